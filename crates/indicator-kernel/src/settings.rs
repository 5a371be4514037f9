use serde::{Deserialize, Serialize};

use crate::{
    DetectorSettings, IndicatorSpec, Recipe, DEFAULT_ADX_PERIOD, DEFAULT_ATR_PERIOD,
    DEFAULT_BOLLINGER_PERIOD, DEFAULT_BOLLINGER_STDDEV, DEFAULT_CCI_PERIOD, DEFAULT_MACD_FAST,
    DEFAULT_MACD_SIGNAL, DEFAULT_MACD_SLOW, DEFAULT_RSI_PERIOD, DEFAULT_STOCH_D_PERIOD,
    DEFAULT_STOCH_K_PERIOD, DEFAULT_STOCH_SMOOTH_K, DEFAULT_WILLIAMS_PERIOD,
};

/// Fully-resolved indicator configuration: the built-in defaults with any
/// group/symbol overrides already applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSettings {
    pub rsi_period: usize,
    pub stoch_k_period: usize,
    pub stoch_d_period: usize,
    pub stoch_smooth_k: usize,
    pub williams_period: usize,
    pub cci_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub adx_period: usize,
    pub bollinger_period: usize,
    pub bollinger_stddev: f64,
    pub atr_period: usize,
    pub detector: DetectorSettings,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            rsi_period: DEFAULT_RSI_PERIOD,
            stoch_k_period: DEFAULT_STOCH_K_PERIOD,
            stoch_d_period: DEFAULT_STOCH_D_PERIOD,
            stoch_smooth_k: DEFAULT_STOCH_SMOOTH_K,
            williams_period: DEFAULT_WILLIAMS_PERIOD,
            cci_period: DEFAULT_CCI_PERIOD,
            macd_fast: DEFAULT_MACD_FAST,
            macd_slow: DEFAULT_MACD_SLOW,
            macd_signal: DEFAULT_MACD_SIGNAL,
            adx_period: DEFAULT_ADX_PERIOD,
            bollinger_period: DEFAULT_BOLLINGER_PERIOD,
            bollinger_stddev: DEFAULT_BOLLINGER_STDDEV,
            atr_period: DEFAULT_ATR_PERIOD,
            detector: DetectorSettings::default(),
        }
    }
}

impl IndicatorSettings {
    /// The full standard recipe at these settings.
    pub fn standard_recipe(&self) -> Recipe {
        Recipe::new()
            .with(IndicatorSpec::Rsi {
                period: self.rsi_period,
            })
            .with(IndicatorSpec::Stochastic {
                k_period: self.stoch_k_period,
                d_period: self.stoch_d_period,
                smooth_k: self.stoch_smooth_k,
            })
            .with(IndicatorSpec::WilliamsR {
                period: self.williams_period,
            })
            .with(IndicatorSpec::Cci {
                period: self.cci_period,
            })
            .with(IndicatorSpec::Macd {
                fast: self.macd_fast,
                slow: self.macd_slow,
                signal: self.macd_signal,
            })
            .with(IndicatorSpec::Adx {
                period: self.adx_period,
            })
            .with(IndicatorSpec::Bollinger {
                period: self.bollinger_period,
                stddev: self.bollinger_stddev,
            })
            .with(IndicatorSpec::Atr {
                period: self.atr_period,
            })
    }
}
