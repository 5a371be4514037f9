use std::collections::BTreeMap;

use market_core::{AnalysisError, Frame};
use serde::{Deserialize, Serialize};

use crate::indicators;

/// Built-in defaults, the base layer of override resolution.
pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_RSI_OVERBOUGHT: f64 = 70.0;
pub const DEFAULT_RSI_OVERSOLD: f64 = 30.0;
pub const DEFAULT_STOCH_K_PERIOD: usize = 14;
pub const DEFAULT_STOCH_D_PERIOD: usize = 3;
pub const DEFAULT_STOCH_SMOOTH_K: usize = 3;
pub const DEFAULT_WILLIAMS_PERIOD: usize = 14;
pub const DEFAULT_CCI_PERIOD: usize = 20;
pub const DEFAULT_MACD_FAST: usize = 12;
pub const DEFAULT_MACD_SLOW: usize = 26;
pub const DEFAULT_MACD_SIGNAL: usize = 9;
pub const DEFAULT_ADX_PERIOD: usize = 14;
pub const DEFAULT_BOLLINGER_PERIOD: usize = 20;
pub const DEFAULT_BOLLINGER_STDDEV: f64 = 2.0;
pub const DEFAULT_ATR_PERIOD: usize = 14;

/// A single indicator family plus its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum IndicatorSpec {
    Rsi {
        period: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
        smooth_k: usize,
    },
    WilliamsR {
        period: usize,
    },
    Cci {
        period: usize,
    },
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Adx {
        period: usize,
    },
    Bollinger {
        period: usize,
        stddev: f64,
    },
    Atr {
        period: usize,
    },
    Sma {
        periods: Vec<usize>,
    },
    Ema {
        periods: Vec<usize>,
    },
    Supertrend {
        /// Distinguishes multiple supertrends in one recipe ("a"/"b" for the
        /// dual strategy); empty for the plain `st_*` output names.
        label: String,
        period: usize,
        multiplier: f64,
    },
}

impl IndicatorSpec {
    fn supertrend_key(label: &str) -> String {
        if label.is_empty() {
            "st".to_string()
        } else {
            format!("st_{label}")
        }
    }
}

/// Ordered list of indicator specs evaluated over one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub specs: Vec<IndicatorSpec>,
}

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, spec: IndicatorSpec) -> &mut Self {
        self.specs.push(spec);
        self
    }

    pub fn with(mut self, spec: IndicatorSpec) -> Self {
        self.specs.push(spec);
        self
    }
}

/// Output of one kernel run: named series (frame-length, NaN warmups), named
/// scalars, and the recipe echoed back so results are reproducible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult {
    len: usize,
    series: BTreeMap<String, Vec<f64>>,
    scalars: BTreeMap<String, f64>,
    recipe: Recipe,
}

impl IndicatorResult {
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn series(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|v| v.as_slice())
    }

    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|k| k.as_str())
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        self.scalars.get(name).copied()
    }

    /// Value at the latest bar, None when missing or still in NaN warmup.
    pub fn latest(&self, name: &str) -> Option<f64> {
        self.series
            .get(name)
            .and_then(|v| v.last())
            .copied()
            .filter(|v| v.is_finite())
    }

    fn insert_series(&mut self, name: impl Into<String>, values: Vec<f64>) {
        debug_assert_eq!(values.len(), self.len);
        self.series.insert(name.into(), values);
    }

    fn insert_scalar(&mut self, name: impl Into<String>, value: f64) {
        self.scalars.insert(name.into(), value);
    }
}

/// Evaluate a recipe over a frame. Pure: no I/O, no clock, no globals; equal
/// inputs produce bit-identical outputs. Insufficient history yields NaN
/// warmups instead of failing, so one short series never short-circuits the
/// rest of the recipe.
pub fn compute(frame: &Frame, recipe: &Recipe) -> Result<IndicatorResult, AnalysisError> {
    // Frame::new already validated, but the kernel is also callable with
    // frames deserialized from elsewhere; re-check the ordering invariant.
    let timestamps = frame.timestamps();
    for pair in timestamps.windows(2) {
        if pair[1] <= pair[0] {
            return Err(AnalysisError::InvalidFrame(format!(
                "{}: timestamps not strictly increasing",
                frame.symbol()
            )));
        }
    }

    let bars = frame.bars();
    let closes = frame.closes();
    let mut result = IndicatorResult {
        len: bars.len(),
        series: BTreeMap::new(),
        scalars: BTreeMap::new(),
        recipe: recipe.clone(),
    };

    for spec in &recipe.specs {
        match spec {
            IndicatorSpec::Rsi { period } => {
                result.insert_series("rsi", indicators::rsi(&closes, *period));
                result.insert_scalar("rsi_overbought", DEFAULT_RSI_OVERBOUGHT);
                result.insert_scalar("rsi_oversold", DEFAULT_RSI_OVERSOLD);
            }
            IndicatorSpec::Stochastic {
                k_period,
                d_period,
                smooth_k,
            } => {
                let stoch = indicators::stochastic(bars, *k_period, *d_period, *smooth_k);
                result.insert_series("stoch_k", stoch.k);
                result.insert_series("stoch_d", stoch.d);
            }
            IndicatorSpec::WilliamsR { period } => {
                result.insert_series("williams_r", indicators::williams_r(bars, *period));
            }
            IndicatorSpec::Cci { period } => {
                result.insert_series("cci", indicators::cci(bars, *period));
            }
            IndicatorSpec::Macd { fast, slow, signal } => {
                let macd = indicators::macd(&closes, *fast, *slow, *signal);
                result.insert_series("macd", macd.macd_line);
                result.insert_series("macd_signal", macd.signal_line);
                result.insert_series("macd_hist", macd.histogram);
            }
            IndicatorSpec::Adx { period } => {
                let adx = indicators::adx(bars, *period);
                result.insert_series("adx", adx.adx);
                result.insert_series("plus_di", adx.plus_di);
                result.insert_series("minus_di", adx.minus_di);
            }
            IndicatorSpec::Bollinger { period, stddev } => {
                let bb = indicators::bollinger_bands(&closes, *period, *stddev);
                result.insert_series("bb_upper", bb.upper);
                result.insert_series("bb_middle", bb.middle);
                result.insert_series("bb_lower", bb.lower);
                result.insert_series("bb_width", bb.width);
            }
            IndicatorSpec::Atr { period } => {
                result.insert_series("atr", indicators::atr(bars, *period));
            }
            IndicatorSpec::Sma { periods } => {
                for p in periods {
                    result.insert_series(format!("sma_{p}"), indicators::sma(&closes, *p));
                }
            }
            IndicatorSpec::Ema { periods } => {
                for p in periods {
                    result.insert_series(format!("ema_{p}"), indicators::ema(&closes, *p));
                }
            }
            IndicatorSpec::Supertrend {
                label,
                period,
                multiplier,
            } => {
                let st = indicators::supertrend(bars, *period, *multiplier);
                let key = IndicatorSpec::supertrend_key(label);
                result.insert_series(format!("{key}_value"), st.value);
                result.insert_series(
                    format!("{key}_direction"),
                    st.direction.iter().map(|d| *d as f64).collect(),
                );
            }
        }
    }

    Ok(result)
}
