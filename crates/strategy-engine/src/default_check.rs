use indicator_kernel::{
    CrossoverDetector, IndicatorResult, IndicatorSettings, IndicatorSpec, Recipe,
    DEFAULT_RSI_OVERBOUGHT, DEFAULT_RSI_OVERSOLD,
};
use market_core::{AnalysisError, CrossoverEvent, Frame, SignalStrength, Verdict};

use crate::{
    base_metadata, risk_levels_from_atr, snapshot_of, ParameterTemplate, ResolvedParams,
    Strategy, REASON_INSUFFICIENT_HISTORY, REASON_INSUFFICIENT_VOLATILITY,
};

pub const DEFAULT_CHECK_NAME: &str = "default-check-single-timeframe";

const MIN_BARS: usize = 50;
const CONFIRMATION_CHECKS: u32 = 6;
const ATR_STOP_MULTIPLIER: f64 = 2.0;
const ATR_TARGET_MULTIPLIER: f64 = 3.0;

/// Multi-indicator confirmation strategy with a frozen configuration: six
/// standard checks (RSI, Stochastic, CCI, MACD, Williams %R, DMI) tallied
/// into a directional verdict.
#[derive(Debug, Default)]
pub struct DefaultCheckStrategy;

impl DefaultCheckStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for DefaultCheckStrategy {
    fn name(&self) -> &'static str {
        DEFAULT_CHECK_NAME
    }

    fn parameter_template(&self) -> ParameterTemplate {
        ParameterTemplate::empty()
    }

    fn recipe(&self, _params: &ResolvedParams, indicators: &IndicatorSettings) -> Recipe {
        Recipe::new()
            .with(IndicatorSpec::Rsi {
                period: indicators.rsi_period,
            })
            .with(IndicatorSpec::Stochastic {
                k_period: indicators.stoch_k_period,
                d_period: indicators.stoch_d_period,
                smooth_k: indicators.stoch_smooth_k,
            })
            .with(IndicatorSpec::Cci {
                period: indicators.cci_period,
            })
            .with(IndicatorSpec::Macd {
                fast: indicators.macd_fast,
                slow: indicators.macd_slow,
                signal: indicators.macd_signal,
            })
            .with(IndicatorSpec::WilliamsR {
                period: indicators.williams_period,
            })
            .with(IndicatorSpec::Adx {
                period: indicators.adx_period,
            })
            .with(IndicatorSpec::Atr {
                period: indicators.atr_period,
            })
    }

    fn analyze(
        &self,
        frame: &Frame,
        params: &ResolvedParams,
        indicators: &IndicatorResult,
        detector: &CrossoverDetector,
    ) -> Result<Verdict, AnalysisError> {
        let metadata = base_metadata(frame, self.name(), params);

        if !frame.is_sufficient_for(MIN_BARS) {
            return Ok(Verdict::neutral(REASON_INSUFFICIENT_HISTORY, metadata));
        }

        let atr = indicators.latest("atr");
        if atr.map(|v| v <= 0.0).unwrap_or(true) {
            return Ok(Verdict::neutral(REASON_INSUFFICIENT_VOLATILITY, metadata));
        }
        let atr = atr.unwrap_or(0.0);

        let mut bull = 0u32;
        let mut bear = 0u32;
        let mut reasons: Vec<String> = Vec::new();
        let mut confirm = |bullish: bool, fired: bool, code: &str| {
            if fired {
                if bullish {
                    bull += 1;
                } else {
                    bear += 1;
                }
                reasons.push(code.to_string());
            }
        };

        if let Some(rsi) = indicators.latest("rsi") {
            confirm(true, rsi < DEFAULT_RSI_OVERSOLD, "rsi_oversold");
            confirm(false, rsi > DEFAULT_RSI_OVERBOUGHT, "rsi_overbought");
        }

        if let (Some(k), Some(d)) = (indicators.latest("stoch_k"), indicators.latest("stoch_d"))
        {
            confirm(true, k > d, "stoch_bullish");
            confirm(false, k < d, "stoch_bearish");
        }

        if let Some(cci) = indicators.latest("cci") {
            confirm(true, cci > 100.0, "cci_bullish");
            confirm(false, cci < -100.0, "cci_bearish");
        }

        if let (Some(macd), Some(signal)) =
            (indicators.latest("macd"), indicators.latest("macd_signal"))
        {
            confirm(true, macd > signal, "macd_bullish");
            confirm(false, macd < signal, "macd_bearish");
        }

        if let Some(wr) = indicators.latest("williams_r") {
            confirm(true, wr < -80.0, "williams_oversold");
            confirm(false, wr > -20.0, "williams_overbought");
        }

        if let (Some(pdi), Some(mdi)) =
            (indicators.latest("plus_di"), indicators.latest("minus_di"))
        {
            confirm(true, pdi > mdi, "dmi_bullish");
            confirm(false, pdi < mdi, "dmi_bearish");
        }

        let strong = (CONFIRMATION_CHECKS as f64 * 0.7).ceil() as u32;
        let strength = if bull >= strong {
            SignalStrength::StrongBuy
        } else if bear >= strong {
            SignalStrength::StrongSell
        } else if bull > bear {
            SignalStrength::Buy
        } else if bear > bull {
            SignalStrength::Sell
        } else {
            SignalStrength::Neutral
        };

        let confidence = bull.max(bear) as f64 / CONFIRMATION_CHECKS as f64;
        let close = frame.latest().map(|b| b.close).unwrap_or(0.0);

        let mut snapshot = snapshot_of(
            indicators,
            &[
                "rsi",
                "stoch_k",
                "stoch_d",
                "cci",
                "macd",
                "macd_signal",
                "williams_r",
                "adx",
                "plus_di",
                "minus_di",
                "atr",
            ],
        );
        snapshot.insert("close".to_string(), close);

        Ok(Verdict {
            sentiment: strength.sentiment(),
            strength,
            confidence,
            confirmations_buy: bull,
            confirmations_sell: bear,
            risk_levels: Some(risk_levels_from_atr(
                close,
                atr,
                ATR_STOP_MULTIPLIER,
                ATR_TARGET_MULTIPLIER,
            )),
            indicator_snapshot: snapshot,
            reasons,
            crossovers: detect_crossovers(frame, indicators, detector),
            metadata,
        })
    }
}

/// Line and level crossings the default strategy watches: %K over %D, MACD
/// over its signal, and RSI through the oversold/overbought levels.
fn detect_crossovers(
    frame: &Frame,
    indicators: &IndicatorResult,
    detector: &CrossoverDetector,
) -> Vec<CrossoverEvent> {
    let timestamps = frame.timestamps();
    let closes = frame.closes();
    let adx = indicators.series("adx");
    let mut events = Vec::new();

    if let (Some(k), Some(d)) = (indicators.series("stoch_k"), indicators.series("stoch_d")) {
        events.extend(detector.detect_line(k, d, &timestamps, &closes, adx));
    }
    if let (Some(macd), Some(signal)) =
        (indicators.series("macd"), indicators.series("macd_signal"))
    {
        events.extend(detector.detect_line(macd, signal, &timestamps, &closes, adx));
    }
    if let Some(rsi) = indicators.series("rsi") {
        events.extend(detector.detect_level(
            rsi,
            DEFAULT_RSI_OVERSOLD,
            &timestamps,
            &closes,
            adx,
        ));
        events.extend(detector.detect_level(
            rsi,
            DEFAULT_RSI_OVERBOUGHT,
            &timestamps,
            &closes,
            adx,
        ));
    }

    events.sort_by_key(|e| e.bar_index);
    events
}
