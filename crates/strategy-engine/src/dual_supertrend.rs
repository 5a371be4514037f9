use indicator_kernel::{
    CrossoverDetector, IndicatorResult, IndicatorSettings, IndicatorSpec, Recipe,
};
use market_core::{AnalysisError, CrossoverEvent, Frame, SignalStrength, Verdict};

use crate::{
    base_metadata, float_param, int_param, risk_levels_from_atr, snapshot_of, ParamSpec,
    ParameterTemplate, ResolvedParams, Strategy, REASON_INSUFFICIENT_HISTORY,
    REASON_INSUFFICIENT_VOLATILITY,
};

pub const DUAL_SUPERTREND_NAME: &str = "dual-supertrend-check-single-timeframe";

const MIN_BARS: usize = 30;
const CONFIRMATION_CHECKS: u32 = 4;

/// Two Supertrends (a slow one for the regime, a fast one for timing) plus
/// RSI, MACD and ADX gates. Entries need both trends aligned; exits fire as
/// soon as either lets go.
#[derive(Debug, Default)]
pub struct DualSupertrendStrategy;

impl DualSupertrendStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl Strategy for DualSupertrendStrategy {
    fn name(&self) -> &'static str {
        DUAL_SUPERTREND_NAME
    }

    fn parameter_template(&self) -> ParameterTemplate {
        ParameterTemplate::new(vec![
            ParamSpec::int("supertrend_a_period", 15, 10, 30, "Long trend period"),
            ParamSpec::float(
                "supertrend_a_multiplier",
                3.142,
                1.0,
                5.0,
                "Long trend ATR multiplier",
            ),
            ParamSpec::int("supertrend_b_period", 6, 3, 15, "Short trend period"),
            ParamSpec::float(
                "supertrend_b_multiplier",
                0.66,
                0.5,
                3.0,
                "Short trend ATR multiplier",
            ),
            ParamSpec::int(
                "confirmation_threshold",
                3,
                1,
                5,
                "Minimum confirmations to enter",
            ),
            ParamSpec::int("exit_threshold", 2, 1, 5, "Minimum confirmations to exit"),
            ParamSpec::float(
                "atr_stop_multiplier",
                2.0,
                1.0,
                5.0,
                "Stop distance in ATR units",
            ),
            ParamSpec::float(
                "atr_target_multiplier",
                3.0,
                1.0,
                10.0,
                "Target distance in ATR units",
            ),
            ParamSpec::float("rsi_overbought", 70.0, 60.0, 90.0, "RSI ceiling"),
            ParamSpec::float("rsi_oversold", 30.0, 10.0, 40.0, "RSI floor"),
            ParamSpec::float(
                "trend_strength_threshold",
                25.0,
                15.0,
                35.0,
                "Minimum ADX for a tradable trend",
            ),
        ])
    }

    fn recipe(&self, params: &ResolvedParams, indicators: &IndicatorSettings) -> Recipe {
        let a_period = int_param(params, "supertrend_a_period").unwrap_or(15) as usize;
        let a_multiplier = float_param(params, "supertrend_a_multiplier").unwrap_or(3.142);
        let b_period = int_param(params, "supertrend_b_period").unwrap_or(6) as usize;
        let b_multiplier = float_param(params, "supertrend_b_multiplier").unwrap_or(0.66);

        Recipe::new()
            .with(IndicatorSpec::Supertrend {
                label: "a".to_string(),
                period: a_period,
                multiplier: a_multiplier,
            })
            .with(IndicatorSpec::Supertrend {
                label: "b".to_string(),
                period: b_period,
                multiplier: b_multiplier,
            })
            .with(IndicatorSpec::Rsi {
                period: indicators.rsi_period,
            })
            .with(IndicatorSpec::Macd {
                fast: indicators.macd_fast,
                slow: indicators.macd_slow,
                signal: indicators.macd_signal,
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

        let dir_a = indicators.latest("st_a_direction").unwrap_or(0.0);
        let dir_b = indicators.latest("st_b_direction").unwrap_or(0.0);
        // Entries need both trends aligned; the exit fires as soon as either
        // trend lets go.
        let entry_long = dir_a > 0.0 && dir_b > 0.0;
        let exit_long = dir_a < 0.0 || dir_b < 0.0;

        let rsi = indicators.latest("rsi");
        let macd = indicators.latest("macd");
        let adx = indicators.latest("adx");

        let rsi_overbought = float_param(params, "rsi_overbought").unwrap_or(70.0);
        let rsi_oversold = float_param(params, "rsi_oversold").unwrap_or(30.0);
        let trend_strength = float_param(params, "trend_strength_threshold").unwrap_or(25.0);

        let mut bull = 0u32;
        let mut bear = 0u32;
        let mut reasons: Vec<String> = Vec::new();

        if entry_long {
            bull += 1;
            reasons.push("dual_supertrend_long".to_string());
        }
        if exit_long {
            bear += 1;
            reasons.push("dual_supertrend_exit".to_string());
        }
        if let Some(rsi) = rsi {
            if rsi < rsi_overbought {
                bull += 1;
                reasons.push("rsi_headroom".to_string());
            }
            if rsi > rsi_oversold {
                bear += 1;
                reasons.push("rsi_floor_clear".to_string());
            }
        }
        if let Some(macd) = macd {
            if macd > 0.0 {
                bull += 1;
                reasons.push("macd_positive".to_string());
            }
            if macd < 0.0 {
                bear += 1;
                reasons.push("macd_negative".to_string());
            }
        }
        if adx.map(|v| v > trend_strength).unwrap_or(false) {
            bull += 1;
            bear += 1;
            reasons.push("adx_trending".to_string());
        }

        let confirmation_threshold = int_param(params, "confirmation_threshold").unwrap_or(3) as u32;
        let exit_threshold = int_param(params, "exit_threshold").unwrap_or(2) as u32;

        let strength = if bull >= CONFIRMATION_CHECKS {
            SignalStrength::StrongBuy
        } else if bull >= confirmation_threshold {
            SignalStrength::Buy
        } else if bear >= CONFIRMATION_CHECKS {
            SignalStrength::StrongSell
        } else if bear >= exit_threshold {
            SignalStrength::Sell
        } else {
            SignalStrength::Neutral
        };

        let confidence = bull.max(bear) as f64 / CONFIRMATION_CHECKS as f64;
        let close = frame.latest().map(|b| b.close).unwrap_or(0.0);
        let stop_multiplier = float_param(params, "atr_stop_multiplier").unwrap_or(2.0);
        let target_multiplier = float_param(params, "atr_target_multiplier").unwrap_or(3.0);

        let mut snapshot = snapshot_of(
            indicators,
            &[
                "st_a_value",
                "st_a_direction",
                "st_b_value",
                "st_b_direction",
                "rsi",
                "macd",
                "adx",
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
                stop_multiplier,
                target_multiplier,
            )),
            indicator_snapshot: snapshot,
            reasons,
            crossovers: detect_flips(frame, indicators, detector),
            metadata,
        })
    }
}

/// State flips of both Supertrends inside the detector window.
fn detect_flips(
    frame: &Frame,
    indicators: &IndicatorResult,
    detector: &CrossoverDetector,
) -> Vec<CrossoverEvent> {
    let timestamps = frame.timestamps();
    let closes = frame.closes();
    let adx = indicators.series("adx");
    let mut events = Vec::new();

    for name in ["st_a_direction", "st_b_direction"] {
        if let Some(direction) = indicators.series(name) {
            let as_i8: Vec<i8> = direction.iter().map(|d| *d as i8).collect();
            events.extend(detector.detect_state_flip(&as_i8, &timestamps, &closes, adx));
        }
    }

    events.sort_by_key(|e| e.bar_index);
    events
}
