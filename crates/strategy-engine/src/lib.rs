pub mod default_check;
pub mod dual_supertrend;
pub mod params;
pub mod registry;

pub use default_check::*;
pub use dual_supertrend::*;
pub use params::*;
pub use registry::*;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use indicator_kernel::{CrossoverDetector, IndicatorResult, IndicatorSettings, Recipe};
use market_core::{AnalysisError, Frame, RiskLevels, Verdict, VerdictMetadata};

/// A pluggable analyzer: typed parameter schema in, structured verdict out.
///
/// Implementations are pure CPU-bound code; the orchestrator owns fetching
/// and evaluates `recipe()` through the kernel before calling `analyze`.
pub trait Strategy: Send + Sync {
    /// Stable identifier used by the registry and persisted configs.
    fn name(&self) -> &'static str;

    fn parameter_template(&self) -> ParameterTemplate;

    /// Overlay and check caller-supplied parameters; the error lists every
    /// offending field.
    fn validate(
        &self,
        overrides: &BTreeMap<String, ParamValue>,
    ) -> Result<ResolvedParams, ParameterValidationError> {
        self.parameter_template().validate(overrides)
    }

    /// Indicator recipe this strategy needs, given validated parameters and
    /// the resolved per-symbol indicator settings.
    fn recipe(&self, params: &ResolvedParams, indicators: &IndicatorSettings) -> Recipe;

    fn analyze(
        &self,
        frame: &Frame,
        params: &ResolvedParams,
        indicators: &IndicatorResult,
        detector: &CrossoverDetector,
    ) -> Result<Verdict, AnalysisError>;
}

/// Metadata skeleton a strategy attaches to its verdict. Strategies are
/// clock-free: `run_at` starts as the latest bar timestamp and the
/// orchestrator stamps the real run time afterwards.
pub(crate) fn base_metadata(
    frame: &Frame,
    strategy_name: &str,
    params: &ResolvedParams,
) -> VerdictMetadata {
    let run_at: DateTime<Utc> = frame
        .latest()
        .map(|b| b.timestamp)
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    VerdictMetadata {
        symbol: frame.symbol().to_string(),
        strategy_name: strategy_name.to_string(),
        interval: frame.interval(),
        run_at,
        data_completeness: 1.0,
        params_used: serde_json::to_value(params).unwrap_or(serde_json::Value::Null),
    }
}

/// ATR-scaled protective levels around the latest close.
pub(crate) fn risk_levels_from_atr(
    close: f64,
    atr: f64,
    stop_multiplier: f64,
    target_multiplier: f64,
) -> RiskLevels {
    RiskLevels {
        stop_long: close - atr * stop_multiplier,
        target_long: close + atr * target_multiplier,
        stop_short: close + atr * stop_multiplier,
        target_short: close - atr * target_multiplier,
    }
}

/// Latest finite values for the named series, for the verdict snapshot.
pub(crate) fn snapshot_of(
    indicators: &IndicatorResult,
    names: &[&str],
) -> BTreeMap<String, f64> {
    let mut snapshot = BTreeMap::new();
    for name in names {
        if let Some(value) = indicators.latest(name) {
            snapshot.insert((*name).to_string(), value);
        }
    }
    snapshot
}

/// Reason code for frames too short to analyze.
pub const REASON_INSUFFICIENT_HISTORY: &str = "insufficient_history";
/// Reason code for frames with a dead-flat tail (zero ATR).
pub const REASON_INSUFFICIENT_VOLATILITY: &str = "insufficient_volatility";
/// Reason code attached when a strategy failed internally.
pub const REASON_INTERNAL_ERROR: &str = "internal_error";
