use std::sync::Arc;

use chrono::Utc;
use indicator_kernel::CrossoverDetector;
use market_core::{DataError, DataProvider, Verdict};
use portfolio_model::ResolvedConfig;
use strategy_engine::{StrategyRegistry, REASON_INTERNAL_ERROR};
use thiserror::Error;

/// How a single end-to-end analysis run can fail.
#[derive(Error, Debug)]
pub enum AnalyzeFailure {
    /// Provider timeout or empty response; the only retriable class.
    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    /// OHLC invariants violated in the fetched frame.
    #[error("Data invalid: {0}")]
    DataInvalid(String),

    /// Unknown strategy or parameters outside the template.
    #[error("Config invalid: {0}")]
    ConfigInvalid(String),
}

impl AnalyzeFailure {
    pub fn is_retriable(&self) -> bool {
        matches!(self, AnalyzeFailure::DataUnavailable(_))
    }
}

/// End-to-end analysis for one resolved symbol config:
/// fetch -> validate -> kernel -> detector -> strategy -> metadata.
///
/// Synchronous apart from the provider await; concurrency and timeouts live
/// one level up in the scheduler.
pub struct Orchestrator {
    provider: Arc<dyn DataProvider>,
    registry: Arc<StrategyRegistry>,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn DataProvider>, registry: Arc<StrategyRegistry>) -> Self {
        Self { provider, registry }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub async fn analyze(&self, config: &ResolvedConfig) -> Result<Verdict, AnalyzeFailure> {
        tracing::debug!(
            symbol = %config.symbol,
            strategy = %config.strategy_name,
            interval = %config.interval,
            "Starting analysis"
        );

        // 1. Fetch. Frame construction enforces the OHLC invariants, so a
        //    frame that arrives here is structurally valid.
        let frame = self
            .provider
            .fetch(
                &config.symbol,
                config.asset_class,
                config.interval,
                config.period,
            )
            .await
            .map_err(|err| match err {
                DataError::Timeout(_) | DataError::Empty(_) | DataError::Provider(_) => {
                    AnalyzeFailure::DataUnavailable(err.to_string())
                }
            })?;

        if frame.is_empty() {
            return Err(AnalyzeFailure::DataUnavailable(format!(
                "empty frame for {}",
                config.symbol
            )));
        }

        // 2. Resolve the strategy and validate parameters; both are config
        //    errors, never retried.
        let strategy = self
            .registry
            .get(&config.strategy_name)
            .map_err(|err| AnalyzeFailure::ConfigInvalid(err.to_string()))?;
        let params = strategy
            .validate(&config.strategy_params)
            .map_err(|err| AnalyzeFailure::ConfigInvalid(err.to_string()))?;

        // 3. Kernel pass over the strategy's recipe.
        let recipe = strategy.recipe(&params, &config.indicators);
        let indicators = indicator_kernel::compute(&frame, &recipe)
            .map_err(|err| AnalyzeFailure::DataInvalid(err.to_string()))?;

        // 4. Detector with the resolved thresholds.
        let detector = CrossoverDetector::new(config.detector_settings());

        // 5. Strategy verdict. A strategy error is contained: logged and
        //    demoted to a neutral verdict so the monitor keeps running.
        let mut verdict = match strategy.analyze(&frame, &params, &indicators, &detector) {
            Ok(verdict) => verdict,
            Err(err) => {
                tracing::error!(
                    symbol = %config.symbol,
                    strategy = %config.strategy_name,
                    "Strategy failed: {err}"
                );
                let metadata = market_core::VerdictMetadata {
                    symbol: config.symbol.clone(),
                    strategy_name: config.strategy_name.clone(),
                    interval: config.interval,
                    run_at: Utc::now(),
                    data_completeness: 0.0,
                    params_used: serde_json_value(&params),
                };
                Verdict::neutral(REASON_INTERNAL_ERROR, metadata)
            }
        };

        // 6. Attach run metadata.
        verdict.metadata.run_at = Utc::now();
        verdict.metadata.data_completeness = completeness(&frame, config);

        tracing::debug!(
            symbol = %config.symbol,
            sentiment = ?verdict.sentiment,
            strength = ?verdict.strength,
            confidence = verdict.confidence,
            "Analysis complete"
        );

        Ok(verdict)
    }
}

fn serde_json_value(params: &strategy_engine::ResolvedParams) -> serde_json::Value {
    serde_json::to_value(params).unwrap_or(serde_json::Value::Null)
}

fn completeness(frame: &market_core::Frame, config: &ResolvedConfig) -> f64 {
    match config.period.approx_days() {
        Some(days) => {
            let expected = (days * 24 * 60) / config.interval.to_minutes();
            frame.completeness(expected.max(1) as usize)
        }
        None => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use market_core::{
        AssetClass, Bar, Frame, Interval, Period, Sentiment,
    };
    use portfolio_model::{resolve, Group, SymbolConfig};
    use std::sync::Mutex;

    struct StaticProvider {
        frames: Mutex<Vec<Result<Frame, DataError>>>,
    }

    impl StaticProvider {
        fn with(frame: Result<Frame, DataError>) -> Self {
            Self {
                frames: Mutex::new(vec![frame]),
            }
        }
    }

    #[async_trait]
    impl DataProvider for StaticProvider {
        async fn fetch(
            &self,
            symbol: &str,
            _asset_class: AssetClass,
            _interval: Interval,
            _period: Period,
        ) -> Result<Frame, DataError> {
            self.frames
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(DataError::Empty(symbol.to_string())))
        }
    }

    fn trend_frame(n: usize) -> Frame {
        let bars: Vec<Bar> = (0..n)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.4).sin() * 3.0 + i as f64 * 0.05;
                Bar {
                    timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
                        + chrono::Duration::hours(i as i64),
                    open: base,
                    high: base + 1.0,
                    low: base - 1.0,
                    close: base + 0.3,
                    volume: 1000.0,
                }
            })
            .collect();
        Frame::new("EURUSD", Interval::Hour1, bars).unwrap()
    }

    fn config_for(strategy: Option<&str>) -> portfolio_model::ResolvedConfig {
        let mut group = Group::new("fx", "FX");
        let mut member = SymbolConfig::new(
            "EURUSD",
            AssetClass::Forex,
            Interval::Hour1,
            Period::Month1,
        );
        if let Some(name) = strategy {
            member.strategy_overrides.name = Some(name.to_string());
        }
        group.upsert_member("eurusd-1h", member);
        resolve(&group, "eurusd-1h").unwrap()
    }

    fn orchestrator(provider: StaticProvider) -> Orchestrator {
        Orchestrator::new(
            Arc::new(provider),
            Arc::new(StrategyRegistry::with_builtins()),
        )
    }

    #[tokio::test]
    async fn full_pipeline_produces_verdict_with_metadata() {
        let orch = orchestrator(StaticProvider::with(Ok(trend_frame(120))));
        let verdict = orch.analyze(&config_for(None)).await.unwrap();

        assert_eq!(verdict.metadata.symbol, "EURUSD");
        assert_eq!(
            verdict.metadata.strategy_name,
            "default-check-single-timeframe"
        );
        assert!(verdict.metadata.data_completeness > 0.0);
        assert!(verdict.confidence >= 0.0 && verdict.confidence <= 1.0);
    }

    #[tokio::test]
    async fn provider_failure_is_retriable_data_unavailable() {
        let orch = orchestrator(StaticProvider::with(Err(DataError::Timeout(
            "EURUSD".to_string(),
        ))));
        let err = orch.analyze(&config_for(None)).await.unwrap_err();

        assert!(matches!(err, AnalyzeFailure::DataUnavailable(_)));
        assert!(err.is_retriable());
    }

    #[tokio::test]
    async fn unknown_strategy_is_config_invalid() {
        let orch = orchestrator(StaticProvider::with(Ok(trend_frame(120))));
        let err = orch
            .analyze(&config_for(Some("quantum-oracle")))
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyzeFailure::ConfigInvalid(_)));
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn short_frame_becomes_neutral_verdict_not_error() {
        let orch = orchestrator(StaticProvider::with(Ok(trend_frame(5))));
        let verdict = orch.analyze(&config_for(None)).await.unwrap();

        assert_eq!(verdict.sentiment, Sentiment::Neutral);
        assert!(verdict
            .reasons
            .iter()
            .any(|r| r == "insufficient_history"));
    }

    #[tokio::test]
    async fn legacy_alias_resolves_through_registry() {
        let orch = orchestrator(StaticProvider::with(Ok(trend_frame(120))));
        let verdict = orch
            .analyze(&config_for(Some("single-check")))
            .await
            .unwrap();
        assert_eq!(
            verdict.metadata.strategy_name,
            "default-check-single-timeframe"
        );
    }
}
