use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AssetClass, CrossoverEvent, DataError, Frame, Interval, NotifyError, Period, Sentiment,
};

/// Trait for market-data providers. Network, caching and format specifics are
/// the provider's business; the engine only sees frames.
#[async_trait]
pub trait DataProvider: Send + Sync {
    async fn fetch(
        &self,
        symbol: &str,
        asset_class: AssetClass,
        interval: Interval,
        period: Period,
    ) -> Result<Frame, DataError>;
}

/// Alert conditions a policy can subscribe to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    SentimentFlip,
    ConfidenceDrift,
    AtrBandShift,
    ValidityLoss,
    NewCrossover,
}

/// Event severity as seen by the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warn,
    Critical,
}

/// Snapshot of the verdict that opened a tracked entry, kept so later runs can
/// tell when the original thesis stops holding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub sentiment: Sentiment,
    pub confidence: f64,
    pub price: f64,
    pub entered_at: DateTime<Utc>,
}

/// Payload of an emitted alert, one variant per diff condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AlertPayload {
    SentimentFlip {
        old_sentiment: Sentiment,
        new_sentiment: Sentiment,
        indicator_deltas: BTreeMap<String, f64>,
    },
    ConfidenceDrift {
        old_confidence: f64,
        new_confidence: f64,
        delta: f64,
    },
    AtrBandShift {
        old_upper: f64,
        old_lower: f64,
        new_upper: f64,
        new_lower: f64,
        suggested_trailing_stop: f64,
    },
    ValidityLoss {
        entry: EntrySnapshot,
        current_sentiment: Sentiment,
        current_confidence: f64,
    },
    NewCrossover {
        event: CrossoverEvent,
    },
    /// Operational event: a monitor exhausted its failure budget.
    MonitorFailing {
        consecutive_failures: u32,
        last_error: String,
    },
}

impl AlertPayload {
    /// Diff condition this payload belongs to, `None` for operational events.
    pub fn condition(&self) -> Option<AlertCondition> {
        match self {
            AlertPayload::SentimentFlip { .. } => Some(AlertCondition::SentimentFlip),
            AlertPayload::ConfidenceDrift { .. } => Some(AlertCondition::ConfidenceDrift),
            AlertPayload::AtrBandShift { .. } => Some(AlertCondition::AtrBandShift),
            AlertPayload::ValidityLoss { .. } => Some(AlertCondition::ValidityLoss),
            AlertPayload::NewCrossover { .. } => Some(AlertCondition::NewCrossover),
            AlertPayload::MonitorFailing { .. } => None,
        }
    }
}

/// A classified alert handed to the notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub timestamp: DateTime<Utc>,
    pub group_id: String,
    pub symbol_key: String,
    pub monitor_id: String,
    pub severity: Severity,
    pub payload: AlertPayload,
}

/// Trait for notification sinks. Transports (console, webhook, mail) live
/// outside the engine.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError>;
}
