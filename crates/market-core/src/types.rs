use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OHLCV bar data
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candle interval supported by providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    Minute1,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour1,
    #[serde(rename = "2h")]
    Hour2,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "1wk")]
    Week1,
    #[serde(rename = "1mo")]
    Month1,
}

impl Interval {
    pub fn to_minutes(&self) -> i64 {
        match self {
            Interval::Minute1 => 1,
            Interval::Minute5 => 5,
            Interval::Minute15 => 15,
            Interval::Minute30 => 30,
            Interval::Hour1 => 60,
            Interval::Hour2 => 120,
            Interval::Hour4 => 240,
            Interval::Day1 => 1440,
            Interval::Week1 => 10080,
            Interval::Month1 => 43200,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute1 => "1m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Minute30 => "30m",
            Interval::Hour1 => "1h",
            Interval::Hour2 => "2h",
            Interval::Hour4 => "4h",
            Interval::Day1 => "1d",
            Interval::Week1 => "1wk",
            Interval::Month1 => "1mo",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Interval::Minute1),
            "5m" => Ok(Interval::Minute5),
            "15m" => Ok(Interval::Minute15),
            "30m" => Ok(Interval::Minute30),
            "1h" => Ok(Interval::Hour1),
            "2h" => Ok(Interval::Hour2),
            "4h" => Ok(Interval::Hour4),
            "1d" => Ok(Interval::Day1),
            "1wk" => Ok(Interval::Week1),
            "1mo" => Ok(Interval::Month1),
            other => Err(format!("unsupported interval: {other}")),
        }
    }
}

/// Lookback period requested from providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    #[serde(rename = "1d")]
    Day1,
    #[serde(rename = "5d")]
    Day5,
    #[serde(rename = "7d")]
    Day7,
    #[serde(rename = "1wk")]
    Week1,
    #[serde(rename = "1mo")]
    Month1,
    #[serde(rename = "3mo")]
    Month3,
    #[serde(rename = "6mo")]
    Month6,
    #[serde(rename = "1y")]
    Year1,
    #[serde(rename = "2y")]
    Year2,
    #[serde(rename = "5y")]
    Year5,
    #[serde(rename = "max")]
    Max,
}

impl Period {
    /// Rough calendar span, for completeness reporting; `None` for `max`.
    pub fn approx_days(&self) -> Option<i64> {
        match self {
            Period::Day1 => Some(1),
            Period::Day5 => Some(5),
            Period::Day7 => Some(7),
            Period::Week1 => Some(7),
            Period::Month1 => Some(30),
            Period::Month3 => Some(90),
            Period::Month6 => Some(180),
            Period::Year1 => Some(365),
            Period::Year2 => Some(730),
            Period::Year5 => Some(1825),
            Period::Max => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Day1 => "1d",
            Period::Day5 => "5d",
            Period::Day7 => "7d",
            Period::Week1 => "1wk",
            Period::Month1 => "1mo",
            Period::Month3 => "3mo",
            Period::Month6 => "6mo",
            Period::Year1 => "1y",
            Period::Year2 => "2y",
            Period::Year5 => "5y",
            Period::Max => "max",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1d" => Ok(Period::Day1),
            "5d" => Ok(Period::Day5),
            "7d" => Ok(Period::Day7),
            "1wk" => Ok(Period::Week1),
            "1mo" => Ok(Period::Month1),
            "3mo" => Ok(Period::Month3),
            "6mo" => Ok(Period::Month6),
            "1y" => Ok(Period::Year1),
            "2y" => Ok(Period::Year2),
            "5y" => Ok(Period::Year5),
            "max" => Ok(Period::Max),
            other => Err(format!("unsupported period: {other}")),
        }
    }
}

/// Tradable instrument class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    Forex,
    Stocks,
    Crypto,
    Indices,
    Futures,
}

impl fmt::Display for AssetClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssetClass::Forex => "forex",
            AssetClass::Stocks => "stocks",
            AssetClass::Crypto => "crypto",
            AssetClass::Indices => "indices",
            AssetClass::Futures => "futures",
        };
        f.write_str(s)
    }
}

impl FromStr for AssetClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "forex" => Ok(AssetClass::Forex),
            "stocks" => Ok(AssetClass::Stocks),
            "crypto" => Ok(AssetClass::Crypto),
            "indices" => Ok(AssetClass::Indices),
            "futures" => Ok(AssetClass::Futures),
            other => Err(format!("unsupported asset class: {other}")),
        }
    }
}

/// Directional read of a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    pub fn to_label(&self) -> &'static str {
        match self {
            Sentiment::Bullish => "Bullish",
            Sentiment::Bearish => "Bearish",
            Sentiment::Neutral => "Neutral",
        }
    }
}

/// Signal strength
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalStrength {
    StrongBuy,
    Buy,
    Neutral,
    Sell,
    StrongSell,
}

impl SignalStrength {
    /// Directional sentiment implied by the strength bucket.
    pub fn sentiment(&self) -> Sentiment {
        match self {
            SignalStrength::StrongBuy | SignalStrength::Buy => Sentiment::Bullish,
            SignalStrength::Sell | SignalStrength::StrongSell => Sentiment::Bearish,
            SignalStrength::Neutral => Sentiment::Neutral,
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            SignalStrength::StrongBuy => "Strong Buy",
            SignalStrength::Buy => "Buy",
            SignalStrength::Neutral => "Neutral",
            SignalStrength::Sell => "Sell",
            SignalStrength::StrongSell => "Strong Sell",
        }
    }
}

/// Direction of a crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossKind {
    Bullish,
    Bearish,
}

/// What kind of pair produced the crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossSource {
    Line,
    Level,
    StateFlip,
}

/// A single crossing within the detector's lookback window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossoverEvent {
    pub kind: CrossKind,
    pub kind_source: CrossSource,
    pub bar_index: usize,
    pub bar_timestamp: DateTime<Utc>,
    pub price_at_bar: f64,
    /// ADX at the event bar when the volatility gate was consulted.
    pub gating_strength: Option<f64>,
}

/// ATR-derived protective levels around the latest close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskLevels {
    pub stop_long: f64,
    pub target_long: f64,
    pub stop_short: f64,
    pub target_short: f64,
}

/// Provenance attached to every verdict by the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictMetadata {
    pub symbol: String,
    pub strategy_name: String,
    pub interval: Interval,
    pub run_at: DateTime<Utc>,
    /// Ratio of bars received to bars expected for the requested window.
    pub data_completeness: f64,
    /// Parameter set the verdict was computed with, echoed for reproducibility.
    pub params_used: serde_json::Value,
}

/// Structured output of a single strategy invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub sentiment: Sentiment,
    pub strength: SignalStrength,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub confirmations_buy: u32,
    pub confirmations_sell: u32,
    pub risk_levels: Option<RiskLevels>,
    /// Named scalar readings at the latest bar.
    pub indicator_snapshot: BTreeMap<String, f64>,
    /// Short machine-readable codes explaining the verdict.
    pub reasons: Vec<String>,
    /// Detector output at verdict time, used for crossover diffing downstream.
    pub crossovers: Vec<CrossoverEvent>,
    pub metadata: VerdictMetadata,
}

impl Verdict {
    /// Neutral verdict for routine data shortfalls. Never an error path.
    pub fn neutral(reason: impl Into<String>, metadata: VerdictMetadata) -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            strength: SignalStrength::Neutral,
            confidence: 0.0,
            confirmations_buy: 0,
            confirmations_sell: 0,
            risk_levels: None,
            indicator_snapshot: BTreeMap::new(),
            reasons: vec![reason.into()],
            crossovers: Vec::new(),
            metadata,
        }
    }
}
