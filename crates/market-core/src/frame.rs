use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{AnalysisError, Bar, Interval};

/// Immutable window of bars for a single (symbol, interval).
///
/// Construction validates the OHLC invariants; a `Frame` that exists is a
/// frame the kernel can trust. Missing bars are never interpolated;
/// `completeness` reports how full the window is instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    symbol: String,
    interval: Interval,
    bars: Vec<Bar>,
}

impl Frame {
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        bars: Vec<Bar>,
    ) -> Result<Self, AnalysisError> {
        let symbol = symbol.into();

        for (i, bar) in bars.iter().enumerate() {
            let values = [bar.open, bar.high, bar.low, bar.close, bar.volume];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(AnalysisError::InvalidFrame(format!(
                    "{symbol}: non-finite value at bar {i}"
                )));
            }
            if bar.open < 0.0 || bar.close < 0.0 || bar.low < 0.0 || bar.volume < 0.0 {
                return Err(AnalysisError::InvalidFrame(format!(
                    "{symbol}: negative price or volume at bar {i}"
                )));
            }
            if bar.low > bar.high {
                return Err(AnalysisError::InvalidFrame(format!(
                    "{symbol}: low > high at bar {i}"
                )));
            }
            if bar.open < bar.low
                || bar.open > bar.high
                || bar.close < bar.low
                || bar.close > bar.high
            {
                return Err(AnalysisError::InvalidFrame(format!(
                    "{symbol}: open/close outside [low, high] at bar {i}"
                )));
            }
            if i > 0 {
                let prev = bars[i - 1].timestamp;
                if bar.timestamp == prev {
                    return Err(AnalysisError::InvalidFrame(format!(
                        "{symbol}: duplicated timestamp {} at bar {i}",
                        bar.timestamp
                    )));
                }
                if bar.timestamp < prev {
                    return Err(AnalysisError::InvalidFrame(format!(
                        "{symbol}: timestamps not increasing at bar {i}"
                    )));
                }
            }
        }

        Ok(Self {
            symbol,
            interval,
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn is_sufficient_for(&self, min_bars: usize) -> bool {
        self.bars.len() >= min_bars
    }

    /// New frame holding only the trailing `n` bars.
    pub fn tail(&self, n: usize) -> Frame {
        let start = self.bars.len().saturating_sub(n);
        Frame {
            symbol: self.symbol.clone(),
            interval: self.interval,
            bars: self.bars[start..].to_vec(),
        }
    }

    /// Fraction of the expected window actually present, in [0, 1].
    pub fn completeness(&self, expected_bars: usize) -> f64 {
        if expected_bars == 0 {
            return 1.0;
        }
        (self.bars.len() as f64 / expected_bars as f64).min(1.0)
    }

    pub fn opens(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.open).collect()
    }

    pub fn highs(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.high).collect()
    }

    pub fn lows(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.low).collect()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.bars.iter().map(|b| b.timestamp).collect()
    }
}
