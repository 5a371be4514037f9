use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use market_core::{AssetClass, Bar, DataError, DataProvider, Frame, Interval, Period};
use serde::Deserialize;

/// File-backed data provider: one CSV per (symbol, interval) under a root
/// directory, named `<SYMBOL>_<interval>.csv` with columns
/// `timestamp,open,high,low,close,volume`. Timestamps are RFC 3339 or epoch
/// seconds. Stands in for a network provider behind the same interface.
pub struct CsvDataProvider {
    root: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvBar {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

impl CsvDataProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, DataError> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        if let Ok(epoch) = raw.parse::<i64>() {
            if let Some(ts) = Utc.timestamp_opt(epoch, 0).single() {
                return Ok(ts);
            }
        }
        Err(DataError::Provider(format!("unparsable timestamp '{raw}'")))
    }
}

#[async_trait]
impl DataProvider for CsvDataProvider {
    async fn fetch(
        &self,
        symbol: &str,
        _asset_class: AssetClass,
        interval: Interval,
        period: Period,
    ) -> Result<Frame, DataError> {
        let path = self.root.join(format!("{symbol}_{interval}.csv"));
        if !path.exists() {
            return Err(DataError::Empty(format!(
                "no bar file {} for {symbol}",
                path.display()
            )));
        }

        let mut reader = csv::Reader::from_path(&path)
            .map_err(|err| DataError::Provider(err.to_string()))?;

        let mut bars = Vec::new();
        for record in reader.deserialize::<CsvBar>() {
            let row = record.map_err(|err| DataError::Provider(err.to_string()))?;
            bars.push(Bar {
                timestamp: Self::parse_timestamp(&row.timestamp)?,
                open: row.open,
                high: row.high,
                low: row.low,
                close: row.close,
                volume: row.volume,
            });
        }

        if bars.is_empty() {
            return Err(DataError::Empty(symbol.to_string()));
        }

        // Trim to the requested lookback window, anchored at the latest bar
        if let Some(days) = period.approx_days() {
            let last = bars.last().map(|b| b.timestamp);
            if let Some(last) = last {
                let cutoff = last - Duration::days(days);
                bars.retain(|b| b.timestamp >= cutoff);
            }
        }

        Frame::new(symbol, interval, bars)
            .map_err(|err| DataError::Provider(err.to_string()))
    }
}
