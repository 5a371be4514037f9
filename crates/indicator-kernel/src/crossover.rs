use chrono::{DateTime, Utc};
use market_core::{CrossKind, CrossSource, CrossoverEvent};
use serde::{Deserialize, Serialize};

/// Detector configuration; every field is resolvable per group/symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectorSettings {
    pub enabled: bool,
    pub volatility_filter_enabled: bool,
    pub adx_threshold: f64,
    pub lookback: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volatility_filter_enabled: true,
            adx_threshold: 18.0,
            lookback: 5,
        }
    }
}

/// Detects line/level/state-flip crossings over the trailing lookback window,
/// optionally gated by ADX. Stateless across calls; callers feed it the
/// current series each run.
#[derive(Debug, Clone, Default)]
pub struct CrossoverDetector {
    settings: DetectorSettings,
}

impl CrossoverDetector {
    pub fn new(settings: DetectorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Line-vs-line crossings of `a` over `b`.
    pub fn detect_line(
        &self,
        a: &[f64],
        b: &[f64],
        timestamps: &[DateTime<Utc>],
        closes: &[f64],
        adx: Option<&[f64]>,
    ) -> Vec<CrossoverEvent> {
        self.scan(CrossSource::Line, a.len(), timestamps, closes, adx, |i| {
            cross_kind(a[i - 1], b[i - 1], a[i], b[i])
        })
    }

    /// Series-vs-constant crossings.
    pub fn detect_level(
        &self,
        a: &[f64],
        level: f64,
        timestamps: &[DateTime<Utc>],
        closes: &[f64],
        adx: Option<&[f64]>,
    ) -> Vec<CrossoverEvent> {
        self.scan(CrossSource::Level, a.len(), timestamps, closes, adx, |i| {
            cross_kind(a[i - 1], level, a[i], level)
        })
    }

    /// Supertrend-style state flips of a +1/-1 direction series.
    pub fn detect_state_flip(
        &self,
        direction: &[i8],
        timestamps: &[DateTime<Utc>],
        closes: &[f64],
        adx: Option<&[f64]>,
    ) -> Vec<CrossoverEvent> {
        self.scan(
            CrossSource::StateFlip,
            direction.len(),
            timestamps,
            closes,
            adx,
            |i| {
                if direction[i] == direction[i - 1] {
                    None
                } else if direction[i] > 0 {
                    Some(CrossKind::Bullish)
                } else {
                    Some(CrossKind::Bearish)
                }
            },
        )
    }

    /// Most recent event in the window, if any.
    pub fn latest<'a>(&self, events: &'a [CrossoverEvent]) -> Option<&'a CrossoverEvent> {
        events.last()
    }

    fn scan(
        &self,
        source: CrossSource,
        len: usize,
        timestamps: &[DateTime<Utc>],
        closes: &[f64],
        adx: Option<&[f64]>,
        classify: impl Fn(usize) -> Option<CrossKind>,
    ) -> Vec<CrossoverEvent> {
        if !self.settings.enabled || len < 2 || self.settings.lookback == 0 {
            return vec![];
        }
        debug_assert_eq!(len, timestamps.len());
        debug_assert_eq!(len, closes.len());

        let start = len.saturating_sub(self.settings.lookback).max(1);
        let mut events = Vec::new();

        for i in start..len {
            let Some(kind) = classify(i) else {
                continue;
            };

            let gating_strength = adx.map(|s| s[i]).filter(|v| v.is_finite());
            if self.settings.volatility_filter_enabled {
                match gating_strength {
                    Some(v) if v >= self.settings.adx_threshold => {}
                    // Unknown or weak trend strength suppresses the event.
                    _ if adx.is_some() => continue,
                    _ => {}
                }
            }

            events.push(CrossoverEvent {
                kind,
                kind_source: source,
                bar_index: i,
                bar_timestamp: timestamps[i],
                price_at_bar: closes[i],
                gating_strength,
            });
        }

        events
    }
}

fn cross_kind(prev_a: f64, prev_b: f64, cur_a: f64, cur_b: f64) -> Option<CrossKind> {
    if prev_a.is_nan() || prev_b.is_nan() || cur_a.is_nan() || cur_b.is_nan() {
        return None;
    }
    if prev_a <= prev_b && cur_a > cur_b {
        Some(CrossKind::Bullish)
    } else if prev_a >= prev_b && cur_a < cur_b {
        Some(CrossKind::Bearish)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(n: usize) -> Vec<DateTime<Utc>> {
        (0..n)
            .map(|i| {
                Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(i as i64)
            })
            .collect()
    }

    #[test]
    fn line_cross_detected_within_lookback() {
        let a = vec![1.0, 1.0, 1.0, 2.0, 3.0];
        let b = vec![2.0, 2.0, 2.0, 1.5, 1.5];
        let closes = vec![10.0; 5];
        let detector = CrossoverDetector::new(DetectorSettings {
            volatility_filter_enabled: false,
            ..Default::default()
        });

        let events = detector.detect_line(&a, &b, &ts(5), &closes, None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, CrossKind::Bullish);
        assert_eq!(events[0].bar_index, 3);
        assert_eq!(events[0].kind_source, CrossSource::Line);
    }

    #[test]
    fn cross_outside_lookback_is_ignored() {
        let mut a = vec![1.0; 12];
        let mut b = vec![2.0; 12];
        // Cross at index 2, far before the 5-bar window
        a[2] = 3.0;
        b[2] = 1.0;
        let closes = vec![10.0; 12];
        let detector = CrossoverDetector::new(DetectorSettings {
            volatility_filter_enabled: false,
            ..Default::default()
        });

        let events = detector.detect_line(&a, &b, &ts(12), &closes, None);
        assert!(events.is_empty());
    }

    #[test]
    fn adx_gate_suppresses_weak_cross() {
        let a = vec![1.0, 1.0, 1.0, 1.0, 2.0];
        let b = vec![1.5, 1.5, 1.5, 1.5, 1.5];
        let closes = vec![10.0; 5];
        let adx = vec![12.0; 5];
        let detector = CrossoverDetector::new(DetectorSettings::default());

        let events = detector.detect_line(&a, &b, &ts(5), &closes, Some(&adx));
        assert!(events.is_empty());

        let strong_adx = vec![28.0; 5];
        let events = detector.detect_line(&a, &b, &ts(5), &closes, Some(&strong_adx));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].gating_strength, Some(28.0));
    }

    #[test]
    fn state_flip_detected() {
        let direction = vec![1i8, 1, 1, -1, -1];
        let closes = vec![10.0; 5];
        let detector = CrossoverDetector::new(DetectorSettings {
            volatility_filter_enabled: false,
            ..Default::default()
        });

        let events = detector.detect_state_flip(&direction, &ts(5), &closes, None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, CrossKind::Bearish);
        assert_eq!(events[0].kind_source, CrossSource::StateFlip);
        assert_eq!(events[0].bar_index, 3);
    }

    #[test]
    fn level_cross_uses_constant() {
        let a = vec![35.0, 32.0, 29.0, 28.0, 31.0];
        let closes = vec![10.0; 5];
        let detector = CrossoverDetector::new(DetectorSettings {
            volatility_filter_enabled: false,
            ..Default::default()
        });

        let events = detector.detect_level(&a, 30.0, &ts(5), &closes, None);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, CrossKind::Bearish);
        assert_eq!(events[1].kind, CrossKind::Bullish);
        assert_eq!(detector.latest(&events).unwrap().bar_index, 4);
    }

    #[test]
    fn disabled_detector_emits_nothing() {
        let a = vec![1.0, 2.0];
        let b = vec![1.5, 1.5];
        let closes = vec![10.0; 2];
        let detector = CrossoverDetector::new(DetectorSettings {
            enabled: false,
            ..Default::default()
        });

        assert!(detector.detect_line(&a, &b, &ts(2), &closes, None).is_empty());
    }

    #[test]
    fn nan_bars_produce_no_events() {
        let a = vec![f64::NAN, 2.0];
        let b = vec![1.5, 1.5];
        let closes = vec![10.0; 2];
        let detector = CrossoverDetector::new(DetectorSettings {
            volatility_filter_enabled: false,
            ..Default::default()
        });

        assert!(detector.detect_line(&a, &b, &ts(2), &closes, None).is_empty());
    }
}
