use std::collections::BTreeMap;

use market_core::{
    AlertCondition, AlertPayload, EntrySnapshot, Sentiment, Severity, Verdict,
};
use portfolio_model::AlertPolicy;

/// Confidence a flip involving neutral must reach before it is worth telling
/// anyone about.
const NEUTRAL_FLIP_MIN_CONFIDENCE: f64 = 0.5;
/// Confidence slack below the entry confidence before an entry is degraded.
const VALIDITY_CONFIDENCE_SLACK: f64 = 0.2;

/// Compare two successive verdicts under a policy and produce one payload per
/// triggered condition. Pure; the scheduler applies dedup and severity on top.
pub fn diff_verdicts(
    policy: &AlertPolicy,
    last: Option<&Verdict>,
    new: &Verdict,
    entry: Option<&EntrySnapshot>,
) -> Vec<AlertPayload> {
    let mut payloads = Vec::new();

    if let Some(last) = last {
        if policy.conditions.contains(&AlertCondition::SentimentFlip) {
            if let Some(payload) = sentiment_flip(last, new) {
                payloads.push(payload);
            }
        }

        if policy.conditions.contains(&AlertCondition::ConfidenceDrift) {
            let delta = new.confidence - last.confidence;
            if delta.abs() >= policy.min_confidence_drift {
                payloads.push(AlertPayload::ConfidenceDrift {
                    old_confidence: last.confidence,
                    new_confidence: new.confidence,
                    delta,
                });
            }
        }

        if policy.conditions.contains(&AlertCondition::AtrBandShift) {
            if let Some(payload) = band_shift(policy, last, new) {
                payloads.push(payload);
            }
        }

        if policy.conditions.contains(&AlertCondition::NewCrossover) {
            for event in &new.crossovers {
                let seen = last.crossovers.iter().any(|old| {
                    old.kind == event.kind
                        && old.kind_source == event.kind_source
                        && old.bar_timestamp == event.bar_timestamp
                });
                if !seen {
                    payloads.push(AlertPayload::NewCrossover {
                        event: event.clone(),
                    });
                }
            }
        }
    }

    if policy.conditions.contains(&AlertCondition::ValidityLoss) {
        if let Some(entry) = entry {
            if let Some(payload) = validity_loss(entry, new) {
                payloads.push(payload);
            }
        }
    }

    payloads
}

fn sentiment_flip(last: &Verdict, new: &Verdict) -> Option<AlertPayload> {
    if last.sentiment == new.sentiment {
        return None;
    }

    let involves_neutral =
        last.sentiment == Sentiment::Neutral || new.sentiment == Sentiment::Neutral;
    if involves_neutral
        && last.confidence < NEUTRAL_FLIP_MIN_CONFIDENCE
        && new.confidence < NEUTRAL_FLIP_MIN_CONFIDENCE
    {
        return None;
    }

    Some(AlertPayload::SentimentFlip {
        old_sentiment: last.sentiment,
        new_sentiment: new.sentiment,
        indicator_deltas: indicator_deltas(last, new),
    })
}

/// Deltas for the indicator readings present in both snapshots.
fn indicator_deltas(last: &Verdict, new: &Verdict) -> BTreeMap<String, f64> {
    let mut deltas = BTreeMap::new();
    for (name, new_value) in &new.indicator_snapshot {
        if let Some(old_value) = last.indicator_snapshot.get(name) {
            let delta = new_value - old_value;
            if delta != 0.0 {
                deltas.insert(name.clone(), delta);
            }
        }
    }
    deltas
}

fn band_shift(policy: &AlertPolicy, last: &Verdict, new: &Verdict) -> Option<AlertPayload> {
    let (old_levels, new_levels) = match (&last.risk_levels, &new.risk_levels) {
        (Some(old), Some(new)) => (old, new),
        _ => return None,
    };

    // The ATR envelope: stop_short above price, stop_long below.
    let upper_shift = (new_levels.stop_short - old_levels.stop_short).abs();
    let lower_shift = (new_levels.stop_long - old_levels.stop_long).abs();
    if upper_shift.max(lower_shift) < policy.min_band_shift_units {
        return None;
    }

    let suggested_trailing_stop = match new.sentiment {
        Sentiment::Bearish => new_levels.stop_short,
        _ => new_levels.stop_long,
    };

    Some(AlertPayload::AtrBandShift {
        old_upper: old_levels.stop_short,
        old_lower: old_levels.stop_long,
        new_upper: new_levels.stop_short,
        new_lower: new_levels.stop_long,
        suggested_trailing_stop,
    })
}

fn validity_loss(entry: &EntrySnapshot, new: &Verdict) -> Option<AlertPayload> {
    let direction_lost =
        new.sentiment != Sentiment::Neutral && new.sentiment != entry.sentiment;
    let confidence_lost = new.confidence < entry.confidence - VALIDITY_CONFIDENCE_SLACK;

    if !direction_lost && !confidence_lost {
        return None;
    }

    Some(AlertPayload::ValidityLoss {
        entry: entry.clone(),
        current_sentiment: new.sentiment,
        current_confidence: new.confidence,
    })
}

/// Severity for an emitted payload: warn for flips and validity losses, info
/// for the rest, critical when the policy says so.
pub fn severity_for(policy: &AlertPolicy, payload: &AlertPayload) -> Severity {
    if let Some(condition) = payload.condition() {
        if policy.critical_conditions.contains(&condition) {
            return Severity::Critical;
        }
        return match condition {
            AlertCondition::SentimentFlip | AlertCondition::ValidityLoss => Severity::Warn,
            AlertCondition::ConfidenceDrift
            | AlertCondition::AtrBandShift
            | AlertCondition::NewCrossover => Severity::Info,
        };
    }
    // Operational events (monitor failing) always warn
    Severity::Warn
}
