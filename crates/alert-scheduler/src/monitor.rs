use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use market_core::{AlertCondition, EntrySnapshot, Verdict};
use serde::{Deserialize, Serialize};

/// Lifecycle of one monitor between ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorStatus {
    Idle,
    Due,
    Running,
    Cooling,
    Failing,
}

/// Per-(group, symbol_key) state the scheduler owns and persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorState {
    pub group_id: String,
    pub symbol_key: String,
    pub status: MonitorStatus,
    pub last_verdict: Option<Verdict>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_due_at: DateTime<Utc>,
    pub consecutive_failures: u32,
    pub entry_snapshot: Option<EntrySnapshot>,
    /// Policy-timezone calendar day the counter below refers to.
    pub alerts_day: NaiveDate,
    pub alerts_emitted_today: u32,
    /// Last emission per condition, for the once-per-cadence dedup rule.
    #[serde(default)]
    pub last_emitted: BTreeMap<AlertCondition, DateTime<Utc>>,
}

impl MonitorState {
    /// Fresh monitor, due immediately.
    pub fn new(group_id: impl Into<String>, symbol_key: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            group_id: group_id.into(),
            symbol_key: symbol_key.into(),
            status: MonitorStatus::Idle,
            last_verdict: None,
            last_run_at: None,
            next_due_at: now,
            consecutive_failures: 0,
            entry_snapshot: None,
            alerts_day: now.date_naive(),
            alerts_emitted_today: 0,
            last_emitted: BTreeMap::new(),
        }
    }

    pub fn monitor_id(&self) -> String {
        format!("{}/{}", self.group_id, self.symbol_key)
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        now >= self.next_due_at
    }

    /// Successful run: store the verdict and schedule the next run at
    /// `now + cadence` (not anchored to the previous due time, so outages do
    /// not accumulate catch-up runs).
    pub fn record_success(&mut self, verdict: Verdict, now: DateTime<Utc>, cadence_minutes: u32) {
        self.last_verdict = Some(verdict);
        self.last_run_at = Some(now);
        self.next_due_at = now + Duration::minutes(cadence_minutes as i64);
        self.consecutive_failures = 0;
        self.status = MonitorStatus::Idle;
    }

    /// Retriable failure: back off exponentially from the cadence, capped.
    /// Returns the new consecutive-failure count.
    pub fn record_failure(
        &mut self,
        now: DateTime<Utc>,
        cadence_minutes: u32,
        backoff_cap_minutes: u32,
    ) -> u32 {
        self.consecutive_failures += 1;
        let delay = backoff_minutes(
            cadence_minutes,
            self.consecutive_failures,
            backoff_cap_minutes,
        );
        self.last_run_at = Some(now);
        self.next_due_at = now + Duration::minutes(delay as i64);
        self.consecutive_failures
    }

    /// Count an emitted alert against the daily budget.
    pub fn record_emission(
        &mut self,
        condition: Option<AlertCondition>,
        now: DateTime<Utc>,
        local_day: NaiveDate,
    ) {
        if self.alerts_day != local_day {
            self.alerts_day = local_day;
            self.alerts_emitted_today = 0;
        }
        self.alerts_emitted_today += 1;
        if let Some(condition) = condition {
            self.last_emitted.insert(condition, now);
        }
    }

    /// Whether an event for `condition` may be emitted now: at most one per
    /// cadence interval per condition, within the daily budget.
    pub fn may_emit(
        &self,
        condition: AlertCondition,
        now: DateTime<Utc>,
        cadence_minutes: u32,
        daily_cap: u32,
        local_day: NaiveDate,
    ) -> bool {
        let today_count = if self.alerts_day == local_day {
            self.alerts_emitted_today
        } else {
            0
        };
        if today_count >= daily_cap {
            return false;
        }
        match self.last_emitted.get(&condition) {
            Some(last) => now - *last >= Duration::minutes(cadence_minutes as i64),
            None => true,
        }
    }
}

/// Doubling backoff: cadence, 2x, 4x, ... capped (the cap never undercuts the
/// cadence itself).
pub fn backoff_minutes(cadence_minutes: u32, failures: u32, cap_minutes: u32) -> u32 {
    let cap = cap_minutes.max(cadence_minutes);
    let exponent = failures.saturating_sub(1).min(16);
    cadence_minutes
        .saturating_mul(1u32 << exponent)
        .min(cap)
        .max(1)
}
