use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use analysis_orchestrator::{AnalyzeFailure, Orchestrator};
use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use market_core::{AlertEvent, AlertPayload, EntrySnapshot, Notifier, Severity, Verdict};
use portfolio_model::{resolve, AlertPolicy, FileStore, Group, ResolvedConfig, StoreError};
use tokio::sync::{watch, Mutex, RwLock, Semaphore};

use crate::{diff_verdicts, severity_for, MonitorState, MonitorStatus};

/// Seam between the scheduler and the analysis pipeline, so monitors can be
/// driven against scripted verdicts in tests.
#[async_trait]
pub trait AnalysisRunner: Send + Sync {
    async fn analyze(&self, config: &ResolvedConfig) -> Result<Verdict, AnalyzeFailure>;
}

#[async_trait]
impl AnalysisRunner for Orchestrator {
    async fn analyze(&self, config: &ResolvedConfig) -> Result<Verdict, AnalyzeFailure> {
        Orchestrator::analyze(self, config).await
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Driver granularity between due checks.
    pub tick_interval_secs: u64,
    /// Upper bound on concurrent orchestrator runs (the effective pool is
    /// min(this, due monitors)).
    pub max_concurrent_runs: usize,
    /// Per-run timeout; expiry surfaces as a retriable data failure.
    pub run_timeout_secs: u64,
    /// Consecutive retriable failures before a monitor is marked failing.
    pub failures_before_failing: u32,
    /// Ceiling for the doubling backoff.
    pub backoff_cap_minutes: u32,
    /// Events per monitor per policy-timezone calendar day.
    pub daily_alert_cap: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 30,
            max_concurrent_runs: 8,
            run_timeout_secs: 30,
            failures_before_failing: 3,
            backoff_cap_minutes: 60,
            daily_alert_cap: 10,
        }
    }
}

/// What one tick did, mostly for logging and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TickSummary {
    pub monitors_considered: usize,
    pub monitors_run: usize,
    pub events_emitted: usize,
}

type MonitorKey = (String, String);

/// Drives one logical monitor per enabled (group, symbol_key) on its policy
/// cadence: runs the analysis, diffs successive verdicts, emits deduplicated
/// alert events, and confines every failure to the owning monitor.
pub struct AlertScheduler {
    runner: Arc<dyn AnalysisRunner>,
    store: Arc<FileStore>,
    notifier: Arc<dyn Notifier>,
    config: SchedulerConfig,
    groups: RwLock<BTreeMap<String, Group>>,
    monitors: Mutex<BTreeMap<MonitorKey, MonitorState>>,
    shutdown: watch::Sender<bool>,
}

impl AlertScheduler {
    /// Build the scheduler and recover persisted groups and monitor state.
    /// Monitors whose `next_due_at` is already past fire on the first tick.
    pub fn new(
        runner: Arc<dyn AnalysisRunner>,
        store: Arc<FileStore>,
        notifier: Arc<dyn Notifier>,
        config: SchedulerConfig,
    ) -> Result<Self, StoreError> {
        let mut groups = BTreeMap::new();
        let mut monitors = BTreeMap::new();

        for group in store.load_groups()? {
            for symbol_key in group.members.keys() {
                if let Some(state) =
                    store.load_monitor::<MonitorState>(&group.id, symbol_key)?
                {
                    monitors.insert((group.id.clone(), symbol_key.clone()), state);
                }
            }
            groups.insert(group.id.clone(), group);
        }

        tracing::info!(
            "Scheduler recovered {} groups, {} monitor states",
            groups.len(),
            monitors.len()
        );

        let (shutdown, _) = watch::channel(false);
        Ok(Self {
            runner,
            store,
            notifier,
            config,
            groups: RwLock::new(groups),
            monitors: Mutex::new(monitors),
            shutdown,
        })
    }

    /// Replace or add a group; takes effect for each monitor on its next tick.
    pub async fn upsert_group(&self, group: Group) -> Result<(), StoreError> {
        self.store.save_group(&group)?;
        self.groups.write().await.insert(group.id.clone(), group);
        Ok(())
    }

    /// Delete a group along with its members' monitor state.
    pub async fn remove_group(&self, group_id: &str) -> Result<(), StoreError> {
        self.store.delete_group(group_id)?;
        self.groups.write().await.remove(group_id);
        self.monitors
            .lock()
            .await
            .retain(|(gid, _), _| gid != group_id);
        Ok(())
    }

    /// Tear down one monitor. An in-flight run is allowed to finish; its
    /// verdict is discarded when it reports back.
    pub async fn detach_monitor(
        &self,
        group_id: &str,
        symbol_key: &str,
    ) -> Result<(), StoreError> {
        self.monitors
            .lock()
            .await
            .remove(&(group_id.to_string(), symbol_key.to_string()));
        self.store.delete_monitor(group_id, symbol_key)
    }

    /// Record (or clear) the entry a monitor should defend, for the
    /// validity-loss condition.
    pub async fn set_entry_snapshot(
        &self,
        group_id: &str,
        symbol_key: &str,
        snapshot: Option<EntrySnapshot>,
    ) -> Result<(), StoreError> {
        let key = (group_id.to_string(), symbol_key.to_string());
        let mut monitors = self.monitors.lock().await;
        let state = monitors
            .entry(key)
            .or_insert_with(|| MonitorState::new(group_id, symbol_key, Utc::now()));
        state.entry_snapshot = snapshot;
        self.store.save_monitor(group_id, symbol_key, state)
    }

    /// Request a cooperative stop of the run loop.
    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Tick loop at the configured granularity until `stop()`.
    pub async fn run(&self) {
        let mut interval = tokio::time::interval(Duration::from_secs(
            self.config.tick_interval_secs.max(1),
        ));
        let mut shutdown = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let summary = self.tick_once(Utc::now()).await;
                    if summary.monitors_run > 0 {
                        tracing::info!(
                            "Tick: {}/{} monitors ran, {} events emitted",
                            summary.monitors_run,
                            summary.monitors_considered,
                            summary.events_emitted
                        );
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("Scheduler stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One pass over all monitors at instant `now`. Separated from the timer
    /// loop so tests can drive virtual clocks through it.
    pub async fn tick_once(&self, now: DateTime<Utc>) -> TickSummary {
        let mut summary = TickSummary::default();
        let mut due: Vec<(ResolvedConfig, MonitorState)> = Vec::new();

        {
            let groups = self.groups.read().await;
            let mut monitors = self.monitors.lock().await;

            for group in groups.values() {
                if !group.enabled {
                    continue;
                }
                for symbol_key in group.members.keys() {
                    let resolved = match resolve(group, symbol_key) {
                        Ok(resolved) => resolved,
                        Err(err) => {
                            tracing::warn!("Skipping unresolvable monitor: {err}");
                            continue;
                        }
                    };
                    if !resolved.enabled || !resolved.alert_policy.enabled {
                        continue;
                    }
                    summary.monitors_considered += 1;

                    let key = (group.id.clone(), symbol_key.clone());
                    let state = monitors
                        .entry(key)
                        .or_insert_with(|| MonitorState::new(&group.id, symbol_key, now));

                    if !state.is_due(now) {
                        continue;
                    }
                    if !in_active_window(&resolved.alert_policy, now) {
                        continue;
                    }

                    state.status = MonitorStatus::Due;
                    due.push((resolved, state.clone()));
                }
            }
        }

        if due.is_empty() {
            return summary;
        }

        // Bounded worker pool across monitors; each monitor's run is strictly
        // ordered with respect to itself because the tick awaits completion.
        let pool = self.config.max_concurrent_runs.min(due.len()).max(1);
        let semaphore = Arc::new(Semaphore::new(pool));
        let mut handles = Vec::with_capacity(due.len());

        for (resolved, state) in due {
            summary.monitors_run += 1;
            let semaphore = Arc::clone(&semaphore);
            let runner = Arc::clone(&self.runner);
            let notifier = Arc::clone(&self.notifier);
            let store = Arc::clone(&self.store);
            let config = self.config.clone();

            handles.push(tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return (state_key(&state), state, 0usize),
                };
                run_monitor(resolved, state, now, runner, notifier, store, config).await
            }));
        }

        for handle in handles {
            let Ok((key, new_state, emitted)) = handle.await else {
                tracing::error!("Monitor task panicked");
                continue;
            };
            summary.events_emitted += emitted;

            let mut monitors = self.monitors.lock().await;
            if monitors.contains_key(&key) {
                if let Err(err) = self.store.save_monitor(&key.0, &key.1, &new_state) {
                    // In-memory state stays authoritative until the next
                    // successful flush.
                    tracing::warn!("Failed to persist monitor {}/{}: {err}", key.0, key.1);
                }
                monitors.insert(key, new_state);
            } else {
                tracing::debug!(
                    "Monitor {}/{} detached mid-run; verdict discarded",
                    key.0,
                    key.1
                );
            }
        }

        summary
    }
}

fn state_key(state: &MonitorState) -> MonitorKey {
    (state.group_id.clone(), state.symbol_key.clone())
}

async fn run_monitor(
    resolved: ResolvedConfig,
    mut state: MonitorState,
    now: DateTime<Utc>,
    runner: Arc<dyn AnalysisRunner>,
    notifier: Arc<dyn Notifier>,
    store: Arc<FileStore>,
    config: SchedulerConfig,
) -> (MonitorKey, MonitorState, usize) {
    state.status = MonitorStatus::Running;
    let policy = resolved.alert_policy.clone();
    let cadence = policy.cadence_minutes;

    let outcome = match tokio::time::timeout(
        Duration::from_secs(config.run_timeout_secs.max(1)),
        runner.analyze(&resolved),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => Err(AnalyzeFailure::DataUnavailable(format!(
            "analysis timed out after {}s",
            config.run_timeout_secs
        ))),
    };

    let mut emitted = 0usize;
    match outcome {
        Ok(verdict) => {
            state.status = MonitorStatus::Cooling;
            let day = local_day(&policy, now);
            let payloads = diff_verdicts(
                &policy,
                state.last_verdict.as_ref(),
                &verdict,
                state.entry_snapshot.as_ref(),
            );

            for payload in payloads {
                let condition = payload.condition();
                if let Some(condition) = condition {
                    if !state.may_emit(condition, now, cadence, config.daily_alert_cap, day) {
                        tracing::debug!(
                            "Suppressed {:?} for {} (dedup/daily cap)",
                            condition,
                            state.monitor_id()
                        );
                        continue;
                    }
                }

                let event = AlertEvent {
                    timestamp: now,
                    group_id: state.group_id.clone(),
                    symbol_key: state.symbol_key.clone(),
                    monitor_id: state.monitor_id(),
                    severity: severity_for(&policy, &payload),
                    payload,
                };
                emit(&*notifier, &*store, &event, now).await;
                state.record_emission(condition, now, day);
                emitted += 1;
            }

            state.record_success(verdict, now, cadence);
        }
        Err(err) if err.is_retriable() => {
            let failures = state.record_failure(now, cadence, config.backoff_cap_minutes);
            tracing::warn!(
                "Monitor {} failure {}/{}: {err}",
                state.monitor_id(),
                failures,
                config.failures_before_failing
            );

            if failures >= config.failures_before_failing {
                state.status = MonitorStatus::Failing;
                // One warn event at the threshold, not on every retry after
                if failures == config.failures_before_failing {
                    let day = local_day(&policy, now);
                    let event = AlertEvent {
                        timestamp: now,
                        group_id: state.group_id.clone(),
                        symbol_key: state.symbol_key.clone(),
                        monitor_id: state.monitor_id(),
                        severity: Severity::Warn,
                        payload: AlertPayload::MonitorFailing {
                            consecutive_failures: failures,
                            last_error: err.to_string(),
                        },
                    };
                    emit(&*notifier, &*store, &event, now).await;
                    state.record_emission(None, now, day);
                    emitted += 1;
                }
            }
        }
        Err(err) => {
            // Config or data shape problems will not fix themselves by
            // retrying fast; park the monitor on the backoff schedule. A
            // config update takes effect on its next tick.
            tracing::error!("Monitor {} error: {err}", state.monitor_id());
            state.record_failure(now, cadence, config.backoff_cap_minutes);
            state.status = MonitorStatus::Failing;
        }
    }

    (state_key(&state), state, emitted)
}

async fn emit(notifier: &dyn Notifier, store: &FileStore, event: &AlertEvent, now: DateTime<Utc>) {
    if let Err(err) = notifier.notify(event).await {
        tracing::warn!("Notifier error for {}: {err}", event.monitor_id);
    }
    if let Err(err) = store.append_alert(now.date_naive(), event) {
        tracing::warn!("Failed to append alert history: {err}");
    }
}

fn policy_tz(policy: &AlertPolicy) -> chrono_tz::Tz {
    match policy.timezone.parse() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!("Unknown timezone '{}', falling back to UTC", policy.timezone);
            chrono_tz::UTC
        }
    }
}

/// Whether `now` falls inside the policy's active weekdays/hours, evaluated
/// in the policy's timezone. Weekday 0 = Monday.
fn in_active_window(policy: &AlertPolicy, now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&policy_tz(policy));
    let weekday = local.weekday().num_days_from_monday() as u8;
    let hour = local.hour() as u8;
    policy.active_weekdays.contains(&weekday) && policy.active_hours.contains(&hour)
}

fn local_day(policy: &AlertPolicy, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&policy_tz(policy)).date_naive()
}
