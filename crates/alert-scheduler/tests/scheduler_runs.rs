use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex};

use alert_scheduler::{
    AlertScheduler, AnalysisRunner, MonitorState, MonitorStatus, SchedulerConfig,
};
use analysis_orchestrator::AnalyzeFailure;
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use market_core::{
    AlertCondition, AlertEvent, AlertPayload, AssetClass, EntrySnapshot, Interval, Notifier,
    NotifyError, Period, Sentiment, Severity, SignalStrength, Verdict, VerdictMetadata,
};
use portfolio_model::{FileStore, Group, ResolvedConfig, SymbolConfig};

struct ScriptedRunner {
    script: Mutex<VecDeque<Result<Verdict, AnalyzeFailure>>>,
}

impl ScriptedRunner {
    fn new(script: Vec<Result<Verdict, AnalyzeFailure>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
        })
    }
}

#[async_trait]
impl AnalysisRunner for ScriptedRunner {
    async fn analyze(&self, _config: &ResolvedConfig) -> Result<Verdict, AnalyzeFailure> {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(AnalyzeFailure::DataUnavailable("script exhausted".into())))
    }
}

#[derive(Default)]
struct CollectingNotifier {
    events: Mutex<Vec<AlertEvent>>,
}

impl CollectingNotifier {
    fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for CollectingNotifier {
    async fn notify(&self, event: &AlertEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn monday_noon() -> DateTime<Utc> {
    // 2024-03-04 is a Monday
    Utc.with_ymd_and_hms(2024, 3, 4, 12, 0, 0).unwrap()
}

fn verdict(sentiment: Sentiment, confidence: f64) -> Verdict {
    Verdict {
        sentiment,
        strength: match sentiment {
            Sentiment::Bullish => SignalStrength::Buy,
            Sentiment::Bearish => SignalStrength::Sell,
            Sentiment::Neutral => SignalStrength::Neutral,
        },
        confidence,
        confirmations_buy: 0,
        confirmations_sell: 0,
        risk_levels: None,
        indicator_snapshot: BTreeMap::new(),
        reasons: vec![],
        crossovers: vec![],
        metadata: VerdictMetadata {
            symbol: "EURUSD".to_string(),
            strategy_name: "default-check-single-timeframe".to_string(),
            interval: Interval::Hour1,
            run_at: monday_noon(),
            data_completeness: 1.0,
            params_used: serde_json::Value::Null,
        },
    }
}

fn group_with_member(cadence_minutes: u32, conditions: BTreeSet<AlertCondition>) -> Group {
    let mut group = Group::new("fx-majors", "FX majors under watch");
    group.defaults.alert_policy.cadence_minutes = Some(cadence_minutes);
    group.defaults.alert_policy.conditions = Some(conditions);
    group.upsert_member(
        "eurusd-1h",
        SymbolConfig::new("EURUSD", AssetClass::Forex, Interval::Hour1, Period::Month1),
    );
    group
}

fn scheduler_with(
    store: Arc<FileStore>,
    runner: Arc<ScriptedRunner>,
    notifier: Arc<CollectingNotifier>,
) -> AlertScheduler {
    AlertScheduler::new(runner, store, notifier, SchedulerConfig::default()).unwrap()
}

#[tokio::test]
async fn overdue_monitor_fires_and_reschedules_one_cadence_ahead() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let group = group_with_member(15, BTreeSet::from([AlertCondition::SentimentFlip]));
    store.save_group(&group).unwrap();

    // Restart recovery: last ran 20 minutes ago, became due 5 minutes ago
    let t0 = monday_noon();
    let mut state = MonitorState::new(&group.id, "eurusd-1h", t0 - Duration::minutes(20));
    state.last_run_at = Some(t0 - Duration::minutes(20));
    state.next_due_at = t0 - Duration::minutes(5);
    store.save_monitor(&group.id, "eurusd-1h", &state).unwrap();

    let runner = ScriptedRunner::new(vec![Ok(verdict(Sentiment::Bullish, 0.6))]);
    let notifier = Arc::new(CollectingNotifier::default());
    let scheduler = scheduler_with(store.clone(), runner, notifier);

    let summary = scheduler.tick_once(t0).await;
    assert_eq!(summary.monitors_run, 1);

    let persisted: MonitorState = store
        .load_monitor(&group.id, "eurusd-1h")
        .unwrap()
        .unwrap();
    assert_eq!(persisted.next_due_at, t0 + Duration::minutes(15));
    assert_eq!(persisted.status, MonitorStatus::Idle);
    assert_eq!(persisted.last_run_at, Some(t0));

    // One minute later nothing is due
    let summary = scheduler.tick_once(t0 + Duration::minutes(1)).await;
    assert_eq!(summary.monitors_run, 0);

    // At the new due time it runs again
    let summary = scheduler.tick_once(t0 + Duration::minutes(15)).await;
    assert_eq!(summary.monitors_run, 1);
}

#[tokio::test]
async fn validity_loss_emits_exactly_one_warn_event() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let group = group_with_member(15, BTreeSet::from([AlertCondition::ValidityLoss]));
    store.save_group(&group).unwrap();

    let t0 = monday_noon();
    // Long entered at 0.8 confidence
    let mut state = MonitorState::new(&group.id, "eurusd-1h", t0);
    state.entry_snapshot = Some(EntrySnapshot {
        sentiment: Sentiment::Bullish,
        confidence: 0.8,
        price: 182.0,
        entered_at: t0 - Duration::hours(4),
    });
    store.save_monitor(&group.id, "eurusd-1h", &state).unwrap();

    let runner = ScriptedRunner::new(vec![
        Ok(verdict(Sentiment::Bullish, 0.8)),
        Ok(verdict(Sentiment::Bearish, 0.6)),
    ]);
    let notifier = Arc::new(CollectingNotifier::default());
    let scheduler = scheduler_with(store.clone(), runner, notifier.clone());

    // Baseline run agrees with the entry: silence
    scheduler.tick_once(t0).await;
    assert!(notifier.events().is_empty());

    // Two ticks later the thesis is gone
    let t1 = t0 + Duration::minutes(15);
    let summary = scheduler.tick_once(t1).await;
    assert_eq!(summary.events_emitted, 1);

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::Warn);
    assert!(matches!(
        events[0].payload,
        AlertPayload::ValidityLoss { .. }
    ));
    assert_eq!(events[0].monitor_id, format!("{}/eurusd-1h", group.id));

    // The event is also in the day's append-only history
    let history = store.load_alerts(t1.date_naive()).unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn duplicate_condition_within_cadence_is_suppressed() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let group = group_with_member(15, BTreeSet::from([AlertCondition::ConfidenceDrift]));
    store.save_group(&group).unwrap();

    let t0 = monday_noon();
    let runner = ScriptedRunner::new(vec![
        Ok(verdict(Sentiment::Bullish, 0.9)),
        Ok(verdict(Sentiment::Bullish, 0.4)),
    ]);
    let notifier = Arc::new(CollectingNotifier::default());
    let scheduler = scheduler_with(store.clone(), runner, notifier.clone());

    scheduler.tick_once(t0).await;
    let summary = scheduler.tick_once(t0 + Duration::minutes(15)).await;
    assert_eq!(summary.events_emitted, 1);

    // Force the monitor due again one minute after the emission; the drift
    // repeats but the (monitor, condition) pair already fired this cadence
    let mut state: MonitorState = store
        .load_monitor(&group.id, "eurusd-1h")
        .unwrap()
        .unwrap();
    state.next_due_at = t0 + Duration::minutes(16);
    store.save_monitor(&group.id, "eurusd-1h", &state).unwrap();

    let runner = ScriptedRunner::new(vec![Ok(verdict(Sentiment::Bullish, 0.9))]);
    let second_notifier = Arc::new(CollectingNotifier::default());
    let scheduler = scheduler_with(store.clone(), runner, second_notifier.clone());

    let summary = scheduler.tick_once(t0 + Duration::minutes(16)).await;
    assert_eq!(summary.monitors_run, 1);
    assert_eq!(summary.events_emitted, 0);
    assert!(second_notifier.events().is_empty());
}

#[tokio::test]
async fn three_data_failures_mark_failing_with_one_warn() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let group = group_with_member(15, BTreeSet::from([AlertCondition::SentimentFlip]));
    store.save_group(&group).unwrap();

    let t0 = monday_noon();
    let runner = ScriptedRunner::new(vec![
        Err(AnalyzeFailure::DataUnavailable("feed down".into())),
        Err(AnalyzeFailure::DataUnavailable("feed down".into())),
        Err(AnalyzeFailure::DataUnavailable("feed down".into())),
    ]);
    let notifier = Arc::new(CollectingNotifier::default());
    let scheduler = scheduler_with(store.clone(), runner, notifier.clone());

    // Backoff: 15, then 30 minutes
    scheduler.tick_once(t0).await;
    scheduler.tick_once(t0 + Duration::minutes(15)).await;
    assert!(notifier.events().is_empty());

    let summary = scheduler.tick_once(t0 + Duration::minutes(45)).await;
    assert_eq!(summary.monitors_run, 1);

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].severity, Severity::Warn);
    assert!(matches!(
        events[0].payload,
        AlertPayload::MonitorFailing {
            consecutive_failures: 3,
            ..
        }
    ));

    let persisted: MonitorState = store
        .load_monitor(&group.id, "eurusd-1h")
        .unwrap()
        .unwrap();
    assert_eq!(persisted.status, MonitorStatus::Failing);
    assert_eq!(persisted.consecutive_failures, 3);
    // Backoff capped at one hour
    assert_eq!(
        persisted.next_due_at,
        t0 + Duration::minutes(45) + Duration::minutes(60)
    );
}

#[tokio::test]
async fn weekend_is_outside_the_active_window() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let group = group_with_member(15, BTreeSet::from([AlertCondition::SentimentFlip]));
    store.save_group(&group).unwrap();

    // 2024-03-09 is a Saturday; default policy is Monday..Friday
    let saturday = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
    let runner = ScriptedRunner::new(vec![Ok(verdict(Sentiment::Bullish, 0.9))]);
    let notifier = Arc::new(CollectingNotifier::default());
    let scheduler = scheduler_with(store.clone(), runner, notifier);

    let summary = scheduler.tick_once(saturday).await;
    assert_eq!(summary.monitors_considered, 1);
    assert_eq!(summary.monitors_run, 0);
}

#[tokio::test]
async fn detached_monitor_is_forgotten() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let group = group_with_member(15, BTreeSet::from([AlertCondition::SentimentFlip]));
    store.save_group(&group).unwrap();

    let t0 = monday_noon();
    let runner = ScriptedRunner::new(vec![Ok(verdict(Sentiment::Bullish, 0.9))]);
    let notifier = Arc::new(CollectingNotifier::default());
    let scheduler = scheduler_with(store.clone(), runner, notifier);

    scheduler.tick_once(t0).await;
    scheduler.detach_monitor(&group.id, "eurusd-1h").await.unwrap();

    let state: Option<MonitorState> = store.load_monitor(&group.id, "eurusd-1h").unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn sentiment_flip_between_runs_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let group = group_with_member(15, BTreeSet::from([AlertCondition::SentimentFlip]));
    store.save_group(&group).unwrap();

    let t0 = monday_noon();
    let runner = ScriptedRunner::new(vec![
        Ok(verdict(Sentiment::Bullish, 0.7)),
        Ok(verdict(Sentiment::Bearish, 0.7)),
    ]);
    let notifier = Arc::new(CollectingNotifier::default());
    let scheduler = scheduler_with(store.clone(), runner, notifier.clone());

    scheduler.tick_once(t0).await;
    scheduler.tick_once(t0 + Duration::minutes(15)).await;

    let events = notifier.events();
    assert_eq!(events.len(), 1);
    match &events[0].payload {
        AlertPayload::SentimentFlip {
            old_sentiment,
            new_sentiment,
            ..
        } => {
            assert_eq!(*old_sentiment, Sentiment::Bullish);
            assert_eq!(*new_sentiment, Sentiment::Bearish);
        }
        other => panic!("unexpected payload: {other:?}"),
    }
    assert_eq!(events[0].severity, Severity::Warn);
}
