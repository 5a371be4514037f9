use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use indicator_kernel::{DetectorSettings, IndicatorSettings};
use market_core::{AlertCondition, AssetClass, Interval, Period};
use serde::{Deserialize, Serialize};
use strategy_engine::{ParamValue, DEFAULT_CHECK_NAME};

/// When a monitor is allowed to run and which changes it alerts on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicy {
    pub enabled: bool,
    /// Minimum minutes between two analyses of the same monitor.
    pub cadence_minutes: u32,
    /// Weekdays the monitor is active, 0 = Monday .. 6 = Sunday.
    pub active_weekdays: BTreeSet<u8>,
    /// Local hours (0..=23) the monitor is active.
    pub active_hours: BTreeSet<u8>,
    /// IANA timezone the weekday/hour windows are evaluated in.
    pub timezone: String,
    pub conditions: BTreeSet<AlertCondition>,
    /// Conditions escalated to critical severity.
    pub critical_conditions: BTreeSet<AlertCondition>,
    pub min_confidence_drift: f64,
    /// ATR band movement, in price units, required for a band-shift event.
    pub min_band_shift_units: f64,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            cadence_minutes: 60,
            active_weekdays: (0..=4).collect(),
            active_hours: (0..=23).collect(),
            timezone: "UTC".to_string(),
            conditions: BTreeSet::from([
                AlertCondition::SentimentFlip,
                AlertCondition::ValidityLoss,
                AlertCondition::NewCrossover,
            ]),
            critical_conditions: BTreeSet::new(),
            min_confidence_drift: 0.2,
            min_band_shift_units: 0.0,
        }
    }
}

/// Sparse alert-policy override; unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlertPolicyOverrides {
    pub enabled: Option<bool>,
    pub cadence_minutes: Option<u32>,
    pub active_weekdays: Option<BTreeSet<u8>>,
    pub active_hours: Option<BTreeSet<u8>>,
    pub timezone: Option<String>,
    pub conditions: Option<BTreeSet<AlertCondition>>,
    pub critical_conditions: Option<BTreeSet<AlertCondition>>,
    pub min_confidence_drift: Option<f64>,
    pub min_band_shift_units: Option<f64>,
}

impl AlertPolicyOverrides {
    pub fn apply(&self, policy: &mut AlertPolicy) {
        if let Some(v) = self.enabled {
            policy.enabled = v;
        }
        if let Some(v) = self.cadence_minutes {
            policy.cadence_minutes = v;
        }
        if let Some(v) = &self.active_weekdays {
            policy.active_weekdays = v.clone();
        }
        if let Some(v) = &self.active_hours {
            policy.active_hours = v.clone();
        }
        if let Some(v) = &self.timezone {
            policy.timezone = v.clone();
        }
        if let Some(v) = &self.conditions {
            policy.conditions = v.clone();
        }
        if let Some(v) = &self.critical_conditions {
            policy.critical_conditions = v.clone();
        }
        if let Some(v) = self.min_confidence_drift {
            policy.min_confidence_drift = v;
        }
        if let Some(v) = self.min_band_shift_units {
            policy.min_band_shift_units = v;
        }
    }
}

/// Sparse indicator override; unset fields fall through to the layer below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorOverrides {
    pub rsi_period: Option<usize>,
    pub stoch_k_period: Option<usize>,
    pub stoch_d_period: Option<usize>,
    pub stoch_smooth_k: Option<usize>,
    pub williams_period: Option<usize>,
    pub cci_period: Option<usize>,
    pub macd_fast: Option<usize>,
    pub macd_slow: Option<usize>,
    pub macd_signal: Option<usize>,
    pub adx_period: Option<usize>,
    pub bollinger_period: Option<usize>,
    pub bollinger_stddev: Option<f64>,
    pub atr_period: Option<usize>,
    pub detector_enabled: Option<bool>,
    pub volatility_filter_enabled: Option<bool>,
    pub adx_threshold: Option<f64>,
    pub crossover_lookback: Option<usize>,
}

impl IndicatorOverrides {
    pub fn apply(&self, settings: &mut IndicatorSettings) {
        if let Some(v) = self.rsi_period {
            settings.rsi_period = v;
        }
        if let Some(v) = self.stoch_k_period {
            settings.stoch_k_period = v;
        }
        if let Some(v) = self.stoch_d_period {
            settings.stoch_d_period = v;
        }
        if let Some(v) = self.stoch_smooth_k {
            settings.stoch_smooth_k = v;
        }
        if let Some(v) = self.williams_period {
            settings.williams_period = v;
        }
        if let Some(v) = self.cci_period {
            settings.cci_period = v;
        }
        if let Some(v) = self.macd_fast {
            settings.macd_fast = v;
        }
        if let Some(v) = self.macd_slow {
            settings.macd_slow = v;
        }
        if let Some(v) = self.macd_signal {
            settings.macd_signal = v;
        }
        if let Some(v) = self.adx_period {
            settings.adx_period = v;
        }
        if let Some(v) = self.bollinger_period {
            settings.bollinger_period = v;
        }
        if let Some(v) = self.bollinger_stddev {
            settings.bollinger_stddev = v;
        }
        if let Some(v) = self.atr_period {
            settings.atr_period = v;
        }
        if let Some(v) = self.detector_enabled {
            settings.detector.enabled = v;
        }
        if let Some(v) = self.volatility_filter_enabled {
            settings.detector.volatility_filter_enabled = v;
        }
        if let Some(v) = self.adx_threshold {
            settings.detector.adx_threshold = v;
        }
        if let Some(v) = self.crossover_lookback {
            settings.detector.lookback = v;
        }
    }
}

/// Sparse strategy override at group or symbol level.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyOverrides {
    pub name: Option<String>,
    #[serde(default)]
    pub params: BTreeMap<String, ParamValue>,
}

/// One instrument inside a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolConfig {
    pub symbol: String,
    pub asset_class: AssetClass,
    pub interval: Interval,
    pub period: Period,
    pub enabled: bool,
    #[serde(default)]
    pub indicator_overrides: IndicatorOverrides,
    #[serde(default)]
    pub strategy_overrides: StrategyOverrides,
    #[serde(default)]
    pub alert_policy: AlertPolicyOverrides,
}

impl SymbolConfig {
    pub fn new(
        symbol: impl Into<String>,
        asset_class: AssetClass,
        interval: Interval,
        period: Period,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            asset_class,
            interval,
            period,
            enabled: true,
            indicator_overrides: IndicatorOverrides::default(),
            strategy_overrides: StrategyOverrides::default(),
            alert_policy: AlertPolicyOverrides::default(),
        }
    }
}

/// Group-level defaults layered between the built-ins and per-symbol
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupDefaults {
    #[serde(default)]
    pub indicators: IndicatorOverrides,
    pub strategy_name: String,
    #[serde(default)]
    pub strategy_params: BTreeMap<String, ParamValue>,
    #[serde(default)]
    pub alert_policy: AlertPolicyOverrides,
    /// Fallback cadence for members whose policy does not set one.
    pub schedule_cadence_minutes: Option<u32>,
}

impl Default for GroupDefaults {
    fn default() -> Self {
        Self {
            indicators: IndicatorOverrides::default(),
            strategy_name: DEFAULT_CHECK_NAME.to_string(),
            strategy_params: BTreeMap::new(),
            alert_policy: AlertPolicyOverrides::default(),
            schedule_cadence_minutes: None,
        }
    }
}

/// A named portfolio of instruments sharing defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub enabled: bool,
    /// symbol_key → config; the map keeps keys unique within the group.
    #[serde(default)]
    pub members: BTreeMap<String, SymbolConfig>,
    #[serde(default)]
    pub defaults: GroupDefaults,
}

impl Group {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: description.into(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
            enabled: true,
            members: BTreeMap::new(),
            defaults: GroupDefaults::default(),
        }
    }

    /// Insert or replace a member under `symbol_key`.
    pub fn upsert_member(&mut self, symbol_key: impl Into<String>, config: SymbolConfig) {
        self.members.insert(symbol_key.into(), config);
        self.updated_at = Utc::now();
    }

    pub fn remove_member(&mut self, symbol_key: &str) -> Option<SymbolConfig> {
        let removed = self.members.remove(symbol_key);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }

    pub fn member(&self, symbol_key: &str) -> Option<&SymbolConfig> {
        self.members.get(symbol_key)
    }

    pub fn set_member_enabled(&mut self, symbol_key: &str, enabled: bool) -> bool {
        match self.members.get_mut(symbol_key) {
            Some(member) => {
                member.enabled = enabled;
                self.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

/// Fully-resolved configuration for one (group, symbol_key), ready for the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    pub group_id: String,
    pub symbol_key: String,
    pub symbol: String,
    pub asset_class: AssetClass,
    pub interval: Interval,
    pub period: Period,
    pub enabled: bool,
    pub strategy_name: String,
    /// Merged sparse strategy params; template validation happens at analysis
    /// time.
    pub strategy_params: BTreeMap<String, ParamValue>,
    pub indicators: IndicatorSettings,
    pub alert_policy: AlertPolicy,
}

impl ResolvedConfig {
    pub fn detector_settings(&self) -> DetectorSettings {
        self.indicators.detector
    }
}
