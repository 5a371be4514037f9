use indicator_kernel::IndicatorSettings;
use thiserror::Error;

use crate::{AlertPolicy, Group, ResolvedConfig};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("Unknown symbol key '{symbol_key}' in group {group_id}")]
    UnknownSymbol {
        group_id: String,
        symbol_key: String,
    },
}

/// Merge built-in defaults, group defaults and per-symbol overrides into one
/// resolved config.
///
/// Pure and deterministic: no clock, no globals. Resolving twice, or
/// resolving a persisted-and-reloaded group, yields identical output; the
/// scheduler relies on that when configs change between ticks.
pub fn resolve(group: &Group, symbol_key: &str) -> Result<ResolvedConfig, ResolveError> {
    let member = group
        .member(symbol_key)
        .ok_or_else(|| ResolveError::UnknownSymbol {
            group_id: group.id.clone(),
            symbol_key: symbol_key.to_string(),
        })?;

    // Layer 1: built-in defaults
    let mut indicators = IndicatorSettings::default();
    let mut alert_policy = AlertPolicy::default();

    // Layer 2: group defaults
    group.defaults.indicators.apply(&mut indicators);
    if let Some(cadence) = group.defaults.schedule_cadence_minutes {
        alert_policy.cadence_minutes = cadence;
    }
    group.defaults.alert_policy.apply(&mut alert_policy);

    // Layer 3: symbol overrides
    member.indicator_overrides.apply(&mut indicators);
    member.alert_policy.apply(&mut alert_policy);

    let strategy_name = member
        .strategy_overrides
        .name
        .clone()
        .unwrap_or_else(|| group.defaults.strategy_name.clone());

    let mut strategy_params = group.defaults.strategy_params.clone();
    for (key, value) in &member.strategy_overrides.params {
        strategy_params.insert(key.clone(), value.clone());
    }

    Ok(ResolvedConfig {
        group_id: group.id.clone(),
        symbol_key: symbol_key.to_string(),
        symbol: member.symbol.clone(),
        asset_class: member.asset_class,
        interval: member.interval,
        period: member.period,
        enabled: group.enabled && member.enabled,
        strategy_name,
        strategy_params,
        indicators,
        alert_policy,
    })
}
