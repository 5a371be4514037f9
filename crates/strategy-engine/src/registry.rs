use std::collections::BTreeMap;
use std::sync::Arc;

use market_core::AnalysisError;

use crate::{
    DefaultCheckStrategy, DualSupertrendStrategy, ParameterTemplate, Strategy,
    DEFAULT_CHECK_NAME, DUAL_SUPERTREND_NAME,
};

type StrategyFactory = fn() -> Arc<dyn Strategy>;

/// Name → factory map with legacy aliases. Built once at startup and injected;
/// read-only afterwards.
pub struct StrategyRegistry {
    factories: BTreeMap<String, StrategyFactory>,
    aliases: BTreeMap<String, String>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
            aliases: BTreeMap::new(),
        }
    }

    /// Registry preloaded with the built-in strategies and their historical
    /// aliases.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(DEFAULT_CHECK_NAME, || Arc::new(DefaultCheckStrategy::new()));
        registry.register(DUAL_SUPERTREND_NAME, || {
            Arc::new(DualSupertrendStrategy::new())
        });
        // Names older configs still carry
        registry.register_alias("single-check", DEFAULT_CHECK_NAME);
        registry.register_alias("dual-supertrend", DUAL_SUPERTREND_NAME);
        registry
    }

    pub fn register(&mut self, name: &str, factory: StrategyFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn register_alias(&mut self, alias: &str, target: &str) {
        self.aliases.insert(alias.to_string(), target.to_string());
    }

    /// Canonical name behind an alias; unknown names pass through untouched.
    pub fn resolve_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.aliases.get(name).map(|s| s.as_str()).unwrap_or(name)
    }

    /// Instantiate a strategy. Unknown names are an explicit error, never a
    /// silent fallback.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Strategy>, AnalysisError> {
        let canonical = self.resolve_name(name);
        self.factories
            .get(canonical)
            .map(|factory| factory())
            .ok_or_else(|| AnalysisError::UnknownStrategy(name.to_string()))
    }

    pub fn template(&self, name: &str) -> Result<ParameterTemplate, AnalysisError> {
        Ok(self.get(name)?.parameter_template())
    }

    /// Canonical strategy names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.factories.keys().map(|k| k.as_str()).collect()
    }

    /// (alias, canonical) pairs, sorted by alias.
    pub fn aliases(&self) -> Vec<(&str, &str)> {
        self.aliases
            .iter()
            .map(|(a, t)| (a.as_str(), t.as_str()))
            .collect()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
