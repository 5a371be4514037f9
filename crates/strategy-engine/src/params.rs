use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A typed parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Enum(String),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Numeric read; ints widen to float.
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&str> {
        match self {
            ParamValue::Enum(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Enum(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamKind {
    Int,
    Float,
    Bool,
    Enum,
}

/// Allowed values for one parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamConstraint {
    Range { min: f64, max: f64 },
    Choices(Vec<String>),
    Unconstrained,
}

/// Schema entry for one strategy parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub default: ParamValue,
    pub constraint: ParamConstraint,
    pub description: String,
}

impl ParamSpec {
    pub fn int(name: &str, default: i64, min: i64, max: i64, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Int,
            default: ParamValue::Int(default),
            constraint: ParamConstraint::Range {
                min: min as f64,
                max: max as f64,
            },
            description: description.to_string(),
        }
    }

    pub fn float(name: &str, default: f64, min: f64, max: f64, description: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: ParamKind::Float,
            default: ParamValue::Float(default),
            constraint: ParamConstraint::Range { min, max },
            description: description.to_string(),
        }
    }
}

/// Parameters after validation: every template key present, every value typed
/// and in range.
pub type ResolvedParams = BTreeMap<String, ParamValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamIssue {
    pub name: String,
    pub message: String,
}

/// Validation failure listing every offending field.
#[derive(Debug, Clone)]
pub struct ParameterValidationError {
    pub issues: Vec<ParamIssue>,
}

impl std::error::Error for ParameterValidationError {}

impl fmt::Display for ParameterValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .issues
            .iter()
            .map(|i| format!("{}: {}", i.name, i.message))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

/// Ordered, typed parameter schema for a strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterTemplate {
    pub specs: Vec<ParamSpec>,
}

impl ParameterTemplate {
    pub fn new(specs: Vec<ParamSpec>) -> Self {
        Self { specs }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.specs.iter().find(|s| s.name == name)
    }

    /// Every template key at its default value.
    pub fn defaults(&self) -> ResolvedParams {
        self.specs
            .iter()
            .map(|s| (s.name.clone(), s.default.clone()))
            .collect()
    }

    /// Overlay user-supplied values on the defaults. Unknown names, wrong
    /// kinds and out-of-range values are all collected before failing.
    pub fn validate(
        &self,
        overrides: &BTreeMap<String, ParamValue>,
    ) -> Result<ResolvedParams, ParameterValidationError> {
        let mut resolved = self.defaults();
        let mut issues = Vec::new();

        for (name, value) in overrides {
            let Some(spec) = self.get(name) else {
                issues.push(ParamIssue {
                    name: name.clone(),
                    message: "unknown parameter".to_string(),
                });
                continue;
            };

            match normalize(spec, value) {
                Ok(normalized) => {
                    resolved.insert(name.clone(), normalized);
                }
                Err(message) => issues.push(ParamIssue {
                    name: name.clone(),
                    message,
                }),
            }
        }

        if issues.is_empty() {
            Ok(resolved)
        } else {
            Err(ParameterValidationError { issues })
        }
    }
}

fn normalize(spec: &ParamSpec, value: &ParamValue) -> Result<ParamValue, String> {
    let normalized = match (spec.kind, value) {
        (ParamKind::Int, ParamValue::Int(v)) => ParamValue::Int(*v),
        (ParamKind::Float, ParamValue::Float(v)) => {
            if !v.is_finite() {
                return Err("value must be finite".to_string());
            }
            ParamValue::Float(*v)
        }
        // Int literals are accepted where a float is expected
        (ParamKind::Float, ParamValue::Int(v)) => ParamValue::Float(*v as f64),
        (ParamKind::Bool, ParamValue::Bool(v)) => ParamValue::Bool(*v),
        (ParamKind::Enum, ParamValue::Enum(v)) => ParamValue::Enum(v.clone()),
        (kind, other) => {
            return Err(format!("expected {kind:?} value, got {other}"));
        }
    };

    match &spec.constraint {
        ParamConstraint::Range { min, max } => {
            let v = normalized
                .as_float()
                .ok_or_else(|| "range constraint on non-numeric value".to_string())?;
            if v < *min || v > *max {
                return Err(format!("{v} outside [{min}, {max}]"));
            }
        }
        ParamConstraint::Choices(choices) => {
            let v = normalized
                .as_enum()
                .ok_or_else(|| "choices constraint on non-enum value".to_string())?;
            if !choices.iter().any(|c| c == v) {
                return Err(format!("{v} not one of {choices:?}"));
            }
        }
        ParamConstraint::Unconstrained => {}
    }

    Ok(normalized)
}

/// Convenience readers for validated parameter maps.
pub fn int_param(params: &ResolvedParams, name: &str) -> Option<i64> {
    params.get(name).and_then(|v| v.as_int())
}

pub fn float_param(params: &ResolvedParams, name: &str) -> Option<f64> {
    params.get(name).and_then(|v| v.as_float())
}
