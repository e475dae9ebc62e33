use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

// ── Metric Definitions ──

/// One named metric in the scoring model.
/// `weight` may be 0 (tracked, non-contributory) or negative (experimental).
/// `reverse` marks metrics where a lower raw value is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub key: String,
    pub weight: f64,
    #[serde(default)]
    pub reverse: bool,
}

impl MetricDefinition {
    pub fn new(key: impl Into<String>, weight: f64, reverse: bool) -> Self {
        Self {
            key: key.into(),
            weight,
            reverse,
        }
    }

    /// Map a coerced raw value onto the "higher is better" scale.
    #[inline]
    pub fn goodness(&self, value: f64) -> f64 {
        if self.reverse {
            10.0 - value
        } else {
            value
        }
    }
}

// ── Entities ──

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityIdentity {
    pub canonical_ticker: String,
    pub display_name: String,
}

// ── Raw Metric Values ──

/// Loosely-typed scalar as handed over by the collection layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
    Null,
}

impl RawValue {
    /// Parse-or-omit. `None` means the value is present but unusable.
    pub fn coerce(&self) -> Option<f64> {
        let v = match self {
            RawValue::Number(n) => *n,
            RawValue::Text(s) => s.trim().parse::<f64>().ok()?,
            RawValue::Null => return None,
        };
        v.is_finite().then_some(v)
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::Text(s.to_string())
    }
}

// Anything that is not a number or a string (bools, arrays, objects) is kept
// as Null so a single odd field never rejects a whole snapshot.
impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::Number(n) => n.as_f64().map(RawValue::Number).unwrap_or(RawValue::Null),
            serde_json::Value::String(s) => RawValue::Text(s),
            _ => RawValue::Null,
        })
    }
}

// ── Records In / Results Out ──

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub entity_key: String,
    pub metrics: HashMap<String, RawValue>,
}

impl ScoreRecord {
    pub fn new(entity_key: impl Into<String>) -> Self {
        Self {
            entity_key: entity_key.into(),
            metrics: HashMap::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<RawValue>) -> Self {
        self.metrics.insert(key.to_string(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    pub entity_key: String,
    pub total: f64,
    /// Total as a percentage of the catalog's theoretical maximum.
    pub percentage: f64,
    pub percentile: Option<u8>,
}

/// Undirected edge, stored once per unordered pair with `entity_a < entity_b`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationEdge {
    pub entity_a: String,
    pub entity_b: String,
    pub coefficient: f64,
    pub sample_size: usize,
}

impl CorrelationEdge {
    pub fn new(a: &str, b: &str, coefficient: f64, sample_size: usize) -> Self {
        let (entity_a, entity_b) = if a <= b { (a, b) } else { (b, a) };
        Self {
            entity_a: entity_a.to_string(),
            entity_b: entity_b.to_string(),
            coefficient,
            sample_size,
        }
    }

    /// The entity on the other end, if `entity` is part of this edge.
    pub fn other(&self, entity: &str) -> Option<&str> {
        if self.entity_a == entity {
            Some(&self.entity_b)
        } else if self.entity_b == entity {
            Some(&self.entity_a)
        } else {
            None
        }
    }
}
