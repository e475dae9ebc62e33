use crate::errors::{ScoringError, ScoringResult};
use crate::types::MetricDefinition;
use std::collections::HashMap;

/// Top of the raw metric scale. Every metric is rated 0..=10.
pub const METRIC_SCALE_MAX: f64 = 10.0;

/// Built-in scoring model: (key, weight, reverse).
const DEFAULT_METRICS: &[(&str, f64, bool)] = &[
    ("moat_score", 10.0, false),
    ("barriers_score", 10.0, false),
    ("disruption_risk", 10.0, true),
    ("switching_cost", 10.0, false),
    ("brand_strength", 10.0, false),
    ("competition_intensity", 10.0, true),
    ("network_effect", 10.0, false),
    ("product_differentiation", 10.0, false),
    ("innovativeness_score", 10.0, false),
    ("growth_opportunity", 10.0, false),
    ("riskiness_score", 10.0, true),
    ("pricing_power", 10.0, false),
    ("ambition_score", 10.0, false),
    ("bargaining_power_of_customers", 10.0, true),
    ("bargaining_power_of_suppliers", 10.0, true),
    ("product_quality_score", 10.0, false),
    ("culture_employee_satisfaction_score", 10.0, false),
    ("trailblazer_score", 10.0, false),
    ("management_quality_score", 10.0, false),
    ("ai_knowledge_score", 10.0, false),
    ("size_well_known_score", 19.31, true),
    ("ethical_healthy_environmental_score", 10.0, false),
    ("long_term_orientation_score", 10.0, false),
];

/// Immutable metric registry. Built once per batch run and shared by reference.
/// Iteration order is definition order; every key appears exactly once.
#[derive(Debug, Clone)]
pub struct MetricCatalog {
    definitions: Vec<MetricDefinition>,
    index: HashMap<String, usize>,
}

impl MetricCatalog {
    pub fn new(definitions: Vec<MetricDefinition>) -> ScoringResult<Self> {
        let mut index = HashMap::with_capacity(definitions.len());
        for (i, def) in definitions.iter().enumerate() {
            if !def.weight.is_finite() {
                return Err(ScoringError::InvalidWeight {
                    key: def.key.clone(),
                    weight: def.weight,
                });
            }
            if index.insert(def.key.clone(), i).is_some() {
                return Err(ScoringError::DuplicateMetric(def.key.clone()));
            }
        }
        Ok(Self { definitions, index })
    }

    /// Parse a JSON array of `{"key", "weight", "reverse"}` objects.
    pub fn from_json(json: &str) -> ScoringResult<Self> {
        let definitions: Vec<MetricDefinition> = serde_json::from_str(json)?;
        Self::new(definitions)
    }

    pub fn definition_of(&self, key: &str) -> Option<&MetricDefinition> {
        self.index.get(key).map(|&i| &self.definitions[i])
    }

    /// Unknown metrics weigh nothing.
    #[inline]
    pub fn weight_of(&self, key: &str) -> f64 {
        self.definition_of(key).map_or(0.0, |d| d.weight)
    }

    /// Unknown metrics read in the normal direction.
    #[inline]
    pub fn is_reverse(&self, key: &str) -> bool {
        self.definition_of(key).is_some_and(|d| d.reverse)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MetricDefinition> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Theoretical maximum total: every positively weighted metric at the top
    /// of the scale.
    pub fn max_score(&self) -> f64 {
        self.definitions
            .iter()
            .filter(|d| d.weight > 0.0)
            .map(|d| d.weight * METRIC_SCALE_MAX)
            .sum()
    }

    /// Copy with one metric re-weighted. `None` if the key is unknown.
    pub fn with_weight(&self, key: &str, weight: f64) -> Option<Self> {
        let &i = self.index.get(key)?;
        let mut copy = self.clone();
        copy.definitions[i].weight = weight;
        Some(copy)
    }
}

impl Default for MetricCatalog {
    fn default() -> Self {
        let definitions: Vec<MetricDefinition> = DEFAULT_METRICS
            .iter()
            .map(|&(key, weight, reverse)| MetricDefinition::new(key, weight, reverse))
            .collect();
        let index = definitions
            .iter()
            .enumerate()
            .map(|(i, d)| (d.key.clone(), i))
            .collect();
        Self { definitions, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_is_consistent() {
        let cat = MetricCatalog::default();
        assert_eq!(cat.len(), DEFAULT_METRICS.len());
        // Re-validating the built-in table must succeed (no duplicates).
        assert!(MetricCatalog::new(cat.iter().cloned().collect()).is_ok());
        assert!(cat.is_reverse("disruption_risk"));
        assert!(!cat.is_reverse("moat_score"));
        assert!((cat.weight_of("size_well_known_score") - 19.31).abs() < 1e-12);
    }

    #[test]
    fn test_unknown_metric_defaults() {
        let cat = MetricCatalog::default();
        assert!(cat.definition_of("not_a_metric").is_none());
        assert_eq!(cat.weight_of("not_a_metric"), 0.0);
        assert!(!cat.is_reverse("not_a_metric"));
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = MetricCatalog::new(vec![
            MetricDefinition::new("a", 1.0, false),
            MetricDefinition::new("a", 2.0, true),
        ])
        .unwrap_err();
        assert!(matches!(err, ScoringError::DuplicateMetric(k) if k == "a"));
    }

    #[test]
    fn test_non_finite_weight_rejected() {
        let err = MetricCatalog::new(vec![MetricDefinition::new("a", f64::NAN, false)]).unwrap_err();
        assert!(matches!(err, ScoringError::InvalidWeight { .. }));
    }

    #[test]
    fn test_max_score_ignores_non_positive_weights() {
        let cat = MetricCatalog::new(vec![
            MetricDefinition::new("a", 10.0, false),
            MetricDefinition::new("b", 5.0, true),
            MetricDefinition::new("c", 0.0, false),
            MetricDefinition::new("d", -3.0, false),
        ])
        .unwrap();
        assert_eq!(cat.max_score(), 150.0);
    }

    #[test]
    fn test_from_json_and_reweight() {
        let cat = MetricCatalog::from_json(
            r#"[{"key": "a", "weight": 2.0}, {"key": "b", "weight": 1.0, "reverse": true}]"#,
        )
        .unwrap();
        assert!(!cat.is_reverse("a"));
        assert!(cat.is_reverse("b"));

        let rw = cat.with_weight("b", -4.0).unwrap();
        assert_eq!(rw.weight_of("b"), -4.0);
        assert_eq!(cat.weight_of("b"), 1.0, "original must be untouched");
        assert!(cat.with_weight("zzz", 1.0).is_none());
    }
}
