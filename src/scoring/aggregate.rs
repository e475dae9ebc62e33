use super::catalog::MetricCatalog;
use crate::types::{AggregateResult, RawValue, ScoreRecord};
use std::collections::HashMap;

/// Weighted total over the catalog.
///
/// total = Σ goodness(value) * weight
///
/// where goodness(v) = 10 - v for reverse metrics, v otherwise.
/// Absent metrics count as a raw 0; present-but-unparseable metrics are
/// left out of the sum entirely. Unknown keys in the input are ignored.
#[derive(Debug, Clone, Copy)]
pub struct ScoreAggregator<'a> {
    catalog: &'a MetricCatalog,
}

impl<'a> ScoreAggregator<'a> {
    pub fn new(catalog: &'a MetricCatalog) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &'a MetricCatalog {
        self.catalog
    }

    pub fn aggregate(&self, metrics: &HashMap<String, RawValue>) -> f64 {
        let mut total = 0.0;
        for def in self.catalog.iter() {
            let value = match metrics.get(&def.key) {
                None => 0.0,
                Some(raw) => match raw.coerce() {
                    Some(v) => v,
                    None => continue,
                },
            };
            total += def.goodness(value) * def.weight;
        }
        total
    }

    /// Total as a share of the catalog's theoretical maximum, in percent.
    #[inline]
    pub fn percentage(&self, total: f64) -> f64 {
        let max = self.catalog.max_score();
        if max > 0.0 {
            total / max * 100.0
        } else {
            0.0
        }
    }

    /// Aggregate one record. Percentile is filled in once the population is known.
    pub fn score_record(&self, record: &ScoreRecord) -> AggregateResult {
        let total = self.aggregate(&record.metrics);
        AggregateResult {
            entity_key: record.entity_key.clone(),
            total,
            percentage: self.percentage(total),
            percentile: None,
        }
    }
}
