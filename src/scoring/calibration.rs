//! Zero-correlation weight calibration.
//!
//! Finds the weight w for one metric at which the aggregate totals become
//! uncorrelated with a side signal the metric is meant to offset:
//!
//!   r(w) = pearson(total_w(record_i), side_i) = 0
//!
//! by bisection. Typical use: pick the (usually negative) weight for a
//! size/recognition metric so that company size stops leaking into the total.
//!
//! Analysis utility only. The catalog is never mutated; every probe scores
//! against a re-weighted copy.

use super::aggregate::ScoreAggregator;
use super::catalog::MetricCatalog;
use crate::correlation::pearson::pearson;
use crate::types::ScoreRecord;
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct CalibrationParams {
    /// Initial bracket.
    pub low: f64,
    pub high: f64,
    /// Bracket tried once if the initial one does not straddle zero.
    pub widened_low: f64,
    pub widened_high: f64,
    /// Stop once |r| falls below this.
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        Self {
            low: -50.0,
            high: 50.0,
            widened_low: -200.0,
            widened_high: 200.0,
            tolerance: 1e-6,
            max_iterations: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Calibration {
    pub metric: String,
    pub weight: f64,
    pub correlation: f64,
    pub iterations: u32,
}

/// Correlation between totals (with `metric` weighted `weight`) and `side_signal`.
/// `side_signal[i]` belongs to `records[i]`.
pub fn correlation_at_weight(
    catalog: &MetricCatalog,
    records: &[ScoreRecord],
    side_signal: &[f64],
    metric: &str,
    weight: f64,
) -> Option<f64> {
    let reweighted = catalog.with_weight(metric, weight)?;
    let agg = ScoreAggregator::new(&reweighted);
    let totals: Vec<f64> = records.iter().map(|r| agg.aggregate(&r.metrics)).collect();
    pearson(&totals, side_signal)
}

/// Bisect for the weight that zeroes the correlation.
///
/// `None` when the metric is unknown, inputs are misaligned, the correlation
/// is undefined at a probe (fewer than two records, zero variance), or no
/// bracket straddles zero.
pub fn zero_correlation_weight(
    catalog: &MetricCatalog,
    records: &[ScoreRecord],
    side_signal: &[f64],
    metric: &str,
    params: &CalibrationParams,
) -> Option<Calibration> {
    if records.len() != side_signal.len() || catalog.definition_of(metric).is_none() {
        return None;
    }
    let probe = |w: f64| correlation_at_weight(catalog, records, side_signal, metric, w);

    let (mut low, mut high) = (params.low, params.high);
    let (mut r_low, mut r_high) = (probe(low)?, probe(high)?);

    if same_sign(r_low, r_high) {
        low = params.widened_low;
        high = params.widened_high;
        r_low = probe(low)?;
        r_high = probe(high)?;
        if same_sign(r_low, r_high) {
            tracing::debug!(metric, r_low, r_high, "correlation does not cross zero");
            return None;
        }
    }

    let mut iterations = 0u32;
    while iterations < params.max_iterations {
        let mid = (low + high) / 2.0;
        let r_mid = probe(mid)?;

        if r_mid.abs() < params.tolerance {
            return Some(Calibration {
                metric: metric.to_string(),
                weight: mid,
                correlation: r_mid,
                iterations,
            });
        }

        if opposite_sign(r_low, r_mid) {
            high = mid;
            r_high = r_mid;
        } else if opposite_sign(r_high, r_mid) {
            low = mid;
            r_low = r_mid;
        } else if r_low.abs() < r_high.abs() {
            // an endpoint hit exactly zero; shrink toward the smaller side
            high = mid;
            r_high = r_mid;
        } else {
            low = mid;
            r_low = r_mid;
        }
        iterations += 1;
    }

    let weight = (low + high) / 2.0;
    let correlation = probe(weight)?;
    Some(Calibration {
        metric: metric.to_string(),
        weight,
        correlation,
        iterations,
    })
}

#[inline]
fn same_sign(a: f64, b: f64) -> bool {
    (a > 0.0 && b > 0.0) || (a < 0.0 && b < 0.0)
}

#[inline]
fn opposite_sign(a: f64, b: f64) -> bool {
    (a > 0.0 && b < 0.0) || (a < 0.0 && b > 0.0)
}
