use crate::scoring::MetricCatalog;
use crate::types::{RawValue, ScoreRecord};
use smallvec::SmallVec;
use statrs::statistics::Statistics;
use std::collections::HashMap;

/// Fewer shared metrics than this and no edge is emitted.
pub const MIN_SHARED_METRICS: usize = 2;

/// Paired goodness vectors. Stack-allocated for catalogs up to 32 metrics.
pub type SharedVector = SmallVec<[f64; 32]>;

/// Pearson product-moment correlation.
///
/// r = Σ((x-x̄)(y-ȳ)) / sqrt(Σ(x-x̄)² · Σ(y-ȳ)²)
///
/// `None` when the vectors differ in length, hold fewer than two points, or
/// either has zero variance.
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let (num, den) = moments(x, y)?;
    if den == 0.0 {
        return None;
    }
    let r = num / den;
    r.is_finite().then_some(r)
}

/// Pairwise coefficient as stored on correlation edges.
///
/// Same as [`pearson`], except zero variance is defined rather than absent:
/// 1.0 if the two vectors are identical, 0.0 otherwise.
pub fn pair_coefficient(x: &[f64], y: &[f64]) -> Option<f64> {
    let (num, den) = moments(x, y)?;
    if den == 0.0 {
        return Some(if x == y { 1.0 } else { 0.0 });
    }
    let r = num / den;
    if !r.is_finite() {
        return None;
    }
    // rounding can push |r| a hair past 1
    Some(r.clamp(-1.0, 1.0))
}

/// Co-moment and denominator over peak-scaled copies of `x` and `y`.
/// r is invariant to a positive scale per vector, and scaling keeps every
/// intermediate sum finite for inputs near the f64 range limits.
fn moments(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    if x.len() != y.len() || x.len() < MIN_SHARED_METRICS {
        return None;
    }
    let x = peak_scaled(x);
    let y = peak_scaled(y);
    let mean_x = Statistics::mean(x.iter());
    let mean_y = Statistics::mean(y.iter());

    let mut num = 0.0;
    let mut ss_x = 0.0;
    let mut ss_y = 0.0;
    for (&a, &b) in x.iter().zip(y.iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        num += dx * dy;
        ss_x += dx * dx;
        ss_y += dy * dy;
    }
    Some((num, (ss_x * ss_y).sqrt()))
}

/// Divide by the largest magnitude, so values land in [-1, 1].
fn peak_scaled(v: &[f64]) -> SharedVector {
    let peak = v.iter().fold(0.0_f64, |m, x| m.max(x.abs()));
    if peak == 0.0 || !peak.is_finite() {
        return v.iter().copied().collect();
    }
    v.iter().map(|x| x / peak).collect()
}

/// Goodness vectors over the metrics both records carry with a usable value,
/// in catalog order. Keys outside the catalog are not compared.
pub fn shared_vectors(
    catalog: &MetricCatalog,
    a: &HashMap<String, RawValue>,
    b: &HashMap<String, RawValue>,
) -> (SharedVector, SharedVector) {
    let mut xs = SharedVector::new();
    let mut ys = SharedVector::new();
    for def in catalog.iter() {
        let (Some(ra), Some(rb)) = (a.get(&def.key), b.get(&def.key)) else {
            continue;
        };
        let (Some(va), Some(vb)) = (ra.coerce(), rb.coerce()) else {
            continue;
        };
        xs.push(def.goodness(va));
        ys.push(def.goodness(vb));
    }
    (xs, ys)
}

/// Coefficient and sample size for two records, `None` on insufficient overlap.
pub fn correlate_records(
    catalog: &MetricCatalog,
    a: &ScoreRecord,
    b: &ScoreRecord,
) -> Option<(f64, usize)> {
    let (xs, ys) = shared_vectors(catalog, &a.metrics, &b.metrics);
    pair_coefficient(&xs, &ys).map(|r| (r, xs.len()))
}
