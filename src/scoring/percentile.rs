use serde::Serialize;
use statrs::statistics::{Data, Median, Statistics};

/// Percentile rank, inclusive of self:
///
/// floor(100 * |{p in population : p <= score}| / |population|)
///
/// `None` for an empty population. Ties share a percentile and the
/// population maximum always ranks 100.
pub fn percentile_of(score: f64, population: &[f64]) -> Option<u8> {
    if population.is_empty() {
        return None;
    }
    let at_or_below = population.iter().filter(|&&p| p <= score).count();
    Some(to_percentile(at_or_below, population.len()))
}

/// Percentile of every member of `population`, in input order.
/// Same result as calling [`percentile_of`] per member, in O(n log n).
pub fn rank_population(population: &[f64]) -> Vec<Option<u8>> {
    if population.is_empty() {
        return Vec::new();
    }
    let mut sorted = population.to_vec();
    sorted.sort_by(f64::total_cmp);

    population
        .iter()
        .map(|&score| {
            let at_or_below = sorted.partition_point(|&p| p <= score);
            Some(to_percentile(at_or_below, sorted.len()))
        })
        .collect()
}

#[inline]
fn to_percentile(at_or_below: usize, len: usize) -> u8 {
    // at_or_below <= len, so the result is within 0..=100
    (at_or_below * 100 / len) as u8
}

/// Descriptive statistics for a population of totals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PopulationSummary {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

impl PopulationSummary {
    /// `None` for an empty population.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let std_dev = if values.len() < 2 {
            0.0
        } else {
            Statistics::std_dev(values.iter())
        };
        Some(Self {
            count: values.len(),
            mean: Statistics::mean(values.iter()),
            std_dev,
            min: Statistics::min(values.iter()),
            median: Data::new(values.to_vec()).median(),
            max: Statistics::max(values.iter()),
        })
    }
}
