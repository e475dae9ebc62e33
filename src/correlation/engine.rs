use super::pearson::correlate_records;
use super::progress::{CancelFlag, NoProgress, ProgressSink, ProgressTracker};
use crate::scoring::MetricCatalog;
use crate::types::{CorrelationEdge, ScoreRecord};
use rayon::prelude::*;
use serde::Serialize;

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    /// Pairs between progress reports.
    pub progress_interval: u64,
    /// Pairs per parallel work unit. Cancellation is checked per unit.
    pub chunk_size: usize,
    /// Dedicated pool size. 0 uses the global rayon pool.
    pub worker_threads: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            progress_interval: 100,
            chunk_size: 256,
            worker_threads: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CorrelationStats {
    pub entities: usize,
    pub total_pairs: u64,
    pub pairs_evaluated: u64,
    pub edges_emitted: usize,
    pub cancelled: bool,
    pub elapsed_secs: f64,
}

#[derive(Debug, Clone)]
pub struct CorrelationRun {
    /// Canonical order: by entity_a, then entity_b.
    pub edges: Vec<CorrelationEdge>,
    pub stats: CorrelationStats,
}

/// All-pairs Pearson correlation over a population snapshot.
///
/// Entities are put in canonical (sorted key) order and every unordered pair
/// i < j is visited exactly once. Pairs are split into fixed-size index
/// ranges and mapped in parallel; each range yields its own edge list and the
/// lists are concatenated in range order, so output is independent of thread
/// scheduling. The only shared state is the progress counter.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationEngine<'a> {
    catalog: &'a MetricCatalog,
    config: EngineConfig,
}

impl<'a> CorrelationEngine<'a> {
    pub fn new(catalog: &'a MetricCatalog, config: EngineConfig) -> Self {
        Self { catalog, config }
    }

    /// Every edge for the population, no progress reporting.
    pub fn compute_all(&self, records: &[ScoreRecord]) -> Vec<CorrelationEdge> {
        self.run(records, &NoProgress, &CancelFlag::new()).edges
    }

    /// Full run with progress reports and cooperative cancellation.
    /// A cancelled run returns the edges of every range that was started.
    pub fn run(
        &self,
        records: &[ScoreRecord],
        sink: &dyn ProgressSink,
        cancel: &CancelFlag,
    ) -> CorrelationRun {
        let population = canonical_order(records);
        let n = population.len();
        let total_pairs = pair_count(n);
        let chunk_size = self.config.chunk_size.max(1) as u64;

        let ranges: Vec<(u64, u64)> = (0..total_pairs)
            .step_by(chunk_size as usize)
            .map(|start| (start, (start + chunk_size).min(total_pairs)))
            .collect();
        let offsets = row_offsets(n);

        tracing::info!(
            entities = n,
            total_pairs,
            chunks = ranges.len(),
            "correlation run starting"
        );

        let tracker = ProgressTracker::new(total_pairs, self.config.progress_interval, sink);

        let work = || -> Vec<CorrelationEdge> {
            ranges
                .par_iter()
                .map(|&(start, end)| {
                    if cancel.is_cancelled() {
                        return Vec::new();
                    }
                    let mut edges = Vec::new();
                    for (i, j) in PairRange::new(&offsets, n, start, end) {
                        let (a, b) = (population[i], population[j]);
                        if let Some((r, sample_size)) = correlate_records(self.catalog, a, b) {
                            edges.push(CorrelationEdge::new(&a.entity_key, &b.entity_key, r, sample_size));
                        }
                        tracker.tick();
                    }
                    edges
                })
                .collect::<Vec<Vec<CorrelationEdge>>>()
                .into_iter()
                .flatten()
                .collect()
        };

        let edges = match self.dedicated_pool() {
            Some(pool) => pool.install(work),
            None => work(),
        };

        let last = tracker.finish();
        let stats = CorrelationStats {
            entities: n,
            total_pairs,
            pairs_evaluated: last.completed,
            edges_emitted: edges.len(),
            cancelled: cancel.is_cancelled() && last.completed < total_pairs,
            elapsed_secs: last.elapsed_secs,
        };

        tracing::info!(
            pairs = stats.pairs_evaluated,
            edges = stats.edges_emitted,
            cancelled = stats.cancelled,
            elapsed_secs = format_args!("{:.2}", stats.elapsed_secs),
            rate = format_args!("{:.1}", last.rate),
            "correlation run finished"
        );

        CorrelationRun { edges, stats }
    }

    fn dedicated_pool(&self) -> Option<rayon::ThreadPool> {
        if self.config.worker_threads == 0 {
            return None;
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.worker_threads)
            .build()
        {
            Ok(pool) => Some(pool),
            Err(e) => {
                tracing::warn!(error = %e, "could not build worker pool, using global pool");
                None
            }
        }
    }
}

/// Sorted by key, first occurrence kept for duplicate keys.
fn canonical_order(records: &[ScoreRecord]) -> Vec<&ScoreRecord> {
    let mut sorted: Vec<&ScoreRecord> = records.iter().collect();
    sorted.sort_by(|a, b| a.entity_key.cmp(&b.entity_key));
    let before = sorted.len();
    sorted.dedup_by(|later, earlier| later.entity_key == earlier.entity_key);
    if sorted.len() < before {
        tracing::debug!(dropped = before - sorted.len(), "duplicate entity keys ignored");
    }
    sorted
}

#[inline]
pub(crate) fn pair_count(n: usize) -> u64 {
    let n = n as u64;
    n * n.saturating_sub(1) / 2
}

/// Linear index of the first pair in each row i: (i, i+1).
fn row_offsets(n: usize) -> Vec<u64> {
    let mut offsets = Vec::with_capacity(n);
    let mut acc = 0u64;
    for i in 0..n {
        offsets.push(acc);
        acc += (n - i - 1) as u64;
    }
    offsets
}

/// Pairs (i, j), i < j, for linear pair indices in [start, end).
struct PairRange {
    n: usize,
    i: usize,
    j: usize,
    remaining: u64,
}

impl PairRange {
    fn new(offsets: &[u64], n: usize, start: u64, end: u64) -> Self {
        if start >= end {
            return Self { n, i: 0, j: 0, remaining: 0 };
        }
        // last row whose first pair index is <= start
        let i = offsets.partition_point(|&o| o <= start) - 1;
        let j = i + 1 + (start - offsets[i]) as usize;
        Self {
            n,
            i,
            j,
            remaining: end - start,
        }
    }
}

impl Iterator for PairRange {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let pair = (self.i, self.j);
        self.remaining -= 1;
        self.j += 1;
        if self.j >= self.n {
            self.i += 1;
            self.j = self.i + 1;
        }
        Some(pair)
    }
}
