use crate::correlation::{
    most_negative, strongest, CancelFlag, CorrelationEngine, CorrelationStats, EngineConfig,
    ProgressSink,
};
use crate::errors::{ScoringError, ScoringResult};
use crate::resolve::{listing_source, CandidateSource, EntityDirectory, NameResolver, ResolverConfig};
use crate::scoring::{rank_population, MetricCatalog, PopulationSummary, ScoreAggregator};
use crate::types::{AggregateResult, CorrelationEdge, EntityIdentity, RawValue, ScoreRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use uuid::Uuid;

/// Fully loaded population for one batch run.
///
/// `scores` is keyed by storage key (ticker in any case, or display name).
/// `listings` is the bulk ticker table, `overrides` the curated one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PopulationSnapshot {
    pub scores: BTreeMap<String, HashMap<String, RawValue>>,
    #[serde(default)]
    pub listings: BTreeMap<String, String>,
    #[serde(default)]
    pub overrides: BTreeMap<String, String>,
}

impl PopulationSnapshot {
    pub fn from_json(json: &str) -> ScoringResult<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        if snapshot.scores.is_empty() {
            return Err(ScoringError::EmptyPopulation("snapshot has no scores".into()));
        }
        Ok(snapshot)
    }

    pub fn load(path: &Path) -> ScoringResult<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ScoringError::Io(format!("{}: {e}", path.display())))?;
        Self::from_json(&raw)
    }

    /// Listing (bonds filtered) first, overrides last.
    pub fn sources(&self) -> Vec<CandidateSource> {
        vec![
            listing_source("listings", &self.listings),
            CandidateSource::overrides("overrides", &self.overrides),
        ]
    }

    pub fn directory(&self) -> EntityDirectory {
        EntityDirectory::from_sources(&self.sources())
    }

    /// Records keyed by canonical ticker.
    ///
    /// Storage keys are visited in sorted order; when two keys resolve to the
    /// same ticker the first one wins. Keys the directory cannot place go to
    /// the fuzzy fallback, if any, and are skipped when that fails too. With an
    /// empty directory storage keys are used as they are.
    pub fn records(
        &self,
        directory: &EntityDirectory,
        fallback: Option<KeyFallback<'_>>,
    ) -> Vec<ScoreRecord> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut records = Vec::with_capacity(self.scores.len());
        let mut unresolved = 0usize;
        let mut shadowed = 0usize;

        for (storage_key, metrics) in &self.scores {
            let key = if directory.is_empty() {
                Some(storage_key.trim().to_string())
            } else {
                directory
                    .canonical_ticker(storage_key)
                    .or_else(|| fallback.and_then(|f| f.resolve(storage_key)))
            };
            let Some(key) = key.filter(|k| !k.is_empty()) else {
                tracing::debug!(storage_key = storage_key.as_str(), "unresolved storage key");
                unresolved += 1;
                continue;
            };
            if !seen.insert(key.clone()) {
                tracing::debug!(
                    storage_key = storage_key.as_str(),
                    ticker = %key,
                    "storage key shadowed by earlier key"
                );
                shadowed += 1;
                continue;
            }
            records.push(ScoreRecord {
                entity_key: key,
                metrics: metrics.clone(),
            });
        }

        if unresolved > 0 || shadowed > 0 {
            tracing::info!(
                kept = records.len(),
                unresolved,
                shadowed,
                "snapshot keys canonicalised"
            );
        }
        records
    }
}

/// Name search for storage keys that are neither tickers nor exact names.
#[derive(Debug, Clone, Copy)]
pub struct KeyFallback<'a> {
    pub resolver: &'a NameResolver,
    /// Best match must score at least this to be accepted.
    pub min_score: i32,
}

impl KeyFallback<'_> {
    fn resolve(&self, storage_key: &str) -> Option<String> {
        let hit = self.resolver.resolve(storage_key)?;
        if hit.score < self.min_score {
            tracing::debug!(
                storage_key,
                best = %hit.identifier,
                score = hit.score,
                "fallback match too weak"
            );
            return None;
        }
        tracing::debug!(
            storage_key,
            ticker = %hit.identifier,
            score = hit.score,
            "storage key matched by name"
        );
        Some(hit.identifier)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BatchOptions {
    pub engine: EngineConfig,
    pub resolver: ResolverConfig,
    /// Minimum resolver score for fuzzy storage-key matches.
    pub min_match_score: i32,
    /// Length of the global strongest and most-negative edge lists.
    pub top_correlations: usize,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            resolver: ResolverConfig::default(),
            min_match_score: 900,
            top_correlations: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub calculated_at: DateTime<Utc>,
    pub entities: Vec<EntityIdentity>,
    /// Descending total, ties by key.
    pub aggregates: Vec<AggregateResult>,
    pub summary: Option<PopulationSummary>,
    pub edges: Vec<CorrelationEdge>,
    pub strongest: Vec<CorrelationEdge>,
    /// Lowest coefficients first.
    pub most_negative: Vec<CorrelationEdge>,
    pub correlation: CorrelationStats,
}

/// First occurrence of each entity key, input order kept.
fn unique_by_key(records: &[ScoreRecord]) -> Cow<'_, [ScoreRecord]> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(records.len());
    if records.iter().all(|r| seen.insert(r.entity_key.as_str())) {
        return Cow::Borrowed(records);
    }
    seen.clear();
    let unique: Vec<ScoreRecord> = records
        .iter()
        .filter(|r| seen.insert(r.entity_key.as_str()))
        .cloned()
        .collect();
    tracing::debug!(dropped = records.len() - unique.len(), "duplicate entity keys ignored");
    Cow::Owned(unique)
}

/// Aggregate, rank and correlate one population.
/// Duplicate entity keys keep their first occurrence only.
pub fn run_batch(
    catalog: &MetricCatalog,
    records: &[ScoreRecord],
    directory: &EntityDirectory,
    options: &BatchOptions,
    sink: &dyn ProgressSink,
    cancel: &CancelFlag,
) -> BatchReport {
    let records = unique_by_key(records);
    let records: &[ScoreRecord] = &records;
    let run_id = Uuid::new_v4();
    let calculated_at = Utc::now();
    tracing::info!(%run_id, entities = records.len(), metrics = catalog.len(), "batch starting");

    // ── Aggregate + rank ──
    let aggregator = ScoreAggregator::new(catalog);
    let mut aggregates: Vec<AggregateResult> =
        records.iter().map(|r| aggregator.score_record(r)).collect();
    let totals: Vec<f64> = aggregates.iter().map(|a| a.total).collect();
    for (agg, pct) in aggregates.iter_mut().zip(rank_population(&totals)) {
        agg.percentile = pct;
    }
    aggregates.sort_by(|a, b| {
        b.total
            .total_cmp(&a.total)
            .then_with(|| a.entity_key.cmp(&b.entity_key))
    });
    let summary = PopulationSummary::from_values(&totals);
    if let Some(s) = &summary {
        tracing::info!(
            count = s.count,
            mean = format_args!("{:.2}", s.mean),
            std_dev = format_args!("{:.2}", s.std_dev),
            median = format_args!("{:.2}", s.median),
            min = format_args!("{:.2}", s.min),
            max = format_args!("{:.2}", s.max),
            "aggregate scores"
        );
    }

    // ── Correlate ──
    let run = CorrelationEngine::new(catalog, options.engine).run(records, sink, cancel);
    let top = strongest(&run.edges, options.top_correlations);
    let bottom = most_negative(&run.edges, options.top_correlations);

    let mut entities: Vec<EntityIdentity> =
        records.iter().map(|r| directory.identity(&r.entity_key)).collect();
    entities.sort_by(|a, b| a.canonical_ticker.cmp(&b.canonical_ticker));
    entities.dedup_by(|a, b| a.canonical_ticker == b.canonical_ticker);

    BatchReport {
        run_id,
        calculated_at,
        entities,
        aggregates,
        summary,
        edges: run.edges,
        strongest: top,
        most_negative: bottom,
        correlation: run.stats,
    }
}

/// Canonicalise a snapshot and run one batch over it.
pub fn run_snapshot(
    catalog: &MetricCatalog,
    snapshot: &PopulationSnapshot,
    options: &BatchOptions,
    sink: &dyn ProgressSink,
    cancel: &CancelFlag,
) -> ScoringResult<BatchReport> {
    let sources = snapshot.sources();
    let directory = EntityDirectory::from_sources(&sources);
    let resolver = NameResolver::new(options.resolver, &sources);
    let fallback = KeyFallback {
        resolver: &resolver,
        min_score: options.min_match_score,
    };
    let records = snapshot.records(&directory, Some(fallback));
    if records.is_empty() {
        return Err(ScoringError::EmptyPopulation(
            "no snapshot key resolved to an entity".into(),
        ));
    }
    Ok(run_batch(catalog, &records, &directory, options, sink, cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlation::NoProgress;
    use crate::types::MetricDefinition;

    const SNAPSHOT: &str = r#"{
        "scores": {
            "aapl": {"moat": 9, "risk": 2, "brand": "10"},
            "Apple Inc": {"moat": 1, "risk": 9, "brand": 1},
            "Microsoft Corp": {"moat": 8, "risk": 3, "brand": 8},
            "xom": {"moat": 5, "risk": 6, "brand": null},
            "Some Unknown Company": {"moat": 5}
        },
        "listings": {
            "AAPL": "Apple Inc",
            "MSFT": "Microsoft Corp",
            "XOM": "Exxon Mobil Corp",
            "F-B": "Ford Motor Co Notes Due 2030"
        },
        "overrides": {"XOM": "ExxonMobil"}
    }"#;

    fn catalog() -> MetricCatalog {
        MetricCatalog::new(vec![
            MetricDefinition::new("moat", 10.0, false),
            MetricDefinition::new("risk", 10.0, true),
            MetricDefinition::new("brand", 10.0, false),
        ])
        .unwrap()
    }

    #[test]
    fn test_snapshot_canonicalisation() {
        let snap = PopulationSnapshot::from_json(SNAPSHOT).unwrap();
        let dir = snap.directory();
        assert_eq!(dir.len(), 3, "bond row should be filtered");
        assert_eq!(dir.display_name("XOM"), Some("ExxonMobil"));

        let records = snap.records(&dir, None);
        let keys: Vec<&str> = records.iter().map(|r| r.entity_key.as_str()).collect();
        // "Apple Inc" sorts before "aapl" and wins the AAPL slot
        assert_eq!(keys, vec!["AAPL", "MSFT", "XOM"]);
        assert_eq!(records[0].metrics.get("moat"), Some(&RawValue::Number(1.0)));
    }

    #[test]
    fn test_fuzzy_fallback_for_loose_names() {
        let snap = PopulationSnapshot::from_json(
            r#"{
                "scores": {"Nvidia": {"moat": 9}, "Some Unknown Company": {"moat": 5}},
                "listings": {"NVDA": "NVIDIA Corporation", "MSFT": "Microsoft Corp"}
            }"#,
        )
        .unwrap();
        let sources = snap.sources();
        let dir = EntityDirectory::from_sources(&sources);
        assert!(snap.records(&dir, None).is_empty());

        let resolver = NameResolver::new(ResolverConfig::default(), &sources);
        let fallback = KeyFallback { resolver: &resolver, min_score: 900 };
        let keys: Vec<String> = snap
            .records(&dir, Some(fallback))
            .into_iter()
            .map(|r| r.entity_key)
            .collect();
        assert_eq!(keys, vec!["NVDA"]);
    }

    #[test]
    fn test_empty_snapshot_rejected() {
        let err = PopulationSnapshot::from_json(r#"{"scores": {}}"#).unwrap_err();
        assert!(matches!(err, ScoringError::EmptyPopulation(_)));
        let err = PopulationSnapshot::from_json("not json").unwrap_err();
        assert!(matches!(err, ScoringError::Parse(_)));
    }

    #[test]
    fn test_missing_snapshot_file_is_io_error() {
        let err = PopulationSnapshot::load(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(matches!(err, ScoringError::Io(_)));
    }

    #[test]
    fn test_no_directory_keeps_storage_keys() {
        let snap = PopulationSnapshot::from_json(r#"{"scores": {"b": {"moat": 1}, "a": {"moat": 2}}}"#)
            .unwrap();
        let dir = snap.directory();
        let keys: Vec<String> = snap.records(&dir, None).into_iter().map(|r| r.entity_key).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn test_batch_report() {
        let cat = catalog();
        let snap = PopulationSnapshot::from_json(SNAPSHOT).unwrap();
        let report = run_snapshot(
            &cat,
            &snap,
            &BatchOptions { top_correlations: 2, ..Default::default() },
            &NoProgress,
            &CancelFlag::new(),
        )
        .unwrap();

        // MSFT: 80 + 70 + 80 = 230, XOM: 50 + 40 + 0 (null omitted) = 90, AAPL: 10 + 10 + 10 = 30
        let order: Vec<&str> = report.aggregates.iter().map(|a| a.entity_key.as_str()).collect();
        assert_eq!(order, vec!["MSFT", "XOM", "AAPL"]);
        assert!((report.aggregates[0].total - 230.0).abs() < 1e-9);
        assert!((report.aggregates[1].total - 90.0).abs() < 1e-9);
        assert_eq!(report.aggregates[0].percentile, Some(100));
        assert_eq!(report.aggregates[2].percentile, Some(33));
        assert!((report.aggregates[0].percentage - 230.0 / 300.0 * 100.0).abs() < 1e-9);

        let summary = report.summary.expect("non-empty population");
        assert_eq!(summary.count, 3);
        assert!((summary.median - 90.0).abs() < 1e-9);

        assert_eq!(report.correlation.total_pairs, 3);
        assert_eq!(report.edges.len(), 3);
        assert_eq!(report.strongest.len(), 2);
        assert_eq!(report.most_negative.len(), 2);
        assert!(report.most_negative[0].coefficient <= report.most_negative[1].coefficient);
        assert!(!report.correlation.cancelled);

        let names: Vec<&str> = report.entities.iter().map(|e| e.display_name.as_str()).collect();
        assert_eq!(names, vec!["Apple Inc", "Microsoft Corp", "ExxonMobil"]);
    }

    #[test]
    fn test_report_serialises() {
        let cat = catalog();
        let records = vec![
            ScoreRecord::new("A").with("moat", 3.0).with("risk", 4.0),
            ScoreRecord::new("B").with("moat", 6.0).with("risk", 1.0),
        ];
        let report = run_batch(
            &cat,
            &records,
            &EntityDirectory::default(),
            &BatchOptions::default(),
            &NoProgress,
            &CancelFlag::new(),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["run_id"].is_string());
        assert!(json["calculated_at"].as_str().unwrap().contains('T'));
        assert_eq!(json["correlation"]["total_pairs"], 1);
        assert_eq!(json["entities"][0]["display_name"], "A");
    }

    #[test]
    fn test_duplicate_keys_keep_first_occurrence() {
        let cat = catalog();
        let records = vec![
            ScoreRecord::new("A").with("moat", 1.0).with("risk", 2.0),
            ScoreRecord::new("A").with("moat", 9.0).with("risk", 9.0),
            ScoreRecord::new("B").with("moat", 5.0).with("risk", 1.0),
        ];
        let report = run_batch(
            &cat,
            &records,
            &EntityDirectory::default(),
            &BatchOptions::default(),
            &NoProgress,
            &CancelFlag::new(),
        );

        assert_eq!(report.aggregates.len(), 2, "one aggregate per entity");
        assert_eq!(report.correlation.entities, 2);
        assert_eq!(report.entities.len(), 2);
        assert_eq!(report.summary.map(|s| s.count), Some(2));

        // B: 50 + 90 = 140, A (first row): 10 + 80 = 90
        assert_eq!(report.aggregates[0].entity_key, "B");
        assert_eq!(report.aggregates[0].percentile, Some(100));
        assert_eq!(report.aggregates[1].entity_key, "A");
        assert!((report.aggregates[1].total - 90.0).abs() < 1e-9);
        assert_eq!(report.aggregates[1].percentile, Some(50));
    }

    // ── Population properties over the default catalog ──

    /// Deterministic population. Some values arrive as text, some are missing.
    fn default_population(n: usize) -> Vec<ScoreRecord> {
        let catalog = MetricCatalog::default();
        (0..n)
            .map(|i| {
                let mut rec = ScoreRecord::new(format!("CO{i:02}"));
                for (k, def) in catalog.iter().enumerate() {
                    if (i + k) % 7 == 0 {
                        continue;
                    }
                    let v = ((i * 7 + k * 3) % 11) as f64;
                    rec = if (i + k) % 5 == 0 {
                        rec.with(&def.key, format!("{v}").as_str())
                    } else {
                        rec.with(&def.key, v)
                    };
                }
                rec
            })
            .collect()
    }

    #[test]
    fn test_aggregate_is_linear_per_metric() {
        let catalog = MetricCatalog::default();
        let agg = ScoreAggregator::new(&catalog);
        let base = default_population(1).remove(0);

        for def in catalog.iter() {
            let mut bumped = base.metrics.clone();
            let before = bumped.get(&def.key).and_then(RawValue::coerce).unwrap_or(0.0);
            bumped.insert(def.key.clone(), RawValue::Number(before + 1.5));

            let delta = agg.aggregate(&bumped) - agg.aggregate(&base.metrics);
            let expected = if def.reverse { -1.5 * def.weight } else { 1.5 * def.weight };
            assert!(
                (delta - expected).abs() < 1e-9,
                "metric {} moved total by {delta}, expected {expected}",
                def.key
            );
        }
    }

    #[test]
    fn test_empty_scores_equal_reverse_baseline() {
        let catalog = MetricCatalog::default();
        let expected: f64 = catalog.iter().filter(|d| d.reverse).map(|d| 10.0 * d.weight).sum();
        let got = ScoreAggregator::new(&catalog).aggregate(&HashMap::new());
        assert!((got - expected).abs() < 1e-9, "{got} vs {expected}");
    }

    #[test]
    fn test_population_maximum_ranks_100() {
        let catalog = MetricCatalog::default();
        let agg = ScoreAggregator::new(&catalog);
        let totals: Vec<f64> = default_population(20).iter().map(|r| agg.aggregate(&r.metrics)).collect();
        let max = totals.iter().cloned().fold(f64::MIN, f64::max);
        assert_eq!(crate::scoring::percentile_of(max, &totals), Some(100));
    }

    #[test]
    fn test_compute_all_is_deterministic() {
        use crate::correlation::correlations_for;

        let catalog = MetricCatalog::default();
        let recs = default_population(40);
        let first = CorrelationEngine::new(&catalog, EngineConfig { chunk_size: 7, ..Default::default() })
            .compute_all(&recs);
        let second =
            CorrelationEngine::new(&catalog, EngineConfig { chunk_size: 300, ..Default::default() })
                .compute_all(&recs);
        assert_eq!(first, second);

        let mut reversed = recs.clone();
        reversed.reverse();
        let third = CorrelationEngine::new(&catalog, EngineConfig::default()).compute_all(&reversed);
        assert_eq!(first, third);

        let neighbors = correlations_for(&first, "CO10");
        assert_eq!(neighbors.len(), 39);
        assert!(neighbors
            .windows(2)
            .all(|w| w[0].coefficient.abs() >= w[1].coefficient.abs()));
    }

    #[test]
    fn test_snapshot_end_to_end_default_catalog() {
        let json = r#"{
            "scores": {
                "MSFT": {"moat_score": 9, "riskiness_score": 2},
                "ko": {"moat_score": "8", "riskiness_score": 1},
                "Exxon Mobil Corp": {"moat_score": 6, "riskiness_score": "n/a"}
            },
            "listings": {
                "MSFT": "Microsoft Corp",
                "KO": "Coca-Cola Co",
                "XOM": "Exxon Mobil Corp"
            }
        }"#;
        let snapshot = PopulationSnapshot::from_json(json).unwrap();
        let report = run_snapshot(
            &MetricCatalog::default(),
            &snapshot,
            &BatchOptions::default(),
            &NoProgress,
            &CancelFlag::new(),
        )
        .unwrap();

        let mut keys: Vec<&str> = report.aggregates.iter().map(|a| a.entity_key.as_str()).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["KO", "MSFT", "XOM"]);
        assert!(report.aggregates.iter().all(|a| a.percentile.is_some()));
        // XOM has a single usable metric and cannot correlate
        assert_eq!(report.correlation.total_pairs, 3);
        assert_eq!(report.edges.len(), 1);
        assert_eq!(report.edges[0].entity_a, "KO");
        assert_eq!(report.edges[0].entity_b, "MSFT");
    }

    #[test]
    fn test_cancelled_batch_still_reports_aggregates() {
        let recs = default_population(15);
        let cancel = CancelFlag::new();
        cancel.cancel();
        let report = run_batch(
            &MetricCatalog::default(),
            &recs,
            &EntityDirectory::default(),
            &BatchOptions::default(),
            &NoProgress,
            &cancel,
        );
        assert_eq!(report.aggregates.len(), 15);
        assert!(report.edges.is_empty());
        assert!(report.most_negative.is_empty());
        assert!(report.correlation.cancelled);
    }
}
