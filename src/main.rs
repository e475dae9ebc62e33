use company_scorer::batch::{run_snapshot, BatchOptions, BatchReport, PopulationSnapshot};
use company_scorer::config::AppConfig;
use company_scorer::correlation::{CancelFlag, EngineConfig, LogProgress, Progress, ProgressSink};
use company_scorer::errors::{ScoringError, ScoringResult};
use company_scorer::resolve::ResolverConfig;
use company_scorer::scoring::MetricCatalog;
use std::path::Path;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("company_scorer batch starting");

    let cfg = match AppConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cfg).await {
        tracing::error!(error = %e, "batch failed");
        std::process::exit(1);
    }
}

async fn run(cfg: AppConfig) -> ScoringResult<()> {
    let catalog = match &cfg.metric_catalog_path {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path)
                .await
                .map_err(|e| ScoringError::Io(format!("{}: {e}", path.display())))?;
            MetricCatalog::from_json(&raw)?
        }
        None => MetricCatalog::default(),
    };
    tracing::info!(
        metrics = catalog.len(),
        max_score = catalog.max_score(),
        "metric catalog loaded"
    );

    let snapshot = PopulationSnapshot::load(&cfg.snapshot_path)?;
    tracing::info!(
        path = %cfg.snapshot_path.display(),
        entries = snapshot.scores.len(),
        listings = snapshot.listings.len(),
        overrides = snapshot.overrides.len(),
        "snapshot loaded"
    );

    // ── Cancellation ──
    let cancel = CancelFlag::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing in-flight chunks");
            on_interrupt.cancel();
        }
    });

    // ── Progress: workers send, this task logs ──
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<Progress>();
    let progress_task = tokio::spawn(async move {
        while let Some(p) = progress_rx.recv().await {
            LogProgress.report(&p);
        }
    });

    let options = BatchOptions {
        engine: EngineConfig {
            progress_interval: cfg.progress_interval,
            chunk_size: cfg.correlation_chunk_size,
            worker_threads: cfg.worker_threads,
        },
        resolver: ResolverConfig {
            override_bonus: cfg.override_bonus,
        },
        min_match_score: cfg.min_match_score,
        top_correlations: cfg.top_correlations,
    };

    // Sender moves into the blocking task; dropping it there ends the progress task.
    let report = tokio::task::spawn_blocking(move || {
        run_snapshot(&catalog, &snapshot, &options, &progress_tx, &cancel)
    })
    .await
    .map_err(|e| ScoringError::Task(e.to_string()))??;

    let _ = progress_task.await;

    log_report(&report);
    write_report(&cfg.output_path, &report).await?;
    tracing::info!(path = %cfg.output_path.display(), "results written");
    Ok(())
}

fn log_report(report: &BatchReport) {
    let stats = &report.correlation;
    tracing::info!(
        run_id = %report.run_id,
        entities = report.entities.len(),
        edges = stats.edges_emitted,
        pairs = stats.pairs_evaluated,
        total_pairs = stats.total_pairs,
        cancelled = stats.cancelled,
        "batch complete"
    );

    for agg in report.aggregates.iter().take(10) {
        tracing::info!(
            entity = %agg.entity_key,
            total = format_args!("{:.1}", agg.total),
            percentage = format_args!("{:.1}", agg.percentage),
            percentile = agg.percentile,
            "top score"
        );
    }
    for edge in report.strongest.iter().take(10) {
        tracing::info!(
            a = %edge.entity_a,
            b = %edge.entity_b,
            r = format_args!("{:.4}", edge.coefficient),
            shared = edge.sample_size,
            "strong correlation"
        );
    }
    for edge in report.most_negative.iter().take(10) {
        tracing::info!(
            a = %edge.entity_a,
            b = %edge.entity_b,
            r = format_args!("{:.4}", edge.coefficient),
            shared = edge.sample_size,
            "negative correlation"
        );
    }
}

async fn write_report(path: &Path, report: &BatchReport) -> ScoringResult<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let json = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
