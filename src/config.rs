use crate::errors::{ScoringError, ScoringResult};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub snapshot_path: PathBuf,
    pub output_path: PathBuf,
    pub metric_catalog_path: Option<PathBuf>,
    pub progress_interval: u64,
    pub correlation_chunk_size: usize,
    pub worker_threads: usize,
    pub override_bonus: i32,
    pub min_match_score: i32,
    pub top_correlations: usize,
}

impl AppConfig {
    pub fn from_env() -> ScoringResult<Self> {
        dotenvy::dotenv().ok();

        let progress_interval = env_var_or("PROGRESS_INTERVAL", "100")
            .parse::<u64>()
            .map_err(|e| ScoringError::Config(format!("PROGRESS_INTERVAL: {e}")))?;

        let correlation_chunk_size = env_var_or("CORRELATION_CHUNK_SIZE", "256")
            .parse::<usize>()
            .map_err(|e| ScoringError::Config(format!("CORRELATION_CHUNK_SIZE: {e}")))?;

        let worker_threads = env_var_or("WORKER_THREADS", "0")
            .parse::<usize>()
            .map_err(|e| ScoringError::Config(format!("WORKER_THREADS: {e}")))?;

        let override_bonus = env_var_or("OVERRIDE_BONUS", "10")
            .parse::<i32>()
            .map_err(|e| ScoringError::Config(format!("OVERRIDE_BONUS: {e}")))?;

        let min_match_score = env_var_or("MIN_MATCH_SCORE", "900")
            .parse::<i32>()
            .map_err(|e| ScoringError::Config(format!("MIN_MATCH_SCORE: {e}")))?;

        let top_correlations = env_var_or("TOP_CORRELATIONS", "100")
            .parse::<usize>()
            .map_err(|e| ScoringError::Config(format!("TOP_CORRELATIONS: {e}")))?;

        if progress_interval == 0 {
            return Err(ScoringError::Config("PROGRESS_INTERVAL must be > 0".into()));
        }
        if correlation_chunk_size == 0 {
            return Err(ScoringError::Config("CORRELATION_CHUNK_SIZE must be > 0".into()));
        }

        Ok(Self {
            snapshot_path: PathBuf::from(env_var("SNAPSHOT_PATH")?),
            output_path: PathBuf::from(env_var_or("OUTPUT_PATH", "data/batch_results.json")),
            metric_catalog_path: std::env::var("METRIC_CATALOG_PATH").ok().map(PathBuf::from),
            progress_interval,
            correlation_chunk_size,
            worker_threads,
            override_bonus,
            min_match_score,
            top_correlations,
        })
    }
}

fn env_var(key: &str) -> ScoringResult<String> {
    std::env::var(key).map_err(|_| ScoringError::Config(format!("missing env var: {key}")))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
