pub mod aggregate;
pub mod calibration;
pub mod catalog;
pub mod percentile;

pub use aggregate::ScoreAggregator;
pub use calibration::{zero_correlation_weight, Calibration, CalibrationParams};
pub use catalog::MetricCatalog;
pub use percentile::{percentile_of, rank_population, PopulationSummary};
