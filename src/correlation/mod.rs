pub mod engine;
pub mod pearson;
pub mod progress;
pub mod query;

pub use engine::{CorrelationEngine, CorrelationRun, CorrelationStats, EngineConfig};
pub use pearson::{pair_coefficient, pearson, MIN_SHARED_METRICS};
pub use progress::{Callback, CancelFlag, LogProgress, NoProgress, Progress, ProgressSink};
pub use query::{correlations_for, most_negative, strongest, Neighbor};
