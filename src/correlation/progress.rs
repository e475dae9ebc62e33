use portable_atomic::{AtomicBool, AtomicU64, Ordering};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Point-in-time progress of a pairwise run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Progress {
    pub completed: u64,
    pub total: u64,
    pub elapsed_secs: f64,
    /// Pairs per second since the run started.
    pub rate: f64,
    /// Seconds remaining at the current rate. `None` until a rate exists.
    pub eta_secs: Option<f64>,
}

impl Progress {
    pub fn percent(&self) -> u64 {
        if self.total == 0 {
            100
        } else {
            self.completed * 100 / self.total
        }
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// Receives progress reports. Called from worker threads.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &Progress);
}

/// Discards reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: &Progress) {}
}

/// Structured log line per report.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, p: &Progress) {
        tracing::info!(
            completed = p.completed,
            total = p.total,
            percent = p.percent(),
            rate = format_args!("{:.1}", p.rate),
            eta_secs = p.eta_secs.map(|s| s.round() as u64),
            "correlation progress"
        );
    }
}

/// Wraps a closure as a sink.
pub struct Callback<F>(pub F);

impl<F> ProgressSink for Callback<F>
where
    F: Fn(&Progress) + Send + Sync,
{
    fn report(&self, progress: &Progress) {
        (self.0)(progress)
    }
}

/// Forward reports to an async consumer. A closed receiver is ignored.
impl ProgressSink for tokio::sync::mpsc::UnboundedSender<Progress> {
    fn report(&self, progress: &Progress) {
        let _ = self.send(*progress);
    }
}

/// Cooperative stop signal. Once set, no new work units start.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Shared pair counter. Reports every `interval` completed pairs.
pub(crate) struct ProgressTracker<'a> {
    completed: AtomicU64,
    total: u64,
    interval: u64,
    started: Instant,
    sink: &'a dyn ProgressSink,
}

impl<'a> ProgressTracker<'a> {
    pub(crate) fn new(total: u64, interval: u64, sink: &'a dyn ProgressSink) -> Self {
        Self {
            completed: AtomicU64::new(0),
            total,
            interval: interval.max(1),
            started: Instant::now(),
            sink,
        }
    }

    /// Count one finished pair.
    #[inline]
    pub(crate) fn tick(&self) {
        let done = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.interval == 0 {
            self.sink.report(&self.snapshot_at(done));
        }
    }

    pub(crate) fn completed(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }

    pub(crate) fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Closing report, unless the last tick already produced one.
    pub(crate) fn finish(&self) -> Progress {
        let done = self.completed();
        let snap = self.snapshot_at(done);
        if done == 0 || done % self.interval != 0 {
            self.sink.report(&snap);
        }
        snap
    }

    fn snapshot_at(&self, completed: u64) -> Progress {
        let elapsed_secs = self.elapsed_secs();
        let rate = if elapsed_secs > 0.0 {
            completed as f64 / elapsed_secs
        } else {
            0.0
        };
        let eta_secs = (rate > 0.0).then(|| self.total.saturating_sub(completed) as f64 / rate);
        Progress {
            completed,
            total: self.total,
            elapsed_secs,
            rate,
            eta_secs,
        }
    }
}
