#[cfg(feature = "metrics")]
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "metrics")]
use std::time::Instant;

/// Optional scheduler counters, enabled with the `metrics` feature.
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct Metrics {
    /// Jobs accepted by the queue.
    pub tasks_submitted: AtomicU64,
    /// Jobs rejected because the queue was full.
    pub submissions_rejected: AtomicU64,
    /// Jobs that ran to completion (including panicked ones).
    pub tasks_completed: AtomicU64,
    /// Switches from a main coroutine into a fiber.
    pub fiber_resumes: AtomicU64,
    /// Times a worker parked on the pool condition variable.
    pub idle_parks: AtomicU64,
    /// When metrics collection started.
    pub start_time: Instant,
}

#[cfg(feature = "metrics")]
impl Metrics {
    pub fn new() -> Self {
        Metrics {
            tasks_submitted: AtomicU64::new(0),
            submissions_rejected: AtomicU64::new(0),
            tasks_completed: AtomicU64::new(0),
            fiber_resumes: AtomicU64::new(0),
            idle_parks: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Returns a point-in-time copy of all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            submissions_rejected: self.submissions_rejected.load(Ordering::Relaxed),
            tasks_completed: self.tasks_completed.load(Ordering::Relaxed),
            fiber_resumes: self.fiber_resumes.load(Ordering::Relaxed),
            idle_parks: self.idle_parks.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

#[cfg(feature = "metrics")]
impl Default for Metrics {
    fn default() -> Self {
        Metrics::new()
    }
}

/// Snapshot of [`Metrics`] at a point in time.
#[cfg(feature = "metrics")]
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub tasks_submitted: u64,
    pub submissions_rejected: u64,
    pub tasks_completed: u64,
    pub fiber_resumes: u64,
    pub idle_parks: u64,
    pub elapsed_seconds: f64,
}

#[cfg(feature = "metrics")]
impl MetricsSnapshot {
    /// Completed tasks per second since pool construction.
    pub fn tasks_per_second(&self) -> f64 {
        if self.elapsed_seconds > 0.0 {
            self.tasks_completed as f64 / self.elapsed_seconds
        } else {
            0.0
        }
    }

    /// Approximate number of accepted jobs not yet completed.
    pub fn tasks_pending(&self) -> i64 {
        self.tasks_submitted as i64 - self.tasks_completed as i64
    }
}
