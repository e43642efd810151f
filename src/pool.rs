//! The pool facade: construction, lifecycle, and submission.

use crate::handle::JobHandle;
use crate::job::Job;
use crate::queue::SyncArrayQueue;
use crate::worker::{Worker, WorkerParams};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

#[cfg(feature = "metrics")]
use crate::metrics::Metrics;

/// Default job-queue capacity.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1_024_000;

/// Default fiber stack size: a 4 KiB library reserve on top of 64 KiB of
/// user stack.
pub const DEFAULT_STACK_SIZE: usize = 4 * 1024 + 64 * 1024;

/// Construction parameters for a [`CoroutinePool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of worker threads. Clamped to at least 1.
    pub worker_threads: usize,
    /// Fibers hosted by each worker. Clamped to at least 1.
    pub fibers_per_worker: usize,
    /// Capacity of the shared job queue (one slot always stays empty).
    /// Clamped to at least 1.
    pub queue_capacity: usize,
    /// Stack size per fiber, in bytes; values below one page are raised to
    /// 4096. There are no guard pages, so tasks that overflow their stack
    /// corrupt the fiber; tasks that may panic with deep formatting need a
    /// larger value here.
    pub stack_size: usize,
    /// Microseconds slept between contended queue attempts.
    pub queue_sleep_us: u64,
    /// Extra attempts after a contended queue CAS before giving up.
    pub queue_retry_times: u32,
    /// Pin worker `i` to core `i mod cores`.
    pub pin_workers: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            worker_threads: 1,
            fibers_per_worker: 1,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            stack_size: DEFAULT_STACK_SIZE,
            queue_sleep_us: 100,
            queue_retry_times: 3,
            pin_workers: false,
        }
    }
}

impl PoolConfig {
    fn clamped(mut self) -> Self {
        self.worker_threads = self.worker_threads.max(1);
        self.fibers_per_worker = self.fibers_per_worker.max(1);
        self.queue_capacity = self.queue_capacity.max(1);
        self.stack_size = self.stack_size.max(4096);
        self
    }
}

/// State shared between the pool facade and its workers.
pub(crate) struct PoolShared {
    started: AtomicBool,
    pub(crate) queue: SyncArrayQueue<Job>,
    pub(crate) park_lock: Mutex<()>,
    pub(crate) park_cond: Condvar,
    pub(crate) fibers_per_worker: usize,
    pub(crate) stack_size: usize,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Metrics,
}

impl PoolShared {
    pub(crate) fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }
}

/// A multi-threaded pool of stackful coroutines.
///
/// Worker threads each host a fixed ring of fibers and pull jobs from a
/// shared bounded queue. Tasks run until they return or call
/// [`yield_now`](crate::yield_now); [`stop`](CoroutinePool::stop) waits for
/// every previously accepted job to finish before returning.
///
/// Submitting concurrently with `stop` or with the pool going out of scope
/// is not supported: such a job may be rejected, or accepted and never
/// run (its descriptor is freed with the queue, its handle never
/// finishes).
pub struct CoroutinePool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<Worker>>,
    config: PoolConfig,
}

impl CoroutinePool {
    /// Creates a pool with the given worker and per-worker fiber counts
    /// and default queue capacity. No threads start until
    /// [`run`](CoroutinePool::run).
    pub fn new(worker_threads: usize, fibers_per_worker: usize) -> Self {
        CoroutinePool::with_config(PoolConfig {
            worker_threads,
            fibers_per_worker,
            ..PoolConfig::default()
        })
    }

    pub fn with_config(config: PoolConfig) -> Self {
        let config = config.clamped();
        let shared = Arc::new(PoolShared {
            started: AtomicBool::new(false),
            queue: SyncArrayQueue::new(
                config.queue_capacity,
                config.queue_sleep_us,
                config.queue_retry_times,
            ),
            park_lock: Mutex::new(()),
            park_cond: Condvar::new(),
            fibers_per_worker: config.fibers_per_worker,
            stack_size: config.stack_size,
            #[cfg(feature = "metrics")]
            metrics: Metrics::new(),
        });
        CoroutinePool {
            shared,
            workers: Mutex::new(Vec::new()),
            config,
        }
    }

    /// Starts the worker threads. Returns `false` if the pool is already
    /// running. A stopped pool can be started again.
    pub fn run(&self) -> bool {
        let mut workers = self.workers.lock().unwrap();
        if self
            .shared
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        let core_ids = if self.config.pin_workers {
            core_affinity::get_core_ids().unwrap_or_default()
        } else {
            Vec::new()
        };

        for id in 0..self.config.worker_threads {
            let core_id = if core_ids.is_empty() {
                None
            } else {
                Some(core_ids[id % core_ids.len()])
            };
            workers.push(Worker::new(WorkerParams {
                id,
                shared: Arc::clone(&self.shared),
                core_id,
            }));
        }
        true
    }

    /// Stops the pool, waiting for all previously accepted jobs to finish.
    /// Idempotent; a no-op if the pool is not running.
    pub fn stop(&self) {
        let mut workers = self.workers.lock().unwrap();
        if self
            .shared
            .started
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        {
            let _guard = self.shared.park_lock.lock().unwrap();
            self.shared.park_cond.notify_all();
        }

        for worker in workers.drain(..) {
            let id = worker.id();
            if worker.join().is_err() {
                eprintln!("worker {} panicked during execution", id);
            }
        }
    }

    /// Submits a unit of work. Returns `None` when the job queue is full;
    /// the caller may retry.
    pub fn submit<F>(&self, work: F) -> Option<JobHandle>
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = JobHandle::new();
        let job = Box::new(Job::new(work, handle.clone()));

        if self.shared.queue.push(job).is_err() {
            #[cfg(feature = "metrics")]
            self.shared
                .metrics
                .submissions_rejected
                .fetch_add(1, Ordering::Relaxed);
            return None;
        }

        #[cfg(feature = "metrics")]
        self.shared
            .metrics
            .tasks_submitted
            .fetch_add(1, Ordering::Relaxed);

        // Notify under the park lock so an idle worker between its failed
        // pop and its wait cannot miss this job.
        let _guard = self.shared.park_lock.lock().unwrap();
        self.shared.park_cond.notify_all();
        Some(handle)
    }

    /// Number of worker threads the pool was configured with.
    pub fn worker_threads(&self) -> usize {
        self.config.worker_threads
    }

    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> &Metrics {
        &self.shared.metrics
    }
}

impl Drop for CoroutinePool {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = PoolConfig::default();
        assert_eq!(config.queue_capacity, DEFAULT_QUEUE_CAPACITY);
        assert_eq!(config.stack_size, 4 * 1024 + 64 * 1024);
        assert_eq!(config.queue_sleep_us, 100);
        assert_eq!(config.queue_retry_times, 3);
        assert!(!config.pin_workers);
    }

    #[test]
    fn test_counts_clamped_to_one() {
        let pool = CoroutinePool::with_config(PoolConfig {
            worker_threads: 0,
            fibers_per_worker: 0,
            queue_capacity: 0,
            ..PoolConfig::default()
        });
        assert_eq!(pool.worker_threads(), 1);
        assert_eq!(pool.shared.fibers_per_worker, 1);
        assert_eq!(pool.shared.queue.capacity(), 1);
    }

    #[test]
    fn test_run_is_not_reentrant() {
        let pool = CoroutinePool::new(1, 1);
        assert!(pool.run());
        assert!(!pool.run());
        pool.stop();
    }

    #[test]
    fn test_stop_without_run_is_noop() {
        let pool = CoroutinePool::new(1, 1);
        pool.stop();
        pool.stop();
    }
}
