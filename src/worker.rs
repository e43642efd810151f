//! Worker threads: one OS thread per worker, each hosting a main coroutine
//! and a fixed ring of fibers.
//!
//! The loop round-robins over the ring. A bound fiber at the cursor is
//! resumed; an idle fiber gets the next job from the shared queue; with
//! nothing to pop but work still in flight the cursor just rotates; with
//! nothing at all the worker parks on the pool condition variable. The
//! loop exits only once the pool is stopped, no fiber on this worker is
//! bound, and the shared queue is empty, which is what makes stop drain.

use crate::fiber::Fiber;
use crate::pool::PoolShared;
use crate::sched;
use crate::trace;
use core_affinity::CoreId;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;

/// A single worker thread of the pool.
pub struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

pub(crate) struct WorkerParams {
    pub(crate) id: usize,
    pub(crate) shared: Arc<PoolShared>,
    pub(crate) core_id: Option<CoreId>,
}

impl Worker {
    /// Spawns the worker thread and starts its scheduler loop.
    pub(crate) fn new(params: WorkerParams) -> Self {
        let id = params.id;
        let handle = thread::spawn(move || {
            if let Some(core_id) = params.core_id {
                core_affinity::set_for_current(core_id);
            }
            Worker::run_loop(params.id, params.shared);
        });

        Worker {
            id,
            handle: Some(handle),
        }
    }

    fn run_loop(id: usize, shared: Arc<PoolShared>) {
        sched::init_worker(shared.fibers_per_worker, shared.stack_size);

        loop {
            let in_flight = sched::with(|ctx| ctx.in_flight);
            if !shared.is_started() && in_flight == 0 && shared.queue.is_empty() {
                break;
            }

            if sched::with(|ctx| ctx.fibers[ctx.cursor].has_task()) {
                Worker::run_current_fiber(id, &shared);
                continue;
            }

            match shared.queue.pop() {
                Some(job) => {
                    sched::with(|ctx| {
                        let cursor = ctx.cursor;
                        ctx.fibers[cursor].bind(*job);
                        ctx.in_flight += 1;
                    });
                    Worker::run_current_fiber(id, &shared);
                }
                None if in_flight > 0 => sched::move_cursor(),
                None => {
                    #[cfg(feature = "metrics")]
                    shared.metrics.idle_parks.fetch_add(1, Ordering::Relaxed);
                    let _span = trace::TraceGuard::new("park", id);
                    // The emptiness and started checks repeat under the
                    // pool lock; submit and stop notify while holding it,
                    // so a job cannot slip in between the failed pop above
                    // and the wait.
                    let guard = shared.park_lock.lock().unwrap();
                    if shared.is_started() && shared.queue.is_empty() {
                        drop(shared.park_cond.wait(guard).unwrap());
                    }
                }
            }
        }

        trace::collect_local_trace();
        sched::teardown_worker();
    }

    /// Switches into the fiber at the cursor and rotates the cursor once
    /// the fiber hands the CPU back (yield or completion).
    fn run_current_fiber(id: usize, shared: &PoolShared) {
        {
            let _span = trace::TraceGuard::new("resume", id);
            let (main, cur) = sched::with(|ctx| {
                let cursor = ctx.cursor;
                (
                    ctx.main.as_mut() as *mut Fiber,
                    ctx.fibers[cursor].as_mut() as *mut Fiber,
                )
            });
            // SAFETY: both fibers are boxed in this thread's scheduler
            // context and pinned for the worker's lifetime; the RefCell
            // borrow ended before the switch.
            unsafe { crate::arch::switch((*main).frame_ptr(), (*cur).frame_ptr()) };
        }

        #[cfg(feature = "metrics")]
        {
            shared.metrics.fiber_resumes.fetch_add(1, Ordering::Relaxed);
            if !sched::with(|ctx| ctx.fibers[ctx.cursor].has_task()) {
                shared.metrics.tasks_completed.fetch_add(1, Ordering::Relaxed);
            }
        }
        #[cfg(not(feature = "metrics"))]
        let _ = shared;

        sched::move_cursor();
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Waits for the worker thread to finish.
    pub(crate) fn join(mut self) -> thread::Result<()> {
        match self.handle.take() {
            Some(handle) => handle.join(),
            None => Ok(()),
        }
    }
}
