//! # coropool - Multi-Threaded Stackful Coroutine Pool
//!
//! A work-dispatch runtime in which each worker thread hosts a fixed ring
//! of stackful coroutines (fibers) that cooperatively yield to each other
//! while executing user-submitted tasks. Submitters get back a completion
//! handle that can be awaited with a timeout.
//!
//! ## Architecture
//!
//! - **Fibers**: stackful coroutines, one heap stack and one saved
//!   register frame each, bound to at most one task at a time
//! - **Context switch**: a hand-written register save/restore behind the
//!   [`arch`] abstraction (x86-64 System V and aarch64)
//! - **Job queue**: a bounded ring shared by all workers, coordinated by
//!   per-slot compare-and-swap with bounded retry
//! - **Workers**: OS threads whose main coroutine round-robins over its
//!   fiber ring; no work stealing, no preemption
//!
//! Scheduling is cooperative: a task keeps its fiber until it returns or
//! calls [`yield_now`]. Stopping the pool drains it first; every job
//! accepted before the stop is finished before `stop` returns.
//!
//! ## Example
//!
//! ```no_run
//! use coropool::CoroutinePool;
//!
//! let pool = CoroutinePool::new(2, 8);
//! pool.run();
//!
//! let handle = pool
//!     .submit(|| {
//!         println!("hello from a fiber");
//!         coropool::yield_now();
//!         println!("resumed");
//!     })
//!     .expect("job queue full");
//!
//! handle.wait();
//! pool.stop();
//! ```

pub mod arch;
pub mod fiber;
pub mod handle;
pub mod job;
pub mod metrics;
pub mod pool;
pub mod queue;
pub mod sched;
pub mod trace;
pub mod worker;

pub use handle::JobHandle;
pub use pool::{CoroutinePool, PoolConfig};
pub use sched::yield_now;
