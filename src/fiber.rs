//! Fiber objects: one user-space stack plus one saved register frame.
//!
//! A fiber is either *idle* (no task descriptor bound) or *bound*. Binding
//! a task re-primes the stack so that the next switch into the fiber enters
//! [`fiber_entry`], which runs the user closure, signals its handle, and
//! hands the CPU back to the worker's main coroutine.

use crate::arch::Frame;
use crate::job::Job;
use crate::sched;
use std::panic::{self, AssertUnwindSafe};

/// A stackful coroutine owned by a single worker thread.
///
/// The stack is a heap buffer, so its address survives moves of the `Fiber`
/// struct itself; the struct must still stay put between [`Fiber::bind`]
/// and task completion because the primed frame carries its address into
/// the trampoline. Workers keep fibers boxed in a ring built once at
/// startup, which pins them for the whole worker lifetime.
pub struct Fiber {
    frame: Frame,
    stack: Box<[u8]>,
    task: Option<Job>,
}

impl Fiber {
    pub(crate) fn new(stack_size: usize) -> Self {
        Fiber {
            frame: Frame::zeroed(),
            stack: vec![0u8; stack_size].into_boxed_slice(),
            task: None,
        }
    }

    /// True iff a task descriptor is currently bound.
    pub fn has_task(&self) -> bool {
        self.task.is_some()
    }

    /// Binds a task descriptor and primes the stack for [`fiber_entry`].
    pub(crate) fn bind(&mut self, job: Job) {
        self.task = Some(job);
        // SAFETY: one-past-the-end of the owned stack buffer.
        let top = unsafe { self.stack.as_mut_ptr().add(self.stack.len()) };
        let this = self as *mut Fiber as usize;
        self.frame
            .init(top, fiber_entry as extern "C" fn(*mut Fiber) as usize, this);
    }

    pub(crate) fn frame_ptr(&mut self) -> *mut Frame {
        &mut self.frame
    }
}

/// First-entry trampoline for a bound fiber.
///
/// Entered through the primed frame with the fiber pointer in the first
/// argument register. The task stays bound while the closure runs (the
/// scheduler resumes the fiber through its `has_task` flag whenever the
/// closure yields) and is released only after the handle is signaled. The
/// function never returns through the normal mechanism; it leaves by
/// switching back to the main coroutine.
extern "C" fn fiber_entry(fiber: *mut Fiber) {
    // SAFETY: the worker primed this frame with the address of a fiber that
    // is boxed in its ring and stays in place until the task completes.
    let fiber = unsafe { &mut *fiber };

    let work = fiber.task.as_mut().and_then(|job| job.work.take());
    let panicked = match work {
        Some(work) => panic::catch_unwind(AssertUnwindSafe(work)).is_err(),
        None => false,
    };

    if let Some(job) = fiber.task.take() {
        job.handle.set_finished(panicked);
    }
    sched::task_finished();

    // The scheduler only resumes fibers that hold a task; once unbound this
    // fiber must keep handing the CPU back even if a stray resume lands
    // here.
    loop {
        sched::switch_to_main(fiber);
    }
}
