//! Per-thread scheduler state: the main coroutine, the fiber ring, the
//! round-robin cursor, and the in-flight count.
//!
//! The context is intrinsically thread-local; it is created when a worker
//! thread starts and torn down when it exits. [`yield_now`] is the only
//! entry point that touches it from user code, and it degrades to a
//! `false` no-op on threads that have no context.

use crate::arch;
use crate::fiber::Fiber;
use std::cell::RefCell;

pub(crate) struct SchedCtx {
    pub(crate) main: Box<Fiber>,
    pub(crate) fibers: Vec<Box<Fiber>>,
    pub(crate) cursor: usize,
    pub(crate) in_flight: usize,
}

thread_local! {
    static SCHED: RefCell<Option<SchedCtx>> = const { RefCell::new(None) };
}

/// Installs a fresh scheduler context on the current thread.
///
/// The main coroutine needs no stack priming: its frame is populated by the
/// first switch out of it.
pub(crate) fn init_worker(fiber_count: usize, stack_size: usize) {
    SCHED.with(|s| {
        *s.borrow_mut() = Some(SchedCtx {
            main: Box::new(Fiber::new(stack_size)),
            fibers: (0..fiber_count)
                .map(|_| Box::new(Fiber::new(stack_size)))
                .collect(),
            cursor: 0,
            in_flight: 0,
        });
    });
}

pub(crate) fn teardown_worker() {
    SCHED.with(|s| {
        *s.borrow_mut() = None;
    });
}

/// Runs `f` against the current thread's scheduler context.
///
/// Worker-internal; panics on a thread that has none. Every borrow taken
/// here ends before control can reach a context switch.
pub(crate) fn with<R>(f: impl FnOnce(&mut SchedCtx) -> R) -> R {
    SCHED.with(|s| {
        let mut borrow = s.borrow_mut();
        let ctx = borrow
            .as_mut()
            .expect("scheduler context missing on worker thread");
        f(ctx)
    })
}

/// Rotates the round-robin cursor one fiber forward.
pub(crate) fn move_cursor() {
    with(|ctx| {
        ctx.cursor = if ctx.cursor == ctx.fibers.len() - 1 {
            0
        } else {
            ctx.cursor + 1
        };
    });
}

/// Marks one bound task as finished on this worker.
pub(crate) fn task_finished() {
    with(|ctx| ctx.in_flight -= 1);
}

/// Switches from `cur` back to this worker's main coroutine.
pub(crate) fn switch_to_main(cur: *mut Fiber) {
    let main = with(|ctx| ctx.main.as_mut() as *mut Fiber);
    // SAFETY: both fibers are boxed in the live scheduler context and the
    // RefCell borrow above has ended.
    unsafe { arch::switch((*cur).frame_ptr(), (*main).frame_ptr()) };
}

/// Cooperatively yields the currently executing fiber back to its worker's
/// scheduler. Returns `true` once the fiber is resumed.
///
/// On a thread that is not a pool worker (no scheduler context, or an empty
/// fiber ring) this is a no-op and returns `false`.
pub fn yield_now() -> bool {
    let ptrs = SCHED.with(|s| {
        let mut borrow = s.borrow_mut();
        let ctx = borrow.as_mut()?;
        if ctx.fibers.is_empty() {
            return None;
        }
        let cursor = ctx.cursor;
        let cur = ctx.fibers[cursor].as_mut() as *mut Fiber;
        let main = ctx.main.as_mut() as *mut Fiber;
        Some((cur, main))
    });
    match ptrs {
        Some((cur, main)) => {
            // SAFETY: worker fibers are boxed and pinned for the life of
            // the worker; the RefCell borrow ended before the switch.
            unsafe { arch::switch((*cur).frame_ptr(), (*main).frame_ptr()) };
            true
        }
        None => false,
    }
}
