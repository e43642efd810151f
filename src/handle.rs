//! Completion handles: single-shot wait-notify objects, one per submitted
//! job.
//!
//! The submitter keeps one clone, the job descriptor carries another; the
//! state survives until both sides release it. `finished` transitions
//! false → true exactly once, set by the fiber that ran the task.

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

#[derive(Default)]
struct HandleState {
    finished: bool,
    panicked: bool,
}

struct HandleInner {
    state: Mutex<HandleState>,
    cond: Condvar,
}

/// Cloneable handle to one submitted job's completion state.
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<HandleInner>,
}

impl JobHandle {
    pub(crate) fn new() -> Self {
        JobHandle {
            inner: Arc::new(HandleInner {
                state: Mutex::new(HandleState::default()),
                cond: Condvar::new(),
            }),
        }
    }

    /// Marks the job finished and wakes all waiters.
    ///
    /// The first call wins; later calls only re-notify, which is harmless.
    pub(crate) fn set_finished(&self, panicked: bool) {
        {
            let mut state = self.inner.state.lock().unwrap();
            if !state.finished {
                state.finished = true;
                state.panicked = panicked;
            }
        }
        self.inner.cond.notify_all();
    }

    /// Blocks until the job has finished.
    pub fn wait(&self) {
        let mut state = self.inner.state.lock().unwrap();
        while !state.finished {
            state = self.inner.cond.wait(state).unwrap();
        }
    }

    /// Blocks until the job finishes or `timeout` elapses. Returns `true`
    /// iff the job finished in time.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let state = self.inner.state.lock().unwrap();
        if state.finished {
            return true;
        }
        let (state, _timed_out) = self
            .inner
            .cond
            .wait_timeout_while(state, timeout, |s| !s.finished)
            .unwrap();
        state.finished
    }

    pub fn is_finished(&self) -> bool {
        self.inner.state.lock().unwrap().finished
    }

    /// True iff the task unwound with a panic. Implies [`is_finished`]:
    /// the pool catches the unwind at the fiber boundary and still signals
    /// the handle, so waiters never hang on a panicking task.
    ///
    /// [`is_finished`]: JobHandle::is_finished
    pub fn panicked(&self) -> bool {
        self.inner.state.lock().unwrap().panicked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fresh_handle_is_unfinished() {
        let handle = JobHandle::new();
        assert!(!handle.is_finished());
        assert!(!handle.panicked());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let handle = JobHandle::new();
        assert!(!handle.wait_timeout(Duration::from_millis(20)));
    }

    #[test]
    fn test_set_finished_wakes_waiter() {
        let handle = JobHandle::new();
        let waiter = handle.clone();
        let t = thread::spawn(move || {
            waiter.wait();
            assert!(waiter.is_finished());
        });
        thread::sleep(Duration::from_millis(10));
        handle.set_finished(false);
        t.join().unwrap();
    }

    #[test]
    fn test_wait_timeout_observes_finish() {
        let handle = JobHandle::new();
        let setter = handle.clone();
        let t = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            setter.set_finished(false);
        });
        assert!(handle.wait_timeout(Duration::from_secs(5)));
        t.join().unwrap();
    }

    #[test]
    fn test_set_finished_is_single_shot() {
        let handle = JobHandle::new();
        handle.set_finished(true);
        // The losing call must not overwrite the recorded outcome.
        handle.set_finished(false);
        assert!(handle.is_finished());
        assert!(handle.panicked());
    }
}
