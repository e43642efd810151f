//! Job descriptors: the unit of work that travels through the pool.
//!
//! A job owns the user closure and a clone of the completion handle the
//! submitter got back. Ownership moves submitter → queue → fiber; the
//! descriptor is dropped by the fiber after the closure returns and the
//! handle is signaled.

use crate::handle::JobHandle;

pub struct Job {
    /// The user closure. An `Option` so the running fiber can move it out
    /// while the descriptor itself stays bound until completion.
    pub(crate) work: Option<Box<dyn FnOnce() + Send + 'static>>,
    pub(crate) handle: JobHandle,
}

impl Job {
    pub(crate) fn new<F>(work: F, handle: JobHandle) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Job {
            work: Some(Box::new(work)),
            handle,
        }
    }
}
