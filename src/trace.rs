//! Chrome Tracing collector for scheduler visualization.
//!
//! Records fiber resumes and idle parks into thread-local buffers with no
//! cross-thread contention on the hot path. Buffers are folded into a
//! global list when each worker exits and can be exported as a JSON file
//! loadable in chrome://tracing or ui.perfetto.dev.
//!
//! Recording is off by default; flip it on with [`set_enabled`] before
//! starting the pool.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A single span in Chrome Tracing's Complete-event format.
#[derive(Debug, Clone)]
pub struct TraceEvent {
    pub name: &'static str,
    pub worker: usize,
    pub start_us: u64,
    pub duration_us: u64,
}

static ENABLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static TRACE_BUFFER: RefCell<Vec<TraceEvent>> = RefCell::new(Vec::new());
}

lazy_static::lazy_static! {
    static ref GLOBAL_START: Instant = Instant::now();
    static ref EPOCH_START_US: u64 = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_micros() as u64;
    static ref COLLECTED: Mutex<Vec<Vec<TraceEvent>>> = Mutex::new(Vec::new());
}

/// Turns span recording on or off globally.
pub fn set_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::SeqCst);
}

pub fn is_enabled() -> bool {
    ENABLED.load(Ordering::SeqCst)
}

/// Records one completed span into the current thread's buffer.
pub fn record_event(name: &'static str, worker: usize, start: Instant, end: Instant) {
    let start_us = (start.duration_since(*GLOBAL_START).as_micros() as u64) + *EPOCH_START_US;
    let duration_us = end.duration_since(start).as_micros() as u64;

    TRACE_BUFFER.with(|buf| {
        buf.borrow_mut().push(TraceEvent {
            name,
            worker,
            start_us,
            duration_us,
        });
    });
}

/// Folds the current thread's buffer into the global list. Each worker
/// calls this when it exits.
pub fn collect_local_trace() {
    TRACE_BUFFER.with(|buf| {
        let mut local = buf.borrow_mut();
        if !local.is_empty() {
            COLLECTED.lock().unwrap().push(std::mem::take(&mut *local));
        }
    });
}

/// Writes all collected spans as a chrome://tracing JSON array.
pub fn export_to_file(path: &str) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let buffers = COLLECTED.lock().unwrap();

    writeln!(writer, "[")?;
    let mut first = true;
    for buffer in buffers.iter() {
        for event in buffer {
            if !first {
                writeln!(writer, ",")?;
            }
            first = false;
            write!(
                writer,
                "{{\"name\":\"{}\",\"ph\":\"X\",\"ts\":{},\"dur\":{},\"pid\":1,\"tid\":{}}}",
                event.name, event.start_us, event.duration_us, event.worker
            )?;
        }
    }
    writeln!(writer, "\n]")?;
    writer.flush()
}

/// RAII span: records from construction to drop when tracing is enabled.
pub struct TraceGuard {
    name: &'static str,
    worker: usize,
    start: Option<Instant>,
}

impl TraceGuard {
    pub fn new(name: &'static str, worker: usize) -> Self {
        TraceGuard {
            name,
            worker,
            start: is_enabled().then(Instant::now),
        }
    }
}

impl Drop for TraceGuard {
    fn drop(&mut self) {
        if let Some(start) = self.start {
            record_event(self.name, self.worker, start, Instant::now());
        }
    }
}
