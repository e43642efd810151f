//! Bounded multi-producer/multi-consumer ring of boxed items.
//!
//! A fixed array of cells where null means *empty*; producers and consumers
//! claim cells with a compare-and-swap and retry a bounded number of times
//! with a configured microsecond sleep between attempts. Two cursors chase
//! each other around the ring; they are advanced after a successful cell
//! transition, so the structure is not linearizable and does not promise
//! FIFO order under contention. It does promise that every pushed item is
//! eventually popped, that every pop returns a pushed item exactly once,
//! and that push and pop never block longer than their retry budget.

use crossbeam::utils::CachePadded;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

pub struct SyncArrayQueue<T> {
    cells: Box<[AtomicPtr<T>]>,
    push_cursor: CachePadded<AtomicUsize>,
    pop_cursor: CachePadded<AtomicUsize>,
    sleep_us: u64,
    retry_times: u32,
}

// SAFETY: items cross threads by pointer through the cells; the per-cell
// CAS hands each box to exactly one consumer.
unsafe impl<T: Send> Send for SyncArrayQueue<T> {}
unsafe impl<T: Send> Sync for SyncArrayQueue<T> {}

impl<T> SyncArrayQueue<T> {
    /// Creates a queue with `capacity` cells (raised to at least 1).
    ///
    /// One cell always stays empty to distinguish full from empty, so at
    /// most `capacity - 1` items reside in the queue at once.
    pub fn new(capacity: usize, sleep_us: u64, retry_times: u32) -> Self {
        let capacity = capacity.max(1);
        SyncArrayQueue {
            cells: (0..capacity)
                .map(|_| AtomicPtr::new(ptr::null_mut()))
                .collect(),
            push_cursor: CachePadded::new(AtomicUsize::new(0)),
            pop_cursor: CachePadded::new(AtomicUsize::new(0)),
            sleep_us,
            retry_times,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pop_cursor.load(Ordering::SeqCst) == self.push_cursor.load(Ordering::SeqCst)
    }

    pub fn is_full(&self) -> bool {
        let push = self.push_cursor.load(Ordering::SeqCst);
        self.next_cursor(push) == self.pop_cursor.load(Ordering::SeqCst)
    }

    fn next_cursor(&self, cursor: usize) -> usize {
        if cursor == self.cells.len() - 1 {
            0
        } else {
            cursor + 1
        }
    }

    /// Advances `cursor` from `seen` unless some other thread already did.
    ///
    /// The compare-exchange keeps a stalled thread from storing a stale
    /// value over a cursor that has since moved on, which could otherwise
    /// make a non-empty queue report empty while it drains.
    fn advance(&self, cursor: &AtomicUsize, seen: usize) {
        let _ = cursor.compare_exchange(
            seen,
            self.next_cursor(seen),
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Enqueues `item`, returning it back on a full queue or when the retry
    /// budget is exhausted by contention.
    pub fn push(&self, item: Box<T>) -> Result<(), Box<T>> {
        let raw = Box::into_raw(item);
        let mut retries = 0;
        loop {
            let push = self.push_cursor.load(Ordering::SeqCst);
            if self.next_cursor(push) == self.pop_cursor.load(Ordering::SeqCst) {
                // SAFETY: `raw` came from Box::into_raw above and was never
                // published.
                return Err(unsafe { Box::from_raw(raw) });
            }

            if self.cells[push]
                .compare_exchange(ptr::null_mut(), raw, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                self.advance(&self.push_cursor, push);
                return Ok(());
            }

            if retries == self.retry_times {
                // SAFETY: as above; the CAS failed, so the cell never took
                // ownership.
                return Err(unsafe { Box::from_raw(raw) });
            }
            retries += 1;
            thread::sleep(Duration::from_micros(self.sleep_us));
        }
    }

    /// Dequeues an item, or `None` when the queue is empty or the retry
    /// budget is exhausted by contention.
    pub fn pop(&self) -> Option<Box<T>> {
        let mut retries = 0;
        loop {
            let pop = self.pop_cursor.load(Ordering::SeqCst);
            if pop == self.push_cursor.load(Ordering::SeqCst) {
                return None;
            }

            let observed = self.cells[pop].load(Ordering::SeqCst);
            if !observed.is_null()
                && self.cells[pop]
                    .compare_exchange(
                        observed,
                        ptr::null_mut(),
                        Ordering::SeqCst,
                        Ordering::SeqCst,
                    )
                    .is_ok()
            {
                self.advance(&self.pop_cursor, pop);
                // SAFETY: the pointer was published by `push` and the CAS
                // above transferred ownership to this consumer.
                return Some(unsafe { Box::from_raw(observed) });
            }

            if retries == self.retry_times {
                return None;
            }
            retries += 1;
            thread::sleep(Duration::from_micros(self.sleep_us));
        }
    }
}

impl<T> Drop for SyncArrayQueue<T> {
    fn drop(&mut self) {
        for cell in self.cells.iter_mut() {
            let raw = *cell.get_mut();
            if !raw.is_null() {
                // SAFETY: exclusive access; the cell still owns the box.
                drop(unsafe { Box::from_raw(raw) });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn queue(capacity: usize) -> SyncArrayQueue<u32> {
        SyncArrayQueue::new(capacity, 10, 3)
    }

    #[test]
    fn test_push_pop_roundtrip() {
        let q = queue(4);
        assert!(q.is_empty());
        q.push(Box::new(7)).unwrap();
        assert!(!q.is_empty());
        assert_eq!(*q.pop().unwrap(), 7);
        assert!(q.is_empty());
    }

    #[test]
    fn test_pop_empty_returns_none() {
        let q = queue(4);
        assert!(q.pop().is_none());
    }

    #[test]
    fn test_full_rejects_and_returns_item() {
        let q = queue(3);
        q.push(Box::new(1)).unwrap();
        q.push(Box::new(2)).unwrap();
        assert!(q.is_full());
        let rejected = q.push(Box::new(3)).unwrap_err();
        assert_eq!(*rejected, 3);
    }

    #[test]
    fn test_capacity_clamped_to_one() {
        let q = queue(0);
        assert_eq!(q.capacity(), 1);
        // A single cell can never hold an item: full == empty.
        assert!(q.push(Box::new(1)).is_err());
    }

    #[test]
    fn test_cursor_wraps() {
        let q = queue(3);
        for round in 0..10u32 {
            q.push(Box::new(round)).unwrap();
            q.push(Box::new(round + 100)).unwrap();
            assert_eq!(*q.pop().unwrap(), round);
            assert_eq!(*q.pop().unwrap(), round + 100);
        }
    }

    #[test]
    fn test_bounded_occupancy() {
        let q = queue(5);
        let mut accepted = 0;
        for i in 0..20u32 {
            if q.push(Box::new(i)).is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 4);
    }

    #[test]
    fn test_drop_drains_remaining_items() {
        #[derive(Debug)]
        struct Tracked(Arc<AtomicUsize>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let drops = Arc::new(AtomicUsize::new(0));
        {
            let q: SyncArrayQueue<Tracked> = SyncArrayQueue::new(8, 10, 3);
            for _ in 0..5 {
                q.push(Box::new(Tracked(drops.clone()))).unwrap();
            }
            drop(q.pop().unwrap());
        }
        assert_eq!(drops.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_concurrent_producers_consumers() {
        let q = Arc::new(SyncArrayQueue::<u32>::new(64, 10, 3));
        let popped = Arc::new(AtomicUsize::new(0));
        let pushed = Arc::new(AtomicUsize::new(0));

        let mut threads = Vec::new();
        for t in 0..4 {
            let q = q.clone();
            let pushed = pushed.clone();
            threads.push(std::thread::spawn(move || {
                for i in 0..500u32 {
                    let mut item = Box::new(t * 1000 + i);
                    loop {
                        match q.push(item) {
                            Ok(()) => {
                                pushed.fetch_add(1, Ordering::SeqCst);
                                break;
                            }
                            Err(back) => {
                                item = back;
                                std::thread::yield_now();
                            }
                        }
                    }
                }
            }));
        }
        for _ in 0..4 {
            let q = q.clone();
            let popped = popped.clone();
            let pushed = pushed.clone();
            threads.push(std::thread::spawn(move || loop {
                if q.pop().is_some() {
                    popped.fetch_add(1, Ordering::SeqCst);
                } else if pushed.load(Ordering::SeqCst) == 2000
                    && popped.load(Ordering::SeqCst) == 2000
                {
                    break;
                } else {
                    std::thread::yield_now();
                }
            }));
        }
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(popped.load(Ordering::SeqCst), 2000);
        assert!(q.is_empty());
    }
}
