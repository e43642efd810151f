//! Fiber stacks must survive arbitrary interleavings of yields: a pattern
//! written into a stack-resident array before a switch is intact after it.

use coropool::{yield_now, CoroutinePool, PoolConfig};
use std::hint::black_box;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const WORDS: usize = 16 * 1024;
const CHUNK: usize = 1024;

#[test]
fn test_pattern_survives_yields() {
    // 16K u32 words need 64 KiB of stack for the array alone.
    let pool = CoroutinePool::with_config(PoolConfig {
        worker_threads: 1,
        fibers_per_worker: 4,
        queue_capacity: 16,
        stack_size: 512 * 1024,
        ..PoolConfig::default()
    });
    pool.run();

    let verified = Arc::new(AtomicUsize::new(0));
    let mut handles = Vec::new();
    for task in 0..4u32 {
        let verified = verified.clone();
        let handle = pool
            .submit(move || {
                let mut arr = [0u32; WORDS];
                for chunk_start in (0..WORDS).step_by(CHUNK) {
                    for i in chunk_start..chunk_start + CHUNK {
                        arr[i] = task.wrapping_mul(31).wrapping_add(i as u32);
                    }
                    // Switch away mid-pattern; the other three fibers run
                    // on this same OS thread and scribble on their own
                    // stacks in the meantime.
                    yield_now();
                    for i in chunk_start..chunk_start + CHUNK {
                        assert_eq!(arr[i], task.wrapping_mul(31).wrapping_add(i as u32));
                    }
                }
                black_box(&mut arr);
                // Full pass after all yields.
                for (i, value) in arr.iter().enumerate() {
                    assert_eq!(*value, task.wrapping_mul(31).wrapping_add(i as u32));
                }
                verified.fetch_add(1, Ordering::SeqCst);
            })
            .expect("queue holds four jobs");
        handles.push(handle);
    }

    for handle in &handles {
        handle.wait();
        assert!(!handle.panicked(), "stack verification failed inside task");
    }
    assert_eq!(verified.load(Ordering::SeqCst), 4);
    pool.stop();
}
