use coropool::{yield_now, CoroutinePool};
use std::time::{Duration, Instant};

/// One simulated wait: touch a stack-resident array, hand the CPU back,
/// verify the array survived the switch.
fn tick(task: usize, arr: &mut [u32]) {
    for (i, slot) in arr.iter_mut().enumerate() {
        *slot = (task + i) as u32;
    }
    std::thread::sleep(Duration::from_millis(1));
    yield_now();
    for (i, slot) in arr.iter().enumerate() {
        assert_eq!(*slot, (task + i) as u32, "stack corrupted in task {}", task);
    }
}

fn main() {
    println!("coropool - multi-threaded stackful coroutine pool\n");

    // Small thread count, large fiber count: the waits overlap on two OS
    // threads instead of occupying four hundred.
    let pool = CoroutinePool::new(2, 300);
    pool.run();
    println!("Started pool: 2 workers x 300 fibers");

    let task_count = 400usize;
    let start = Instant::now();

    let mut handles = Vec::new();
    for i in 0..task_count {
        let ticks = i % 5 + 1;
        let handle = pool.submit(move || {
            let mut arr = [0u32; 2048];
            for _ in 0..ticks {
                tick(i, &mut arr);
            }
        });
        if let Some(handle) = handle {
            handles.push(handle);
        }
    }
    println!("Submitted {} tasks ({} accepted)", task_count, handles.len());

    for handle in &handles {
        handle.wait();
    }
    println!(
        "All tasks finished in {:?} (sum of simulated waits: {:?})",
        start.elapsed(),
        Duration::from_millis((0..task_count as u64).map(|i| i % 5 + 1).sum())
    );

    pool.stop();
    println!("Pool stopped");
}
