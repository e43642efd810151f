//! Throughput of the bounded CAS ring under single-threaded and contended
//! access.

use coropool::queue::SyncArrayQueue;
use criterion::{criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::thread;

fn bench_uncontended_push_pop(c: &mut Criterion) {
    let queue: SyncArrayQueue<u64> = SyncArrayQueue::new(1024, 100, 3);

    c.bench_function("queue_push_pop", |b| {
        b.iter(|| {
            queue.push(Box::new(std::hint::black_box(42))).unwrap();
            std::hint::black_box(queue.pop().unwrap());
        })
    });
}

fn bench_mpmc_handoff(c: &mut Criterion) {
    c.bench_function("queue_mpmc_4x4_1000", |b| {
        b.iter(|| {
            let queue = Arc::new(SyncArrayQueue::<u64>::new(256, 10, 3));
            let mut threads = Vec::new();
            for _ in 0..4 {
                let queue = queue.clone();
                threads.push(thread::spawn(move || {
                    for i in 0..250u64 {
                        let mut item = Box::new(i);
                        while let Err(back) = queue.push(item) {
                            item = back;
                            thread::yield_now();
                        }
                    }
                }));
            }
            for _ in 0..4 {
                let queue = queue.clone();
                threads.push(thread::spawn(move || {
                    let mut got = 0;
                    while got < 250 {
                        if queue.pop().is_some() {
                            got += 1;
                        } else {
                            thread::yield_now();
                        }
                    }
                }));
            }
            for t in threads {
                t.join().unwrap();
            }
        })
    });
}

criterion_group!(benches, bench_uncontended_push_pop, bench_mpmc_handoff);
criterion_main!(benches);
