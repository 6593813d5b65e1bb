//! Basic benchmarks for the `counted` crate.
#![allow(
    missing_docs,
    reason = "No need for API documentation in benchmark code"
)]

use std::hint::black_box;
use std::iter;
use std::time::Instant;

use alloc_tracker::Allocator;
use counted::Shared;
use criterion::{Criterion, criterion_group, criterion_main};

criterion_group!(benches, entrypoint);
criterion_main!(benches);

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

type TestItem = usize;
const TEST_VALUE: TestItem = 1024;

fn entrypoint(c: &mut Criterion) {
    let allocs = alloc_tracker::Session::new();

    let mut group = c.benchmark_group("counted_basic");

    let allocs_op = allocs.operation("new_drop");
    group.bench_function("new_drop", |b| {
        b.iter_custom(|iters| {
            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(Shared::new(black_box(TEST_VALUE))));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("clone_drop");
    group.bench_function("clone_drop", |b| {
        b.iter_custom(|iters| {
            let shared = Shared::new(TEST_VALUE);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                drop(black_box(black_box(&shared).clone()));
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("read_one");
    group.bench_function("read_one", |b| {
        b.iter_custom(|iters| {
            let shared = Shared::new(TEST_VALUE);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                _ = black_box(*black_box(&shared).get().unwrap());
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("downgrade_upgrade");
    group.bench_function("downgrade_upgrade", |b| {
        b.iter_custom(|iters| {
            let shared = Shared::new(TEST_VALUE);

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for _ in 0..iters {
                let weak = black_box(&shared).downgrade();
                _ = black_box(weak.upgrade());
            }

            start.elapsed()
        });
    });

    let allocs_op = allocs.operation("adopt_drop");
    group.bench_function("adopt_drop", |b| {
        b.iter_custom(|iters| {
            let targets = iter::repeat_with(|| Box::into_raw(Box::new(TEST_VALUE)))
                .take(usize::try_from(iters).unwrap())
                .collect::<Vec<_>>();

            let _span = allocs_op.measure_thread().iterations(iters);

            let start = Instant::now();

            for target in targets {
                // SAFETY: The pointer came from Box::into_raw just above and the
                // default deleter releases it.
                let shared = unsafe {
                    Shared::adopt(std::ptr::NonNull::new(target).unwrap())
                };
                drop(black_box(shared));
            }

            start.elapsed()
        });
    });

    group.finish();

    allocs.print_to_stdout();
}
