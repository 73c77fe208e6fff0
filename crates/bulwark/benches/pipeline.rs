// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.
#![expect(missing_docs, reason = "benchmark code")]

use std::time::Duration;

use alloc_tracker::{Allocator, Session};
use bulwark::circuit_breaker::CircuitBreaker;
use bulwark::concurrency_limiter::ConcurrencyLimiter;
use bulwark::fallback::Fallback;
use bulwark::retry::Retry;
use bulwark::timeout::Timeout;
use bulwark::{Fault, Pipeline, PipelineOptions, ResilienceContext};
use criterion::{Criterion, criterion_group, criterion_main};
use futures::executor::block_on;
use tick::Clock;

#[global_allocator]
static ALLOCATOR: Allocator<std::alloc::System> = Allocator::system();

fn entry(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let session = Session::new();
    let options = PipelineOptions::<u64>::new(Clock::new_frozen());

    // No strategies
    let empty = Pipeline::builder(&options).build();
    let operation = session.operation("empty");
    group.bench_function("empty", |b| {
        b.iter(|| {
            let _span = operation.measure_thread();
            _ = block_on(empty.execute(&ResilienceContext::new(), |_| async { Ok(1) }));
        });
    });

    // Every strategy, successful operation
    let full = Pipeline::builder(&options)
        .add(Fallback::layer("fallback", &options).fallback(|_, _| Ok(0)))
        .add(Retry::layer("retry", &options).base_delay(Duration::ZERO))
        .add(CircuitBreaker::layer("breaker", &options))
        .add(Timeout::layer("timeout", &options).timeout(Duration::from_secs(1)))
        .add(ConcurrencyLimiter::layer("bulkhead", &options))
        .build();

    let operation = session.operation("full");
    group.bench_function("full", |b| {
        b.iter(|| {
            let _span = operation.measure_thread();
            _ = block_on(full.execute(&ResilienceContext::new(), |_| async { Ok(1) }));
        });
    });

    let operation = session.operation("full-blocking");
    group.bench_function("full-blocking", |b| {
        b.iter(|| {
            let _span = operation.measure_thread();
            _ = full.execute_blocking(&ResilienceContext::new(), |_| Ok(1));
        });
    });

    // Retry then fallback
    let recovering = Pipeline::builder(&options)
        .add(Fallback::layer("fallback", &options).fallback(|_, _| Ok(0)))
        .add(Retry::layer("retry", &options).max_retry_attempts(2).base_delay(Duration::ZERO))
        .build();

    let operation = session.operation("retry-fallback");
    group.bench_function("retry-fallback", |b| {
        b.iter(|| {
            let _span = operation.measure_thread();
            _ = block_on(recovering.execute(&ResilienceContext::new(), |_| async { Err(Fault::application("failed")) }));
        });
    });

    // Pooled contexts
    let operation = session.operation("full-pooled");
    group.bench_function("full-pooled", |b| {
        b.iter(|| {
            let _span = operation.measure_thread();
            _ = block_on(full.run(|_| async { Ok(1) }));
        });
    });

    group.finish();
    session.print_to_stdout();
}

criterion_group!(benches, entry);
criterion_main!(benches);
