// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for the fallback strategy using only public API.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use bulwark::fallback::Fallback;
use bulwark::{Fault, FaultKind, Pipeline, PipelineOptions, ResilienceContext};
use tick::Clock;

#[test]
fn handled_fault_is_replaced() {
    let options = PipelineOptions::<String>::new(Clock::new_frozen());
    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let pipeline = Pipeline::builder(&options)
        .add(
            Fallback::layer("fallback", &options)
                .on_fallback(move |outcome, _| {
                    sink.lock().unwrap().push(outcome.as_ref().err().map(Fault::kind));
                })
                .fallback(|outcome, _| {
                    assert!(outcome.is_err());
                    Ok("cached".to_string())
                }),
        )
        .build();

    let result = pipeline.execute_blocking(&ResilienceContext::new(), |_| Err(Fault::application("offline")));

    assert_eq!(result.unwrap(), "cached");
    assert_eq!(*observed.lock().unwrap(), vec![Some(FaultKind::Application)]);
}

#[test]
fn provider_is_never_invoked_for_unhandled_outcomes() {
    let options = PipelineOptions::<u32>::new(Clock::new_frozen());
    let invoked = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&invoked);
    let pipeline = Pipeline::builder(&options)
        .add(
            Fallback::layer("fallback", &options)
                .should_handle(|outcome| matches!(outcome, Err(fault) if fault.is_timed_out()))
                .fallback(move |_, _| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(0)
                }),
        )
        .build();

    let success = pipeline.execute_blocking(&ResilienceContext::new(), |_| Ok(5));
    let failure = pipeline.execute_blocking(&ResilienceContext::new(), |_| Err(Fault::BulkheadRejected));

    assert_eq!(success.unwrap(), 5);
    assert!(matches!(failure, Err(Fault::BulkheadRejected)));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[test]
fn provider_fault_becomes_the_result() {
    let options = PipelineOptions::<u32>::new(Clock::new_frozen());
    let pipeline = Pipeline::builder(&options)
        .add(Fallback::layer("fallback", &options).fallback(|_, _| Err(Fault::application("fallback failed"))))
        .build();

    let result = pipeline.execute_blocking(&ResilienceContext::new(), |_| Err(Fault::application("primary failed")));

    assert_eq!(result.unwrap_err().to_string(), "fallback failed");
}

#[tokio::test]
async fn asynchronous_provider_replaces_outcome() {
    let options = PipelineOptions::<String>::new(Clock::new_frozen());
    let pipeline = Pipeline::builder(&options)
        .add(Fallback::layer("fallback", &options).fallback_async(|_, args| {
            let key = args.context().operation_key().unwrap_or("unknown").to_string();
            async move { Ok(format!("fallback for {key}")) }
        }))
        .build();

    let context = ResilienceContext::new().with_operation_key("profile");
    let asynchronous = pipeline
        .execute(&context, |_| async { Err(Fault::application("offline")) })
        .await;
    let blocking = pipeline.execute_blocking(&context, |_| Err(Fault::application("offline")));

    assert_eq!(asynchronous.unwrap(), "fallback for profile");
    assert_eq!(blocking.unwrap(), "fallback for profile");
}

#[test]
fn cancellation_is_never_replaced() {
    let options = PipelineOptions::<u32>::new(Clock::new_frozen());
    let pipeline = Pipeline::builder(&options)
        .add(
            Fallback::layer("fallback", &options)
                .should_handle(|outcome| outcome.is_err())
                .fallback(|_, _| Ok(0)),
        )
        .build();

    let result = pipeline.execute_blocking(&ResilienceContext::new(), |_| Err(Fault::Cancelled));

    assert!(matches!(result, Err(Fault::Cancelled)));
}
