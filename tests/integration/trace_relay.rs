//! Suspend/resume span continuity tests.

use petit_relay::testing::{FailingStore, RecordingTracer};
use petit_relay::trace::{
    EXECUTION_ID_ATTRIBUTE, ORIGINAL_SPAN_ID_ATTRIBUTE, SpanRecord, TASK_ID_ATTRIBUTE,
};
use petit_relay::{
    ExecutionId, KeyValueStore, SpanContext, TaskId, TraceFlags, TraceSpan, TraceStoreConfig,
};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use crate::common::{relay_over, relay_with};

fn ids() -> (ExecutionId, TaskId) {
    (ExecutionId::new("exec-42"), TaskId::new("wait_for_callback"))
}

#[tokio::test]
async fn test_suspend_resume_round_trip() {
    let (kv, relay) = relay_with(TraceStoreConfig::default());
    let (exec, task) = ids();

    let tracer = RecordingTracer::new();
    let root = tracer.root_span("execution");
    let task_span = tracer.child_span("task", &root.context);

    relay
        .store()
        .save_context(&exec, &task, Some(&root.context), &task_span.context)
        .await;
    assert_eq!(kv.len(), 1);

    let resumed = relay.load_context(&exec, &task).await.expect("span restored");
    let restored = resumed.span_context();

    assert_eq!(restored.trace_id, root.context.trace_id);
    assert_eq!(resumed.parent, root.context);
    assert_ne!(restored.span_id, task_span.context.span_id);
    assert_eq!(resumed.original_span_id, task_span.context.span_id);

    let started = relay.tracer().started();
    let span = &started[0];
    assert_eq!(span.parent.as_ref(), Some(&root.context));
    assert_eq!(
        span.attribute(ORIGINAL_SPAN_ID_ATTRIBUTE),
        Some(task_span.context.span_id.as_str())
    );
    assert_eq!(span.attribute(EXECUTION_ID_ATTRIBUTE), Some("exec-42"));
    assert_eq!(span.attribute(TASK_ID_ATTRIBUTE), Some("wait_for_callback"));

    // consumed: a second resume finds nothing
    assert!(relay.load_span(&exec, &task).await.is_none());
    assert!(kv.is_empty());
}

#[tokio::test]
async fn test_start_time_is_preserved() {
    let (kv, relay) = relay_with(TraceStoreConfig::default());
    let (exec, task) = ids();
    let record = SpanRecord {
        trace_id: "4bf92f3577b34da6a3ce929d0e0e4736".into(),
        span_id: "00f067aa0ba902b7".into(),
        parent_span_id: Some("b7ad6b7169203331".into()),
        trace_flags: "01".into(),
        start_time_millis: 1_700_000_000_123,
    };
    kv.set(
        &relay.store().task_key(&exec, &task),
        serde_json::to_string(&record).unwrap(),
    )
    .await
    .unwrap();

    let resumed = relay.load_context(&exec, &task).await.unwrap();
    let expected = UNIX_EPOCH + Duration::from_millis(1_700_000_000_123);
    assert_eq!(resumed.start_time, expected);
    assert_eq!(relay.tracer().started()[0].start_time, expected);
    assert_eq!(resumed.parent.span_id, "b7ad6b7169203331");
}

#[tokio::test]
async fn test_zero_ttl_expires_record() {
    let (kv, relay) = relay_with(TraceStoreConfig::default().with_ttl_secs(0));
    let (exec, task) = ids();
    let span = SpanContext::new(
        "4bf92f3577b34da6a3ce929d0e0e4736",
        "00f067aa0ba902b7",
        TraceFlags::SAMPLED,
    );

    relay.store().save_context(&exec, &task, None, &span).await;
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(kv.is_empty());
    assert!(relay.load_span(&exec, &task).await.is_none());
}

#[tokio::test]
async fn test_default_ttl_applied() {
    let (kv, relay) = relay_with(TraceStoreConfig::default());
    let (exec, task) = ids();
    let span = SpanContext::new(
        "4bf92f3577b34da6a3ce929d0e0e4736",
        "00f067aa0ba902b7",
        TraceFlags::SAMPLED,
    );

    relay.store().save_context(&exec, &task, None, &span).await;
    relay.store().save_execution_context(&exec, &span).await;

    for key in [
        relay.store().task_key(&exec, &task),
        relay.store().execution_key(&exec),
    ] {
        let ttl = kv.ttl(&key).expect("ttl set");
        assert!(ttl > Duration::from_secs(7100) && ttl <= Duration::from_secs(7200));
    }
}

#[tokio::test]
async fn test_failing_store_never_surfaces_errors() {
    let relay = relay_over(Arc::new(FailingStore));
    let (exec, task) = ids();
    let span = SpanContext::new(
        "4bf92f3577b34da6a3ce929d0e0e4736",
        "00f067aa0ba902b7",
        TraceFlags::SAMPLED,
    );

    relay.store().save_context(&exec, &task, None, &span).await;
    relay.store().save_execution_context(&exec, &span).await;
    assert!(relay.load_span(&exec, &task).await.is_none());
    assert!(relay.load_execution_context(&exec).await.is_none());
    relay.remove_span_context(&exec, &task).await;

    assert!(relay.tracer().started().is_empty());
}

#[tokio::test]
async fn test_malformed_record_yields_none_and_is_cleaned_up() {
    let (kv, relay) = relay_with(TraceStoreConfig::default());
    let (exec, task) = ids();
    let key = relay.store().task_key(&exec, &task);
    kv.set(&key, r#"{"traceId":"xyz","spanId":"1","traceFlags":"01","startTime":0}"#.into())
        .await
        .unwrap();

    assert!(relay.load_context(&exec, &task).await.is_none());
    assert!(kv.get(&key).await.unwrap().is_none());
}

#[tokio::test]
async fn test_execution_context_is_reusable() {
    let (kv, relay) = relay_with(TraceStoreConfig::default());
    let exec = ExecutionId::new("exec-42");
    let root = RecordingTracer::new().root_span("execution");

    relay.store().save_execution_context(&exec, &root.context).await;

    for _ in 0..3 {
        let resumed = relay.load_execution_context(&exec).await.unwrap();
        assert_eq!(resumed.parent, root.context);
        assert_eq!(resumed.span_context().trace_id, root.context.trace_id);
    }
    assert_eq!(kv.len(), 1);
}

#[tokio::test]
async fn test_task_records_are_isolated() {
    let (_, relay) = relay_with(TraceStoreConfig::default());
    let exec = ExecutionId::new("exec-42");
    let tracer = RecordingTracer::new();
    let a = tracer.root_span("a");
    let b = tracer.root_span("b");

    relay.store().save_context(&exec, &TaskId::new("a"), None, &a.context).await;
    relay.store().save_context(&exec, &TaskId::new("b"), None, &b.context).await;

    let resumed_b = relay.load_context(&exec, &TaskId::new("b")).await.unwrap();
    assert_eq!(resumed_b.original_span_id, b.context.span_id);
    let resumed_a = relay.load_context(&exec, &TaskId::new("a")).await.unwrap();
    assert_eq!(resumed_a.original_span_id, a.context.span_id);
}

#[tokio::test]
async fn test_concurrent_resume_consumes_once() {
    let (_, relay) = relay_with(TraceStoreConfig::default());
    let relay = Arc::new(relay);
    let (exec, task) = ids();
    let span = RecordingTracer::new().root_span("task");
    relay.store().save_context(&exec, &task, None, &span.context).await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let relay = Arc::clone(&relay);
        let (exec, task) = (exec.clone(), task.clone());
        handles.push(tokio::spawn(async move {
            relay.load_span(&exec, &task).await.is_some()
        }));
    }

    let mut resumed = 0;
    for handle in handles {
        if handle.await.unwrap() {
            resumed += 1;
        }
    }
    assert_eq!(resumed, 1);
}
