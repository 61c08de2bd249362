//! Configuration and rule files loaded from disk.

use petit_relay::testing::RecordingTracer;
use petit_relay::{
    ConfigError, ExecutionId, InMemoryKeyValueStore, MappingEngine, SpanRelay, TaskId,
    TraceContextStore, UnsupportedEvaluator, YamlLoader,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::common::Documents;

#[tokio::test]
async fn test_relay_built_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relay.yaml");
    std::fs::write(
        &path,
        r#"
trace:
  task_key_prefix: "wf_span_"
  execution_key_prefix: "wf_exec_span_"
  ttl_secs: 600
telemetry:
  service_name: "billing-flows"
"#,
    )
    .unwrap();

    let config = YamlLoader::load_relay_config(&path).unwrap();
    assert_eq!(config.telemetry.service_name, "billing-flows");
    assert_eq!(config.telemetry.endpoint, "http://localhost:4317");

    let kv = Arc::new(InMemoryKeyValueStore::new());
    let store = TraceContextStore::new(kv.clone(), config.trace.clone());
    let relay = SpanRelay::new(store, RecordingTracer::new());

    let exec = ExecutionId::new("e1");
    let task = TaskId::new("t1");
    let span = RecordingTracer::new().root_span("t1");
    relay.store().save_context(&exec, &task, None, &span.context).await;

    let ttl = kv.ttl("wf_span_e1_t1").expect("record stored under configured prefix");
    assert!(ttl <= Duration::from_secs(600) && ttl > Duration::from_secs(590));
    assert!(relay.load_span(&exec, &task).await.is_some());
}

#[test]
fn test_json_rules_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("rules.json");
    std::fs::write(
        &path,
        r#"[
  {"source": "$.context.order.id", "target": "$.input.order_id"},
  {"source": "$.tasks.ship.trigger_url", "target": "$.input.callback", "tolerance": false}
]"#,
    )
    .unwrap();

    let config = YamlLoader::parse_relay_config("mapping:\n  server_host: \"https://flow.example.com\"\n").unwrap();
    let rules = YamlLoader::load_rules(&path).unwrap();
    assert_eq!(rules.len(), 2);
    assert!(!rules[1].tolerant);

    let engine = MappingEngine::new(config.mapping, Arc::new(UnsupportedEvaluator));
    let mut docs = Documents::new(
        json!({"flow_execution_id": "e9", "order": {"id": 17}}),
        json!({}),
        json!({}),
    );
    engine
        .mapping(&mut docs.context, &mut docs.input, &mut docs.output, &rules)
        .unwrap();

    assert_eq!(docs.input.get("order_id"), Some(&json!(17)));
    assert_eq!(
        docs.input.get("callback"),
        Some(&json!(
            "https://flow.example.com/flow/trigger_function.json?execution_id=e9&task_name=ship"
        ))
    );
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relay.yaml");
    std::fs::write(&path, "trace:\n  ttl_secs: 0\n").unwrap();

    assert!(matches!(
        YamlLoader::load_relay_config(&path),
        Err(ConfigError::InvalidConfig(_))
    ));
}
