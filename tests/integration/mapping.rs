//! End-to-end mapping rule tests.

use petit_relay::mapping::EXECUTION_ID_KEY;
use petit_relay::testing::FnEvaluator;
use petit_relay::{
    MappingConfig, MappingEngine, MappingError, MappingRule, PathAccessor, UnsupportedEvaluator,
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::common::{Documents, engine, engine_with};

fn run(engine: &MappingEngine, docs: &mut Documents, rules: &[MappingRule]) -> Result<(), MappingError> {
    engine.mapping(&mut docs.context, &mut docs.input, &mut docs.output, rules)
}

#[test]
fn test_later_rules_observe_earlier_writes() {
    let mut docs = Documents::empty();
    let rules = vec![
        MappingRule::new("literal:1", "$.input.x"),
        MappingRule::transform_only("input.x + 1", "$.input.y"),
    ];

    run(&engine(), &mut docs, &rules).unwrap();

    assert_eq!(docs.input.get("x"), Some(&json!(1)));
    assert_eq!(docs.input.get("y"), Some(&json!(2)));
}

#[test]
fn test_source_and_transform_combined() {
    let mut docs = Documents::new(json!({"price": 21}), json!({}), json!({}));
    let rules = vec![MappingRule::new("$.context.price", "$.output.total").with_transform("source * 2")];

    run(&engine(), &mut docs, &rules).unwrap();
    assert_eq!(docs.output.get("total"), Some(&json!(42)));
}

#[test]
fn test_tolerant_failure_is_skipped() {
    let mut docs = Documents::empty();
    let rules = vec![
        MappingRule::transform_only("no.such + 1", "$.input.bad"),
        MappingRule::new("ok", "$.input.good"),
    ];

    run(&engine(), &mut docs, &rules).unwrap();

    assert!(docs.input.get("bad").is_none());
    assert_eq!(docs.input.get("good"), Some(&json!("ok")));
}

#[test]
fn test_tolerant_malformed_source_is_skipped() {
    let mut docs = Documents::new(json!({"a": 1}), json!({}), json!({}));
    let rules = vec![
        MappingRule::new("$.context[", "$.input.bad"),
        MappingRule::new("literal:fine", "$.input.good"),
    ];

    run(&engine(), &mut docs, &rules).unwrap();

    assert!(docs.input.get("bad").is_none());
    assert_eq!(docs.input.get("good"), Some(&json!("fine")));
}

#[test]
fn test_tolerant_oversized_index_does_not_stop_later_rules() {
    let mut docs = Documents::empty();
    let rules = vec![
        MappingRule::new("1", "$.output.a[18446744073709551615]"),
        MappingRule::new("2", "$.output.after"),
    ];

    run(&engine(), &mut docs, &rules).unwrap();

    assert_eq!(Value::Object(docs.output), json!({"after": 2}));
}

#[test]
fn test_intolerant_failure_aborts() {
    let evaluator = Arc::new(FnEvaluator::failing("boom"));
    let mut docs = Documents::empty();
    let rules = vec![
        MappingRule::new("first", "$.output.a"),
        MappingRule::transform_only("explode()", "$.output.b").with_tolerant(false),
        MappingRule::new("never", "$.output.c"),
    ];

    let err = run(&engine_with(evaluator.clone()), &mut docs, &rules).unwrap_err();

    match err {
        MappingError::Rule { index, target, source } => {
            assert_eq!(index, 1);
            assert_eq!(target, "$.output.b");
            assert!(matches!(*source, MappingError::Transform(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(Value::Object(docs.output), json!({"a": "first"}));
    assert_eq!(evaluator.calls(), 1);
}

#[test]
fn test_null_results_never_overwrite() {
    let mut docs = Documents::new(json!({}), json!({"keep": "me"}), json!({}));
    let evaluator = Arc::new(FnEvaluator::constant(Value::Null));
    let rules = vec![
        MappingRule::new("$.context.absent", "$.input.keep"),
        MappingRule::transform_only("anything", "$.input.keep"),
    ];

    run(&engine_with(evaluator), &mut docs, &rules).unwrap();
    assert_eq!(docs.input.get("keep"), Some(&json!("me")));
}

#[test]
fn test_auto_vivification() {
    let mut docs = Documents::empty();
    let rules = vec![MappingRule::new("literal:hello", "$.output.a[2].b")];

    run(&engine(), &mut docs, &rules).unwrap();
    assert_eq!(
        Value::Object(docs.output),
        json!({"a": [null, null, {"b": "hello"}]})
    );

    let mut doc = json!({});
    PathAccessor::set(&mut doc, json!("v"), "$.a[2].b").unwrap();
    assert_eq!(doc, json!({"a": [null, null, {"b": "v"}]}));
}

#[test]
fn test_literal_resolution() {
    let mut docs = Documents::empty();
    let rules = vec![
        MappingRule::new("3.5", "$.input.float"),
        MappingRule::new("3", "$.input.int"),
        MappingRule::new("TRUE", "$.input.flag"),
        MappingRule::new(r#"{"k":1}"#, "$.input.object"),
        MappingRule::new("[1, 2]", "$.input.list"),
        MappingRule::new("plain text", "$.input.text"),
    ];

    run(&engine(), &mut docs, &rules).unwrap();

    assert_eq!(
        Value::Object(docs.input),
        json!({
            "float": 3.5,
            "int": 3,
            "flag": true,
            "object": {"k": 1},
            "list": [1, 2],
            "text": "plain text",
        })
    );
}

#[test]
fn test_trigger_url_source() {
    let engine = MappingEngine::new(
        MappingConfig {
            server_host: "http://flow.internal".into(),
            trigger_uri: "/flow/trigger_function.json".into(),
        },
        Arc::new(UnsupportedEvaluator),
    );
    let mut docs = Documents::new(json!({"flow_execution_id": "exec-7"}), json!({}), json!({}));
    let rules = vec![
        MappingRule::new("$.tasks.notify.trigger_url", "$.input.callback"),
        MappingRule::new("$.tasks.notify.trigger_url?retry=1", "$.input.callback_retry"),
    ];

    run(&engine, &mut docs, &rules).unwrap();

    assert_eq!(EXECUTION_ID_KEY, "flow_execution_id");
    assert_eq!(
        docs.input.get("callback"),
        Some(&json!(
            "http://flow.internal/flow/trigger_function.json?execution_id=exec-7&task_name=notify"
        ))
    );
    assert_eq!(
        docs.input.get("callback_retry"),
        Some(&json!(
            "http://flow.internal/flow/trigger_function.json?execution_id=exec-7&task_name=notify&retry=1"
        ))
    );
}

#[test]
fn test_copy_between_documents_with_wildcard_read() {
    let mut docs = Documents::new(
        json!({"items": [{"id": 1}, {"id": 2}]}),
        json!({}),
        json!({}),
    );
    let rules = vec![MappingRule::new("$.context.items[*].id", "$.output.ids")];

    run(&engine(), &mut docs, &rules).unwrap();
    assert_eq!(docs.output.get("ids"), Some(&json!([1, 2])));
}

#[test]
fn test_rules_from_yaml_are_applied() {
    let rules: Vec<MappingRule> = serde_yaml::from_str(
        r#"
- source: "$.context.user.name"
  target: "$.input.user"
- source: ""
  target: "$.input.ignored"
- source: "$.input.user"
  target: "$.output['display name']"
  tolerance: false
"#,
    )
    .unwrap();

    let mut docs = Documents::new(json!({"user": {"name": "ada"}}), json!({}), json!({}));
    run(&engine(), &mut docs, &rules).unwrap();

    assert!(docs.input.get("ignored").is_none());
    assert_eq!(docs.output.get("display name"), Some(&json!("ada")));
}
