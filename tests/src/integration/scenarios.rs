//! # End-to-End Scenarios
//!
//! Producer → queue → listener → ingress flows, including the bootstrap
//! path where events are enqueued before any runtime exists.

use std::sync::Arc;
use std::time::Duration;

use evbus::{Broker, BrokerConfig, ChannelErrorCallback, Contexts};
use evbus_runtime::{BusRuntime, RuntimeConfig};
use serde_json::{json, Value};

use super::fixtures::{Fault, FaultyIngress, RecordingIngress};

fn bodies(plugin: &RecordingIngress) -> Vec<Value> {
    plugin
        .received()
        .into_iter()
        .map(|(_, body)| serde_json::from_slice(&body).unwrap())
        .collect()
}

#[tokio::test]
async fn test_profiles_route_to_their_providers() {
    let broker = Broker::default();
    let first = RecordingIngress::new("first", &["p1"]);
    let second = RecordingIngress::new("second", &["p2"]);
    broker.register_ingress(first.clone());
    broker.register_ingress(second.clone());

    let contexts = Contexts::new()
        .with_profile("p1", "default", "default", json!("c1"))
        .with_profile("p2", "default", "special", json!("c2"));

    broker.put(&json!({"x": 1}), "default").await.unwrap();
    broker.put(&json!({"x": 2}), "special").await.unwrap();

    for _ in 0..2 {
        let event = broker.get().await.unwrap();
        broker.propagate(&contexts, event).await.unwrap();
    }

    assert_eq!(bodies(&first), vec![json!({"x": 1})]);
    assert_eq!(bodies(&second), vec![json!({"x": 2})]);
}

#[tokio::test]
async fn test_failed_publish_reports_to_callback() {
    let broker = Broker::default();
    let (callback, mut reports) = ChannelErrorCallback::new();
    broker.set_error_callback(Arc::new(callback));
    broker.register_ingress(FaultyIngress::new("broken", &["p1"], Fault::Error));

    let contexts = Contexts::new().with_profile("p1", "default", "*", json!("c1"));
    broker.put(&json!({"x": 1}), "orders").await.unwrap();
    let event = broker.get().await.unwrap();
    broker.propagate(&contexts, event).await.unwrap();

    let report = tokio::time::timeout(Duration::from_secs(1), reports.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.profile, "orders");
    assert_eq!(
        report.exception.to_string(),
        "Ingress plugin 'broken' failed to publish for profile 'orders': boom"
    );
}

#[test]
fn test_events_enqueued_before_runtime_are_all_retrieved() {
    let broker = Broker::new(BrokerConfig::default());
    for _ in 0..5 {
        broker.put_nowait(&json!({"k": "v"}), "default").unwrap();
    }

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        broker.init().await;
        for _ in 0..5 {
            let event = broker.get().await.unwrap();
            let body: Value = serde_json::from_slice(event.body()).unwrap();
            assert_eq!(body, json!({"k": "v"}));
        }
        assert!(broker.queue().is_empty());
    });
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_listener_drains_queue_before_stopping() {
    let broker = Arc::new(Broker::default());
    let plugin = RecordingIngress::new("sink", &["p1"]);
    broker.register_ingress(plugin.clone());
    let contexts = Arc::new(Contexts::new().with_profile("p1", "default", "*", json!("c")));

    let listener = {
        let broker = Arc::clone(&broker);
        let contexts = Arc::clone(&contexts);
        tokio::spawn(async move { broker.listen(&contexts).await })
    };

    for i in 0..25 {
        broker.put(&json!({ "i": i }), "default").await.unwrap();
    }
    broker.stop().await;

    let processed = tokio::time::timeout(Duration::from_secs(5), listener)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(processed, 25);
    assert_eq!(plugin.calls(), 25);
}

#[tokio::test]
async fn test_runtime_from_toml_delivers_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("out.jsonl");
    let config = RuntimeConfig::parse(&format!(
        r#"
[broker]
serializer = "json"

[[ingress]]
name = "archive"
kind = "file"
acct = ["p1"]
path = {:?}

[[contexts.p1.default]]
"*" = "cred"
"#,
        out.display().to_string()
    ))
    .unwrap();

    let mut runtime = BusRuntime::new(&config).unwrap();
    runtime.start().await;
    runtime
        .broker()
        .put(&json!({"hello": "world"}), "default")
        .await
        .unwrap();
    assert_eq!(runtime.shutdown(Duration::from_secs(5)).await, Some(1));

    let line: Value =
        serde_json::from_str(std::fs::read_to_string(&out).unwrap().trim()).unwrap();
    assert_eq!(line["body"], json!({"hello": "world"}));
    assert_eq!(line["acct"], json!("cred"));
}
