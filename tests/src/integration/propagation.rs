//! # Propagation
//!
//! Fan-out to matching ingress plugins and the containment of their
//! failures.

use std::sync::Arc;
use std::time::Duration;

use evbus::{Broker, BrokerError, ChannelErrorCallback, Contexts, DeliveryError, Event};
use serde_json::json;

use super::fixtures::{Fault, FaultyIngress, RecordingIngress};

fn event(profile: &str) -> Event {
    Event::new(profile, br#"{"x":1}"#.to_vec())
}

fn contexts() -> Contexts {
    Contexts::new()
        .with_profile("p1", "default", "prod-*", json!({"token": "t1"}))
        .with_profile("p1", "default", "*", json!({"token": "any"}))
        .with_profile("p2", "ops", "staging-*", json!("ops-user"))
}

// =============================================================================
// DELIVERY ISOLATION
// =============================================================================

#[tokio::test]
async fn test_failing_plugin_does_not_affect_siblings() {
    let broker = Broker::default();
    let first = RecordingIngress::new("a-first", &["p2"]);
    let second = FaultyIngress::new("b-second", &["p2"], Fault::Error);
    let third = RecordingIngress::new("c-third", &["p2"]);
    broker.register_ingress(first.clone());
    broker.register_ingress(second.clone());
    broker.register_ingress(third.clone());

    let summary = broker
        .propagate(&contexts(), event("staging-1"))
        .await
        .unwrap();

    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 1);
    assert_eq!(third.calls(), 1);
    assert_eq!(summary.scheduled(), 3);
    assert_eq!(summary.failed(), 1);

    let failure = summary.outcomes.iter().find(|o| !o.is_success()).unwrap();
    assert_eq!(failure.plugin, "b-second");
}

#[tokio::test]
async fn test_panicking_plugin_is_contained() {
    let broker = Broker::default();
    let healthy = RecordingIngress::new("healthy", &["p2"]);
    broker.register_ingress(healthy.clone());
    broker.register_ingress(FaultyIngress::new("panicky", &["p2"], Fault::Panic));

    let summary = broker
        .propagate(&contexts(), event("staging-1"))
        .await
        .unwrap();

    assert_eq!(healthy.calls(), 1);
    let failure = summary.outcomes.iter().find(|o| !o.is_success()).unwrap();
    assert!(matches!(
        failure.result.as_ref().unwrap_err().as_ref(),
        DeliveryError::Panicked { .. }
    ));
}

#[tokio::test]
async fn test_deliveries_run_concurrently() {
    let broker = Broker::default();
    for name in ["slow-a", "slow-b", "slow-c"] {
        broker.register_ingress(FaultyIngress::new(
            name,
            &["p2"],
            Fault::Slow(Duration::from_millis(200)),
        ));
    }

    let started = tokio::time::Instant::now();
    let summary = broker
        .propagate(&contexts(), event("staging-1"))
        .await
        .unwrap();

    assert_eq!(summary.delivered(), 3);
    assert!(started.elapsed() < Duration::from_millis(550));
}

// =============================================================================
// CONFIGURATION ERRORS
// =============================================================================

#[tokio::test]
async fn test_empty_acct_aborts_before_any_delivery() {
    let broker = Broker::default();
    let healthy = RecordingIngress::new("a-healthy", &["p2"]);
    broker.register_ingress(healthy.clone());
    broker.register_ingress(RecordingIngress::new("b-misconfigured", &[]));

    let err = broker
        .propagate(&contexts(), event("staging-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::Configuration { ref plugin } if plugin == "b-misconfigured"));
    assert_eq!(healthy.calls(), 0);
}

#[tokio::test]
async fn test_unknown_match_plugin_is_fatal() {
    let broker = Broker::default();
    let healthy = RecordingIngress::new("healthy", &["p2"]);
    broker.register_ingress(healthy.clone());

    let contexts = contexts().with_match_plugin("soundex");
    let err = broker
        .propagate(&contexts, event("staging-1"))
        .await
        .unwrap_err();

    assert!(matches!(err, BrokerError::PluginNotFound { .. }));
    assert_eq!(healthy.calls(), 0);
}

// =============================================================================
// PATTERN MATCHING
// =============================================================================

#[tokio::test]
async fn test_glob_pattern_selects_deliveries() {
    let broker = Broker::default();
    let plugin = RecordingIngress::new("ops", &["p2"]);
    broker.register_ingress(plugin.clone());

    let contexts = Contexts::new().with_profile("p2", "default", "prod-*", json!("cred"));

    let summary = broker.propagate(&contexts, event("prod-eu-1")).await.unwrap();
    assert_eq!(summary.scheduled(), 1);

    let summary = broker.propagate(&contexts, event("staging-1")).await.unwrap();
    assert_eq!(summary.scheduled(), 0);
    assert_eq!(plugin.calls(), 1);
}

#[tokio::test]
async fn test_every_matching_credential_gets_a_delivery() {
    let broker = Broker::default();
    let plugin = RecordingIngress::new("fanout", &["p1"]);
    broker.register_ingress(plugin.clone());

    // Both "prod-*" and "*" match.
    broker
        .propagate(&contexts(), event("prod-us-2"))
        .await
        .unwrap();

    let mut tokens: Vec<_> = plugin
        .received()
        .into_iter()
        .map(|(ctx, _)| ctx.acct["token"].as_str().unwrap().to_string())
        .collect();
    tokens.sort();
    assert_eq!(tokens, vec!["any".to_string(), "t1".to_string()]);
}

#[tokio::test]
async fn test_regex_matcher_selected_per_call() {
    let broker = Broker::default();
    let plugin = RecordingIngress::new("regex", &["p1"]);
    broker.register_ingress(plugin.clone());

    let contexts = Contexts::new()
        .with_match_plugin("regex")
        .with_profile("p1", "default", r"prod-(eu|us)-\d+", json!("cred"));

    broker.propagate(&contexts, event("prod-eu-12")).await.unwrap();
    broker.propagate(&contexts, event("prod-ap-1")).await.unwrap();
    broker.propagate(&contexts, event("xprod-eu-1")).await.unwrap();

    assert_eq!(plugin.calls(), 1);
}

#[tokio::test]
async fn test_unregistered_plugin_receives_nothing() {
    let broker = Broker::default();
    let plugin = RecordingIngress::new("gone", &["p2"]);
    broker.register_ingress(plugin.clone());
    assert!(broker.unregister_ingress("gone").is_some());

    let summary = broker
        .propagate(&contexts(), event("staging-1"))
        .await
        .unwrap();
    assert_eq!(summary.scheduled(), 0);
    assert_eq!(plugin.calls(), 0);
}

// =============================================================================
// ERROR CALLBACK
// =============================================================================

#[tokio::test]
async fn test_error_callback_receives_one_report_per_failure() {
    let broker = Broker::default();
    let (callback, mut reports) = ChannelErrorCallback::new();
    broker.set_error_callback(Arc::new(callback));
    broker.register_ingress(FaultyIngress::new("broken", &["p2"], Fault::Error));
    broker.register_ingress(RecordingIngress::new("healthy", &["p2"]));

    broker
        .propagate(&contexts(), event("staging-7"))
        .await
        .unwrap();

    let report = tokio::time::timeout(Duration::from_secs(1), reports.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.plugin, "broken");
    assert_eq!(report.profile, "staging-7");
    assert_eq!(report.context.acct, json!("ops-user"));
    assert!(report.exception.to_string().contains("boom"));

    // Only the one failure is reported.
    assert!(
        tokio::time::timeout(Duration::from_millis(100), reports.recv())
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_failures_without_callback_are_only_logged() {
    let broker = Broker::default();
    broker.register_ingress(FaultyIngress::new("broken", &["p2"], Fault::Error));

    let summary = broker
        .propagate(&contexts(), event("staging-1"))
        .await
        .unwrap();
    assert_eq!(summary.failed(), 1);
}
