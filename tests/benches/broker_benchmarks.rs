//! # evbus Broker Benchmarks
//!
//! | Path | Measures |
//! |------|----------|
//! | `put_nowait` | serialize + sync FIFO push + pop |
//! | `put` / `get` | priority heap round trip |
//! | `propagate` | fan-out to N recording plugins |
//! | matchers | glob / regex `find` with warm pattern cache |

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use evbus::{Broker, Contexts, Event, GlobMatcher, Matcher, RegexMatcher};
use evbus_tests::integration::fixtures::RecordingIngress;
use serde_json::json;

fn bench_enqueue(c: &mut Criterion) {
    let mut group = c.benchmark_group("evbus-enqueue");
    group.measurement_time(Duration::from_secs(5));
    let payload = json!({"order": 42, "items": ["a", "b", "c"]});

    group.bench_function("put_nowait", |b| {
        let broker = Broker::default();
        b.iter(|| {
            broker.put_nowait(black_box(&payload), "default").unwrap();
            broker.queue().try_pop()
        });
    });

    let runtime = tokio::runtime::Runtime::new().unwrap();
    group.bench_function("put_get_roundtrip", |b| {
        let broker = Broker::default();
        b.iter(|| {
            runtime.block_on(async {
                broker.put(black_box(&payload), "default").await.unwrap();
                black_box(broker.get().await)
            })
        });
    });

    group.finish();
}

fn bench_propagate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evbus-propagate");
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let contexts = Contexts::new().with_profile("p1", "default", "prod-*", json!("cred"));

    for plugins in [1usize, 8, 32] {
        let broker = Arc::new(Broker::default());
        for i in 0..plugins {
            broker.register_ingress(RecordingIngress::new(&format!("sink-{i}"), &["p1"]));
        }

        group.throughput(Throughput::Elements(plugins as u64));
        group.bench_with_input(BenchmarkId::new("fanout", plugins), &plugins, |b, _| {
            b.iter(|| {
                let event = Event::new("prod-eu-1", br#"{"x":1}"#.to_vec());
                runtime.block_on(broker.propagate(&contexts, event)).unwrap()
            });
        });
    }

    group.finish();
}

fn bench_matchers(c: &mut Criterion) {
    let mut group = c.benchmark_group("evbus-matchers");
    let glob = GlobMatcher::new();
    let regex = RegexMatcher::new();

    group.bench_function("glob_find", |b| {
        b.iter(|| glob.find(black_box("prod-eu-1"), black_box("prod-*")));
    });
    group.bench_function("regex_find", |b| {
        b.iter(|| regex.find(black_box("prod-eu-1"), black_box(r"prod-\w+-\d+")));
    });

    group.finish();
}

criterion_group!(benches, bench_enqueue, bench_propagate, bench_matchers);
criterion_main!(benches);
