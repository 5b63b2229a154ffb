//! # Test Fixtures
//!
//! Ingress plugins with observable behavior, shared by the integration
//! tests and the benchmarks.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evbus::{DeliveryContext, IngressPlugin};
use parking_lot::Mutex;

/// Records every delivery it receives.
pub struct RecordingIngress {
    name: String,
    acct: Vec<String>,
    calls: AtomicUsize,
    received: Mutex<Vec<(DeliveryContext, Vec<u8>)>>,
}

impl RecordingIngress {
    pub fn new(name: &str, acct: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            acct: acct.iter().map(|a| a.to_string()).collect(),
            calls: AtomicUsize::new(0),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn received(&self) -> Vec<(DeliveryContext, Vec<u8>)> {
        self.received.lock().clone()
    }
}

#[async_trait]
impl IngressPlugin for RecordingIngress {
    fn name(&self) -> &str {
        &self.name
    }

    fn acct(&self) -> Vec<String> {
        self.acct.clone()
    }

    async fn publish(&self, ctx: &DeliveryContext, body: &[u8]) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.received.lock().push((ctx.clone(), body.to_vec()));
        Ok(())
    }
}

/// How a [`FaultyIngress`] misbehaves.
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    /// Return an error with the message `boom`.
    Error,
    /// Panic inside `publish`.
    Panic,
    /// Sleep before succeeding.
    Slow(Duration),
}

/// Counts calls and misbehaves on every one of them.
pub struct FaultyIngress {
    name: String,
    acct: Vec<String>,
    fault: Fault,
    calls: AtomicUsize,
}

impl FaultyIngress {
    pub fn new(name: &str, acct: &[&str], fault: Fault) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            acct: acct.iter().map(|a| a.to_string()).collect(),
            fault,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IngressPlugin for FaultyIngress {
    fn name(&self) -> &str {
        &self.name
    }

    fn acct(&self) -> Vec<String> {
        self.acct.clone()
    }

    async fn publish(&self, _ctx: &DeliveryContext, _body: &[u8]) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.fault {
            Fault::Error => anyhow::bail!("boom"),
            Fault::Panic => panic!("ingress '{}' exploded", self.name),
            Fault::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}
