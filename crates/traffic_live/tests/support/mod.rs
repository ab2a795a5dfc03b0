#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use traffic_core::test_helpers::test_simulator;
use traffic_live::{
    Connection, ConnectionId, LiveConfig, Pacer, Payload, SendError, TrafficService,
};

/// Tokio time that remembers every requested sleep.
#[derive(Debug, Default)]
pub struct RecordingPacer {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingPacer {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }
}

#[async_trait]
impl Pacer for RecordingPacer {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
        tokio::time::sleep(duration).await;
    }
}

/// A connection whose every send fails.
#[derive(Debug)]
pub struct FailingConnection {
    id: ConnectionId,
}

impl FailingConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::next(),
        })
    }
}

#[async_trait]
impl Connection for FailingConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, _payload: Payload) -> Result<(), SendError> {
        Err(SendError::Transport("peer reset".to_string()))
    }
}

/// A connection whose handshake fails.
#[derive(Debug)]
pub struct RejectingConnection {
    id: ConnectionId,
}

impl RejectingConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::next(),
        })
    }
}

#[async_trait]
impl Connection for RejectingConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn accept(&self) -> Result<(), SendError> {
        Err(SendError::Closed)
    }

    async fn send(&self, _payload: Payload) -> Result<(), SendError> {
        Ok(())
    }
}

/// A connection that panics on its first send and counts the rest.
#[derive(Debug)]
pub struct PanicOnceConnection {
    id: ConnectionId,
    panicked: AtomicBool,
    delivered: AtomicUsize,
}

impl PanicOnceConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::next(),
            panicked: AtomicBool::new(false),
            delivered: AtomicUsize::new(0),
        })
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for PanicOnceConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, _payload: Payload) -> Result<(), SendError> {
        if !self.panicked.swap(true, Ordering::SeqCst) {
            panic!("transport bug");
        }
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A connection whose sends wait until the test opens the gate.
#[derive(Debug)]
pub struct GatedConnection {
    id: ConnectionId,
    gate: Semaphore,
    delivered: AtomicUsize,
}

impl GatedConnection {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ConnectionId::next(),
            gate: Semaphore::new(0),
            delivered: AtomicUsize::new(0),
        })
    }

    /// Let every pending and future send through.
    pub fn open(&self) {
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }

    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for GatedConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, _payload: Payload) -> Result<(), SendError> {
        let _permit = self.gate.acquire().await.map_err(|_| SendError::Closed)?;
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Seeded service over a small fixture network, paced by a [RecordingPacer].
pub fn test_service(config: LiveConfig) -> (TrafficService, Arc<RecordingPacer>) {
    let (simulator, _clock) = test_simulator(5, 12);
    let pacer = Arc::new(RecordingPacer::default());
    let service = TrafficService::with_pacer(config.with_seed(42), simulator, pacer.clone())
        .expect("valid config");
    (service, pacer)
}

/// Everything queued on `rx` right now.
pub fn drain(rx: &mut UnboundedReceiver<Payload>) -> Vec<Payload> {
    let mut out = Vec::new();
    while let Ok(payload) = rx.try_recv() {
        out.push(payload);
    }
    out
}
