//! Subscriber connection abstraction.
//!
//! The transport (websocket, SSE, in-process channel) lives behind
//! [Connection]; the broadcaster only needs an identity and an async send.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::SendError;

/// A message as pushed to subscribers. Shared so fan-out doesn't copy it.
pub type Payload = Arc<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Fresh process-wide id.
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Handle to one live subscriber connection.
#[async_trait]
pub trait Connection: Send + Sync {
    fn id(&self) -> ConnectionId;

    /// Transport handshake, run once before the first send.
    async fn accept(&self) -> Result<(), SendError> {
        Ok(())
    }

    async fn send(&self, payload: Payload) -> Result<(), SendError>;
}

/// In-process connection backed by an unbounded channel. Sends fail once the
/// receiving half is dropped.
#[derive(Debug)]
pub struct ChannelConnection {
    id: ConnectionId,
    tx: mpsc::UnboundedSender<Payload>,
}

impl ChannelConnection {
    pub fn pair() -> (Arc<Self>, mpsc::UnboundedReceiver<Payload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Self {
            id: ConnectionId::next(),
            tx,
        };
        (Arc::new(connection), rx)
    }
}

#[async_trait]
impl Connection for ChannelConnection {
    fn id(&self) -> ConnectionId {
        self.id
    }

    async fn send(&self, payload: Payload) -> Result<(), SendError> {
        self.tx.send(payload).map_err(|_| SendError::Closed)
    }
}
