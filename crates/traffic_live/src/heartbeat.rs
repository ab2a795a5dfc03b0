//! Periodic keep-alive to every subscriber.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::broadcaster::TopicBroadcaster;
use crate::scheduler::Pacer;

/// Running heartbeat task. Aborted on [HeartbeatHandle::stop] or drop.
#[derive(Debug)]
pub struct HeartbeatHandle {
    task: Option<JoinHandle<()>>,
}

impl HeartbeatHandle {
    pub fn stop(mut self) {
        self.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    fn abort(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("heartbeat stopped");
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Sleep `interval`, then ping every subscriber, forever. Must be called
/// from within a tokio runtime.
pub fn spawn_heartbeat(
    broadcaster: Arc<TopicBroadcaster>,
    interval: Duration,
    pacer: Arc<dyn Pacer>,
) -> HeartbeatHandle {
    info!(interval_secs = interval.as_secs_f64(), "heartbeat started");
    let task = tokio::spawn(async move {
        loop {
            pacer.sleep(interval).await;
            let pruned = broadcaster.heartbeat().await;
            debug!(pruned, "heartbeat sent");
        }
    });
    HeartbeatHandle { task: Some(task) }
}
