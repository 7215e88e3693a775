//! Delivery of domain events to the system of record.
//!
//! Delivery is best effort. The confirmation engine treats an error the
//! same as `online: false` and applies the local mutation either way.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use stacker_core::events::DomainEvent;
use stacker_core::types::UserId;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::DialogueError;

/// Channel capacity for live subscribers.
const CHANNEL_CAPACITY: usize = 256;

/// Whether the event reached a live consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BroadcastReceipt {
    pub online: bool,
}

#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn send(&self, user: &UserId, event: &DomainEvent)
        -> Result<BroadcastReceipt, DialogueError>;
}

// =============================================================================
// In-process channel
// =============================================================================

/// Fans events out to in-process subscribers. Online iff someone is subscribed.
#[derive(Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<DomainEvent>,
}

impl Default for ChannelBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelBroadcaster {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn send(
        &self,
        user: &UserId,
        event: &DomainEvent,
    ) -> Result<BroadcastReceipt, DialogueError> {
        // send only fails when there are no receivers
        let online = self.tx.send(event.clone()).is_ok();
        debug!(user = %user, event_type = %event.event_type, online, "Event broadcast");
        Ok(BroadcastReceipt { online })
    }
}

// =============================================================================
// File outbox
// =============================================================================

/// Appends events as JSON lines for a later sync. Never online.
pub struct OutboxBroadcaster {
    path: PathBuf,
}

impl OutboxBroadcaster {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Broadcaster for OutboxBroadcaster {
    async fn send(
        &self,
        user: &UserId,
        event: &DomainEvent,
    ) -> Result<BroadcastReceipt, DialogueError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| DialogueError::Broadcast(e.to_string()))?;
        }
        let mut line = serde_json::to_string(event)
            .map_err(|e| DialogueError::Broadcast(e.to_string()))?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| DialogueError::Broadcast(e.to_string()))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| DialogueError::Broadcast(e.to_string()))?;

        debug!(user = %user, event_id = %event.event_id, path = %self.path.display(), "Event queued in outbox");
        Ok(BroadcastReceipt { online: false })
    }
}
