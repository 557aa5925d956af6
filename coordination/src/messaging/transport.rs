//! Transport trait and the in-memory loopback implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::envelope::{Envelope, MessageId, Priority};
use crate::registry::AgentId;

/// Broadcast capacity of the loopback transport.
const CHANNEL_CAPACITY: usize = 256;

/// Errors reported by the messaging substrate.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    #[error("unknown channel: {0}")]
    UnknownChannel(String),
}

/// Per-send options. Priority is honored by the substrate, not the core.
#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    pub priority: Priority,
}

impl SendOptions {
    pub fn priority(priority: Priority) -> Self {
        Self { priority }
    }
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            priority: Priority::Normal,
        }
    }
}

/// Contract the coordination core consumes from the messaging substrate.
///
/// Delivery is at-least-once/best-effort: a returned `MessageId` means the
/// substrate accepted the message, not that every recipient observed it.
#[async_trait]
pub trait MessageTransport: Send + Sync {
    /// Direct-deliver to the envelope's recipients.
    async fn send_message(
        &self,
        envelope: Envelope,
        opts: SendOptions,
    ) -> Result<MessageId, TransportError>;

    /// Deliver to every registered agent.
    async fn broadcast_message(
        &self,
        envelope: Envelope,
        opts: SendOptions,
    ) -> Result<MessageId, TransportError>;

    /// Publish to a named topic.
    async fn publish_to_topic(
        &self,
        topic: &str,
        envelope: Envelope,
        opts: SendOptions,
    ) -> Result<MessageId, TransportError>;

    /// Join an agent to a channel.
    async fn add_participant_to_channel(
        &self,
        channel: &str,
        agent: &AgentId,
    ) -> Result<(), TransportError>;
}

/// Shared reference to a transport implementation.
pub type SharedTransport = Arc<dyn MessageTransport>;

/// In-memory transport backed by a Tokio broadcast channel.
///
/// Keeps a log of every accepted envelope so tests and local supervisors
/// can inspect outbound traffic without subscribing ahead of time.
pub struct InMemoryTransport {
    sender: broadcast::Sender<Envelope>,
    log: RwLock<Vec<Envelope>>,
    channels: RwLock<HashMap<String, Vec<AgentId>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            sender,
            log: RwLock::new(Vec::new()),
            channels: RwLock::new(HashMap::new()),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Subscribe to all envelopes flowing through this transport.
    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.sender.subscribe()
    }

    /// Snapshot of every envelope accepted so far, in order.
    pub async fn sent(&self) -> Vec<Envelope> {
        self.log.read().await.clone()
    }

    /// Envelopes whose content matches the given wire discriminator.
    pub async fn sent_of_type(&self, message_type: &str) -> Vec<Envelope> {
        self.log
            .read()
            .await
            .iter()
            .filter(|e| e.content.message_type() == message_type)
            .cloned()
            .collect()
    }

    /// Members of a channel.
    pub async fn channel_members(&self, channel: &str) -> Vec<AgentId> {
        self.channels
            .read()
            .await
            .get(channel)
            .cloned()
            .unwrap_or_default()
    }

    async fn accept(&self, envelope: Envelope, opts: SendOptions) -> MessageId {
        let id = envelope.id.clone();
        debug!(
            message_id = %id,
            message_type = envelope.content.message_type(),
            priority = %opts.priority,
            "envelope accepted"
        );
        self.log.write().await.push(envelope.clone());
        // No receivers is fine — the log is the source of truth for tests.
        let _ = self.sender.send(envelope);
        id
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageTransport for InMemoryTransport {
    async fn send_message(
        &self,
        envelope: Envelope,
        opts: SendOptions,
    ) -> Result<MessageId, TransportError> {
        Ok(self.accept(envelope, opts).await)
    }

    async fn broadcast_message(
        &self,
        envelope: Envelope,
        opts: SendOptions,
    ) -> Result<MessageId, TransportError> {
        Ok(self.accept(envelope, opts).await)
    }

    async fn publish_to_topic(
        &self,
        _topic: &str,
        envelope: Envelope,
        opts: SendOptions,
    ) -> Result<MessageId, TransportError> {
        Ok(self.accept(envelope, opts).await)
    }

    async fn add_participant_to_channel(
        &self,
        channel: &str,
        agent: &AgentId,
    ) -> Result<(), TransportError> {
        let mut channels = self.channels.write().await;
        let members = channels.entry(channel.to_string()).or_default();
        if !members.contains(agent) {
            members.push(agent.clone());
        }
        Ok(())
    }
}
