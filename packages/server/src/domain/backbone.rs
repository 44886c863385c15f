//! Cross-process broadcast backbone port.
//!
//! Shaped after a Redis-style pub/sub server: one logical channel per room,
//! a pattern subscription covering all of them, and per-room presence sets
//! with a renewing expiration.

use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{error::BackboneError, value_object::SessionId};

/// Pattern covering every room channel
pub const ROOM_CHANNEL_PATTERN: &str = "quiz:room:*";

/// Channel carrying the broadcasts of one room
pub fn room_channel(room_id: SessionId) -> String {
    format!("quiz:room:{room_id}")
}

/// Set of server ids currently serving a room
pub fn room_presence_key(room_id: SessionId) -> String {
    format!("quiz:room:{room_id}:servers")
}

/// Message received from a pattern subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackboneMessage {
    pub channel: String,
    pub payload: String,
}

/// Live pattern subscription. Yields `None` once the backbone shuts down.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<BackboneMessage>,
}

impl Subscription {
    pub fn new(rx: mpsc::UnboundedReceiver<BackboneMessage>) -> Self {
        Self { rx }
    }

    pub async fn recv(&mut self) -> Option<BackboneMessage> {
        self.rx.recv().await
    }

    /// Next message if one is already waiting
    pub fn try_recv(&mut self) -> Option<BackboneMessage> {
        self.rx.try_recv().ok()
    }
}

#[async_trait]
pub trait Backbone: Send + Sync {
    /// Publish on a channel. Returns the number of subscribers reached.
    async fn publish(&self, channel: &str, payload: String) -> Result<usize, BackboneError>;

    /// Subscribe to every channel matching `pattern` (trailing `*` wildcard)
    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, BackboneError>;

    /// Add `member` to the set at `key` and (re)set the key's expiration
    async fn add_presence(
        &self,
        key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), BackboneError>;

    async fn remove_presence(&self, key: &str, member: &str) -> Result<(), BackboneError>;

    /// Members of the set at `key`, empty if the key expired
    async fn presence_members(&self, key: &str) -> Result<Vec<String>, BackboneError>;
}
