//! Single-host backbone.
//!
//! Every hub sharing one `InMemoryBackbone` behaves like a separate server
//! process attached to the same pub/sub server. Presence sets expire lazily,
//! checked against the tokio clock.

use std::{
    collections::HashSet,
    sync::{Mutex, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::{sync::mpsc, time::Instant};

use crate::domain::{Backbone, BackboneError, BackboneMessage, Subscription};

struct PatternSubscriber {
    prefix: String,
    exact: bool,
    tx: mpsc::UnboundedSender<BackboneMessage>,
}

impl PatternSubscriber {
    fn matches(&self, channel: &str) -> bool {
        if self.exact {
            channel == self.prefix
        } else {
            channel.starts_with(&self.prefix)
        }
    }
}

struct PresenceSet {
    members: HashSet<String>,
    expires_at: Instant,
}

#[derive(Default)]
pub struct InMemoryBackbone {
    subscribers: Mutex<Vec<PatternSubscriber>>,
    presence: DashMap<String, PresenceSet>,
}

impl InMemoryBackbone {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backbone for InMemoryBackbone {
    async fn publish(&self, channel: &str, payload: String) -> Result<usize, BackboneError> {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let mut delivered = 0;
        subscribers.retain(|sub| {
            if !sub.matches(channel) {
                return !sub.tx.is_closed();
            }
            let message = BackboneMessage {
                channel: channel.to_string(),
                payload: payload.clone(),
            };
            match sub.tx.send(message) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => false,
            }
        });
        Ok(delivered)
    }

    async fn psubscribe(&self, pattern: &str) -> Result<Subscription, BackboneError> {
        let (prefix, exact) = match pattern.strip_suffix('*') {
            Some(prefix) => (prefix, false),
            None => (pattern, true),
        };
        if (prefix.is_empty() && exact) || prefix.contains('*') {
            return Err(BackboneError::InvalidPattern(pattern.to_string()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(PatternSubscriber {
                prefix: prefix.to_string(),
                exact,
                tx,
            });
        Ok(Subscription::new(rx))
    }

    async fn add_presence(
        &self,
        key: &str,
        member: &str,
        ttl: Duration,
    ) -> Result<(), BackboneError> {
        let now = Instant::now();
        let mut entry = self
            .presence
            .entry(key.to_string())
            .or_insert_with(|| PresenceSet {
                members: HashSet::new(),
                expires_at: now,
            });
        if entry.expires_at <= now {
            entry.members.clear();
        }
        entry.members.insert(member.to_string());
        entry.expires_at = now + ttl;
        Ok(())
    }

    async fn remove_presence(&self, key: &str, member: &str) -> Result<(), BackboneError> {
        self.presence.remove_if_mut(key, |_, set| {
            set.members.remove(member);
            set.members.is_empty()
        });
        Ok(())
    }

    async fn presence_members(&self, key: &str) -> Result<Vec<String>, BackboneError> {
        let now = Instant::now();
        if let Some(entry) = self.presence.get(key) {
            if entry.expires_at > now {
                let mut members: Vec<String> = entry.members.iter().cloned().collect();
                members.sort();
                return Ok(members);
            }
            // Expired: drop the read guard before removing
            drop(entry);
            self.presence.remove_if(key, |_, set| set.expires_at <= now);
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_matching_pattern_subscribers_only() {
        // テスト項目: パターンに一致するチャンネルの購読者にだけ配信される
        // given (前提条件):
        let backbone = InMemoryBackbone::new();
        let mut rooms = backbone.psubscribe("quiz:room:*").await.unwrap();
        let mut exact = backbone.psubscribe("other").await.unwrap();

        // when (操作):
        let delivered = backbone
            .publish("quiz:room:1", "hello".to_string())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(delivered, 1);
        let message = rooms.recv().await.unwrap();
        assert_eq!(message.channel, "quiz:room:1");
        assert_eq!(message.payload, "hello");
        assert_eq!(exact.try_recv(), None);
    }

    #[tokio::test]
    async fn test_invalid_pattern_is_rejected() {
        // テスト項目: 途中にワイルドカードを含むパターンは拒否される
        // given (前提条件):
        let backbone = InMemoryBackbone::new();

        // when (操作):
        let result = backbone.psubscribe("quiz:*:servers").await;

        // then (期待する結果):
        assert!(matches!(result, Err(BackboneError::InvalidPattern(_))));
    }

    #[tokio::test]
    async fn test_dropped_subscription_is_pruned() {
        // テスト項目: 破棄された購読には配信されず、購読者一覧から除かれる
        // given (前提条件):
        let backbone = InMemoryBackbone::new();
        let subscription = backbone.psubscribe("quiz:room:*").await.unwrap();
        drop(subscription);

        // when (操作):
        let delivered = backbone
            .publish("quiz:room:1", "x".to_string())
            .await
            .unwrap();

        // then (期待する結果):
        assert_eq!(delivered, 0);
        assert!(backbone.subscribers.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_presence_expires_and_renews() {
        // テスト項目: プレゼンスは TTL で失効し、追加のたびに期限が延長される
        // given (前提条件):
        let backbone = InMemoryBackbone::new();
        let ttl = Duration::from_secs(60);
        backbone.add_presence("k", "server-a", ttl).await.unwrap();

        // when (操作): 期限の直前に更新し、その後さらに時間を進める
        tokio::time::advance(Duration::from_secs(50)).await;
        backbone.add_presence("k", "server-b", ttl).await.unwrap();
        tokio::time::advance(Duration::from_secs(50)).await;
        let renewed = backbone.presence_members("k").await.unwrap();
        tokio::time::advance(Duration::from_secs(11)).await;
        let expired = backbone.presence_members("k").await.unwrap();

        // then (期待する結果):
        assert_eq!(renewed, vec!["server-a", "server-b"]);
        assert!(expired.is_empty());
    }

    #[tokio::test]
    async fn test_remove_presence_deletes_empty_set() {
        // テスト項目: 最後のメンバーを削除するとキー自体が削除される
        // given (前提条件):
        let backbone = InMemoryBackbone::new();
        let ttl = Duration::from_secs(60);
        backbone.add_presence("k", "server-a", ttl).await.unwrap();

        // when (操作):
        backbone.remove_presence("k", "server-a").await.unwrap();

        // then (期待する結果):
        assert!(backbone.presence_members("k").await.unwrap().is_empty());
        assert!(!backbone.presence.contains_key("k"));
    }
}
