//! Short-lived cache of serialized broadcast frames.
//!
//! High fan-out events (leaderboard, question end, quiz start) are keyed by
//! type, room and broadcast second so the same event is encoded once. This is
//! a throughput optimization only; nothing may rely on it for idempotence.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::time::Instant;

use crate::{
    domain::{OutboundFrame, SessionId},
    infrastructure::dto::websocket::ServerMessageType,
};

/// A thread-safe TTL cache of encoded frames backed by `DashMap`.
///
/// Entries are evicted lazily on access and swept on every insert.
pub struct MarshalCache {
    inner: DashMap<String, (OutboundFrame, Instant)>,
    ttl: Duration,
}

impl MarshalCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: DashMap::new(),
            ttl,
        }
    }

    /// Only these message types are worth caching
    pub fn is_cacheable(kind: ServerMessageType) -> bool {
        matches!(
            kind,
            ServerMessageType::Leaderboard
                | ServerMessageType::QuestionEnd
                | ServerMessageType::QuizStart
        )
    }

    /// `{type}_{room}_{unix seconds}`
    pub fn key(kind: ServerMessageType, room_id: SessionId, timestamp: DateTime<Utc>) -> String {
        format!("{}_{}_{}", kind.as_str(), room_id, timestamp.timestamp())
    }

    pub fn get(&self, key: &str) -> Option<OutboundFrame> {
        if let Some(entry) = self.inner.get(key) {
            let (frame, inserted) = entry.value();
            if inserted.elapsed() < self.ttl {
                return Some(frame.clone());
            }
            // Expired: drop the read guard before removing
            drop(entry);
            self.inner.remove(key);
        }
        None
    }

    pub fn insert(&self, key: String, frame: OutboundFrame) {
        self.evict_expired();
        self.inner.insert(key, (frame, Instant::now()));
    }

    /// Return the cached frame, or encode it with `encode` and cache the result
    pub fn get_or_try_insert_with<E>(
        &self,
        key: String,
        encode: impl FnOnce() -> Result<OutboundFrame, E>,
    ) -> Result<OutboundFrame, E> {
        if let Some(frame) = self.get(&key) {
            return Ok(frame);
        }
        let frame = encode()?;
        self.insert(key, frame.clone());
        Ok(frame)
    }

    pub fn evict_expired(&self) {
        let ttl = self.ttl;
        self.inner.retain(|_, (_, inserted)| inserted.elapsed() < ttl);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_key_format_and_cacheable_types() {
        // テスト項目: キャッシュキーの形式と対象のメッセージタイプ
        // given (前提条件):
        let timestamp = DateTime::<Utc>::from_timestamp(1_700_000_000, 500_000_000).unwrap();

        // when (操作):
        let key = MarshalCache::key(
            ServerMessageType::Leaderboard,
            SessionId::new(12).unwrap(),
            timestamp,
        );

        // then (期待する結果):
        assert_eq!(key, "leaderboard_12_1700000000");
        assert!(MarshalCache::is_cacheable(ServerMessageType::QuizStart));
        assert!(MarshalCache::is_cacheable(ServerMessageType::QuestionEnd));
        assert!(!MarshalCache::is_cacheable(ServerMessageType::QuestionStart));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        // テスト項目: TTL を過ぎたエントリは返されず、再エンコードされる
        // given (前提条件):
        let cache = MarshalCache::new(Duration::from_secs(30));
        let mut encodes = 0;
        let mut encode = || -> Result<OutboundFrame, ()> {
            encodes += 1;
            Ok(Arc::from("frame"))
        };
        cache
            .get_or_try_insert_with("k".to_string(), &mut encode)
            .unwrap();

        // when (操作):
        cache
            .get_or_try_insert_with("k".to_string(), &mut encode)
            .unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        cache
            .get_or_try_insert_with("k".to_string(), &mut encode)
            .unwrap();

        // then (期待する結果):
        assert_eq!(encodes, 2);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_sweeps_expired_entries() {
        // テスト項目: 挿入時に期限切れのエントリが掃除される
        // given (前提条件):
        let cache = MarshalCache::new(Duration::from_secs(30));
        cache.insert("old".to_string(), Arc::from("a"));

        // when (操作):
        tokio::time::advance(Duration::from_secs(31)).await;
        cache.insert("new".to_string(), Arc::from("b"));

        // then (期待する結果):
        assert_eq!(cache.len(), 1);
        assert!(cache.get("old").is_none());
        assert_eq!(cache.get("new").as_deref(), Some("b"));
    }
}
