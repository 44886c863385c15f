//! Messages exchanged between hubs over the backbone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::SessionId;

/// A room broadcast replicated to sibling processes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossServerMessage {
    /// Publishing process; receivers skip their own messages
    pub server_id: String,
    pub room_id: SessionId,
    /// Serialized outbound frame, delivered as-is
    pub message: String,
    /// Connection the publisher excluded (usually the sender)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_client: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cross_server_message_field_names() {
        // テスト項目: サーバー間メッセージのフィールド名
        // given (前提条件):
        let message = CrossServerMessage {
            server_id: "server-1-abcdefgh".to_string(),
            room_id: SessionId::new(9).unwrap(),
            message: r#"{"type":"pong"}"#.to_string(),
            exclude_client: Some("c1".to_string()),
            timestamp: Utc::now(),
        };

        // when (操作):
        let value = serde_json::to_value(&message).unwrap();

        // then (期待する結果):
        assert_eq!(value["server_id"], "server-1-abcdefgh");
        assert_eq!(value["room_id"], 9);
        assert_eq!(value["exclude_client"], "c1");
        assert!(value["timestamp"].is_string());
        let decoded: CrossServerMessage = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, message);
    }
}
