//! UseCase: ルームを担当しているサーバー一覧の取得（運用向け）

use std::sync::Arc;

use crate::domain::{Backbone, BackboneError, Hub, ServerId, SessionId, room_presence_key};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomServers {
    pub session_id: SessionId,
    /// プレゼンスに登録されているサーバー ID（ソート済み）
    pub servers: Vec<String>,
    pub local_server_id: ServerId,
    pub local_connections: usize,
}

pub struct GetRoomServersUseCase {
    server_id: ServerId,
    backbone: Arc<dyn Backbone>,
    hub: Arc<dyn Hub>,
}

impl GetRoomServersUseCase {
    pub fn new(server_id: ServerId, backbone: Arc<dyn Backbone>, hub: Arc<dyn Hub>) -> Self {
        Self {
            server_id,
            backbone,
            hub,
        }
    }

    pub async fn execute(&self, session_id: SessionId) -> Result<RoomServers, BackboneError> {
        let mut servers = self
            .backbone
            .presence_members(&room_presence_key(session_id))
            .await?;
        servers.sort();
        let local_connections = self.hub.room_client_count(session_id).await;
        Ok(RoomServers {
            session_id,
            servers,
            local_server_id: self.server_id.clone(),
            local_connections,
        })
    }
}
