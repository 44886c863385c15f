//! Server state shared by the HTTP and WebSocket handlers.

use std::sync::Arc;

use crate::{
    config::ConnectionSettings,
    domain::MessageHandler,
    infrastructure::RoomHub,
    usecase::{CreateSessionUseCase, GetRoomServersUseCase, JoinSessionUseCase},
};

/// Shared application state
pub struct AppState {
    /// Hub（ルームごとの接続管理とサーバー間ブロードキャスト）
    pub hub: Arc<RoomHub>,
    /// Hub に登録したメッセージハンドラー
    ///
    /// Hub は弱参照しか持たないため、ここで生存させる。
    pub message_handler: Arc<dyn MessageHandler>,
    /// CreateSessionUseCase（セッション作成のユースケース）
    pub create_session_usecase: Arc<CreateSessionUseCase>,
    /// JoinSessionUseCase（セッション参加のユースケース）
    pub join_session_usecase: Arc<JoinSessionUseCase>,
    /// GetRoomServersUseCase（ルーム担当サーバー取得のユースケース）
    pub get_room_servers_usecase: Arc<GetRoomServersUseCase>,
    /// WebSocket 接続ごとの設定
    pub connection: ConnectionSettings,
}
