//! HTTP API endpoint handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{
    domain::SessionId,
    infrastructure::dto::http::{
        CreateSessionRequest, CreateSessionResponse, ErrorResponse, JoinSessionQuery,
        JoinSessionResponse, RoomServersResponse,
    },
    ui::state::AppState,
    usecase::SessionSetupError,
};

/// `{code, message}` error body with its status
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                code: code.to_string(),
                message: message.into(),
            },
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message)
    }

    fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "INTERNAL_ERROR",
            "Internal server error",
        )
    }
}

impl From<SessionSetupError> for ApiError {
    fn from(error: SessionSetupError) -> Self {
        let status = match &error {
            SessionSetupError::QuizNotFound | SessionSetupError::SessionNotFound => {
                StatusCode::NOT_FOUND
            }
            SessionSetupError::InvalidJoinCode(_) => StatusCode::BAD_REQUEST,
            SessionSetupError::NotJoinable(_) | SessionSetupError::SessionFull => {
                StatusCode::CONFLICT
            }
            SessionSetupError::JoinCodeExhausted(_) | SessionSetupError::Repository(_) => {
                tracing::error!(error = %error, "Session setup failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, error.code(), error.message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// Health check endpoint
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

/// Create a session for a quiz with the caller as host
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    request: Result<Json<CreateSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateSessionResponse>), ApiError> {
    let Json(request) = request.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let created = state
        .create_session_usecase
        .execute(request.quiz_id, request.user_id, request.nickname)
        .await?;

    // ホストの参加者は必ず user_id を持つ
    let host_user_id = created.host.user_id.ok_or_else(|| {
        tracing::error!(session_id = %created.session.id, "Host participant has no user id");
        ApiError::internal()
    })?;

    // Domain Model から DTO への変換
    let join_code = created.session.join_code.to_string();
    let response = CreateSessionResponse {
        session_id: created.session.id,
        join_url: format!("/games/join/{join_code}"),
        join_code,
        quiz_title: created.quiz.title,
        host_name: created.host.nickname,
        host_user_id,
        is_host: true,
        max_participants: created.session.max_participants,
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// Join a waiting session by its join code
pub async fn join_session(
    State(state): State<Arc<AppState>>,
    Path(join_code): Path<String>,
    query: Result<Query<JoinSessionQuery>, QueryRejection>,
) -> Result<Json<JoinSessionResponse>, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let joined = state
        .join_session_usecase
        .execute(&join_code, query.user_id, query.nickname)
        .await?;

    let user_id = joined.participant.user_id.ok_or_else(|| {
        tracing::error!(participant_id = %joined.participant.id, "Participant has no user id");
        ApiError::internal()
    })?;

    // Domain Model から DTO への変換
    Ok(Json(JoinSessionResponse {
        session_id: joined.session.id,
        join_code: joined.session.join_code.to_string(),
        participant_id: joined.participant.id,
        user_id,
        nickname: joined.participant.nickname,
        is_host: joined.participant.is_host,
        quiz_title: joined.quiz_title,
        status: joined.session.status,
        participant_count: joined.session.participant_count,
        max_participants: joined.session.max_participants,
    }))
}

/// Servers currently holding connections for a room
pub async fn get_room_servers(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<RoomServersResponse>, ApiError> {
    let session_id: SessionId = session_id
        .parse()
        .map_err(|e: crate::domain::ValueObjectError| ApiError::bad_request(e.to_string()))?;

    let servers = state
        .get_room_servers_usecase
        .execute(session_id)
        .await
        .map_err(|e| {
            tracing::error!(session_id = %session_id, error = %e, "Failed to read room presence");
            ApiError::internal()
        })?;

    Ok(Json(RoomServersResponse {
        session_id: servers.session_id,
        servers: servers.servers,
        local_server_id: servers.local_server_id.to_string(),
        local_connections: servers.local_connections,
    }))
}
