use application::SendMessageRequest;
use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Response,
    routing::get,
    Json, Router,
};
use domain::{Message, RoomId, Timestamp, UserId};
use serde::Deserialize;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::{error::ApiError, state::AppState, ws_connection::ChatConnection};

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    /// 只返回该时间之后发送的消息（RFC 3339），用于断线重连补拉
    since: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageBody {
    message: String,
    receiver_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    token: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes())
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/rooms/{room_id}/messages",
            get(get_history).post(send_message),
        )
        .route("/ws", get(websocket_upgrade))
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn get_history(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    Query(query): Query<HistoryQuery>,
    headers: HeaderMap,
) -> Result<Json<Vec<Message>>, ApiError> {
    let user_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let messages = state
        .chat_service
        .history(user_id, RoomId::from(room_id), query.since)
        .await?;

    Ok(Json(messages))
}

/// REST 发送与 WebSocket `sendMessage` 走同一条校验、持久化和广播路径
async fn send_message(
    State(state): State<AppState>,
    Path(room_id): Path<Uuid>,
    headers: HeaderMap,
    Json(body): Json<SendMessageBody>,
) -> Result<(StatusCode, Json<Message>), ApiError> {
    let sender_id = state.jwt_service.extract_user_from_headers(&headers)?;
    let message = state
        .chat_service
        .send_message(SendMessageRequest {
            room_id: RoomId::from(room_id),
            sender_id,
            body: body.message,
            receiver_id: body.receiver_id.map(UserId::from),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(message)))
}

/// 升级前完成认证：token 可以放在 `?token=` 或 Authorization 头中
async fn websocket_upgrade(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let user_id = match query.token.as_deref() {
        Some(token) => state.jwt_service.verify_token(token)?,
        None => state.jwt_service.extract_user_from_headers(&headers)?,
    };

    Ok(ws.on_upgrade(move |socket| ChatConnection::new(socket, state, user_id).run()))
}
