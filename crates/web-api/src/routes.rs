use axum::{
    extract::{ws::WebSocketUpgrade, Query, State},
    http::StatusCode,
    middleware,
    response::Response,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use application::HistoryOutcome;
use domain::ChatMessage;

use crate::{
    error::ApiError, guard::ban_guard, origin::ClientOrigin, protocol::UserEntry,
    state::AppState, ws_connection::WebSocketConnection,
};

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    count: Option<i64>,
}

#[derive(Debug, Serialize)]
struct HistoryResponse {
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct UsersResponse {
    users: Vec<UserEntry>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_routes(state.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes(state: AppState) -> Router<AppState> {
    let guarded = Router::new()
        .route("/messages", get(get_history))
        .route("/users", get(list_users))
        .route_layer(middleware::from_fn_with_state(state, ban_guard));

    Router::new()
        .route("/ws", get(websocket_upgrade))
        .merge(guarded)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

async fn get_history(
    State(state): State<AppState>,
    ClientOrigin(origin): ClientOrigin,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let requested = query.count.unwrap_or(50);
    match state.coordinator.recent_messages(&origin, requested).await? {
        HistoryOutcome::Results { messages } => Ok(Json(HistoryResponse { messages })),
        HistoryOutcome::Banned { retry_after } => Err(ApiError::banned(retry_after)),
    }
}

async fn list_users(State(state): State<AppState>) -> Json<UsersResponse> {
    let users = state
        .coordinator
        .current_users()
        .into_iter()
        .map(UserEntry::from)
        .collect();
    Json(UsersResponse { users })
}

async fn websocket_upgrade(
    State(state): State<AppState>,
    ClientOrigin(origin): ClientOrigin,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| WebSocketConnection::new(state, origin).run(socket))
}
