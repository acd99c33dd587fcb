use application::BanStatus;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::{error::ApiError, origin::ClientOrigin, state::AppState};

/// 封禁守卫：被封禁的来源直接得到 403，不进入后续处理
pub async fn ban_guard(
    State(state): State<AppState>,
    ClientOrigin(origin): ClientOrigin,
    request: Request,
    next: Next,
) -> Response {
    match state.coordinator.bans().check(&origin) {
        BanStatus::Banned { remaining, .. } => {
            tracing::debug!(origin = %origin, path = %request.uri().path(), "拒绝被封禁来源的请求");
            ApiError::banned(remaining).into_response()
        }
        BanStatus::NotBanned => next.run(request).await,
    }
}
