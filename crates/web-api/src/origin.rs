use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};
use domain::Origin;

use crate::state::AppState;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// 从请求中解析客户端来源地址。
///
/// 默认使用对端 IP。只有在部署于可信反向代理之后（`trust_forwarded_for`）
/// 才采用 `X-Forwarded-For` 的第一个地址。都拿不到时归入 `"unknown"`。
pub fn resolve_origin(
    peer: Option<SocketAddr>,
    headers: &HeaderMap,
    trust_forwarded_for: bool,
) -> Origin {
    if trust_forwarded_for {
        let forwarded = headers
            .get(FORWARDED_FOR)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        if let Some(first) = forwarded {
            return Origin::new(first);
        }
    }

    match peer {
        Some(addr) => Origin::new(addr.ip().to_string()),
        None => Origin::unknown(),
    }
}

/// 提取器：当前请求的来源地址
#[derive(Debug, Clone)]
pub struct ClientOrigin(pub Origin);

impl FromRequestParts<AppState> for ClientOrigin {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let peer = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Ok(ClientOrigin(resolve_origin(
            peer,
            &parts.headers,
            state.trust_forwarded_for,
        )))
    }
}
