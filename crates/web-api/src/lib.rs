//! Web API 层。
//!
//! 提供 Axum 路由：WebSocket 聊天中枢，以及供非实时客户端使用的少量 HTTP 接口。
//! 所有准入决策都委托给应用层的 `ChatCoordinator`。

mod error;
mod guard;
mod origin;
mod protocol;
mod routes;
mod state;
mod ws_connection;

pub use error::{ApiError, ErrorBody};
pub use origin::{resolve_origin, ClientOrigin};
pub use protocol::{ClientFrame, ServerFrame, UserEntry};
pub use routes::router;
pub use state::AppState;
