use std::sync::Arc;

use application::ChatCoordinator;
use tokio::sync::broadcast;

use crate::protocol::ServerFrame;

/// 广播通道容量，慢连接落后超过该值时会丢帧
const BROADCAST_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<ChatCoordinator>,
    pub broadcaster: broadcast::Sender<ServerFrame>,
    /// 是否信任 `X-Forwarded-For` 作为来源地址
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(coordinator: Arc<ChatCoordinator>, trust_forwarded_for: bool) -> Self {
        let (broadcaster, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            coordinator,
            broadcaster,
            trust_forwarded_for,
        }
    }

    /// 向所有在线连接广播；没有订阅者时直接丢弃
    pub fn broadcast(&self, frame: ServerFrame) {
        if self.broadcaster.send(frame).is_err() {
            tracing::debug!("no subscribers for broadcast frame");
        }
    }

    pub fn broadcast_users(&self) {
        self.broadcast(ServerFrame::users(self.coordinator.current_users()));
    }
}
