use async_trait::async_trait;
use domain::{ChatMessage, ConnectionId, DisplayName};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("message store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// 聊天消息存储（外部协作者）。
///
/// 只追加；`get_last` 返回最新的 `count` 条，按时间从旧到新排列。
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn append(&self, message: ChatMessage) -> Result<(), StoreError>;

    async fn get_last(&self, count: usize) -> Result<Vec<ChatMessage>, StoreError>;

    /// 改写该连接此前所有消息的作者名。
    async fn rename_author(
        &self,
        connection_id: ConnectionId,
        name: DisplayName,
    ) -> Result<(), StoreError>;
}
