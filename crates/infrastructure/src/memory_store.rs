use std::collections::VecDeque;

use application::{MessageStore, StoreError};
use async_trait::async_trait;
use domain::{ChatMessage, ConnectionId, DisplayName};
use tokio::sync::RwLock;

/// 内存中的滚动消息存储
///
/// 最多保留 `capacity` 条，超出时淘汰最旧的消息。进程重启后清空。
pub struct MemoryMessageStore {
    capacity: usize,
    messages: RwLock<VecDeque<ChatMessage>>,
}

impl MemoryMessageStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            messages: RwLock::new(VecDeque::with_capacity(capacity.min(4096))),
        }
    }

    pub async fn len(&self) -> usize {
        self.messages.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.messages.read().await.is_empty()
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, message: ChatMessage) -> Result<(), StoreError> {
        let mut messages = self.messages.write().await;
        while messages.len() >= self.capacity {
            messages.pop_front();
        }
        messages.push_back(message);
        Ok(())
    }

    async fn get_last(&self, count: usize) -> Result<Vec<ChatMessage>, StoreError> {
        let messages = self.messages.read().await;
        let skip = messages.len().saturating_sub(count);
        Ok(messages.iter().skip(skip).cloned().collect())
    }

    async fn rename_author(
        &self,
        connection_id: ConnectionId,
        name: DisplayName,
    ) -> Result<(), StoreError> {
        let mut messages = self.messages.write().await;
        let mut renamed = 0usize;
        for message in messages
            .iter_mut()
            .filter(|message| message.connection_id == connection_id)
        {
            message.rename_author(&name);
            renamed += 1;
        }
        tracing::debug!(
            connection_id = %connection_id,
            display_name = %name,
            renamed,
            "renamed author in history"
        );
        Ok(())
    }
}
