use serde::{Deserialize, Serialize};

use crate::value_objects::{ConnectionId, DisplayName, MessageId, Timestamp};

/// 聊天消息。
///
/// 追加到存储后不可变，唯一例外是 `user_name`：
/// 所属连接改名时可以被原地改写。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: MessageId,
    pub connection_id: ConnectionId,
    pub user_name: String,
    pub text: String,
    pub timestamp: Timestamp,
}

impl ChatMessage {
    pub const MAX_TEXT_CHARS: usize = 500;

    pub fn new(
        connection_id: ConnectionId,
        author: &DisplayName,
        text: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: MessageId::generate(),
            connection_id,
            user_name: author.as_str().to_owned(),
            text: text.into(),
            timestamp,
        }
    }

    pub fn rename_author(&mut self, name: &DisplayName) {
        self.user_name = name.as_str().to_owned();
    }
}
