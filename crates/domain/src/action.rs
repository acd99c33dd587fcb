use std::fmt;

use serde::{Deserialize, Serialize};

/// 受限流约束的客户端动作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Connect,
    ChangeName,
    SendMessage,
    GetHistory,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Connect => "connect",
            ActionKind::ChangeName => "changeName",
            ActionKind::SendMessage => "sendMessage",
            ActionKind::GetHistory => "getHistory",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
