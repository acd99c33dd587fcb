//! WebSocket 帧格式。
//!
//! 所有帧都是带 `type` 标签的 JSON 对象，字段使用 camelCase。

use application::BanNotice;
use domain::{ChatMessage, ConnectionId, DisplayName};
use serde::{Deserialize, Serialize};

/// 客户端发来的帧
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientFrame {
    ChangeName {
        name: String,
    },
    SendMessage {
        text: String,
    },
    GetHistory {
        #[serde(default = "default_history_count")]
        count: i64,
    },
}

fn default_history_count() -> i64 {
    50
}

/// 服务端推送的帧
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerFrame {
    Welcome { connection_id: ConnectionId },
    NameChanged { name: String },
    NameTaken { name: String },
    Message(ChatMessage),
    History { messages: Vec<ChatMessage> },
    Users { users: Vec<UserEntry> },
    Banned(BanNotice),
    CapacityExceeded { message: String },
    Error { message: String },
}

impl ServerFrame {
    pub fn users(users: Vec<(ConnectionId, DisplayName)>) -> Self {
        ServerFrame::Users {
            users: users.into_iter().map(UserEntry::from).collect(),
        }
    }

    pub fn capacity_exceeded() -> Self {
        ServerFrame::CapacityExceeded {
            message: "Too many connections from your address.".to_owned(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerFrame::Error {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEntry {
    pub connection_id: ConnectionId,
    pub name: String,
}

impl From<(ConnectionId, DisplayName)> for UserEntry {
    fn from((connection_id, name): (ConnectionId, DisplayName)) -> Self {
        Self {
            connection_id,
            name: name.as_str().to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::{Clock, SystemClock};
    use std::time::Duration;

    #[test]
    fn client_frames_use_type_tag() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"type":"sendMessage","text":"hi"}"#).unwrap();
        assert_eq!(frame, ClientFrame::SendMessage { text: "hi".into() });

        let frame: ClientFrame = serde_json::from_str(r#"{"type":"getHistory"}"#).unwrap();
        assert_eq!(frame, ClientFrame::GetHistory { count: 50 });

        assert!(serde_json::from_str::<ClientFrame>(r#"{"type":"shutdown"}"#).is_err());
    }

    #[test]
    fn server_frames_are_camel_case() {
        let id = ConnectionId::generate();
        let welcome = serde_json::to_value(ServerFrame::Welcome { connection_id: id }).unwrap();
        assert_eq!(welcome["type"], "welcome");
        assert_eq!(welcome["connectionId"], id.to_string());

        let banned =
            serde_json::to_value(ServerFrame::Banned(BanNotice::new(Some(Duration::from_secs(30)))))
                .unwrap();
        assert_eq!(banned["type"], "banned");
        assert_eq!(banned["retryAfterSeconds"], 30);

        let name = DisplayName::parse("alice").unwrap();
        let message = ChatMessage::new(id, &name, "hello", SystemClock.now());
        let frame = serde_json::to_value(ServerFrame::Message(message)).unwrap();
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["userName"], "alice");
        assert_eq!(frame["text"], "hello");
    }
}
