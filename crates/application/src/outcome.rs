//! 协调器对每类动作返回的结果枚举。
//!
//! 预期内的拒绝（封禁、容量超限、名称冲突、空输入）都在这里表达，
//! 调用方必须逐一处理。`Banned` 与 `CapacityExceeded` 总是要求传输层强制断开。

use std::time::Duration;

use domain::{ChatMessage, DisplayName};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Allowed,
    Banned { retry_after: Duration },
    CapacityExceeded,
}

impl ConnectOutcome {
    pub fn should_terminate(&self) -> bool {
        !matches!(self, ConnectOutcome::Allowed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeNameOutcome {
    /// `changed` 为 false 表示连接本就持有该名称，没有任何状态改变
    Applied { name: DisplayName, changed: bool },
    Ignored,
    NameTaken,
    Banned { retry_after: Duration },
}

impl ChangeNameOutcome {
    pub fn should_terminate(&self) -> bool {
        matches!(self, ChangeNameOutcome::Banned { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendMessageOutcome {
    Stored { message: ChatMessage },
    Ignored,
    Banned { retry_after: Duration },
}

impl SendMessageOutcome {
    pub fn should_terminate(&self) -> bool {
        matches!(self, SendMessageOutcome::Banned { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryOutcome {
    Results { messages: Vec<ChatMessage> },
    Banned { retry_after: Duration },
}

impl HistoryOutcome {
    pub fn should_terminate(&self) -> bool {
        matches!(self, HistoryOutcome::Banned { .. })
    }
}

/// 封禁通知载荷，所有传输适配器共用
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BanNotice {
    pub message: String,
    pub retry_after_seconds: Option<u64>,
}

impl BanNotice {
    pub fn new(retry_after: Option<Duration>) -> Self {
        let retry_after_seconds = retry_after.map(ceil_secs);
        let message = match retry_after_seconds {
            Some(secs) => format!(
                "You have been temporarily banned for abusive traffic. Try again in {secs} seconds."
            ),
            None => "You have been temporarily banned for abusive traffic.".to_owned(),
        };
        Self {
            message,
            retry_after_seconds,
        }
    }
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}
