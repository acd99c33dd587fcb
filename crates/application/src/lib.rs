//! 应用层实现。
//!
//! 这里是中继的防滥用协调核心：按来源统计连接、保证显示名称唯一、
//! 按动作类型做固定窗口限流、把违规升级为临时封禁，
//! 并对外部协作者（消息存储、文本清洗）只依赖抽象接口。

pub mod ban_registry;
pub mod clock;
pub mod connection_registry;
pub mod error;
pub mod outcome;
pub mod rate_limiter;
pub mod sanitizer;
pub mod services;
pub mod store;

pub use ban_registry::{BanRegistry, BanStatus};
pub use clock::{Clock, ManualClock, SystemClock};
pub use connection_registry::{ConnectionRegistry, RegisteredConnection, RegistryError};
pub use error::ApplicationError;
pub use outcome::{
    BanNotice, ChangeNameOutcome, ConnectOutcome, HistoryOutcome, SendMessageOutcome,
};
pub use rate_limiter::{RateLimitRules, RateLimitState, RateLimiter};
pub use sanitizer::{HtmlSanitizer, TextSanitizer};
pub use services::{ChatCoordinator, ChatCoordinatorDependencies, CoordinatorSettings};
pub use store::{MessageStore, StoreError};
