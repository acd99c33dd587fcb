//! 聊天中继核心领域模型
//!
//! 包含连接标识、来源地址、显示名称、聊天消息等值对象与实体，
//! 以及限流所区分的动作类型。

pub mod action;
pub mod errors;
pub mod message;
pub mod value_objects;

// 重新导出常用类型
pub use action::*;
pub use errors::*;
pub use message::*;
pub use value_objects::*;
