//! 基础设施层实现。
//!
//! 提供应用层接口的具体适配器：目前是进程内的滚动消息存储。

pub mod memory_store;

pub use memory_store::MemoryMessageStore;
