use thiserror::Error;

use crate::store::StoreError;

/// 协调器无法以业务结果表达的故障。
///
/// 封禁、限流、名称冲突、空输入都以结果枚举返回，不会走到这里。
#[derive(Debug, Error)]
pub enum ApplicationError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
