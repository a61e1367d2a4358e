//! 错误定义模块

use thiserror::Error;

/// EMPI系统统一错误类型
#[derive(Error, Debug)]
pub enum EmpiError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("权限错误: {0}")]
    Forbidden(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("存在未关闭的工作项，删除被阻止: {work_item_ids:?}")]
    OpenWorkItems { work_item_ids: Vec<i64> },

    #[error("确认摘要与最新删除计划不一致，请重新获取删除预览")]
    ConfirmationMismatch,

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// EMPI系统统一结果类型
pub type Result<T> = std::result::Result<T, EmpiError>;
