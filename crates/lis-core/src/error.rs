//! 错误定义模块

use thiserror::Error;

/// 检验系统统一错误类型
#[derive(Error, Debug)]
pub enum LisError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("数据库错误: {0}")]
    Database(String),

    #[error("IO错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("验证错误: {0}")]
    Validation(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("无效状态转换: 从 {from} 执行 {event}")]
    InvalidState { from: String, event: String },

    #[error("系统内部错误: {0}")]
    Internal(String),
}

impl LisError {
    /// 构造验证错误
    pub fn validation(msg: impl Into<String>) -> Self {
        LisError::Validation(msg.into())
    }

    /// 构造未找到错误
    pub fn not_found(msg: impl Into<String>) -> Self {
        LisError::NotFound(msg.into())
    }
}

#[cfg(feature = "database")]
impl From<sqlx::Error> for LisError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => LisError::NotFound("row not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                LisError::Validation(format!("referenced record does not exist: {}", db_err.message()))
            }
            other => LisError::Database(other.to_string()),
        }
    }
}

/// 检验系统统一结果类型
pub type Result<T> = std::result::Result<T, LisError>;
