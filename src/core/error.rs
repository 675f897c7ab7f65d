//! 错误处理体系 (Error Handling System)
//!
//! 定义拦截管线相关的错误类型以及全局 Result 别名。

use std::time::Duration;

use thiserror::Error;

/// 全局错误定义 (Guard Domain Errors)
#[derive(Error, Debug)]
pub enum GuardError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 拦截器主动返回的失败
    #[error("Handler `{handler}` failed: {message}")]
    Handler { handler: String, message: String },

    /// 拦截器在限定时间内未给出判定
    #[error("Handler `{handler}` timed out after {after:?}")]
    Timeout { handler: String, after: Duration },

    /// 拦截器执行过程中 panic
    #[error("Handler `{handler}` panicked: {message}")]
    Panicked { handler: String, message: String },

    #[error("Invalid request descriptor: {0}")]
    InvalidRequest(String),
}

/// 全局 Result 别名
pub type Result<T> = std::result::Result<T, GuardError>;

impl GuardError {
    /// 构造拦截器失败错误
    pub fn handler(handler: impl Into<String>, message: impl Into<String>) -> Self {
        GuardError::Handler {
            handler: handler.into(),
            message: message.into(),
        }
    }

    /// 是否属于拦截器层面的故障（会被管线吞掉并上报，而不是向上传播）
    pub fn is_handler_fault(&self) -> bool {
        matches!(
            self,
            GuardError::Handler { .. } | GuardError::Timeout { .. } | GuardError::Panicked { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_faults_are_classified() {
        assert!(GuardError::handler("x", "boom").is_handler_fault());
        assert!(
            GuardError::Timeout {
                handler: "x".into(),
                after: Duration::from_millis(5)
            }
            .is_handler_fault()
        );
        assert!(!GuardError::InvalidRequest("nope".into()).is_handler_fault());
    }

    #[test]
    fn handler_error_message_names_the_handler() {
        let err = GuardError::handler("extension-blocking", "boom");
        assert_eq!(err.to_string(), "Handler `extension-blocking` failed: boom");
    }
}
