//! 翻译模块统一错误处理
//!
//! 提供结构化错误类型，并把每个错误归入一个类别。

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
#[derive(Error, Debug, Clone)]
pub enum TranslationError {
    /// 配置错误（致命）
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    NetworkError(String),

    /// 超时错误
    #[error("操作超时: {0}")]
    TimeoutError(String),

    /// 翻译服务返回非 2xx 状态
    #[error("翻译服务返回状态 {status}: {body}")]
    ApiStatus { status: u16, body: String },

    /// 响应外层结构无法解析
    #[error("响应格式错误: {0}")]
    EnvelopeError(String),

    /// 模型回复无法解析为键值映射
    #[error("回复解析错误: {0}")]
    ParseError(String),

    /// 回复结构或占位符不匹配
    #[error("校验失败: {0}")]
    ValidationError(String),

    /// 存储读写错误
    #[error("存储错误: {0}")]
    StorageError(String),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerializationError(String),

    /// 版本源错误
    #[error("版本源错误: {0}")]
    RevisionError(String),

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

/// 请求失败所计入的重试通道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureChannel {
    /// 传输、HTTP 状态、超时或响应外层错误
    Api,
    /// 回复内容不合格
    Validation,
}

impl fmt::Display for FailureChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureChannel::Api => write!(f, "api"),
            FailureChannel::Validation => write!(f, "validation"),
        }
    }
}

impl TranslationError {
    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::NetworkError(_) => ErrorCategory::Network,
            TranslationError::TimeoutError(_) => ErrorCategory::Timeout,
            TranslationError::ApiStatus { .. } => ErrorCategory::Service,
            TranslationError::EnvelopeError(_) => ErrorCategory::Service,
            TranslationError::ParseError(_) => ErrorCategory::Parsing,
            TranslationError::ValidationError(_) => ErrorCategory::Validation,
            TranslationError::StorageError(_) => ErrorCategory::Storage,
            TranslationError::SerializationError(_) => ErrorCategory::Serialization,
            TranslationError::RevisionError(_) => ErrorCategory::Revision,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 只有配置错误会中止整个运行
    pub fn is_fatal(&self) -> bool {
        matches!(self, TranslationError::ConfigError(_))
    }

    /// 截断后的错误摘要，用于日志
    pub fn summary(&self, max_chars: usize) -> String {
        let message = self.to_string();
        if message.chars().count() <= max_chars {
            message
        } else {
            let truncated: String = message.chars().take(max_chars).collect();
            format!("{}...", truncated)
        }
    }
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Timeout,
    Service,
    Parsing,
    Validation,
    Storage,
    Serialization,
    Revision,
    Internal,
}

/// 标准错误转换
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::StorageError(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::SerializationError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

impl From<tokio::time::error::Elapsed> for TranslationError {
    fn from(error: tokio::time::error::Elapsed) -> Self {
        TranslationError::TimeoutError(format!("异步操作超时: {}", error))
    }
}

impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TranslationError::TimeoutError(error.to_string())
        } else if let Some(status) = error.status() {
            TranslationError::ApiStatus {
                status: status.as_u16(),
                body: error.to_string(),
            }
        } else {
            TranslationError::NetworkError(error.to_string())
        }
    }
}

impl From<crate::env::EnvError> for TranslationError {
    fn from(error: crate::env::EnvError) -> Self {
        TranslationError::ConfigError(error.to_string())
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_mapping() {
        assert_eq!(TranslationError::NetworkError("x".into()).category(), ErrorCategory::Network);
        assert_eq!(
            TranslationError::ApiStatus { status: 502, body: String::new() }.category(),
            ErrorCategory::Service
        );
        assert_eq!(TranslationError::ParseError("x".into()).category(), ErrorCategory::Parsing);
        assert_eq!(FailureChannel::Validation.to_string(), "validation");
    }

    #[test]
    fn test_only_config_errors_are_fatal() {
        assert!(TranslationError::ConfigError("missing key".into()).is_fatal());
        assert!(!TranslationError::StorageError("disk".into()).is_fatal());
        assert!(!TranslationError::ValidationError("keys".into()).is_fatal());
    }

    #[test]
    fn test_summary_truncation() {
        let error = TranslationError::NetworkError("a".repeat(200));
        let summary = error.summary(50);
        assert_eq!(summary.chars().count(), 53);
        assert!(summary.ends_with("..."));

        let short = TranslationError::InternalError("ok".into());
        assert_eq!(short.summary(50), short.to_string());
    }
}
