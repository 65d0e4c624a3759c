//! 统一的环境变量管理系统
//!
//! 提供类型安全、可验证的环境变量访问。凭据、运行模式开关和
//! 性能参数都通过这里读取，再由配置管理器覆盖到配置上。

use std::env;
use std::fmt;
use std::time::Duration;

/// 环境变量解析错误
#[derive(Debug, Clone)]
pub struct EnvError {
    pub variable: String,
    pub message: String,
}

impl fmt::Display for EnvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Environment variable '{}': {}", self.variable, self.message)
    }
}

impl std::error::Error for EnvError {}

pub type EnvResult<T> = Result<T, EnvError>;

/// 环境变量访问器特性
pub trait EnvVar<T> {
    const NAME: &'static str;
    const DEFAULT: Option<T>;
    const DESCRIPTION: &'static str;

    fn parse(value: &str) -> EnvResult<T>;

    fn get() -> EnvResult<T> {
        match env::var(Self::NAME) {
            Ok(value) => Self::parse(&value),
            Err(_) => {
                if let Some(default) = Self::DEFAULT {
                    Ok(default)
                } else {
                    Err(EnvError {
                        variable: Self::NAME.to_string(),
                        message: "Required environment variable not set".to_string(),
                    })
                }
            }
        }
    }

    fn get_or_default(default: T) -> T {
        Self::get().unwrap_or(default)
    }

    /// 变量是否被显式设置
    fn is_set() -> bool {
        env::var(Self::NAME).is_ok()
    }
}

/// 核心环境变量定义
pub mod core {
    use super::*;

    /// 日志级别
    pub struct LogLevel;
    impl EnvVar<String> for LogLevel {
        const NAME: &'static str = "AUTO_TRANSLATE_LOG_LEVEL";
        const DEFAULT: Option<String> = None;

        fn get() -> EnvResult<String> {
            match env::var(Self::NAME) {
                Ok(value) => Self::parse(&value),
                Err(_) => Ok("info".to_string()),
            }
        }
        const DESCRIPTION: &'static str = "Log level: trace, debug, info, warn, error";

        fn parse(value: &str) -> EnvResult<String> {
            match value.to_lowercase().as_str() {
                "trace" | "debug" | "info" | "warn" | "error" => Ok(value.to_lowercase()),
                _ => Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid log level '{}'. Use: trace, debug, info, warn, error", value),
                }),
            }
        }
    }

    /// 调试模式：记录每一次请求尝试
    pub struct Debug;
    impl EnvVar<bool> for Debug {
        const NAME: &'static str = "TRANSLATION_DEBUG";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Record every request attempt to the diagnostics directory";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }
}

/// 翻译相关环境变量
pub mod translation {
    use super::*;

    /// 翻译服务密钥
    pub struct ApiKey;
    impl EnvVar<String> for ApiKey {
        const NAME: &'static str = "DEEPSEEK_API_KEY";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Bearer token for the translation service (required)";

        fn parse(value: &str) -> EnvResult<String> {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                return Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: "API key cannot be empty".to_string(),
                });
            }
            Ok(trimmed.to_string())
        }
    }

    /// 翻译服务地址
    pub struct ApiUrl;
    impl EnvVar<String> for ApiUrl {
        const NAME: &'static str = "AUTO_TRANSLATE_API_URL";
        const DEFAULT: Option<String> = None;
        const DESCRIPTION: &'static str = "Chat completion endpoint of the translation service";

        fn parse(value: &str) -> EnvResult<String> {
            if value.starts_with("http://") || value.starts_with("https://") {
                Ok(value.to_string())
            } else {
                Err(EnvError {
                    variable: Self::NAME.to_string(),
                    message: format!("Invalid URL '{}'. Must start with http:// or https://", value),
                })
            }
        }
    }

    /// 全量重译模式
    pub struct ForceTranslate;
    impl EnvVar<bool> for ForceTranslate {
        const NAME: &'static str = "FORCE_TRANSLATE";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Retranslate every key of every namespace and overwrite stores";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 使用快速模型作为首选
    pub struct NonThinkingMode;
    impl EnvVar<bool> for NonThinkingMode {
        const NAME: &'static str = "NON_THINKING_MODE";
        const DEFAULT: Option<bool> = Some(false);
        const DESCRIPTION: &'static str = "Prefer the fast model variant over the careful one";

        fn parse(value: &str) -> EnvResult<bool> {
            parse_bool(value, Self::NAME)
        }
    }

    /// 最大并发请求数，0 表示不限制
    pub struct MaxConcurrentRequests;
    impl EnvVar<usize> for MaxConcurrentRequests {
        const NAME: &'static str = "AUTO_TRANSLATE_MAX_CONCURRENT_REQUESTS";
        const DEFAULT: Option<usize> = None;
        const DESCRIPTION: &'static str = "Maximum in-flight requests, 0 for unbounded";

        fn parse(value: &str) -> EnvResult<usize> {
            value.parse::<usize>().map_err(|_| EnvError {
                variable: Self::NAME.to_string(),
                message: format!("Invalid number '{}'. Must be a non-negative integer", value),
            })
        }
    }

    /// 批次大小
    pub struct BatchSize;
    impl EnvVar<usize> for BatchSize {
        const NAME: &'static str = "AUTO_TRANSLATE_BATCH_SIZE";
        const DEFAULT: Option<usize> = None;
        const DESCRIPTION: &'static str = "Maximum number of keys per request";

        fn parse(value: &str) -> EnvResult<usize> {
            parse_positive_usize(value, Self::NAME)
        }
    }

    /// 单次请求超时
    pub struct ApiTimeout;
    impl EnvVar<Duration> for ApiTimeout {
        const NAME: &'static str = "AUTO_TRANSLATE_API_TIMEOUT";
        const DEFAULT: Option<Duration> = None;
        const DESCRIPTION: &'static str = "Per-request timeout in seconds";

        fn parse(value: &str) -> EnvResult<Duration> {
            let secs = parse_positive_usize(value, Self::NAME)?;
            Ok(Duration::from_secs(secs as u64))
        }
    }
}

// 辅助函数

fn parse_bool(value: &str, var_name: &str) -> EnvResult<bool> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enabled" => Ok(true),
        "false" | "0" | "no" | "off" | "disabled" | "" => Ok(false),
        _ => Err(EnvError {
            variable: var_name.to_string(),
            message: format!("Invalid boolean '{}'. Use: true/false, 1/0, yes/no, on/off", value),
        }),
    }
}

fn parse_positive_usize(value: &str, var_name: &str) -> EnvResult<usize> {
    let parsed = value.parse::<usize>().map_err(|_| EnvError {
        variable: var_name.to_string(),
        message: format!("Invalid number '{}'. Must be a positive integer", value),
    })?;

    if parsed == 0 {
        return Err(EnvError {
            variable: var_name.to_string(),
            message: "Value must be greater than 0".to_string(),
        });
    }

    Ok(parsed)
}
