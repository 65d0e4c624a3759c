//! # auto-translate
//!
//! 资源包本地化文件的增量机器翻译工具。
//!
//! ## 模块组织
//!
//! - `env` - 环境变量定义与解析
//! - `translation` - 变更检测、请求规划、并发执行与结果写回

pub mod env;
pub mod translation;

pub use translation::{TranslationConfig, TranslationError, TranslationResult, TranslationService};
