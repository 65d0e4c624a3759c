//! 增量本地化翻译
//!
//! 采用清晰的模块化架构：
//! - **changes**: 版本差异、重命名合并、缺失文件与缺失键扫描
//! - **pipeline**: 上下文窗口、批次调度、工作项规划
//! - **core**: 请求执行、回复校验、结果合并与清理
//! - **storage**: 参考文档与译文存储
//! - **config**: 配置管理和语言目录
//! - **error**: 错误处理
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use auto_translate::translation::{ConfigManager, TranslationService};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ConfigManager::new()?.into_config();
//! let service = TranslationService::new(config)?;
//! let summary = service.run().await?;
//! println!("{}", summary);
//! # Ok(())
//! # }
//! ```

// ============================================================================
// 子模块声明
// ============================================================================

/// 变更检测模块 - 找出需要翻译的键
pub mod changes;

/// 配置管理模块 - 服务参数、路径、批次与重试设置
pub mod config;

/// 核心模块 - 执行引擎与编排服务
pub mod core;

/// 错误处理模块 - 统一的错误类型
pub mod error;

/// 请求准备管道 - 上下文窗口、批次与规划
pub mod pipeline;

/// 存储模块 - 本地化文档读写
pub mod storage;

/// 共享数据类型
pub mod types;

// ============================================================================
// 公共接口重新导出
// ============================================================================

pub use changes::{ChangeSet, ChangeTarget, GitRevisionSource, KeyChange, RevisionSource};
pub use config::{ConfigManager, LanguageCatalogue, TranslationConfig};
pub use self::core::{
    ChatCompletionClient, RunMode, RunSummary, TranslationBackend, TranslationEngine, TranslationService,
};
pub use error::{FailureChannel, TranslationError, TranslationResult};
pub use pipeline::{RequestPlanner, TranslationRequest};
pub use storage::LocalizationStore;
pub use types::{Language, ReferenceMap, ReferenceValue, TranslationMap};
