//! 翻译编排核心模块
//!
//! 本模块负责一次运行中"规划之后"的全部工作：调用翻译服务、校验回复、
//! 按失败通道重试、累加结果、写回存储以及清理过期键。
//!
//! ## 架构设计
//!
//! - **服务层** (`service.rs`): 串联变更检测、规划、执行、合并与清理
//! - **引擎层** (`engine.rs`): 并发执行请求，每个请求独立的重试状态机
//! - **客户端** (`client.rs`): 翻译服务后端接缝与 chat/completions 实现
//! - **校验** (`validator.rs`): 键集合与占位符检查
//!
//! ## 模块依赖关系
//!
//! ```text
//! TranslationService (service.rs)
//!     ├── RequestPlanner (pipeline/planner.rs)
//!     ├── TranslationEngine (engine.rs)
//!     │       ├── TranslationBackend (client.rs)
//!     │       ├── ReplyValidator (validator.rs)
//!     │       └── ResultAccumulator (accumulator.rs)
//!     ├── merge_results (merge.rs)
//!     └── cleanup_stale_keys (cleanup.rs)
//! ```

pub mod accumulator;
pub mod cleanup;
pub mod client;
pub mod engine;
pub mod merge;
pub mod prompt;
pub mod service;
pub mod session;
pub mod validator;

pub use accumulator::{ExecutionStats, ResultAccumulator};
pub use cleanup::{cleanup_stale_keys, CleanupReport};
pub use client::{ChatCompletionClient, ModelVariant, ServiceCall, TranslationBackend};
pub use engine::{RequestOutcome, RetryPolicy, TranslationEngine};
pub use merge::{merge_results, MergeMode, MergeReport};
pub use prompt::PromptTemplates;
pub use service::{RunMode, RunSummary, TranslationService};
pub use session::{FailureRecorder, RunSession};
pub use validator::ReplyValidator;
