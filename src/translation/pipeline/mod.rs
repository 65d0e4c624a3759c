//! 翻译管道模块
//!
//! 提供请求准备管道：上下文窗口、批次调度和工作项规划

pub mod batch;
pub mod context;
pub mod planner;

// 重新导出主要类型
pub use batch::{split_with_context, Batch, BatchScheduler, BatchSchedulerConfig, BatchStats, TranslationRequest};
pub use context::{build_context_window, ContextWindow};
pub use planner::{PlannerConfig, RequestPlanner, WorkItem, WorkPlan};
