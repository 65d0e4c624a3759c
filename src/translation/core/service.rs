//! 翻译编排服务
//!
//! 本模块把各个子系统串成一次完整的运行，是库的主要入口点。
//!
//! ## 运行流程
//!
//! 1. **变更检测**: 版本差异（含重命名合并）、缺失的语言文件、缺失的键
//! 2. **请求规划**: 上下文窗口、批次拆分与边界上下文
//! 3. **并发执行**: 每个请求独立重试，结果按(命名空间, 语言)累加
//! 4. **合并写回**: 只写回请求过的键
//! 5. **清理**: 无条件删除所有存储中参考已不存在的键
//!
//! 全量模式跳过第 1 步，直接为每个命名空间和语言重译全部键。
//! 没有任何工作时仍然执行清理。
//!
//! ## 错误处理
//!
//! 只有配置错误（例如缺少 API 密钥）会让运行失败。单个请求、单个文件的
//! 问题都在各自的阶段内消化，体现为运行摘要中的失败计数。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use auto_translate::translation::{ConfigManager, TranslationService};
//!
//! let config = ConfigManager::new()?.into_config();
//! let service = TranslationService::new(config)?;
//! let summary = service.run().await?;
//! println!("{}", summary);
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::translation::changes::{
    collect_changes, scan_missing_files, scan_missing_keys, ChangeSet, GitRevisionSource, RevisionSource,
};
use crate::translation::config::{LanguageCatalogue, TranslationConfig};
use crate::translation::error::TranslationResult;
use crate::translation::pipeline::{PlannerConfig, RequestPlanner, WorkPlan};
use crate::translation::storage::LocalizationStore;

use super::cleanup::{cleanup_stale_keys, CleanupReport};
use super::client::{ChatCompletionClient, TranslationBackend};
use super::engine::{RetryPolicy, TranslationEngine};
use super::merge::{merge_results, MergeMode, MergeReport};
use super::session::RunSession;

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// 只翻译变更和缺失的键
    Incremental,
    /// 全量重译
    Force,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Incremental => write!(f, "增量"),
            RunMode::Force => write!(f, "全量"),
        }
    }
}

/// 运行摘要
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub mode: RunMode,
    pub change_sets: usize,
    pub work_items: usize,
    pub requests: usize,
    pub requests_succeeded: usize,
    pub requests_failed: usize,
    pub merge: MergeReport,
    pub cleanup: CleanupReport,
    pub elapsed: Duration,
    /// 执行阶段的内部错误，出现时本次没有写回任何译文
    pub execution_error: Option<String>,
}

impl RunSummary {
    fn empty(mode: RunMode, change_sets: usize) -> Self {
        Self {
            mode,
            change_sets,
            work_items: 0,
            requests: 0,
            requests_succeeded: 0,
            requests_failed: 0,
            merge: MergeReport::default(),
            cleanup: CleanupReport::default(),
            elapsed: Duration::ZERO,
            execution_error: None,
        }
    }

    /// 所有工作项都完整翻译
    pub fn is_complete(&self) -> bool {
        self.execution_error.is_none()
            && self.merge.items_partial == 0
            && self.merge.items_failed == 0
            && self.merge.save_errors == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}翻译: {} 个工作项 (完成 {}, 部分 {}, 失败 {}), {} 个请求 (成功 {}, 失败 {}), \
             写入 {} 个文件 {} 个键, 清理 {} 个过期键, 用时 {:.1}秒",
            self.mode,
            self.work_items,
            self.merge.items_complete,
            self.merge.items_partial,
            self.merge.items_failed,
            self.requests,
            self.requests_succeeded,
            self.requests_failed,
            self.merge.files_saved,
            self.merge.keys_written,
            self.cleanup.keys_removed,
            self.elapsed.as_secs_f32()
        )?;
        if let Some(error) = &self.execution_error {
            write!(f, ", 执行错误: {}", error)?;
        }
        Ok(())
    }
}

/// 翻译编排服务
///
/// 持有一次运行所需的全部组件。后端和版本源都是 trait 对象，
/// 测试中可以替换为内存实现。
///
/// ## 组件
///
/// - **配置**: 路径、批次参数、重试策略
/// - **存储**: 参考文档与译文存储的读写
/// - **语言目录**: 目标语言列表
/// - **翻译后端**: 生产环境为 chat/completions 客户端
/// - **版本源**: 生产环境为 git
pub struct TranslationService {
    config: TranslationConfig,
    store: LocalizationStore,
    catalogue: LanguageCatalogue,
    backend: Arc<dyn TranslationBackend>,
    revisions: Arc<dyn RevisionSource>,
}

impl TranslationService {
    /// 按配置创建生产服务
    ///
    /// # 错误
    /// 缺少 API 密钥或 HTTP 客户端无法创建时返回致命的 `TranslationError::ConfigError`
    pub fn new(config: TranslationConfig) -> TranslationResult<Self> {
        let backend = Arc::new(ChatCompletionClient::from_config(&config)?);
        let revisions = Arc::new(GitRevisionSource::new("."));
        let catalogue = LanguageCatalogue::load(&config.languages_file);
        Ok(Self::with_components(config, backend, revisions, catalogue))
    }

    /// 使用指定组件创建服务
    pub fn with_components(
        config: TranslationConfig,
        backend: Arc<dyn TranslationBackend>,
        revisions: Arc<dyn RevisionSource>,
        catalogue: LanguageCatalogue,
    ) -> Self {
        let store = LocalizationStore::new(&config.assets_dir, &config.translate_dir);
        Self {
            config,
            store,
            catalogue,
            backend,
            revisions,
        }
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    pub fn store(&self) -> &LocalizationStore {
        &self.store
    }

    pub fn catalogue(&self) -> &LanguageCatalogue {
        &self.catalogue
    }

    /// 执行一次完整运行
    ///
    /// 模式由配置中的 `force_translate` 决定。
    ///
    /// # 返回值
    /// 运行摘要。单个请求失败和执行阶段的内部错误都记录在摘要里，
    /// 清理和会话结束照常进行。
    pub async fn run(&self) -> TranslationResult<RunSummary> {
        let session = Arc::new(RunSession::open(&self.config));
        let mode = if self.config.force_translate {
            RunMode::Force
        } else {
            RunMode::Incremental
        };
        tracing::info!(
            "开始{}翻译: {} 种目标语言, 资源目录 {}",
            mode,
            self.catalogue.len(),
            self.store.assets_dir().display()
        );

        let planner = RequestPlanner::new(PlannerConfig::from(&self.config));
        let (plan, change_sets) = match mode {
            RunMode::Force => (planner.plan_full(&self.store, &self.catalogue), 0),
            RunMode::Incremental => {
                let change_sets = self.detect_changes().await;
                (
                    planner.plan_changes(&self.store, &self.catalogue, &change_sets),
                    change_sets.len(),
                )
            }
        };

        let mut summary = RunSummary::empty(mode, change_sets);
        let execution = if plan.is_empty() {
            tracing::info!("没有需要翻译的内容");
            Ok(())
        } else {
            let merge_mode = match mode {
                RunMode::Force => MergeMode::Overwrite,
                RunMode::Incremental => MergeMode::Incremental,
            };
            self.execute_plan(plan, merge_mode, Arc::clone(&session), &mut summary)
                .await
        };

        Ok(self.conclude(&session, summary, execution).await)
    }

    /// 收尾: 记录执行错误，然后总是清理并结束会话
    async fn conclude(
        &self,
        session: &RunSession,
        mut summary: RunSummary,
        execution: TranslationResult<()>,
    ) -> RunSummary {
        if let Err(e) = execution {
            tracing::error!("翻译执行失败: {}", e);
            summary.execution_error = Some(e.to_string());
        }

        summary.cleanup = self.cleanup();
        summary.elapsed = session.close().await;
        tracing::info!("{}", summary);
        summary
    }

    /// 汇总三个来源的变更集合
    ///
    /// 顺序为: 版本差异、缺失文件、缺失键。规划器按这个顺序去重，
    /// 所以同一个键只会被规划一次。
    pub async fn detect_changes(&self) -> Vec<ChangeSet> {
        let marker = self
            .store
            .assets_dir()
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("assets");

        let mut change_sets = collect_changes(
            self.revisions.as_ref(),
            &self.config.previous_revision,
            &self.config.current_revision,
            marker,
        )
        .await;
        let from_revisions = change_sets.len();

        change_sets.extend(scan_missing_files(&self.store, &self.catalogue));
        let missing_files = change_sets.len() - from_revisions;

        change_sets.extend(scan_missing_keys(&self.store, &self.catalogue));
        let missing_keys = change_sets.len() - from_revisions - missing_files;

        tracing::info!(
            "变更检测完成: 版本差异 {} 个, 缺失文件 {} 个, 缺失键 {} 个",
            from_revisions,
            missing_files,
            missing_keys
        );
        change_sets
    }

    /// 删除所有存储中的过期键
    pub fn cleanup(&self) -> CleanupReport {
        cleanup_stale_keys(&self.store, &self.catalogue)
    }

    async fn execute_plan(
        &self,
        plan: WorkPlan,
        merge_mode: MergeMode,
        session: Arc<RunSession>,
        summary: &mut RunSummary,
    ) -> TranslationResult<()> {
        let WorkPlan { items, requests } = plan;
        summary.work_items = items.len();
        summary.requests = requests.len();

        let engine = Arc::new(TranslationEngine::new(
            Arc::clone(&self.backend),
            RetryPolicy::from_config(&self.config),
        )?);
        let results = engine
            .execute_all(requests, session, self.config.max_concurrent_requests)
            .await?;

        let stats = results.stats();
        summary.requests_succeeded = stats.succeeded;
        summary.requests_failed = stats.failed;
        summary.merge = merge_results(&self.store, &items, &results, merge_mode);
        Ok(())
    }
}
