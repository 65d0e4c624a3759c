//! 工作项规划
//!
//! 把变更集合展开为(命名空间, 语言, 目标键)工作项，再经过上下文窗口和批次
//! 调度生成全部翻译请求。

use std::collections::{HashMap, HashSet};

use crate::translation::changes::{ChangeSet, ChangeTarget};
use crate::translation::config::{constants, LanguageCatalogue, TranslationConfig};
use crate::translation::storage::LocalizationStore;
use crate::translation::types::{Language, ReferenceMap, TranslationMap};

use super::batch::{BatchScheduler, BatchSchedulerConfig, TranslationRequest};
use super::context::build_context_window;

/// 一个(命名空间, 语言)上的翻译工作
#[derive(Debug, Clone, PartialEq)]
pub struct WorkItem {
    pub namespace: String,
    pub language: Language,
    /// 需要写回的目标键
    pub keys: Vec<String>,
    /// 规划时已有的译文
    pub existing: TranslationMap,
}

/// 一次运行的全部工作
#[derive(Debug, Default)]
pub struct WorkPlan {
    pub items: Vec<WorkItem>,
    pub requests: Vec<TranslationRequest>,
}

impl WorkPlan {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total_keys(&self) -> usize {
        self.items.iter().map(|item| item.keys.len()).sum()
    }
}

/// 规划参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerConfig {
    /// 命名空间级上下文预算
    pub max_context: usize,
    /// 目标键少于该值时才开窗
    pub min_keys_for_context: usize,
    pub batch: BatchSchedulerConfig,
}

impl From<&TranslationConfig> for PlannerConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            max_context: config.max_context,
            min_keys_for_context: config.min_keys_for_context,
            batch: BatchSchedulerConfig::from(config),
        }
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_context: constants::MAX_CONTEXT,
            min_keys_for_context: constants::MIN_KEYS_FOR_CONTEXT,
            batch: BatchSchedulerConfig::default(),
        }
    }
}

/// 请求规划器
pub struct RequestPlanner {
    config: PlannerConfig,
    scheduler: BatchScheduler,
}

impl RequestPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            scheduler: BatchScheduler::new(config.batch),
        }
    }

    pub fn scheduler(&self) -> &BatchScheduler {
        &self.scheduler
    }

    /// 增量模式：按变更集合规划
    ///
    /// 同一(命名空间, 语言)上已被前面的变更集合覆盖的键不会重复规划。
    pub fn plan_changes(
        &self,
        store: &LocalizationStore,
        catalogue: &LanguageCatalogue,
        change_sets: &[ChangeSet],
    ) -> WorkPlan {
        let mut plan = WorkPlan::default();
        let mut references: HashMap<String, ReferenceMap> = HashMap::new();
        let mut planned: HashMap<(String, String), HashSet<String>> = HashMap::new();

        for set in change_sets {
            let targets = set.keys_to_translate();
            if targets.is_empty() {
                continue;
            }

            let reference = references
                .entry(set.namespace.clone())
                .or_insert_with(|| store.merged_reference(&set.namespace));
            if reference.is_empty() {
                tracing::error!("无法加载命名空间 {} 的合并参考翻译", set.namespace);
                continue;
            }

            let languages: Vec<Language> = match &set.target {
                ChangeTarget::AllLanguages => catalogue.iter().collect(),
                ChangeTarget::Language(code) => match catalogue.get(code) {
                    Some(language) => vec![language],
                    None => {
                        tracing::warn!("未知的语言代码: {}，跳过翻译", code);
                        continue;
                    }
                },
            };

            for language in languages {
                let seen = planned
                    .entry((set.namespace.clone(), language.code.clone()))
                    .or_default();
                let keys: Vec<String> = targets
                    .iter()
                    .filter(|key| !seen.contains(key.as_str()))
                    .cloned()
                    .collect();
                if keys.is_empty() {
                    continue;
                }
                seen.extend(keys.iter().cloned());

                let (payload, core_keys) = if keys.len() < self.config.min_keys_for_context {
                    let window = build_context_window(reference, &keys, self.config.max_context, false);
                    tracing::debug!(
                        "差异翻译上下文补充: {} 个目标键 + {} 个上下文键",
                        keys.len(),
                        window.context_len()
                    );
                    (window.payload, window.core_keys)
                } else {
                    let payload: ReferenceMap = keys
                        .iter()
                        .filter_map(|key| reference.get_key_value(key.as_str()))
                        .map(|(key, value)| (key.clone(), value.clone()))
                        .collect();
                    (payload, keys.clone())
                };

                if payload.is_empty() {
                    tracing::warn!(
                        "{} -> {}: 目标键都不在参考映射中，跳过",
                        set.namespace,
                        language.code
                    );
                    continue;
                }

                self.push_item(&mut plan, store, &set.namespace, language, keys, payload, core_keys);
            }
        }

        self.log_plan(&plan);
        plan
    }

    /// 全量模式：每个命名空间的全部参考键、每个目录语言，不做命名空间级开窗
    pub fn plan_full(&self, store: &LocalizationStore, catalogue: &LanguageCatalogue) -> WorkPlan {
        let mut plan = WorkPlan::default();

        for namespace in store.namespaces() {
            let reference = store.merged_reference(&namespace);
            if reference.is_empty() {
                tracing::warn!("命名空间 {} 没有参考文本，跳过", namespace);
                continue;
            }

            let keys: Vec<String> = reference.keys().cloned().collect();
            for language in catalogue.iter() {
                self.push_item(
                    &mut plan,
                    store,
                    &namespace,
                    language,
                    keys.clone(),
                    reference.clone(),
                    keys.clone(),
                );
            }
        }

        self.log_plan(&plan);
        plan
    }

    #[allow(clippy::too_many_arguments)]
    fn push_item(
        &self,
        plan: &mut WorkPlan,
        store: &LocalizationStore,
        namespace: &str,
        language: Language,
        keys: Vec<String>,
        payload: ReferenceMap,
        core_keys: Vec<String>,
    ) {
        let requests = self.scheduler.schedule(namespace, &language, &payload, &core_keys);
        let existing = store.load_translations(namespace, &language.code);

        plan.requests.extend(requests);
        plan.items.push(WorkItem {
            namespace: namespace.to_string(),
            language,
            keys,
            existing,
        });
    }

    fn log_plan(&self, plan: &WorkPlan) {
        tracing::info!(
            "准备 {} 个翻译任务，共 {} 个目标键，{} 个请求",
            plan.items.len(),
            plan.total_keys(),
            plan.requests.len()
        );
    }
}

impl Default for RequestPlanner {
    fn default() -> Self {
        Self::new(PlannerConfig::default())
    }
}
