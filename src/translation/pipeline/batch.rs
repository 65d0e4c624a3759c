//! 翻译批次调度模块
//!
//! 把任意大小的有序键值载荷拆分成固定大小的批次，并在批次边界补充上下文：
//!
//! - 首段只附加后方 `context_size` 项
//! - 末段只附加前方 `context_size` 项
//! - 中间段前后各附加 `context_size / 2` 项
//!
//! 边界上下文从不写回，每个批次只把自己那一段中原本就是核心的键标记为核心。
//! 与命名空间级窗口叠加使用：小改动先开窗，窗口仍超过批次上限时再在这里拆分。

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::translation::config::{constants, TranslationConfig};
use crate::translation::types::{Language, ReferenceMap};

/// 一个拆分后的批次
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// 发送的键值，包含边界上下文，按原载荷顺序
    pub payload: ReferenceMap,
    /// 需要写回的键
    pub core_keys: Vec<String>,
}

/// 翻译请求
///
/// 由调度器创建，执行引擎恰好消费一次。结果按(命名空间, 语言)合并，而不是按请求 id。
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    pub id: usize,
    pub namespace: String,
    pub language: Language,
    pub payload: ReferenceMap,
    pub core_keys: Vec<String>,
    /// 从 1 开始
    pub batch_index: usize,
    pub total_batches: usize,
}

impl TranslationRequest {
    /// 日志中使用的批次描述，单批次时为空
    pub fn batch_label(&self) -> String {
        if self.total_batches > 1 {
            format!("批次{}/{} ", self.batch_index, self.total_batches)
        } else {
            String::new()
        }
    }
}

impl fmt::Display for TranslationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}{} 个文本 -> {}",
            self.namespace,
            self.batch_label(),
            self.payload.len(),
            self.language.name
        )
    }
}

/// 批次调度配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSchedulerConfig {
    pub batch_size: usize,
    pub context_size: usize,
}

impl From<&TranslationConfig> for BatchSchedulerConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            context_size: config.context_size,
        }
    }
}

impl Default for BatchSchedulerConfig {
    fn default() -> Self {
        Self {
            batch_size: constants::BATCH_SIZE,
            context_size: constants::CONTEXT_SIZE,
        }
    }
}

/// 批次统计
#[derive(Debug, Default)]
pub struct BatchStats {
    input_items: AtomicUsize,
    output_batches: AtomicUsize,
    split_payloads: AtomicUsize,
}

impl BatchStats {
    pub fn input_items(&self) -> usize {
        self.input_items.load(Ordering::Relaxed)
    }

    pub fn output_batches(&self) -> usize {
        self.output_batches.load(Ordering::Relaxed)
    }

    /// 超过批次上限而被拆分的载荷数量
    pub fn split_payloads(&self) -> usize {
        self.split_payloads.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.input_items.store(0, Ordering::Relaxed);
        self.output_batches.store(0, Ordering::Relaxed);
        self.split_payloads.store(0, Ordering::Relaxed);
    }
}

/// 批次调度器
#[derive(Debug)]
pub struct BatchScheduler {
    config: BatchSchedulerConfig,
    stats: BatchStats,
    next_id: AtomicUsize,
}

impl BatchScheduler {
    pub fn new(config: BatchSchedulerConfig) -> Self {
        Self {
            config,
            stats: BatchStats::default(),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn config(&self) -> &BatchSchedulerConfig {
        &self.config
    }

    pub fn stats(&self) -> &BatchStats {
        &self.stats
    }

    /// 为一个(命名空间, 语言)创建请求
    pub fn schedule(
        &self,
        namespace: &str,
        language: &Language,
        payload: &ReferenceMap,
        core_keys: &[String],
    ) -> Vec<TranslationRequest> {
        let batches = split_with_context(
            payload,
            core_keys,
            self.config.batch_size,
            self.config.context_size,
        );

        self.stats.input_items.fetch_add(payload.len(), Ordering::Relaxed);
        self.stats.output_batches.fetch_add(batches.len(), Ordering::Relaxed);
        if batches.len() > 1 {
            self.stats.split_payloads.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(
                "[{}] {} 个文本 -> {} 拆分为 {} 个批次",
                namespace,
                payload.len(),
                language.code,
                batches.len()
            );
        }

        let total_batches = batches.len();
        batches
            .into_iter()
            .enumerate()
            .map(|(index, batch)| TranslationRequest {
                id: self.next_id.fetch_add(1, Ordering::Relaxed),
                namespace: namespace.to_string(),
                language: language.clone(),
                payload: batch.payload,
                core_keys: batch.core_keys,
                batch_index: index + 1,
                total_batches,
            })
            .collect()
    }
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new(BatchSchedulerConfig::default())
    }
}

/// 拆分载荷并附加边界上下文
///
/// 只含上下文、没有核心键的批次不会产生。
pub fn split_with_context(
    payload: &ReferenceMap,
    core_keys: &[String],
    batch_size: usize,
    context_size: usize,
) -> Vec<Batch> {
    if payload.is_empty() || core_keys.is_empty() {
        return Vec::new();
    }

    let total = payload.len();
    let batch_size = batch_size.max(1);

    if total <= batch_size {
        return vec![Batch {
            payload: payload.clone(),
            core_keys: core_keys.to_vec(),
        }];
    }

    let core: HashSet<&str> = core_keys.iter().map(String::as_str).collect();
    let half = context_size / 2;
    let mut batches = Vec::with_capacity(total.div_ceil(batch_size));

    let mut start = 0;
    while start < total {
        let end = (start + batch_size).min(total);

        let (context_start, context_end) = if start == 0 {
            (start, (end + context_size).min(total))
        } else if end >= total {
            (start.saturating_sub(context_size), end)
        } else {
            (start.saturating_sub(half), (end + half).min(total))
        };

        let batch_payload: ReferenceMap = (context_start..context_end)
            .filter_map(|index| payload.get_index(index))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        let batch_core: Vec<String> = (start..end)
            .filter_map(|index| payload.get_index(index))
            .map(|(key, _)| key)
            .filter(|key| core.contains(key.as_str()))
            .cloned()
            .collect();

        tracing::trace!(
            "批次 {}: 前方上下文 {} 项 + 核心 {} 项 + 后方上下文 {} 项",
            batches.len() + 1,
            start - context_start,
            end - start,
            context_end - end
        );

        if batch_core.is_empty() {
            tracing::trace!("跳过只含上下文的批次: {}..{}", start, end);
        } else {
            batches.push(Batch {
                payload: batch_payload,
                core_keys: batch_core,
            });
        }
        start = end;
    }

    batches
}
