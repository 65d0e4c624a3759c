//! 结果累加器
//!
//! 按 命名空间 -> 语言 -> 键 三级分组收集各请求的译文。同一(命名空间, 语言)
//! 的多个批次写入同一个桶，只追加键，不覆盖其他批次的结果。

use indexmap::IndexMap;

use crate::translation::types::TranslationMap;

use super::engine::RequestOutcome;

/// 执行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub requests: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub attempts: u64,
    pub api_failures: u64,
    pub validation_failures: u64,
}

/// 结果累加器
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    buckets: IndexMap<String, IndexMap<String, TranslationMap>>,
    stats: ExecutionStats,
}

impl ResultAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 合并一个请求的结果
    pub fn absorb(&mut self, outcome: RequestOutcome) {
        self.stats.requests += 1;
        self.stats.attempts += u64::from(outcome.attempts);
        self.stats.api_failures += u64::from(outcome.api_failures);
        self.stats.validation_failures += u64::from(outcome.validation_failures);

        match outcome.translations {
            Some(translations) => {
                self.stats.succeeded += 1;
                self.buckets
                    .entry(outcome.namespace)
                    .or_default()
                    .entry(outcome.language)
                    .or_default()
                    .extend(translations);
            }
            None => self.stats.failed += 1,
        }
    }

    pub fn get(&self, namespace: &str, language: &str) -> Option<&TranslationMap> {
        self.buckets.get(namespace).and_then(|languages| languages.get(language))
    }

    pub fn stats(&self) -> ExecutionStats {
        self.stats
    }

    pub fn total_translations(&self) -> usize {
        self.buckets
            .values()
            .flat_map(|languages| languages.values())
            .map(|translations| translations.len())
            .sum()
    }
}
