//! 结果合并与写回

use indexmap::{IndexMap, IndexSet};

use crate::translation::pipeline::WorkItem;
use crate::translation::storage::LocalizationStore;
use crate::translation::types::TranslationMap;

use super::accumulator::ResultAccumulator;

/// 合并方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeMode {
    /// 新译文覆盖到已有存储之上
    Incremental,
    /// 全量重译：用本次译文整体替换存储
    Overwrite,
}

/// 合并报告
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub files_saved: usize,
    pub keys_written: usize,
    /// 全部目标键都有译文的工作项
    pub items_complete: usize,
    pub items_partial: usize,
    /// 没有任何译文的工作项
    pub items_failed: usize,
    pub save_errors: usize,
}

struct Group<'a> {
    keys: IndexSet<&'a str>,
    existing: &'a TranslationMap,
}

/// 把累加的译文写回各(命名空间, 语言)存储
///
/// 结果只取工作项请求过的键，意外多出的键被丢弃。同一(命名空间, 语言)的
/// 多个工作项合并后只写一次，以第一个工作项加载的已有译文为基础。
pub fn merge_results(
    store: &LocalizationStore,
    items: &[WorkItem],
    results: &ResultAccumulator,
    mode: MergeMode,
) -> MergeReport {
    let mut report = MergeReport::default();
    let mut groups: IndexMap<(&str, &str), Group<'_>> = IndexMap::new();

    for item in items {
        let translated = results.get(&item.namespace, &item.language.code);
        let done = item
            .keys
            .iter()
            .filter(|key| translated.is_some_and(|map| map.contains_key(key.as_str())))
            .count();

        if done == item.keys.len() {
            report.items_complete += 1;
        } else if done == 0 {
            report.items_failed += 1;
            tracing::warn!(
                "{} -> {}: {} 个键没有获得任何译文",
                item.namespace,
                item.language.code,
                item.keys.len()
            );
        } else {
            report.items_partial += 1;
            tracing::warn!(
                "{} -> {}: 只获得 {}/{} 个键的译文",
                item.namespace,
                item.language.code,
                done,
                item.keys.len()
            );
        }

        groups
            .entry((item.namespace.as_str(), item.language.code.as_str()))
            .or_insert_with(|| Group {
                keys: IndexSet::new(),
                existing: &item.existing,
            })
            .keys
            .extend(item.keys.iter().map(String::as_str));
    }

    for ((namespace, language), group) in groups {
        let Some(translated) = results.get(namespace, language) else {
            continue;
        };

        let fresh: TranslationMap = group
            .keys
            .iter()
            .filter_map(|key| translated.get_key_value(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        if fresh.is_empty() {
            continue;
        }

        let merged = match mode {
            MergeMode::Incremental => {
                let mut merged = group.existing.clone();
                merged.extend(fresh.iter().map(|(k, v)| (k.clone(), v.clone())));
                merged
            }
            MergeMode::Overwrite => {
                if fresh.len() < group.keys.len() {
                    let dropped: Vec<&str> = group
                        .keys
                        .iter()
                        .copied()
                        .filter(|key| !fresh.contains_key(*key))
                        .collect();
                    tracing::warn!(
                        "{} -> {}: 全量覆盖缺少 {} 个键，将在下次运行时补齐: {:?}",
                        namespace,
                        language,
                        dropped.len(),
                        dropped.iter().take(10).collect::<Vec<_>>()
                    );
                }
                fresh.clone()
            }
        };

        match store.save_translations(namespace, language, &merged) {
            Ok(path) => {
                report.files_saved += 1;
                report.keys_written += fresh.len();
                tracing::info!("已更新 {} 个译文: {}", fresh.len(), path.display());
            }
            Err(e) => {
                report.save_errors += 1;
                tracing::error!("保存 {} -> {} 失败: {}", namespace, language, e);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::engine::RequestOutcome;
    use crate::translation::types::Language;

    fn map(pairs: &[(&str, &str)]) -> TranslationMap {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn item(keys: &[&str], existing: TranslationMap) -> WorkItem {
        WorkItem {
            namespace: "pack".into(),
            language: Language::new("fr_fr", "French"),
            keys: keys.iter().map(|k| k.to_string()).collect(),
            existing,
        }
    }

    fn results(pairs: &[(&str, &str)]) -> ResultAccumulator {
        let mut accumulator = ResultAccumulator::new();
        accumulator.absorb(RequestOutcome {
            request_id: 1,
            namespace: "pack".into(),
            language: "fr_fr".into(),
            batch_index: 1,
            total_batches: 1,
            translations: Some(map(pairs)),
            attempts: 1,
            api_failures: 0,
            validation_failures: 0,
            last_error: None,
        });
        accumulator
    }

    fn store() -> (tempfile::TempDir, LocalizationStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalizationStore::new(dir.path().join("assets"), dir.path().join("translate"));
        (dir, store)
    }

    #[test]
    fn test_incremental_merge_keeps_existing() {
        let (_dir, store) = store();
        let existing = map(&[("old", "Ancien"), ("b", "B-old")]);
        let items = vec![item(&["b", "c"], existing)];
        let results = results(&[("b", "B-new"), ("c", "C"), ("stray", "X")]);

        let report = merge_results(&store, &items, &results, MergeMode::Incremental);
        assert_eq!(report.files_saved, 1);
        assert_eq!(report.keys_written, 2);
        assert_eq!(report.items_complete, 1);

        let saved = store.load_translations("pack", "fr_fr");
        assert_eq!(saved, map(&[("old", "Ancien"), ("b", "B-new"), ("c", "C")]));
    }

    #[test]
    fn test_no_results_leaves_store_untouched() {
        let (_dir, store) = store();
        store.save_translations("pack", "fr_fr", &map(&[("a", "A")])).unwrap();
        let items = vec![item(&["a"], map(&[("a", "A")]))];

        let report = merge_results(&store, &items, &ResultAccumulator::new(), MergeMode::Overwrite);
        assert_eq!(report.files_saved, 0);
        assert_eq!(report.items_failed, 1);
        assert_eq!(store.load_translations("pack", "fr_fr"), map(&[("a", "A")]));
    }

    #[test]
    fn test_overwrite_replaces_store() {
        let (_dir, store) = store();
        let existing = map(&[("a", "stale"), ("gone", "x")]);
        store.save_translations("pack", "fr_fr", &existing).unwrap();
        let items = vec![item(&["a", "b"], existing)];
        let results = results(&[("b", "B"), ("a", "A")]);

        let report = merge_results(&store, &items, &results, MergeMode::Overwrite);
        assert_eq!(report.files_saved, 1);

        let saved = store.load_translations("pack", "fr_fr");
        assert_eq!(saved.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(!saved.contains_key("gone"));
    }

    #[test]
    fn test_partial_results_are_reported() {
        let (_dir, store) = store();
        let items = vec![item(&["a", "b"], TranslationMap::new())];
        let results = results(&[("a", "A")]);

        let report = merge_results(&store, &items, &results, MergeMode::Incremental);
        assert_eq!(report.items_partial, 1);
        assert_eq!(store.load_translations("pack", "fr_fr"), map(&[("a", "A")]));
    }
}
