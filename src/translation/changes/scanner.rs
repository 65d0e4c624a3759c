//! 缺失文件与缺失键扫描
//!
//! 为每个目标语言检查译文存储是否完整，缺口以单语言变更集合的形式返回，
//! 保证参考映射中的每个键最终都会出现在所有语言的存储里。

use crate::translation::config::LanguageCatalogue;
use crate::translation::storage::LocalizationStore;
use crate::translation::types::{ReferenceMap, ReferenceValue};

use super::detector::KeyChange;
use super::set::{ChangeSet, ChangeTarget};

fn first_candidate(value: &ReferenceValue) -> ReferenceValue {
    ReferenceValue::Single(value.first().to_string())
}

fn added_set<'a, I>(namespace: &str, language: &str, entries: I) -> ChangeSet
where
    I: IntoIterator<Item = (&'a String, &'a ReferenceValue)>,
{
    let mut set = ChangeSet::new(namespace, ChangeTarget::Language(language.to_string()));
    set.added = entries
        .into_iter()
        .map(|(key, value)| KeyChange::added(key.as_str(), first_candidate(value)))
        .collect();
    set
}

/// 缺失的译文文件：每个缺失的(命名空间, 语言)生成一个包含全部参考键的变更集合
pub fn scan_missing_files(store: &LocalizationStore, catalogue: &LanguageCatalogue) -> Vec<ChangeSet> {
    let mut changes = Vec::new();

    for namespace in store.namespaces() {
        if store.reference_files(&namespace).is_empty() {
            continue;
        }

        let missing: Vec<String> = catalogue
            .iter()
            .filter(|language| !store.translation_exists(&namespace, &language.code))
            .map(|language| language.code)
            .collect();
        if missing.is_empty() {
            continue;
        }

        let reference = store.merged_reference(&namespace);
        if reference.is_empty() {
            tracing::warn!("命名空间 {} 的参考映射为空，跳过缺失文件补全", namespace);
            continue;
        }

        tracing::info!(
            "命名空间 {} 缺失 {} 个译文文件，每个补全 {} 个键",
            namespace,
            missing.len(),
            reference.len()
        );
        for code in missing {
            changes.push(added_set(&namespace, &code, reference.iter()));
        }
    }

    if !changes.is_empty() {
        tracing::info!("发现 {} 个缺失的翻译文件", changes.len());
    }
    changes
}

/// 已有译文文件中缺失的键
pub fn scan_missing_keys(store: &LocalizationStore, catalogue: &LanguageCatalogue) -> Vec<ChangeSet> {
    let mut changes = Vec::new();

    for namespace in store.namespaces() {
        let reference = store.merged_reference(&namespace);
        if reference.is_empty() {
            continue;
        }

        for language in catalogue.iter() {
            if !store.translation_exists(&namespace, &language.code) {
                continue;
            }

            let existing = store.load_translations(&namespace, &language.code);
            let missing: ReferenceMap = reference
                .iter()
                .filter(|(key, _)| !existing.contains_key(key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            if missing.is_empty() {
                continue;
            }

            tracing::info!(
                "为命名空间 {} -> {} 创建缺失键补全任务: {} 个键",
                namespace,
                language.code,
                missing.len()
            );
            changes.push(added_set(&namespace, &language.code, missing.iter()));
        }
    }

    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::types::TranslationMap;

    fn setup() -> (tempfile::TempDir, LocalizationStore) {
        let dir = tempfile::tempdir().unwrap();
        let lang = dir.path().join("assets/pack/lang");
        std::fs::create_dir_all(&lang).unwrap();
        std::fs::write(lang.join("en_us.json"), r#"{"a": "A", "b": "B", "c": "C"}"#).unwrap();
        std::fs::write(lang.join("zh_cn.json"), r#"{"a": "甲"}"#).unwrap();
        let store = LocalizationStore::new(dir.path().join("assets"), dir.path().join("translate"));
        (dir, store)
    }

    #[test]
    fn test_missing_files_produce_single_language_sets() {
        let (_dir, store) = setup();
        let catalogue = LanguageCatalogue::from_pairs([("fr_fr", "French"), ("ja_jp", "Japanese")]);

        let mut existing = TranslationMap::new();
        existing.insert("a".into(), "A-fr".into());
        store.save_translations("pack", "fr_fr", &existing).unwrap();

        let sets = scan_missing_files(&store, &catalogue);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].target, ChangeTarget::Language("ja_jp".into()));
        assert_eq!(sets[0].keys_to_translate(), vec!["a", "b", "c"]);
        // 候选列表取第一个值
        assert_eq!(sets[0].added[0].new_value, Some(ReferenceValue::from("A")));
    }

    #[test]
    fn test_missing_keys_only_for_existing_stores() {
        let (_dir, store) = setup();
        let catalogue = LanguageCatalogue::from_pairs([("fr_fr", "French"), ("ja_jp", "Japanese")]);

        let mut existing = TranslationMap::new();
        existing.insert("a".into(), "A-fr".into());
        existing.insert("c".into(), "C-fr".into());
        store.save_translations("pack", "fr_fr", &existing).unwrap();

        let sets = scan_missing_keys(&store, &catalogue);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].target, ChangeTarget::Language("fr_fr".into()));
        assert_eq!(sets[0].keys_to_translate(), vec!["b"]);
    }
}
