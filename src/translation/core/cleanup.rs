//! 过期键清理
//!
//! 与本次运行的变更无关：每个存在的译文存储都与当前参考映射比较，
//! 删除参考中已不存在的键。参考为空的命名空间不做处理。

use crate::translation::config::LanguageCatalogue;
use crate::translation::storage::LocalizationStore;
use crate::translation::types::TranslationMap;

/// 清理报告
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub files_checked: usize,
    pub files_cleaned: usize,
    pub keys_removed: usize,
    pub save_errors: usize,
}

pub fn cleanup_stale_keys(store: &LocalizationStore, catalogue: &LanguageCatalogue) -> CleanupReport {
    let mut report = CleanupReport::default();

    for namespace in store.namespaces() {
        let reference = store.merged_reference(&namespace);
        if reference.is_empty() {
            continue;
        }

        for language in catalogue.iter() {
            if !store.translation_exists(&namespace, &language.code) {
                continue;
            }
            report.files_checked += 1;

            let translations = store.load_translations(&namespace, &language.code);
            let before = translations.len();
            let kept: TranslationMap = translations
                .into_iter()
                .filter(|(key, _)| reference.contains_key(key))
                .collect();

            let removed = before - kept.len();
            if removed == 0 {
                continue;
            }

            match store.save_translations(&namespace, &language.code, &kept) {
                Ok(_) => {
                    report.files_cleaned += 1;
                    report.keys_removed += removed;
                    tracing::info!("清理 {}/{}: 删除 {} 个过期键", namespace, language.code, removed);
                }
                Err(e) => {
                    report.save_errors += 1;
                    tracing::error!("清理 {}/{} 时保存失败: {}", namespace, language.code, e);
                }
            }
        }
    }

    if report.keys_removed > 0 {
        tracing::info!(
            "清理完成: {} 个文件删除了 {} 个过期键",
            report.files_cleaned,
            report.keys_removed
        );
    } else {
        tracing::debug!("清理完成: 检查 {} 个文件，没有过期键", report.files_checked);
    }

    report
}
