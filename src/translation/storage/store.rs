//! 本地化键值存储适配器
//!
//! 布局约定：
//!
//! ```text
//! <assets>/<namespace>/lang/<variant>.json      只读的参考文档
//! <translate>/<namespace>/lang/<language>.json  每个(命名空间, 语言)一份译文存储
//! ```
//!
//! 读取时的输入缺陷（文件无法读取、JSON 无效、值不是字符串）都会记录警告
//! 并以空映射代替，不会中止运行。

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;

use crate::translation::config::constants::{DOCUMENT_EXTENSION, LANG_DIR_NAME};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::types::{ReferenceMap, ReferenceValue, TranslationMap};

/// 把扁平的结构化文档解析为 键 → 字符串 映射
///
/// 非字符串值会被跳过。整个文档无法解析时返回错误，由调用方决定如何降级。
pub fn parse_document(content: &str) -> TranslationResult<TranslationMap> {
    let raw: IndexMap<String, Value> = serde_json::from_str(content)
        .map_err(|e| TranslationError::ParseError(format!("文档不是有效的JSON对象: {}", e)))?;

    let mut document = TranslationMap::with_capacity(raw.len());
    for (key, value) in raw {
        match value {
            Value::String(text) => {
                document.insert(key, text);
            }
            other => {
                tracing::warn!("跳过非字符串值: {} = {}", key, other);
            }
        }
    }
    Ok(document)
}

/// 宽松解析：失败时返回空映射并记录警告
pub fn parse_document_lenient(content: &str, origin: &str) -> TranslationMap {
    match parse_document(content) {
        Ok(document) => document,
        Err(e) => {
            tracing::warn!("无法解析 {}，按空文档处理: {}", origin, e);
            TranslationMap::new()
        }
    }
}

/// 按顺序合并多份参考文档，同键不同值收集为候选列表
pub fn merge_reference<I>(documents: I) -> ReferenceMap
where
    I: IntoIterator<Item = TranslationMap>,
{
    let mut merged = ReferenceMap::new();
    for document in documents {
        for (key, value) in document {
            match merged.get_mut(&key) {
                Some(existing) => existing.absorb(value),
                None => {
                    merged.insert(key, ReferenceValue::Single(value));
                }
            }
        }
    }
    merged
}

/// 文件系统上的本地化存储
#[derive(Debug, Clone)]
pub struct LocalizationStore {
    assets_dir: PathBuf,
    translate_dir: PathBuf,
}

impl LocalizationStore {
    pub fn new(assets_dir: impl Into<PathBuf>, translate_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            translate_dir: translate_dir.into(),
        }
    }

    pub fn assets_dir(&self) -> &Path {
        &self.assets_dir
    }

    pub fn translate_dir(&self) -> &Path {
        &self.translate_dir
    }

    /// 所有带 `lang` 目录的命名空间，按名称排序
    pub fn namespaces(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.assets_dir) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("无法读取资源目录 {}: {}", self.assets_dir.display(), e);
                return Vec::new();
            }
        };

        let mut namespaces: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().join(LANG_DIR_NAME).is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        namespaces.sort();
        namespaces
    }

    /// 命名空间下的所有参考文档，按文件名排序
    pub fn reference_files(&self, namespace: &str) -> Vec<PathBuf> {
        let lang_dir = self.assets_dir.join(namespace).join(LANG_DIR_NAME);
        let entries = match std::fs::read_dir(&lang_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path.extension().and_then(|ext| ext.to_str()) == Some(DOCUMENT_EXTENSION)
            })
            .collect();
        files.sort();
        files
    }

    /// 合并命名空间下所有源语言变体，得到参考映射
    pub fn merged_reference(&self, namespace: &str) -> ReferenceMap {
        let documents = self.reference_files(namespace).into_iter().map(|path| {
            match std::fs::read_to_string(&path) {
                Ok(content) => parse_document_lenient(&content, &path.display().to_string()),
                Err(e) => {
                    tracing::warn!("无法读取参考文档 {}: {}", path.display(), e);
                    TranslationMap::new()
                }
            }
        });
        merge_reference(documents)
    }

    /// 译文存储文件路径
    pub fn store_path(&self, namespace: &str, language: &str) -> PathBuf {
        self.translate_dir
            .join(namespace)
            .join(LANG_DIR_NAME)
            .join(format!("{}.{}", language, DOCUMENT_EXTENSION))
    }

    pub fn translation_exists(&self, namespace: &str, language: &str) -> bool {
        self.store_path(namespace, language).is_file()
    }

    /// 加载译文存储，缺失或无效时返回空映射
    pub fn load_translations(&self, namespace: &str, language: &str) -> TranslationMap {
        let path = self.store_path(namespace, language);
        match std::fs::read_to_string(&path) {
            Ok(content) => parse_document_lenient(&content, &path.display().to_string()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => TranslationMap::new(),
            Err(e) => {
                tracing::warn!("无法读取译文存储 {}: {}", path.display(), e);
                TranslationMap::new()
            }
        }
    }

    /// 保存译文存储（两空格缩进，保留非 ASCII 字符）
    pub fn save_translations(
        &self,
        namespace: &str,
        language: &str,
        translations: &TranslationMap,
    ) -> TranslationResult<PathBuf> {
        let path = self.store_path(namespace, language);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                TranslationError::StorageError(format!("创建目录失败 {}: {}", parent.display(), e))
            })?;
        }

        let mut content = serde_json::to_string_pretty(translations)?;
        content.push('\n');
        std::fs::write(&path, content).map_err(|e| {
            TranslationError::StorageError(format!("写入文件失败 {}: {}", path.display(), e))
        })?;

        tracing::debug!("已保存 {} 个键: {}", translations.len(), path.display());
        Ok(path)
    }
}
