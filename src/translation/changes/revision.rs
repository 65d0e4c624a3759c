//! 版本源与基于版本差异的变更收集
//!
//! 版本源只需回答两个问题：两个版本之间改动了哪些文件，以及某个文件在
//! 某个版本下的完整内容。差异获取失败按“没有变更”处理。

use std::path::PathBuf;

use async_trait::async_trait;
use indexmap::IndexMap;
use tokio::process::Command;

use super::detector::{diff_documents, KeyChange};
use super::set::{ChangeSet, ChangeTarget};
use crate::translation::config::constants::{DOCUMENT_EXTENSION, LANG_DIR_NAME};
use crate::translation::error::{TranslationError, TranslationResult};

/// 版本源
#[async_trait]
pub trait RevisionSource: Send + Sync {
    /// 两个版本之间改动的文件（相对仓库根目录的路径）
    async fn changed_files(&self, previous: &str, current: &str) -> TranslationResult<Vec<String>>;

    /// 文件在指定版本下的内容，文件在该版本不存在时返回 `None`
    async fn file_at(&self, revision: &str, path: &str) -> TranslationResult<Option<String>>;
}

/// 基于 git 命令行的版本源
#[derive(Debug, Clone)]
pub struct GitRevisionSource {
    repo_root: PathBuf,
}

impl GitRevisionSource {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> TranslationResult<std::process::Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.repo_root)
            .output()
            .await
            .map_err(|e| TranslationError::RevisionError(format!("无法执行git: {}", e)))
    }
}

#[async_trait]
impl RevisionSource for GitRevisionSource {
    async fn changed_files(&self, previous: &str, current: &str) -> TranslationResult<Vec<String>> {
        let output = self.git(&["diff", "--name-only", previous, current]).await?;
        if !output.status.success() {
            return Err(TranslationError::RevisionError(format!(
                "git diff 失败: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn file_at(&self, revision: &str, path: &str) -> TranslationResult<Option<String>> {
        let object = format!("{}:{}", revision, path);
        let output = self.git(&["show", &object]).await?;
        if !output.status.success() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(&output.stdout).into_owned()))
    }
}

/// 从改动文件路径中识别命名空间
///
/// 只接受 `<assets_marker>/<namespace>/lang/<variant>.json` 形式的路径。
pub fn namespace_of(path: &str, assets_marker: &str) -> Option<String> {
    let parts: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    let suffix = format!(".{}", DOCUMENT_EXTENSION);

    let position = parts.iter().rposition(|part| *part == assets_marker)?;
    if parts.len() != position + 4 {
        return None;
    }

    let namespace = parts[position + 1];
    let lang_dir = parts[position + 2];
    let file_name = parts[position + 3];
    if lang_dir != LANG_DIR_NAME || !file_name.ends_with(&suffix) || file_name.len() == suffix.len() {
        return None;
    }

    Some(namespace.to_string())
}

#[derive(Default)]
struct NamespaceChanges {
    added: IndexMap<String, KeyChange>,
    deleted: IndexMap<String, KeyChange>,
    modified: IndexMap<String, KeyChange>,
}

/// 收集两个版本之间的键级变更，按命名空间聚合
///
/// 同一命名空间下多个变体文件的变更会合并到一个变更集合，目标为所有语言。
pub async fn collect_changes(
    source: &dyn RevisionSource,
    previous: &str,
    current: &str,
    assets_marker: &str,
) -> Vec<ChangeSet> {
    let files = match source.changed_files(previous, current).await {
        Ok(files) => files,
        Err(e) => {
            tracing::warn!("无法获取版本差异，视为没有变更: {}", e);
            return Vec::new();
        }
    };
    tracing::info!("检测到 {} 个变更文件", files.len());

    let mut aggregated: IndexMap<String, NamespaceChanges> = IndexMap::new();

    for path in &files {
        let namespace = match namespace_of(path, assets_marker) {
            Some(namespace) => namespace,
            None => continue,
        };

        let old_content = read_or_none(source, previous, path).await;
        let new_content = read_or_none(source, current, path).await;
        let diff = diff_documents(old_content.as_deref(), new_content.as_deref(), path);
        if diff.is_empty() {
            continue;
        }

        tracing::debug!(
            "{}: 新增 {} / 修改 {} / 删除 {}",
            path,
            diff.added.len(),
            diff.modified.len(),
            diff.deleted.len()
        );

        let bucket = aggregated.entry(namespace).or_default();
        for change in diff.added {
            bucket.added.insert(change.key.clone(), change);
        }
        for change in diff.modified {
            bucket.modified.insert(change.key.clone(), change);
        }
        for change in diff.deleted {
            bucket.deleted.insert(change.key.clone(), change);
        }
    }

    aggregated
        .into_iter()
        .filter(|(_, bucket)| !bucket.added.is_empty() || !bucket.modified.is_empty())
        .map(|(namespace, bucket)| {
            let mut set = ChangeSet::new(namespace, ChangeTarget::AllLanguages);
            set.added = bucket.added.into_values().collect();
            set.modified = bucket.modified.into_values().collect();
            set.deleted = bucket.deleted.into_values().collect();
            set
        })
        .collect()
}

async fn read_or_none(source: &dyn RevisionSource, revision: &str, path: &str) -> Option<String> {
    match source.file_at(revision, path).await {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("无法读取 {}:{}，按空文档处理: {}", revision, path, e);
            None
        }
    }
}
