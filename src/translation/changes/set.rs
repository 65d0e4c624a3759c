//! 命名空间级变更集合

use indexmap::IndexSet;

use super::detector::KeyChange;

/// 变更集合作用的目标语言
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeTarget {
    /// 目录中的所有语言（来自版本差异）
    AllLanguages,
    /// 单一语言（来自缺失文件或缺失键扫描）
    Language(String),
}

/// 一个命名空间的变更集合
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    pub namespace: String,
    pub target: ChangeTarget,
    pub added: Vec<KeyChange>,
    pub deleted: Vec<KeyChange>,
    pub modified: Vec<KeyChange>,
}

impl ChangeSet {
    pub fn new(namespace: impl Into<String>, target: ChangeTarget) -> Self {
        Self {
            namespace: namespace.into(),
            target,
            added: Vec::new(),
            deleted: Vec::new(),
            modified: Vec::new(),
        }
    }

    /// 需要翻译的键：新增 + 修改，去重并保持顺序
    ///
    /// 删除的键交给清理流程处理。
    pub fn keys_to_translate(&self) -> Vec<String> {
        let keys: IndexSet<&str> = self
            .added
            .iter()
            .chain(self.modified.iter())
            .map(|change| change.key.as_str())
            .collect();
        keys.into_iter().map(str::to_string).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
    }
}
