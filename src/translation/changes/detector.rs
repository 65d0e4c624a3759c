//! 键级变更检测
//!
//! 比较同一参考文档的两个快照，把每个键分类为新增、删除或修改，并把
//! “删除 + 值完全相同的新增”识别为重命名，归入修改。

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::translation::storage::parse_document_lenient;
use crate::translation::types::{ReferenceMap, ReferenceValue};

/// 变更类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Deleted,
    Modified,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeKind::Added => write!(f, "added"),
            ChangeKind::Deleted => write!(f, "deleted"),
            ChangeKind::Modified => write!(f, "modified"),
        }
    }
}

/// 单个键的变更
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyChange {
    pub key: String,
    pub old_value: Option<ReferenceValue>,
    pub new_value: Option<ReferenceValue>,
    pub operation: ChangeKind,
}

impl KeyChange {
    pub fn added(key: impl Into<String>, value: ReferenceValue) -> Self {
        Self {
            key: key.into(),
            old_value: None,
            new_value: Some(value),
            operation: ChangeKind::Added,
        }
    }

    pub fn deleted(key: impl Into<String>, value: ReferenceValue) -> Self {
        Self {
            key: key.into(),
            old_value: Some(value),
            new_value: None,
            operation: ChangeKind::Deleted,
        }
    }

    pub fn modified(key: impl Into<String>, old: ReferenceValue, new: ReferenceValue) -> Self {
        Self {
            key: key.into(),
            old_value: Some(old),
            new_value: Some(new),
            operation: ChangeKind::Modified,
        }
    }
}

/// 一次快照比较的结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyDiff {
    pub added: Vec<KeyChange>,
    pub deleted: Vec<KeyChange>,
    pub modified: Vec<KeyChange>,
}

impl KeyDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

/// 比较两个文档的原始内容，无法解析的一侧按空映射处理
pub fn diff_documents(old_content: Option<&str>, new_content: Option<&str>, origin: &str) -> KeyDiff {
    let to_reference = |content: Option<&str>| -> ReferenceMap {
        content
            .map(|text| parse_document_lenient(text, origin))
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, ReferenceValue::Single(value)))
            .collect()
    };

    diff_snapshots(&to_reference(old_content), &to_reference(new_content))
}

/// 比较两个快照
///
/// 新增和修改按新快照的键顺序输出，删除按旧快照的键顺序输出。
/// 修改的判定比较第一个候选值。
pub fn diff_snapshots(old: &ReferenceMap, new: &ReferenceMap) -> KeyDiff {
    let mut diff = KeyDiff::default();

    for (key, new_value) in new {
        match old.get(key) {
            None => diff.added.push(KeyChange::added(key.as_str(), new_value.clone())),
            Some(old_value) if old_value.first() != new_value.first() => {
                diff.modified.push(KeyChange::modified(
                    key.as_str(),
                    old_value.clone(),
                    new_value.clone(),
                ));
            }
            Some(_) => {}
        }
    }

    for (key, old_value) in old {
        if !new.contains_key(key) {
            diff.deleted.push(KeyChange::deleted(key.as_str(), old_value.clone()));
        }
    }

    collapse_renames(&mut diff);
    diff
}

/// 把唯一匹配的 删除 + 新增 归并为一次修改
///
/// 只考虑单值。某个值在删除集合中出现多次时不做任何归并。
/// 唯一性只在删除一侧检查，同一删除项至多与一个新增项配对。
fn collapse_renames(diff: &mut KeyDiff) {
    if diff.added.is_empty() || diff.deleted.is_empty() {
        return;
    }

    let mut value_counts: HashMap<&str, usize> = HashMap::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for (position, change) in diff.deleted.iter().enumerate() {
        if let Some(ReferenceValue::Single(value)) = &change.old_value {
            *value_counts.entry(value.as_str()).or_insert(0) += 1;
            index.insert(value.as_str(), position);
        }
    }

    let mut used: HashSet<usize> = HashSet::new();
    let mut renames: Vec<KeyChange> = Vec::new();
    let mut remaining_added: Vec<KeyChange> = Vec::new();

    for added in &diff.added {
        let matched = match &added.new_value {
            Some(ReferenceValue::Single(value)) if value_counts.get(value.as_str()) == Some(&1) => {
                index.get(value.as_str()).copied().filter(|position| !used.contains(position))
            }
            _ => None,
        };

        match matched {
            Some(position) => {
                let deleted = &diff.deleted[position];
                tracing::info!("检测到键重命名: {} -> {}", deleted.key, added.key);
                used.insert(position);
                renames.push(KeyChange {
                    key: added.key.clone(),
                    old_value: deleted.old_value.clone(),
                    new_value: added.new_value.clone(),
                    operation: ChangeKind::Modified,
                });
            }
            None => remaining_added.push(added.clone()),
        }
    }

    if renames.is_empty() {
        return;
    }

    let deleted = std::mem::take(&mut diff.deleted);
    diff.deleted = deleted
        .into_iter()
        .enumerate()
        .filter(|(position, _)| !used.contains(position))
        .map(|(_, change)| change)
        .collect();
    diff.added = remaining_added;
    diff.modified.extend(renames);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(pairs: &[(&str, &str)]) -> ReferenceMap {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), ReferenceValue::from(*value)))
            .collect()
    }

    #[test]
    fn test_basic_classification() {
        let old = snapshot(&[("a", "A"), ("b", "B"), ("c", "C")]);
        let new = snapshot(&[("a", "A"), ("b", "B2"), ("d", "D")]);

        let diff = diff_snapshots(&old, &new);
        assert_eq!(diff.added, vec![KeyChange::added("d", "D".into())]);
        assert_eq!(diff.deleted, vec![KeyChange::deleted("c", "C".into())]);
        assert_eq!(diff.modified, vec![KeyChange::modified("b", "B".into(), "B2".into())]);
    }

    #[test]
    fn test_unique_rename_becomes_modification() {
        let old = snapshot(&[("a", "Hello")]);
        let new = snapshot(&[("b", "Hello")]);

        let diff = diff_snapshots(&old, &new);
        assert!(diff.added.is_empty());
        assert!(diff.deleted.is_empty());
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].key, "b");
        assert_eq!(diff.modified[0].old_value, Some("Hello".into()));
        assert_eq!(diff.modified[0].new_value, Some("Hello".into()));
        assert_eq!(diff.modified[0].operation, ChangeKind::Modified);
    }

    #[test]
    fn test_ambiguous_rename_is_left_alone() {
        let old = snapshot(&[("a", "Hello"), ("x", "Hello")]);
        let new = snapshot(&[("b", "Hello")]);

        let diff = diff_snapshots(&old, &new);
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.deleted.len(), 2);
        assert!(diff.modified.is_empty());
    }

    #[test]
    fn test_one_deletion_pairs_with_one_addition() {
        let old = snapshot(&[("a", "Yes")]);
        let new = snapshot(&[("b", "Yes"), ("c", "Yes")]);

        let diff = diff_snapshots(&old, &new);
        assert_eq!(diff.modified.len(), 1);
        assert_eq!(diff.modified[0].key, "b");
        assert_eq!(diff.added, vec![KeyChange::added("c", "Yes".into())]);
        assert!(diff.deleted.is_empty());
    }

    #[test]
    fn test_candidate_values_compare_first_and_never_rename() {
        let mut old = ReferenceMap::new();
        old.insert("k".into(), ReferenceValue::Candidates(vec!["A".into(), "B".into()]));
        old.insert("gone".into(), ReferenceValue::Candidates(vec!["Z".into()]));
        let mut new = ReferenceMap::new();
        new.insert("k".into(), ReferenceValue::Single("A".into()));
        new.insert("fresh".into(), ReferenceValue::Single("Z".into()));

        let diff = diff_snapshots(&old, &new);
        assert!(diff.modified.is_empty());
        assert_eq!(diff.added.len(), 1);
        assert_eq!(diff.deleted.len(), 1);
    }

    #[test]
    fn test_unparseable_snapshot_is_empty() {
        let diff = diff_documents(Some("{broken"), Some(r#"{"a": "A"}"#), "test.json");
        assert_eq!(diff.added, vec![KeyChange::added("a", "A".into())]);

        let diff = diff_documents(None, None, "test.json");
        assert!(diff.is_empty());
    }
}
