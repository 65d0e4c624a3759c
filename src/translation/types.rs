//! 本地化数据的基础类型

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 参考映射中的值
///
/// 同一个键在多个源语言变体中取值不同时，合并后的参考映射会把这些值
/// 收集为按首次出现顺序排列、去重后的候选列表。持久化的译文存储中
/// 不会出现列表值。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReferenceValue {
    Single(String),
    Candidates(Vec<String>),
}

impl ReferenceValue {
    /// 第一个候选值，用于比较和占位符校验
    pub fn first(&self) -> &str {
        match self {
            ReferenceValue::Single(value) => value,
            ReferenceValue::Candidates(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self, ReferenceValue::Single(_))
    }

    /// 合并一个新出现的值，保持首次出现顺序并去重
    pub fn absorb(&mut self, value: String) {
        match self {
            ReferenceValue::Single(existing) => {
                if *existing != value {
                    let first = std::mem::take(existing);
                    *self = ReferenceValue::Candidates(vec![first, value]);
                }
            }
            ReferenceValue::Candidates(values) => {
                if !values.contains(&value) {
                    values.push(value);
                }
            }
        }
    }
}

impl From<&str> for ReferenceValue {
    fn from(value: &str) -> Self {
        ReferenceValue::Single(value.to_string())
    }
}

impl From<String> for ReferenceValue {
    fn from(value: String) -> Self {
        ReferenceValue::Single(value)
    }
}

impl fmt::Display for ReferenceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.first())
    }
}

/// 合并后的参考映射，保持文件中的键顺序
pub type ReferenceMap = IndexMap<String, ReferenceValue>;

/// 单一语言的译文映射
pub type TranslationMap = IndexMap<String, String>;

/// 目标语言
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Language {
    /// 语言代码，如 `zh_cn`
    pub code: String,
    /// 展示名称，如 `Simplified Chinese (China)`
    pub name: String,
}

impl Language {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.code)
    }
}
