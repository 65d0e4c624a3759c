//! 目标语言目录
//!
//! 从 JSON 文件（语言代码 → 展示名称）加载，文件缺失或格式无效时回退到内置目录。

use std::path::Path;

use indexmap::IndexMap;

use crate::translation::types::Language;

/// 内置的目标语言目录
const DEFAULT_LANGUAGES: &[(&str, &str)] = &[
    ("en_us", "English (US)"),
    ("pt_br", "Portuguese (Brazil)"),
    ("ru_ru", "Russian"),
    ("de_de", "German"),
    ("es_es", "Spanish (Spain)"),
    ("es_mx", "Spanish (Mexico)"),
    ("fr_fr", "French (France)"),
    ("fr_ca", "French (Canada)"),
    ("tr_tr", "Turkish"),
    ("ja_jp", "Japanese"),
    ("ko_kr", "Korean"),
    ("pl_pl", "Polish"),
    ("nl_nl", "Dutch"),
    ("it_it", "Italian"),
    ("id_id", "Indonesian"),
    ("vi_vn", "Vietnamese"),
    ("zh_tw", "Traditional Chinese (Taiwan)"),
    ("zh_hk", "Traditional Chinese (Hong Kong)"),
    ("zh_cn", "Simplified Chinese (China)"),
];

/// 目标语言目录，保持声明顺序
#[derive(Debug, Clone, PartialEq)]
pub struct LanguageCatalogue {
    languages: IndexMap<String, String>,
}

impl LanguageCatalogue {
    /// 内置目录
    pub fn builtin() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES
                .iter()
                .map(|(code, name)| (code.to_string(), name.to_string()))
                .collect(),
        }
    }

    /// 从语言代码和名称列表创建
    pub fn from_pairs<I, C, N>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, N)>,
        C: Into<String>,
        N: Into<String>,
    {
        Self {
            languages: pairs
                .into_iter()
                .map(|(code, name)| (code.into(), name.into()))
                .collect(),
        }
    }

    /// 从文件加载，失败时回退到内置目录
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                tracing::warn!("未找到语言列表文件 {}，使用默认列表", path.display());
                return Self::builtin();
            }
        };

        match serde_json::from_str::<IndexMap<String, String>>(&content) {
            Ok(languages) if !languages.is_empty() => {
                tracing::info!("已加载 {} 个目标语言: {}", languages.len(), path.display());
                Self { languages }
            }
            Ok(_) => {
                tracing::warn!("语言列表文件为空 {}，使用默认列表", path.display());
                Self::builtin()
            }
            Err(e) => {
                tracing::warn!("语言列表文件格式无效 {}: {}，使用默认列表", path.display(), e);
                Self::builtin()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.languages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    pub fn contains(&self, code: &str) -> bool {
        self.languages.contains_key(code)
    }

    /// 按语言代码查找
    pub fn get(&self, code: &str) -> Option<Language> {
        self.languages
            .get(code)
            .map(|name| Language::new(code, name.as_str()))
    }

    /// 按声明顺序遍历所有语言
    pub fn iter(&self) -> impl Iterator<Item = Language> + '_ {
        self.languages
            .iter()
            .map(|(code, name)| Language::new(code.as_str(), name.as_str()))
    }
}

impl Default for LanguageCatalogue {
    fn default() -> Self {
        Self::builtin()
    }
}
