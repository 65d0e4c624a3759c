//! 提示词模板
//!
//! 模板文件开头的标题行（`#` 开头）和空行会被跳过，支持
//! `{{target_language}}` 与 `{{content_to_translate}}` 两个变量。
//! 模板缺失时使用内置提示词。

use std::path::Path;

const TARGET_LANGUAGE: &str = "{{target_language}}";
const CONTENT_TO_TRANSLATE: &str = "{{content_to_translate}}";

const DEFAULT_SYSTEM_PROMPT: &str = "你是一名专业的游戏本地化译者，熟悉 Minecraft 模组与资源包的术语。";

const DEFAULT_USER_PROMPT: &str = "\
请把下面 JSON 中的本地化文本翻译为{{target_language}}。

要求：
1. 保持 JSON 结构和全部键名不变，只翻译值
2. 原样保留 %s、%1$s 等格式占位符以及颜色代码
3. 同一术语前后保持一致，贴合游戏语境
4. 值为列表时，参考列表中的全部条目，但只输出一个{{target_language}}字符串

源文本：
{{content_to_translate}}

只返回翻译后的 JSON，不要附加任何解释。";

/// 提示词模板
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromptTemplates {
    system: Option<String>,
    user: Option<String>,
}

impl PromptTemplates {
    pub fn new(system: Option<String>, user: Option<String>) -> Self {
        Self { system, user }
    }

    /// 从文件加载，单个文件缺失或为空时回退到内置提示词
    pub fn load(system_path: &Path, user_path: &Path) -> Self {
        Self {
            system: load_template(system_path),
            user: load_template(user_path),
        }
    }

    pub fn render_system(&self, target_language: &str) -> String {
        self.system
            .as_deref()
            .unwrap_or(DEFAULT_SYSTEM_PROMPT)
            .replace(TARGET_LANGUAGE, target_language)
    }

    pub fn render_user(&self, target_language: &str, content: &str) -> String {
        // 先替换语言名，内容中的花括号不会被再次处理
        self.user
            .as_deref()
            .unwrap_or(DEFAULT_USER_PROMPT)
            .replace(TARGET_LANGUAGE, target_language)
            .replace(CONTENT_TO_TRANSLATE, content)
    }
}

fn load_template(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => {
            let body = strip_heading(&content);
            if body.is_empty() {
                tracing::warn!("提示词模板为空 {}，使用默认提示词", path.display());
                None
            } else {
                Some(body)
            }
        }
        Err(e) => {
            tracing::warn!("无法加载提示词模板 {}: {}，使用默认提示词", path.display(), e);
            None
        }
    }
}

/// 跳过开头的标题行和空行，正文开始后的内容原样保留
pub fn strip_heading(content: &str) -> String {
    let mut started = false;
    let mut body = String::with_capacity(content.len());

    for line in content.split_inclusive('\n') {
        let trimmed = line.trim();
        if !started {
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            started = true;
        }
        body.push_str(line);
    }

    body.trim().to_string()
}
