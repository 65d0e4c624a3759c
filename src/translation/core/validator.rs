//! 回复校验
//!
//! 模型回复必须与发送的载荷拥有完全相同的键集合，且每个值中的格式占位符
//! （`%s`、`%1$s` 等）多重集合与参考值一致。列表参考值取第一个候选比较。

use regex::Regex;
use serde_json::Value;

use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::types::{ReferenceMap, TranslationMap};

const PLACEHOLDER_PATTERN: &str = r"%(?:\d+\$)?s";

/// 去掉回复外层的 Markdown 代码块标记
pub fn strip_code_fence(content: &str) -> &str {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

/// 回复校验器
#[derive(Debug, Clone)]
pub struct ReplyValidator {
    placeholder: Regex,
}

impl ReplyValidator {
    pub fn new() -> TranslationResult<Self> {
        let placeholder = Regex::new(PLACEHOLDER_PATTERN)
            .map_err(|e| TranslationError::InternalError(format!("占位符正则无效: {}", e)))?;
        Ok(Self { placeholder })
    }

    /// 排序后的占位符列表
    pub fn placeholder_tokens<'a>(&self, text: &'a str) -> Vec<&'a str> {
        let mut tokens: Vec<&str> = self.placeholder.find_iter(text).map(|m| m.as_str()).collect();
        tokens.sort_unstable();
        tokens
    }

    pub fn placeholders_match(&self, reference: &str, translated: &str) -> bool {
        self.placeholder_tokens(reference) == self.placeholder_tokens(translated)
    }

    /// 把回复正文解析为键值映射
    ///
    /// 正文不是 JSON 对象时返回 `ParseError`，对象中出现非字符串值时返回
    /// `ValidationError`。两者都计入校验失败通道。
    pub fn parse_reply(&self, content: &str) -> TranslationResult<TranslationMap> {
        let body = strip_code_fence(content);
        let value: Value = serde_json::from_str(body)
            .map_err(|e| TranslationError::ParseError(format!("回复不是有效的 JSON: {}", e)))?;

        let object = match value {
            Value::Object(object) => object,
            other => {
                return Err(TranslationError::ParseError(format!(
                    "回复不是 JSON 对象: {}",
                    json_kind(&other)
                )))
            }
        };

        let mut reply = TranslationMap::with_capacity(object.len());
        let mut errors = Vec::new();
        for (key, value) in object {
            match value {
                Value::String(text) => {
                    reply.insert(key, text);
                }
                other => errors.push(format!("键 '{}' 的值不是字符串: {}", key, json_kind(&other))),
            }
        }

        if errors.is_empty() {
            Ok(reply)
        } else {
            Err(TranslationError::ValidationError(errors.join("; ")))
        }
    }

    /// 返回全部校验错误，空列表表示通过
    pub fn validate(&self, payload: &ReferenceMap, reply: &TranslationMap) -> Vec<String> {
        let mut errors = Vec::new();

        let missing: Vec<&str> = payload
            .keys()
            .filter(|key| !reply.contains_key(key.as_str()))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            errors.push(format!("缺少键: {:?}", missing));
        }

        let extra: Vec<&str> = reply
            .keys()
            .filter(|key| !payload.contains_key(key.as_str()))
            .map(String::as_str)
            .collect();
        if !extra.is_empty() {
            errors.push(format!("多余键: {:?}", extra));
        }

        for (key, value) in payload {
            let Some(translated) = reply.get(key) else {
                continue;
            };
            let reference = value.first();
            if !self.placeholders_match(reference, translated) {
                errors.push(format!(
                    "键 '{}' 的占位符不一致: '{}' -> '{}'",
                    key, reference, translated
                ));
            }
        }

        errors
    }

    /// 解析并校验一次回复
    pub fn check(&self, payload: &ReferenceMap, content: &str) -> TranslationResult<TranslationMap> {
        let reply = self.parse_reply(content)?;
        let errors = self.validate(payload, &reply);
        if errors.is_empty() {
            Ok(reply)
        } else {
            Err(TranslationError::ValidationError(errors.join("; ")))
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
