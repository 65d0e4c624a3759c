//! 翻译服务客户端
//!
//! `TranslationBackend` 是执行引擎与翻译服务之间的接缝：引擎只关心
//! "给定载荷和参数，返回模型回复文本或错误"。生产实现是调用
//! OpenAI 兼容 chat/completions 接口的 `ChatCompletionClient`。

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::translation::config::{constants, TranslationConfig};
use crate::translation::error::{TranslationError, TranslationResult};
use crate::translation::types::Language;

use super::prompt::PromptTemplates;

/// 模型变体
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    /// 非思考模式
    Fast,
    /// 思考模式
    Careful,
}

impl ModelVariant {
    pub fn from_preference(prefer_fast: bool) -> Self {
        if prefer_fast {
            ModelVariant::Fast
        } else {
            ModelVariant::Careful
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            ModelVariant::Fast => ModelVariant::Careful,
            ModelVariant::Careful => ModelVariant::Fast,
        }
    }
}

/// 一次服务调用的全部输入
#[derive(Debug, Clone)]
pub struct ServiceCall {
    pub namespace: String,
    pub language: Language,
    /// 序列化后的载荷（缩进 JSON）
    pub source_json: String,
    pub temperature: f32,
    pub variant: ModelVariant,
    /// 从 1 开始的总尝试次数
    pub attempt: u32,
}

/// 翻译服务后端
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    /// 完成一次调用，返回模型回复的正文
    ///
    /// 这里返回的任何错误都计入 API 失败通道。
    async fn complete(&self, call: &ServiceCall) -> TranslationResult<String>;

    /// 变体对应的模型名称，用于日志
    fn model_name(&self, variant: ModelVariant) -> String {
        match variant {
            ModelVariant::Fast => "fast".to_string(),
            ModelVariant::Careful => "careful".to_string(),
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    stream: bool,
}

/// OpenAI 兼容的 chat/completions 客户端
pub struct ChatCompletionClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    fast_model: String,
    careful_model: String,
    prompts: PromptTemplates,
}

impl ChatCompletionClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        prompts: PromptTemplates,
    ) -> TranslationResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslationError::ConfigError(format!("无法创建 HTTP 客户端: {}", e)))?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key: api_key.into(),
            fast_model: constants::FAST_MODEL.to_string(),
            careful_model: constants::CAREFUL_MODEL.to_string(),
            prompts,
        })
    }

    /// 按配置创建，缺少 API 密钥时返回致命的配置错误
    pub fn from_config(config: &TranslationConfig) -> TranslationResult<Self> {
        let api_key = config.require_api_key()?;
        let prompts = PromptTemplates::load(&config.system_prompt_file, &config.user_prompt_file);

        let mut client = Self::new(&config.api_url, api_key, config.api_timeout(), prompts)?;
        client.fast_model = config.fast_model.clone();
        client.careful_model = config.careful_model.clone();
        Ok(client)
    }

    fn model(&self, variant: ModelVariant) -> &str {
        match variant {
            ModelVariant::Fast => &self.fast_model,
            ModelVariant::Careful => &self.careful_model,
        }
    }
}

#[async_trait]
impl TranslationBackend for ChatCompletionClient {
    async fn complete(&self, call: &ServiceCall) -> TranslationResult<String> {
        let request = ChatRequest {
            model: self.model(call.variant),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: self.prompts.render_system(&call.language.name),
                },
                ChatMessage {
                    role: "user",
                    content: self.prompts.render_user(&call.language.name, &call.source_json),
                },
            ],
            temperature: call.temperature,
            stream: false,
        };

        let response = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let body: String = body.chars().take(200).collect();
            return Err(TranslationError::ApiStatus {
                status: status.as_u16(),
                body,
            });
        }

        extract_content(&body)
    }

    fn model_name(&self, variant: ModelVariant) -> String {
        self.model(variant).to_string()
    }
}

/// 从响应体中取出 `choices[0].message.content`
///
/// 先去掉空白行再解析，失败时退回原始响应体。
pub fn extract_content(body: &str) -> TranslationResult<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return Err(TranslationError::EnvelopeError("服务返回空响应".to_string()));
    }

    let filtered = trimmed
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    let envelope: Value = match serde_json::from_str(&filtered) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("过滤后解析响应失败，尝试原始响应: {}", e);
            serde_json::from_str(body)
                .map_err(|e| TranslationError::EnvelopeError(format!("响应不是有效的 JSON: {}", e)))?
        }
    };

    envelope
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(|content| content.trim().to_string())
        .ok_or_else(|| TranslationError::EnvelopeError("响应缺少 choices[0].message.content".to_string()))
}
