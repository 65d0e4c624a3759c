//! 配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::translation::error::{TranslationError, TranslationResult};

/// 翻译编排配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TranslationConfig {
    // 翻译服务
    pub api_url: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub fast_model: String,
    pub careful_model: String,
    pub prefer_fast: bool,
    pub api_timeout_secs: u64,

    // 运行模式
    pub force_translate: bool,
    pub debug: bool,

    // 资源布局
    pub assets_dir: PathBuf,
    pub translate_dir: PathBuf,
    pub system_prompt_file: PathBuf,
    pub user_prompt_file: PathBuf,
    pub languages_file: PathBuf,
    pub log_dir: PathBuf,

    // 批次与上下文
    pub batch_size: usize,
    pub context_size: usize,
    pub max_context: usize,
    pub min_keys_for_context: usize,

    // 重试与升级
    pub max_retries: u32,
    pub default_temperature: f32,
    pub temperature_schedule: Vec<f32>,
    pub api_retry_delay_ms: u64,
    pub validation_retry_delay_ms: u64,

    // 并发，0 表示不限制
    pub max_concurrent_requests: usize,

    // 版本
    pub previous_revision: String,
    pub current_revision: String,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            api_url: constants::DEFAULT_API_URL.to_string(),
            api_key: None,
            fast_model: constants::FAST_MODEL.to_string(),
            careful_model: constants::CAREFUL_MODEL.to_string(),
            prefer_fast: false,
            api_timeout_secs: constants::DEFAULT_API_TIMEOUT.as_secs(),

            force_translate: false,
            debug: false,

            assets_dir: PathBuf::from(constants::DEFAULT_ASSETS_DIR),
            translate_dir: PathBuf::from(constants::DEFAULT_TRANSLATE_DIR),
            system_prompt_file: PathBuf::from(constants::DEFAULT_SYSTEM_PROMPT_FILE),
            user_prompt_file: PathBuf::from(constants::DEFAULT_USER_PROMPT_FILE),
            languages_file: PathBuf::from(constants::DEFAULT_LANGUAGES_FILE),
            log_dir: PathBuf::from(constants::DEFAULT_LOG_DIR),

            batch_size: constants::BATCH_SIZE,
            context_size: constants::CONTEXT_SIZE,
            max_context: constants::MAX_CONTEXT,
            min_keys_for_context: constants::MIN_KEYS_FOR_CONTEXT,

            max_retries: constants::MAX_INDIVIDUAL_RETRIES,
            default_temperature: constants::DEFAULT_TEMPERATURE,
            temperature_schedule: constants::TEMPERATURE_ADJUSTMENTS.to_vec(),
            api_retry_delay_ms: constants::API_RETRY_DELAY.as_millis() as u64,
            validation_retry_delay_ms: constants::VALIDATION_RETRY_DELAY.as_millis() as u64,

            max_concurrent_requests: 0,

            previous_revision: constants::DEFAULT_PREVIOUS_REVISION.to_string(),
            current_revision: constants::DEFAULT_CURRENT_REVISION.to_string(),
        }
    }
}

impl TranslationConfig {
    /// 以指定工作目录为根创建配置，所有相对路径都挂在该目录下
    pub fn rooted_at(root: &Path) -> Self {
        let defaults = Self::default();
        Self {
            assets_dir: root.join(&defaults.assets_dir),
            translate_dir: root.join(&defaults.translate_dir),
            system_prompt_file: root.join(&defaults.system_prompt_file),
            user_prompt_file: root.join(&defaults.user_prompt_file),
            languages_file: root.join(&defaults.languages_file),
            log_dir: root.join(&defaults.log_dir),
            ..defaults
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.batch_size == 0 {
            return Err(TranslationError::ConfigError("批次大小不能为0".to_string()));
        }

        if self.max_retries == 0 {
            return Err(TranslationError::ConfigError("最大重试次数不能为0".to_string()));
        }

        if self.temperature_schedule.is_empty() {
            return Err(TranslationError::ConfigError("温度调整序列不能为空".to_string()));
        }

        if self.api_timeout_secs == 0 {
            return Err(TranslationError::ConfigError("请求超时必须大于0".to_string()));
        }

        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            return Err(TranslationError::ConfigError(format!(
                "无效的API地址: {}",
                self.api_url
            )));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        use crate::env::{core, translation, EnvVar};

        if let Ok(api_key) = translation::ApiKey::get() {
            self.api_key = Some(api_key);
        }

        if let Ok(api_url) = translation::ApiUrl::get() {
            self.api_url = api_url;
            tracing::info!("环境变量覆盖 API URL: {}", self.api_url);
        }

        if translation::ForceTranslate::is_set() {
            self.force_translate = translation::ForceTranslate::get_or_default(false);
        }

        if translation::NonThinkingMode::is_set() {
            self.prefer_fast = translation::NonThinkingMode::get_or_default(false);
        }

        if core::Debug::is_set() {
            self.debug = core::Debug::get_or_default(false);
        }

        if let Ok(max_concurrent) = translation::MaxConcurrentRequests::get() {
            self.max_concurrent_requests = max_concurrent;
        }

        if let Ok(batch_size) = translation::BatchSize::get() {
            self.batch_size = batch_size;
        }

        if let Ok(timeout) = translation::ApiTimeout::get() {
            self.api_timeout_secs = timeout.as_secs();
        }
    }

    /// 获取服务密钥，缺失时为致命配置错误
    pub fn require_api_key(&self) -> TranslationResult<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(TranslationError::ConfigError(format!(
                "未设置 {} 环境变量",
                <crate::env::translation::ApiKey as crate::env::EnvVar<String>>::NAME
            ))),
        }
    }

    /// 转换为Duration类型
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    pub fn api_retry_delay(&self) -> Duration {
        Duration::from_millis(self.api_retry_delay_ms)
    }

    pub fn validation_retry_delay(&self) -> Duration {
        Duration::from_millis(self.validation_retry_delay_ms)
    }
}

/// 配置管理器
pub struct ConfigManager {
    config: TranslationConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器：.env → 配置文件 → 环境变量 → 校验
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();
        let config = Self::load_config()?;
        Self::finish(config)
    }

    /// 从指定配置文件创建
    pub fn from_path(path: &Path) -> TranslationResult<Self> {
        Self::load_dotenv();
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        tracing::info!("加载配置文件: {}", expanded);
        let config = Self::load_from_file(&expanded)?;
        Self::finish(config)
    }

    /// 直接使用给定配置（仍会应用环境变量覆盖与校验）
    pub fn with_config(config: TranslationConfig) -> TranslationResult<Self> {
        Self::finish(config)
    }

    fn finish(mut config: TranslationConfig) -> TranslationResult<Self> {
        config.apply_env_overrides();
        config.validate()?;
        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    /// 取出配置
    pub fn into_config(self) -> TranslationConfig {
        self.config
    }

    /// 从默认搜索路径加载配置
    fn load_config() -> TranslationResult<TranslationConfig> {
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(TranslationConfig::default())
    }

    /// 从指定文件加载配置
    fn load_from_file(path: &str) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败 {}: {}", path, e)))?;

        if path.ends_with(".toml") {
            Ok(toml::from_str(&content)?)
        } else {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        let env_files = [".env.local", ".env.development", ".env.production", ".env"];

        for env_file in &env_files {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::info!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let config = TranslationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
