//! 翻译配置管理模块
//!
//! 提供配置管理，支持环境变量、配置文件和默认值，以及目标语言目录

pub mod languages;
pub mod manager;

// 重新导出主要类型
pub use languages::LanguageCatalogue;
pub use manager::{ConfigManager, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 翻译服务
    pub const DEFAULT_API_URL: &str = "https://api.deepseek.com/chat/completions";
    pub const FAST_MODEL: &str = "deepseek-chat";
    pub const CAREFUL_MODEL: &str = "deepseek-reasoner";
    pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(60);

    // 资源布局
    pub const DEFAULT_ASSETS_DIR: &str = "subprojects/Localization-Resource-Pack/assets";
    pub const DEFAULT_TRANSLATE_DIR: &str = "translate";
    pub const DEFAULT_SYSTEM_PROMPT_FILE: &str =
        "subprojects/Localization-Resource-Pack/assets/system_prompt.md";
    pub const DEFAULT_USER_PROMPT_FILE: &str =
        "subprojects/Localization-Resource-Pack/assets/user_prompt.md";
    pub const DEFAULT_LANGUAGES_FILE: &str = "subprojects/Localization-Resource-Pack/languages.json";
    pub const DEFAULT_LOG_DIR: &str = "logs/translation";
    pub const LANG_DIR_NAME: &str = "lang";
    pub const DOCUMENT_EXTENSION: &str = "json";

    // 批次与上下文
    pub const BATCH_SIZE: usize = 40;
    pub const MAX_CONTEXT: usize = 10;
    pub const CONTEXT_SIZE: usize = 4;
    pub const MIN_KEYS_FOR_CONTEXT: usize = 10;

    // 重试与升级
    pub const MAX_INDIVIDUAL_RETRIES: u32 = 10;
    pub const DEFAULT_TEMPERATURE: f32 = 1.3;
    pub const TEMPERATURE_ADJUSTMENTS: [f32; 5] = [1.3, 1.3, 1.2, 1.0, 0.7];
    pub const API_RETRY_DELAY: Duration = Duration::from_secs(5);
    pub const VALIDATION_RETRY_DELAY: Duration = Duration::from_secs(1);
    pub const ERROR_SUMMARY_CHARS: usize = 50;

    // 版本
    pub const DEFAULT_PREVIOUS_REVISION: &str = "HEAD~1";
    pub const DEFAULT_CURRENT_REVISION: &str = "HEAD";

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "auto-translate.toml",
        ".auto-translate.toml",
        "auto-translate.json",
        "~/.config/auto-translate/config.toml",
        "/etc/auto-translate/config.toml",
    ];
}
