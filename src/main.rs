//! auto-translate 命令行入口

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use auto_translate::env::{core::LogLevel, EnvVar};
use auto_translate::translation::core::cleanup_stale_keys;
use auto_translate::translation::{
    ConfigManager, LanguageCatalogue, LocalizationStore, TranslationConfig, TranslationResult, TranslationService,
};

/// 资源包本地化文件的增量机器翻译
#[derive(Parser, Debug)]
#[command(name = "auto-translate", version)]
struct Args {
    /// 配置文件路径（默认按搜索路径查找）
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// 全量重译所有命名空间和语言
    #[arg(long)]
    force: bool,

    /// 优先使用非思考模型
    #[arg(long, conflicts_with = "careful")]
    fast: bool,

    /// 优先使用思考模型
    #[arg(long)]
    careful: bool,

    /// 比较的旧版本
    #[arg(long, value_name = "REV")]
    previous_rev: Option<String>,

    /// 比较的新版本
    #[arg(long, value_name = "REV")]
    current_rev: Option<String>,

    /// 参考文档根目录
    #[arg(long, value_name = "DIR")]
    assets_dir: Option<PathBuf>,

    /// 译文存储根目录
    #[arg(long, value_name = "DIR")]
    translate_dir: Option<PathBuf>,

    /// 只清理过期键，不调用翻译服务
    #[arg(long)]
    cleanup_only: bool,

    /// 日志级别或过滤表达式，如 `debug`、`auto_translate=trace`
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,
}

impl Args {
    fn apply(&self, config: &mut TranslationConfig) {
        if self.force {
            config.force_translate = true;
        }
        if self.fast {
            config.prefer_fast = true;
        }
        if self.careful {
            config.prefer_fast = false;
        }
        if let Some(rev) = &self.previous_rev {
            config.previous_revision = rev.clone();
        }
        if let Some(rev) = &self.current_rev {
            config.current_revision = rev.clone();
        }
        if let Some(dir) = &self.assets_dir {
            config.assets_dir = dir.clone();
        }
        if let Some(dir) = &self.translate_dir {
            config.translate_dir = dir.clone();
        }
    }
}

fn init_tracing(filter: Option<&str>) {
    let filter = filter
        .map(str::to_string)
        .unwrap_or_else(|| LogLevel::get_or_default("info".to_string()));
    let env_filter = tracing_subscriber::EnvFilter::try_new(&filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();
}

fn load_config(args: &Args) -> TranslationResult<TranslationConfig> {
    let manager = match &args.config {
        Some(path) => ConfigManager::from_path(path)?,
        None => ConfigManager::new()?,
    };
    let mut config = manager.into_config();
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref());

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("错误: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.cleanup_only {
        let store = LocalizationStore::new(&config.assets_dir, &config.translate_dir);
        let catalogue = LanguageCatalogue::load(&config.languages_file);
        let report = cleanup_stale_keys(&store, &catalogue);
        println!(
            "清理完成: 检查 {} 个文件, {} 个文件删除了 {} 个过期键",
            report.files_checked, report.files_cleaned, report.keys_removed
        );
        return ExitCode::SUCCESS;
    }

    let service = match TranslationService::new(config) {
        Ok(service) => service,
        Err(e) => {
            eprintln!("错误: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match service.run().await {
        Ok(summary) => {
            println!("{}", summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("翻译运行失败: {}", e);
            ExitCode::FAILURE
        }
    }
}
