// 集成测试公共模块
//
// 提供临时工作区、内存翻译后端和内存版本源

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use auto_translate::translation::changes::RevisionSource;
use auto_translate::translation::core::{ModelVariant, ServiceCall, TranslationBackend};
use auto_translate::translation::{
    LanguageCatalogue, LocalizationStore, TranslationConfig, TranslationError, TranslationMap, TranslationResult,
    TranslationService,
};

/// 临时工作区
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp dir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// 测试配置：零等待、较小的重试上限
    pub fn config(&self) -> TranslationConfig {
        let mut config = TranslationConfig::rooted_at(self.root());
        config.api_key = Some("test-key".to_string());
        config.max_retries = 3;
        config.api_retry_delay_ms = 0;
        config.validation_retry_delay_ms = 0;
        config
    }

    pub fn store(&self) -> LocalizationStore {
        let config = self.config();
        LocalizationStore::new(config.assets_dir, config.translate_dir)
    }

    /// 参考文档相对于仓库根目录的路径
    pub fn reference_path(namespace: &str, variant: &str) -> String {
        format!(
            "subprojects/Localization-Resource-Pack/assets/{}/lang/{}.json",
            namespace, variant
        )
    }

    pub fn write_reference(&self, namespace: &str, variant: &str, content: &str) -> PathBuf {
        let path = self.root().join(Self::reference_path(namespace, variant));
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create lang dir");
        std::fs::write(&path, content).expect("write reference");
        path
    }

    pub fn write_translation(&self, namespace: &str, language: &str, content: &str) {
        let path = self.store().store_path(namespace, language);
        std::fs::create_dir_all(path.parent().expect("parent")).expect("create store dir");
        std::fs::write(path, content).expect("write translation");
    }

    pub fn read_translation(&self, namespace: &str, language: &str) -> TranslationMap {
        self.store().load_translations(namespace, language)
    }

    pub fn service(
        &self,
        config: TranslationConfig,
        backend: Arc<dyn TranslationBackend>,
        revisions: Arc<dyn RevisionSource>,
    ) -> TranslationService {
        TranslationService::with_components(config, backend, revisions, catalogue())
    }
}

/// 两种目标语言
pub fn catalogue() -> LanguageCatalogue {
    LanguageCatalogue::from_pairs([("fr_fr", "French (France)"), ("de_de", "German (Germany)")])
}

pub fn map(pairs: &[(&str, &str)]) -> TranslationMap {
    pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
}

/// 把 JSON 对象的值转换为字符串，列表取第一个
fn source_entries(call: &ServiceCall) -> Vec<(String, String)> {
    let value: Value = serde_json::from_str(&call.source_json).expect("source json");
    value
        .as_object()
        .expect("source object")
        .iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(text) => text.clone(),
                Value::Array(items) => items.first().and_then(Value::as_str).unwrap_or_default().to_string(),
                other => other.to_string(),
            };
            (key.clone(), text)
        })
        .collect()
}

/// 给每个值加语言前缀，占位符原样保留
#[derive(Default)]
pub struct EchoBackend {
    calls: AtomicUsize,
    payloads: Mutex<Vec<(String, Vec<String>)>>,
}

impl EchoBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 每次调用的(语言, 载荷键)
    pub fn payloads(&self) -> Vec<(String, Vec<String>)> {
        self.payloads.lock().expect("payloads lock").clone()
    }

    pub fn translate(language: &str, text: &str) -> String {
        format!("[{}] {}", language, text)
    }
}

#[async_trait]
impl TranslationBackend for EchoBackend {
    async fn complete(&self, call: &ServiceCall) -> TranslationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let entries = source_entries(call);
        self.payloads.lock().expect("payloads lock").push((
            call.language.code.clone(),
            entries.iter().map(|(key, _)| key.clone()).collect(),
        ));

        let reply: serde_json::Map<String, Value> = entries
            .into_iter()
            .map(|(key, text)| (key, Value::String(Self::translate(&call.language.code, &text))))
            .collect();
        Ok(format!("```json\n{}\n```", Value::Object(reply)))
    }
}

/// 总是返回网络错误
#[derive(Default)]
pub struct FailingBackend {
    calls: AtomicUsize,
}

impl FailingBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationBackend for FailingBackend {
    async fn complete(&self, _call: &ServiceCall) -> TranslationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(TranslationError::NetworkError("connection reset by peer".to_string()))
    }
}

/// 回复的键集合永远不对
#[derive(Default)]
pub struct KeyMismatchBackend {
    calls: AtomicUsize,
}

impl KeyMismatchBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationBackend for KeyMismatchBackend {
    async fn complete(&self, _call: &ServiceCall) -> TranslationResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(r#"{"unexpected": "x"}"#.to_string())
    }
}

/// 前 N 次回复丢掉占位符，之后正常翻译；记录每次调用的参数
pub struct StubbornBackend {
    failures: usize,
    calls: Mutex<Vec<(f32, ModelVariant)>>,
}

impl StubbornBackend {
    pub fn new(failures: usize) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<(f32, ModelVariant)> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl TranslationBackend for StubbornBackend {
    async fn complete(&self, call: &ServiceCall) -> TranslationResult<String> {
        let attempt = {
            let mut calls = self.calls.lock().expect("calls lock");
            calls.push((call.temperature, call.variant));
            calls.len()
        };

        let reply: serde_json::Map<String, Value> = source_entries(call)
            .into_iter()
            .map(|(key, text)| {
                let text = if attempt <= self.failures {
                    text.replace("%s", "")
                } else {
                    EchoBackend::translate(&call.language.code, &text)
                };
                (key, Value::String(text))
            })
            .collect();
        Ok(Value::Object(reply).to_string())
    }
}

/// 内存版本源
#[derive(Default)]
pub struct StaticRevisionSource {
    files: Vec<String>,
    contents: HashMap<(String, String), String>,
}

impl StaticRevisionSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个文件在两个版本中的内容，`None` 表示该版本中不存在
    pub fn with_file(mut self, path: &str, previous: Option<&str>, current: Option<&str>) -> Self {
        self.files.push(path.to_string());
        if let Some(content) = previous {
            self.contents
                .insert(("HEAD~1".to_string(), path.to_string()), content.to_string());
        }
        if let Some(content) = current {
            self.contents
                .insert(("HEAD".to_string(), path.to_string()), content.to_string());
        }
        self
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

#[async_trait]
impl RevisionSource for StaticRevisionSource {
    async fn changed_files(&self, _previous: &str, _current: &str) -> TranslationResult<Vec<String>> {
        Ok(self.files.clone())
    }

    async fn file_at(&self, revision: &str, path: &str) -> TranslationResult<Option<String>> {
        Ok(self
            .contents
            .get(&(revision.to_string(), path.to_string()))
            .cloned())
    }
}
