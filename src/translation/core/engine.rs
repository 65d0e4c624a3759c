//! 请求执行引擎
//!
//! 这个模块负责把调度好的翻译请求发送到翻译服务，并对每个请求独立地运行
//! 重试与升级状态机。一次运行中的所有请求并发执行，结果汇总到一个按
//! 命名空间和语言分组的累加器中。
//!
//! ## 两个独立的失败计数
//! - **API 失败**: 传输错误、HTTP 非 2xx、超时、响应外层无法解析。
//!   等待较长时间后原样重试，不改变温度和模型变体。
//! - **校验失败**: 回复无法解析、键集合不一致、占位符不一致。
//!   等待较短时间后按升级表调整参数重试。
//!
//! 任一计数达到上限即放弃该请求，请求以空结果结束，不会影响其他请求。
//!
//! ## 升级表
//! 设校验失败次数为 `v`，温度表长度为 `n`：
//! - `v = 0`: 默认温度，首选模型变体
//! - `1 <= v <= n`: 温度表第 `v` 项，首选模型变体
//! - `v > n`: 切换到另一个模型变体，温度表从头循环
//!
//! ## 使用示例
//! ```rust,ignore
//! let engine = Arc::new(TranslationEngine::new(backend, RetryPolicy::from_config(&config))?);
//! let session = Arc::new(RunSession::open(&config));
//! let results = engine.execute_all(plan.requests, session, config.max_concurrent_requests).await?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio::time::{sleep, timeout};

use crate::translation::config::{constants, TranslationConfig};
use crate::translation::error::{FailureChannel, TranslationError, TranslationResult};
use crate::translation::pipeline::TranslationRequest;
use crate::translation::types::TranslationMap;

use super::accumulator::ResultAccumulator;
use super::client::{ModelVariant, ServiceCall, TranslationBackend};
use super::session::{AttemptRecord, RunSession};
use super::validator::ReplyValidator;

/// 重试策略
///
/// 两个失败通道共用同一个上限，但各自计数。
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 每个通道的最大失败次数
    pub max_retries: u32,
    /// 首次尝试以及只发生过 API 失败时使用的温度
    pub default_temperature: f32,
    /// 校验失败后的温度表，逐次趋于保守
    pub temperature_schedule: Vec<f32>,
    /// 首选模型变体
    pub preferred: ModelVariant,
    /// API 失败后的等待时间
    pub api_delay: Duration,
    /// 校验失败后的等待时间
    pub validation_delay: Duration,
    /// 单次调用的超时时间，超时计入 API 失败
    pub request_timeout: Duration,
}

impl RetryPolicy {
    /// 从翻译配置构建重试策略
    pub fn from_config(config: &TranslationConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            default_temperature: config.default_temperature,
            temperature_schedule: config.temperature_schedule.clone(),
            preferred: ModelVariant::from_preference(config.prefer_fast),
            api_delay: config.api_retry_delay(),
            validation_delay: config.validation_retry_delay(),
            request_timeout: config.api_timeout(),
        }
    }

    /// 根据已发生的校验失败次数计算下一次尝试的温度和模型变体
    ///
    /// API 失败次数不参与计算，所以纯网络问题的重试参数始终与首次相同。
    pub fn escalation(&self, validation_failures: u32) -> (f32, ModelVariant) {
        let schedule = &self.temperature_schedule;
        if validation_failures == 0 || schedule.is_empty() {
            return (self.default_temperature, self.preferred);
        }

        let n = schedule.len();
        let v = validation_failures as usize;
        if v <= n {
            (schedule[v - 1], self.preferred)
        } else {
            (schedule[(v - n - 1) % n], self.preferred.flipped())
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: constants::MAX_INDIVIDUAL_RETRIES,
            default_temperature: constants::DEFAULT_TEMPERATURE,
            temperature_schedule: constants::TEMPERATURE_ADJUSTMENTS.to_vec(),
            preferred: ModelVariant::Careful,
            api_delay: constants::API_RETRY_DELAY,
            validation_delay: constants::VALIDATION_RETRY_DELAY,
            request_timeout: constants::DEFAULT_API_TIMEOUT,
        }
    }
}

/// 单个请求的执行结果
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    pub request_id: usize,
    pub namespace: String,
    /// 语言代码
    pub language: String,
    pub batch_index: usize,
    pub total_batches: usize,
    /// 只包含核心键的译文，请求放弃时为 `None`
    pub translations: Option<TranslationMap>,
    /// 总尝试次数
    pub attempts: u32,
    pub api_failures: u32,
    pub validation_failures: u32,
    pub last_error: Option<TranslationError>,
}

impl RequestOutcome {
    pub fn succeeded(&self) -> bool {
        self.translations.is_some()
    }
}

/// 翻译执行引擎
///
/// 引擎本身不保存任何请求级的可变状态：每个请求的计数器都是 `execute` 中的
/// 局部变量，所以同一个引擎可以被多个任务通过 `Arc` 同时使用。
///
/// ## 线程安全性
/// - 翻译后端通过 `Arc<dyn TranslationBackend>` 共享
/// - 校验器只读
/// - 结果由单独的收集任务独占写入累加器，工作任务之间没有共享写状态
pub struct TranslationEngine {
    /// 翻译服务后端
    backend: Arc<dyn TranslationBackend>,
    /// 回复校验器
    validator: ReplyValidator,
    /// 重试策略
    policy: RetryPolicy,
}

impl TranslationEngine {
    /// 创建新的执行引擎
    ///
    /// # 参数
    /// - `backend`: 翻译服务后端
    /// - `policy`: 重试与升级策略
    ///
    /// # 错误
    /// 只有校验器初始化失败时返回 `TranslationError::InternalError`
    pub fn new(backend: Arc<dyn TranslationBackend>, policy: RetryPolicy) -> TranslationResult<Self> {
        Ok(Self {
            backend,
            validator: ReplyValidator::new()?,
            policy,
        })
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// 执行单个请求，直到成功或任一失败通道达到上限
    ///
    /// 这个方法从不返回错误：所有失败都体现在 `RequestOutcome` 中，
    /// 放弃的请求 `translations` 为 `None`。
    ///
    /// # 参数
    /// - `request`: 待执行的请求
    /// - `session`: 当前运行会话，用于写失败记录
    ///
    /// # 返回值
    /// 成功时返回只包含核心键的译文，边界上下文和窗口上下文的键都会被丢弃
    pub async fn execute(&self, request: &TranslationRequest, session: &RunSession) -> RequestOutcome {
        let mut outcome = RequestOutcome {
            request_id: request.id,
            namespace: request.namespace.clone(),
            language: request.language.code.clone(),
            batch_index: request.batch_index,
            total_batches: request.total_batches,
            translations: None,
            attempts: 0,
            api_failures: 0,
            validation_failures: 0,
            last_error: None,
        };

        let source_json = match serde_json::to_string_pretty(&request.payload) {
            Ok(json) => json,
            Err(e) => {
                tracing::error!("[{}] 无法序列化请求载荷: {}", request.namespace, e);
                outcome.last_error = Some(e.into());
                return outcome;
            }
        };

        let max = self.policy.max_retries;
        let label = request.batch_label();

        while outcome.api_failures < max && outcome.validation_failures < max {
            outcome.attempts += 1;

            let (temperature, variant) = self.policy.escalation(outcome.validation_failures);
            let model = self.backend.model_name(variant);
            let call = ServiceCall {
                namespace: request.namespace.clone(),
                language: request.language.clone(),
                source_json: source_json.clone(),
                temperature,
                variant,
                attempt: outcome.attempts,
            };

            session.recorder().record_attempt(&AttemptRecord {
                namespace: &request.namespace,
                language: &request.language.code,
                batch_label: &label,
                batch_index: request.batch_index,
                attempt: outcome.attempts,
                model: &model,
                temperature,
                key_count: request.payload.len(),
                source_json: &source_json,
                channel: None,
                error: None,
                response: None,
            })
            .await;

            let reply = match timeout(self.policy.request_timeout, self.backend.complete(&call)).await {
                Ok(reply) => reply,
                Err(elapsed) => Err(elapsed.into()),
            };

            // 后端错误计入 API 通道，回复内容问题计入校验通道
            let (channel, error, response) = match reply {
                Ok(content) => match self.validator.check(&request.payload, &content) {
                    Ok(translations) => {
                        let core = retain_core_keys(translations, &request.core_keys);
                        self.log_success(request, &label, &outcome);
                        outcome.translations = Some(core);
                        return outcome;
                    }
                    Err(e) => (FailureChannel::Validation, e, Some(content)),
                },
                Err(e) => (FailureChannel::Api, e, None),
            };

            let delay = match channel {
                FailureChannel::Api => {
                    outcome.api_failures += 1;
                    self.policy.api_delay
                }
                FailureChannel::Validation => {
                    outcome.validation_failures += 1;
                    self.policy.validation_delay
                }
            };

            session.recorder().record_failure(&AttemptRecord {
                namespace: &request.namespace,
                language: &request.language.code,
                batch_label: &label,
                batch_index: request.batch_index,
                attempt: outcome.attempts,
                model: &model,
                temperature,
                key_count: request.payload.len(),
                source_json: &source_json,
                channel: Some(channel),
                error: Some(error.to_string()),
                response: response.as_deref(),
            })
            .await;

            let summary = error.summary(constants::ERROR_SUMMARY_CHARS);
            let exhausted = outcome.api_failures >= max || outcome.validation_failures >= max;
            outcome.last_error = Some(error);

            if exhausted {
                tracing::error!(
                    "[总尝试{}|API失败{}/{}|验证失败{}/{}] [{}] {}{} 个文本 -> {} -> 最终失败 ({}): {} (达到重试上限)",
                    outcome.attempts,
                    outcome.api_failures,
                    max,
                    outcome.validation_failures,
                    max,
                    request.namespace,
                    label,
                    request.payload.len(),
                    request.language.name,
                    channel,
                    summary
                );
                break;
            }

            tracing::warn!(
                "[总尝试{}|API失败{}/{}|验证失败{}/{}] [{}] {}-> {} -> {} 失败: {}，{:.1}秒后重试",
                outcome.attempts,
                outcome.api_failures,
                max,
                outcome.validation_failures,
                max,
                request.namespace,
                label,
                request.language.name,
                channel,
                summary,
                delay.as_secs_f32()
            );

            if !delay.is_zero() {
                sleep(delay).await;
            }
        }

        outcome
    }

    /// 并发执行全部请求
    ///
    /// 每个请求一个任务。`max_concurrency` 为 0 时不限制并发，否则用信号量
    /// 限制同时在途的请求数。任务把结果发送到收集任务，由收集任务独占地
    /// 合并进累加器，因此同一(命名空间, 语言)的多个批次不会互相覆盖。
    ///
    /// # 参数
    /// - `requests`: 调度器生成的全部请求
    /// - `session`: 运行会话
    /// - `max_concurrency`: 最大并发数，0 表示不限制
    ///
    /// # 错误
    /// 只有收集任务本身异常退出时返回 `TranslationError::InternalError`；
    /// 单个请求的失败只影响它自己的结果。
    pub async fn execute_all(
        self: &Arc<Self>,
        requests: Vec<TranslationRequest>,
        session: Arc<RunSession>,
        max_concurrency: usize,
    ) -> TranslationResult<ResultAccumulator> {
        if requests.is_empty() {
            return Ok(ResultAccumulator::new());
        }

        let total = requests.len();
        tracing::info!(
            "开始并发执行 {} 个翻译请求 (并发上限: {})",
            total,
            if max_concurrency == 0 {
                "不限".to_string()
            } else {
                max_concurrency.to_string()
            }
        );

        let (tx, mut rx) = mpsc::unbounded_channel::<RequestOutcome>();

        let collector = tokio::spawn(async move {
            let mut accumulator = ResultAccumulator::new();
            let mut completed = 0;
            while let Some(outcome) = rx.recv().await {
                completed += 1;
                tracing::debug!(
                    "请求 {} 完成 ({}/{}): {}",
                    outcome.request_id,
                    completed,
                    total,
                    if outcome.succeeded() { "成功" } else { "失败" }
                );
                accumulator.absorb(outcome);
            }
            accumulator
        });

        let semaphore = (max_concurrency > 0).then(|| Arc::new(Semaphore::new(max_concurrency)));

        let tasks: Vec<_> = requests
            .into_iter()
            .map(|request| {
                let engine = Arc::clone(self);
                let session = Arc::clone(&session);
                let semaphore = semaphore.clone();
                let tx = tx.clone();

                tokio::spawn(async move {
                    // 获取并发许可，信号量不会被关闭
                    let _permit = match semaphore {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };

                    let outcome = engine.execute(&request, &session).await;
                    if tx.send(outcome).is_err() {
                        tracing::error!("结果收集任务已退出，丢弃请求 {} 的结果", request.id);
                    }
                })
            })
            .collect();
        drop(tx);

        for joined in futures::future::join_all(tasks).await {
            if let Err(e) = joined {
                tracing::error!("翻译任务异常退出: {}", e);
            }
        }

        let accumulator = collector
            .await
            .map_err(|e| TranslationError::InternalError(format!("结果收集任务异常退出: {}", e)))?;

        let stats = accumulator.stats();
        tracing::info!(
            "请求执行完成: 成功 {}, 失败 {}, 总尝试 {} (API失败 {}, 验证失败 {})",
            stats.succeeded,
            stats.failed,
            stats.attempts,
            stats.api_failures,
            stats.validation_failures
        );

        Ok(accumulator)
    }

    fn log_success(&self, request: &TranslationRequest, label: &str, outcome: &RequestOutcome) {
        let retries = if outcome.attempts > 1 {
            format!(
                "（API失败{}次，验证失败{}次）",
                outcome.api_failures, outcome.validation_failures
            )
        } else {
            String::new()
        };
        tracing::info!(
            "[总尝试{}|API失败{}|验证失败{}] [{}] {}{} 个文本 -> {} -> 成功{}",
            outcome.attempts,
            outcome.api_failures,
            outcome.validation_failures,
            request.namespace,
            label,
            request.payload.len(),
            request.language.name,
            retries
        );
    }
}

/// 只保留核心键，按核心键顺序
fn retain_core_keys(mut translations: TranslationMap, core_keys: &[String]) -> TranslationMap {
    let mut seen = HashSet::with_capacity(core_keys.len());
    core_keys
        .iter()
        .filter(|key| seen.insert(key.as_str()))
        .filter_map(|key| translations.swap_remove_entry(key.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translation::core::session::FailureRecorder;
    use crate::translation::types::{Language, ReferenceMap, ReferenceValue};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// 按顺序返回预设回复，记录每次调用的参数
    struct ScriptedBackend {
        replies: Mutex<VecDeque<TranslationResult<String>>>,
        calls: Mutex<Vec<(f32, ModelVariant)>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<TranslationResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(f32, ModelVariant)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TranslationBackend for ScriptedBackend {
        async fn complete(&self, call: &ServiceCall) -> TranslationResult<String> {
            self.calls.lock().unwrap().push((call.temperature, call.variant));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TranslationError::NetworkError("no more replies".into())))
        }
    }

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            api_delay: Duration::ZERO,
            validation_delay: Duration::ZERO,
            ..RetryPolicy::default()
        }
    }

    fn request() -> TranslationRequest {
        let payload: ReferenceMap = [
            ("ctx", ReferenceValue::from("Context")),
            ("greet", ReferenceValue::from("Hello %s")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        TranslationRequest {
            id: 1,
            namespace: "pack".into(),
            language: Language::new("fr_fr", "French"),
            payload,
            core_keys: vec!["greet".into()],
            batch_index: 1,
            total_batches: 1,
        }
    }

    fn session() -> (tempfile::TempDir, RunSession) {
        let dir = tempfile::tempdir().unwrap();
        let session = RunSession::with_recorder(FailureRecorder::open(dir.path(), false));
        (dir, session)
    }

    const GOOD: &str = r#"{"ctx": "Contexte", "greet": "Bonjour %s"}"#;

    #[test]
    fn test_escalation_schedule() {
        let policy = RetryPolicy {
            preferred: ModelVariant::Fast,
            ..RetryPolicy::default()
        };

        assert_eq!(policy.escalation(0), (1.3, ModelVariant::Fast));
        assert_eq!(policy.escalation(1), (1.3, ModelVariant::Fast));
        assert_eq!(policy.escalation(4), (1.0, ModelVariant::Fast));
        assert_eq!(policy.escalation(5), (0.7, ModelVariant::Fast));
        assert_eq!(policy.escalation(6), (1.3, ModelVariant::Careful));
        assert_eq!(policy.escalation(10), (0.7, ModelVariant::Careful));
        assert_eq!(policy.escalation(11), (1.3, ModelVariant::Careful));
    }

    #[test]
    fn test_retain_core_keys() {
        let translations: TranslationMap = [("a", "A"), ("b", "B"), ("c", "C")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let core = retain_core_keys(translations, &["c".into(), "a".into(), "missing".into()]);
        assert_eq!(core.keys().collect::<Vec<_>>(), vec!["c", "a"]);
    }

    #[tokio::test]
    async fn test_success_keeps_only_core_keys() {
        let backend = ScriptedBackend::new(vec![Ok(GOOD.to_string())]);
        let engine = TranslationEngine::new(backend.clone(), policy(3)).unwrap();
        let (_dir, session) = session();

        let outcome = engine.execute(&request(), &session).await;
        let translations = outcome.translations.unwrap();
        assert_eq!(translations.len(), 1);
        assert_eq!(translations["greet"], "Bonjour %s");
        assert_eq!(outcome.attempts, 1);
    }

    #[tokio::test]
    async fn test_api_failures_do_not_escalate() {
        let backend = ScriptedBackend::new(vec![
            Err(TranslationError::NetworkError("reset".into())),
            Err(TranslationError::TimeoutError("slow".into())),
            Ok(GOOD.to_string()),
        ]);
        let engine = TranslationEngine::new(backend.clone(), policy(5)).unwrap();
        let (_dir, session) = session();

        let outcome = engine.execute(&request(), &session).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.api_failures, 2);
        assert_eq!(outcome.validation_failures, 0);

        let calls = backend.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|call| *call == calls[0]));
    }

    #[tokio::test]
    async fn test_validation_failures_escalate_temperature() {
        let backend = ScriptedBackend::new(vec![
            Ok(r#"{"ctx": "Contexte", "greet": "Bonjour"}"#.to_string()),
            Ok("not json".to_string()),
            Ok(GOOD.to_string()),
        ]);
        let engine = TranslationEngine::new(backend.clone(), policy(5)).unwrap();
        let (_dir, session) = session();

        let outcome = engine.execute(&request(), &session).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.validation_failures, 2);
        assert_eq!(outcome.api_failures, 0);

        let temperatures: Vec<f32> = backend.calls().iter().map(|(t, _)| *t).collect();
        assert_eq!(temperatures, vec![1.3, 1.3, 1.3]);
    }

    #[tokio::test]
    async fn test_counters_are_independent() {
        // 交替的失败不会让任一通道提前达到上限
        let backend = ScriptedBackend::new(vec![
            Err(TranslationError::NetworkError("reset".into())),
            Ok("{}".to_string()),
            Err(TranslationError::NetworkError("reset".into())),
            Ok("{}".to_string()),
            Ok(GOOD.to_string()),
        ]);
        let engine = TranslationEngine::new(backend, policy(3)).unwrap();
        let (_dir, session) = session();

        let outcome = engine.execute(&request(), &session).await;
        assert!(outcome.succeeded());
        assert_eq!(outcome.attempts, 5);
        assert_eq!(outcome.api_failures, 2);
        assert_eq!(outcome.validation_failures, 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_api_failures() {
        let backend = ScriptedBackend::new(Vec::new());
        let engine = TranslationEngine::new(backend.clone(), policy(4)).unwrap();
        let (_dir, session) = session();

        let outcome = engine.execute(&request(), &session).await;
        assert!(!outcome.succeeded());
        assert_eq!(outcome.attempts, 4);
        assert_eq!(outcome.api_failures, 4);
        assert_eq!(outcome.validation_failures, 0);
        assert!(matches!(outcome.last_error, Some(TranslationError::NetworkError(_))));
    }

    #[tokio::test]
    async fn test_execute_all_merges_batches() {
        let replies = (0..3).map(|_| Ok(GOOD.to_string())).collect();
        let backend = ScriptedBackend::new(replies);
        let engine = Arc::new(TranslationEngine::new(backend, policy(2)).unwrap());
        let (_dir, session) = session();

        let mut requests = Vec::new();
        for (id, language) in [(1, "fr_fr"), (2, "de_de"), (3, "fr_fr")] {
            let mut request = request();
            request.id = id;
            request.language = Language::new(language, language);
            requests.push(request);
        }

        let results = engine.execute_all(requests, Arc::new(session), 2).await.unwrap();
        assert_eq!(results.stats().requests, 3);
        assert_eq!(results.stats().succeeded, 3);
        assert_eq!(results.get("pack", "fr_fr").unwrap().len(), 1);
        assert_eq!(results.get("pack", "de_de").unwrap().len(), 1);
    }
}
