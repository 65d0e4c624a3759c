//! 运行会话
//!
//! 一次运行的上下文：开始时间和失败记录器。失败记录器为每次失败的尝试写一份
//! 详细报告，并在 `error_summary.log` 中追加一条摘要；调试模式下每次尝试都写报告。
//! 写日志失败只会产生警告，不影响翻译本身。
//!
//! 报告在并发请求中写出，文件操作走 `tokio::fs`，摘要文件由异步锁串行追加。

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::translation::config::TranslationConfig;
use crate::translation::error::FailureChannel;

const SUMMARY_FILE: &str = "error_summary.log";
const SEPARATOR: &str = "================================================================================";

/// 一次尝试的记录
#[derive(Debug, Clone)]
pub struct AttemptRecord<'a> {
    pub namespace: &'a str,
    pub language: &'a str,
    pub batch_label: &'a str,
    /// 批次序号，从 1 开始
    pub batch_index: usize,
    pub attempt: u32,
    pub model: &'a str,
    pub temperature: f32,
    pub key_count: usize,
    pub source_json: &'a str,
    /// 失败通道，成功或调试记录时为空
    pub channel: Option<FailureChannel>,
    pub error: Option<String>,
    pub response: Option<&'a str>,
}

/// 失败记录器
#[derive(Debug)]
pub struct FailureRecorder {
    dir: PathBuf,
    debug: bool,
    sequence: AtomicUsize,
    summary_lock: Mutex<()>,
}

impl FailureRecorder {
    /// 打开记录目录并清空上一次的摘要文件
    pub fn open(dir: impl Into<PathBuf>, debug: bool) -> Self {
        let recorder = Self {
            dir: dir.into(),
            debug,
            sequence: AtomicUsize::new(0),
            summary_lock: Mutex::new(()),
        };

        let header = format!(
            "翻译错误汇总日志\n会话开始时间: {}\n{}\n\n",
            Local::now().to_rfc3339(),
            SEPARATOR
        );
        if let Err(e) = fs::create_dir_all(&recorder.dir)
            .and_then(|_| fs::write(recorder.summary_path(), header))
        {
            tracing::warn!("无法初始化错误日志目录 {}: {}", recorder.dir.display(), e);
        }

        recorder
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn summary_path(&self) -> PathBuf {
        self.dir.join(SUMMARY_FILE)
    }

    /// 记录一次失败的尝试
    pub async fn record_failure(&self, record: &AttemptRecord<'_>) {
        let file_name = self.report_name("failure", record);
        if let Err(e) = self.write_report(&file_name, "翻译失败日志", record).await {
            tracing::warn!("无法写入失败日志 {}: {}", file_name, e);
            return;
        }
        if let Err(e) = self.append_summary(&file_name, record).await {
            tracing::warn!("无法写入错误汇总日志: {}", e);
        }
    }

    /// 调试模式下记录每次尝试
    pub async fn record_attempt(&self, record: &AttemptRecord<'_>) {
        if !self.debug {
            return;
        }
        let file_name = self.report_name("attempt", record);
        if let Err(e) = self.write_report(&file_name, "翻译请求日志", record).await {
            tracing::warn!("无法写入调试日志 {}: {}", file_name, e);
        }
    }

    /// 文件名带序号和批次号，同一毫秒内的并发失败互不覆盖
    fn report_name(&self, kind: &str, record: &AttemptRecord<'_>) -> String {
        format!(
            "{}_{}_{:04}_{}_{}_batch_{}_attempt_{}.log",
            kind,
            Local::now().format("%Y%m%d_%H%M%S_%3f"),
            self.sequence.fetch_add(1, Ordering::Relaxed),
            sanitize(record.namespace),
            sanitize(record.language),
            record.batch_index,
            record.attempt
        )
    }

    async fn write_report(&self, file_name: &str, title: &str, record: &AttemptRecord<'_>) -> std::io::Result<()> {
        let mut report = String::new();
        report.push_str(&format!("{} - 尝试次数: {}\n", title, record.attempt));
        report.push_str(&format!("时间: {}\n", Local::now().to_rfc3339()));
        report.push_str(&format!("命名空间: {}\n", record.namespace));
        report.push_str(&format!("目标语言: {}\n", record.language));
        if !record.batch_label.is_empty() {
            report.push_str(&format!("批次: {}\n", record.batch_label.trim()));
        }
        report.push_str(&format!("模型: {}\n", record.model));
        report.push_str(&format!("温度: {}\n", record.temperature));
        report.push_str(&format!("文本数量: {}\n", record.key_count));
        if let Some(channel) = record.channel {
            report.push_str(&format!("失败通道: {}\n", channel));
        }
        report.push_str(SEPARATOR);
        report.push_str("\n\n");

        if let Some(error) = &record.error {
            report.push_str(&format!("错误信息:\n{}\n\n{}\n\n", error, SEPARATOR));
        }

        report.push_str(&format!("原始文本:\n{}\n\n{}\n\n", record.source_json, SEPARATOR));
        report.push_str(&format!(
            "API响应:\n{}\n\n{}\n",
            record.response.unwrap_or("无响应"),
            SEPARATOR
        ));

        tokio::fs::write(self.dir.join(file_name), report).await
    }

    async fn append_summary(&self, file_name: &str, record: &AttemptRecord<'_>) -> std::io::Result<()> {
        let error = record.error.as_deref().unwrap_or_default();
        let mut entry = format!(
            "[{}] 尝试 {} 失败 ({}): {}\n",
            Local::now().to_rfc3339(),
            record.attempt,
            record.channel.map(|c| c.to_string()).unwrap_or_default(),
            truncate(error, 100)
        );
        entry.push_str(&format!("  命名空间: {}\n", record.namespace));
        entry.push_str(&format!("  目标语言: {}\n", record.language));
        if !record.batch_label.is_empty() {
            entry.push_str(&format!("  批次: {}\n", record.batch_label.trim()));
        }
        entry.push_str(&format!("  文件: {}\n", file_name));
        entry.push_str(&format!("  文本数量: {}\n", record.key_count));
        entry.push_str(&format!("  模型: {}\n", record.model));
        entry.push_str(&format!("  温度: {}\n\n", record.temperature));

        self.append_to_summary(&entry).await
    }

    async fn append_to_summary(&self, text: &str) -> std::io::Result<()> {
        // 并发请求共享同一个摘要文件
        let _guard = self.summary_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.summary_path())
            .await?;
        file.write_all(text.as_bytes()).await?;
        file.flush().await
    }

    /// 在摘要文件末尾写入会话结束标记
    pub async fn finish(&self, elapsed: Duration) {
        let marker = format!(
            "{}\n会话结束时间: {} (用时 {:.1}秒)\n",
            SEPARATOR,
            Local::now().to_rfc3339(),
            elapsed.as_secs_f32()
        );
        if let Err(e) = self.append_to_summary(&marker).await {
            tracing::warn!("无法写入错误汇总日志: {}", e);
        }
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        format!("{}...", text.chars().take(max_chars).collect::<String>())
    }
}

/// 运行会话
#[derive(Debug)]
pub struct RunSession {
    recorder: FailureRecorder,
    started_at: Instant,
    started_wall: DateTime<Local>,
}

impl RunSession {
    pub fn open(config: &TranslationConfig) -> Self {
        Self::with_recorder(FailureRecorder::open(&config.log_dir, config.debug))
    }

    pub fn with_recorder(recorder: FailureRecorder) -> Self {
        let started_wall = Local::now();
        tracing::info!("翻译会话开始: {}", started_wall.format("%Y-%m-%d %H:%M:%S"));
        Self {
            recorder,
            started_at: Instant::now(),
            started_wall,
        }
    }

    pub fn recorder(&self) -> &FailureRecorder {
        &self.recorder
    }

    pub fn started_wall(&self) -> DateTime<Local> {
        self.started_wall
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// 结束会话，返回总用时
    pub async fn close(&self) -> Duration {
        let elapsed = self.elapsed();
        self.recorder.finish(elapsed).await;
        tracing::info!("翻译会话结束，用时 {:.1}秒", elapsed.as_secs_f32());
        elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record<'a>(error: Option<String>) -> AttemptRecord<'a> {
        AttemptRecord {
            namespace: "pack",
            language: "fr_fr",
            batch_label: "",
            batch_index: 1,
            attempt: 2,
            model: "deepseek-chat",
            temperature: 1.3,
            key_count: 1,
            source_json: "{\"a\": \"A\"}",
            channel: Some(FailureChannel::Validation),
            error,
            response: Some("{}"),
        }
    }

    fn files(dir: &Path, prefix: &str) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(prefix))
            })
            .collect()
    }

    #[test]
    fn test_summary_is_truncated_at_open() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(SUMMARY_FILE), "stale entry from last run").unwrap();

        let recorder = FailureRecorder::open(dir.path(), false);
        let summary = fs::read_to_string(recorder.summary_path()).unwrap();
        assert!(!summary.contains("stale entry"));
        assert!(summary.contains("会话开始时间"));
    }

    #[tokio::test]
    async fn test_failure_writes_report_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = FailureRecorder::open(dir.path(), false);
        recorder.record_failure(&record(Some("缺少键: [\"a\"]".into()))).await;

        let reports = files(dir.path(), "failure_");
        assert_eq!(reports.len(), 1);
        let report = fs::read_to_string(&reports[0]).unwrap();
        assert!(report.contains("命名空间: pack"));
        assert!(report.contains("失败通道: validation"));

        let summary = fs::read_to_string(recorder.summary_path()).unwrap();
        assert!(summary.contains("尝试 2 失败 (validation)"));
    }

    #[tokio::test]
    async fn test_simultaneous_failures_keep_separate_reports() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = FailureRecorder::open(dir.path(), false);

        // 同一语言的三个批次在同一次尝试中失败
        let mut records = Vec::new();
        for batch_index in 1..=3 {
            let mut failed = record(Some("连接被拒绝".into()));
            failed.batch_index = batch_index;
            failed.attempt = 1;
            records.push(failed);
        }
        futures::future::join_all(records.iter().map(|failed| recorder.record_failure(failed))).await;

        assert_eq!(files(dir.path(), "failure_").len(), 3);
        let summary = fs::read_to_string(recorder.summary_path()).unwrap();
        assert_eq!(summary.matches("尝试 1 失败").count(), 3);
    }

    #[test]
    fn test_reports_with_same_attempt_get_distinct_names() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = FailureRecorder::open(dir.path(), false);
        let failed = record(None);
        assert_ne!(recorder.report_name("failure", &failed), recorder.report_name("failure", &failed));
    }

    #[tokio::test]
    async fn test_close_marks_session_end() {
        let dir = tempfile::tempdir().unwrap();
        let session = RunSession::with_recorder(FailureRecorder::open(dir.path(), false));
        session.close().await;

        let summary = fs::read_to_string(session.recorder().summary_path()).unwrap();
        assert!(summary.contains("会话结束时间"));
    }

    #[tokio::test]
    async fn test_attempts_recorded_only_in_debug() {
        let dir = tempfile::tempdir().unwrap();
        FailureRecorder::open(dir.path(), false).record_attempt(&record(None)).await;
        assert!(files(dir.path(), "attempt_").is_empty());

        FailureRecorder::open(dir.path(), true).record_attempt(&record(None)).await;
        assert_eq!(files(dir.path(), "attempt_").len(), 1);
    }
}
