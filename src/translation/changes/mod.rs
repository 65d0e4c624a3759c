//! 变更检测模块
//!
//! 版本差异、缺失文件和缺失键三个来源都产出 [`ChangeSet`]，
//! 由编排服务统一转换为翻译工作项。

pub mod detector;
pub mod revision;
pub mod scanner;
pub mod set;

pub use detector::{diff_documents, diff_snapshots, ChangeKind, KeyChange, KeyDiff};
pub use revision::{collect_changes, namespace_of, GitRevisionSource, RevisionSource};
pub use scanner::{scan_missing_files, scan_missing_keys};
pub use set::{ChangeSet, ChangeTarget};
