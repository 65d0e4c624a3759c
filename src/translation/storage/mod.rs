//! 存储模块
//!
//! 提供参考文档的合并读取和译文存储的持久化。

pub mod store;

pub use store::{merge_reference, parse_document, parse_document_lenient, LocalizationStore};
