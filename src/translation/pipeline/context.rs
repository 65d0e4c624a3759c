//! 命名空间级上下文窗口
//!
//! 为少量目标键挑选参考映射中的相邻键一并发送。相邻键通常属于同一个界面
//! 或同一段提示文本，能帮助翻译服务消歧。只有核心键的译文会被写回。

use std::collections::BTreeSet;

use crate::translation::types::ReferenceMap;

/// 上下文窗口构建结果
#[derive(Debug, Clone, PartialEq)]
pub struct ContextWindow {
    /// 发送给翻译服务的键值，按参考映射顺序
    pub payload: ReferenceMap,
    /// 需要写回的键，保持调用方给出的顺序
    pub core_keys: Vec<String>,
}

impl ContextWindow {
    /// 仅作为上下文的键数量
    pub fn context_len(&self) -> usize {
        self.payload
            .keys()
            .filter(|key| !self.core_keys.contains(key))
            .count()
    }
}

/// 构建上下文窗口
///
/// `force_context` 为真或参考映射不超过 `budget` 时返回整个映射；否则每个
/// 目标键前后各取至多 `budget / 2` 个相邻键（在边界处截断），合并去重后按
/// 参考映射顺序排列。不在参考映射中的目标键不会进入载荷。
pub fn build_context_window(
    reference: &ReferenceMap,
    targets: &[String],
    budget: usize,
    force_context: bool,
) -> ContextWindow {
    let core_keys = targets.to_vec();

    if force_context || reference.len() <= budget {
        return ContextWindow {
            payload: reference.clone(),
            core_keys,
        };
    }

    let half = budget / 2;
    let total = reference.len();
    let mut selected: BTreeSet<usize> = BTreeSet::new();

    for key in targets {
        let Some(position) = reference.get_index_of(key.as_str()) else {
            tracing::debug!("目标键不在参考映射中: {}", key);
            continue;
        };

        let start = position.saturating_sub(half);
        let end = (position + half + 1).min(total);
        selected.extend(start..end);
    }

    let payload = selected
        .into_iter()
        .filter_map(|index| reference.get_index(index))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    ContextWindow { payload, core_keys }
}
