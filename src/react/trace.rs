//! 推理轨迹
//!
//! 每次顶层查询重新开始的 think / decide / act 记录，与对话记忆分开；
//! 渲染进下一轮 Think 提示时只取最近 N 条，较早的条目保留但不再进入提示。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::memory::Role;

/// 渲染窗口默认大小
pub const DEFAULT_HISTORY_WINDOW: usize = 10;
/// 轨迹为空时渲染的占位文本
pub const EMPTY_HISTORY: &str = "no previous steps";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Think,
    Decide,
    Act,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Think => "think",
            Step::Decide => "decide",
            Step::Act => "act",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TraceEntry {
    pub step: Step,
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
}

impl fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.step, self.role, self.content)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReasoningTrace {
    entries: Vec<TraceEntry>,
}

impl ReasoningTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Step, role: Role, content: impl Into<String>) {
        self.entries.push(TraceEntry {
            step,
            role,
            content: content.into(),
            at: Utc::now(),
        });
    }

    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TraceEntry> {
        self.entries.last()
    }

    /// 回滚到指定长度（取消时丢弃本轮写入）
    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 渲染最近 window 条，每行 `[step] role: content`
    pub fn render(&self, window: usize) -> String {
        if self.entries.is_empty() {
            return EMPTY_HISTORY.to_string();
        }
        let start = self.entries.len().saturating_sub(window);
        self.entries[start..]
            .iter()
            .map(TraceEntry::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_render() {
        assert_eq!(ReasoningTrace::new().render(DEFAULT_HISTORY_WINDOW), EMPTY_HISTORY);
    }

    #[test]
    fn test_render_format() {
        let mut trace = ReasoningTrace::new();
        trace.record(Step::Think, Role::Assistant, "{\"answer\":\"x\"}");
        trace.record(Step::Act, Role::ToolResult, "result of echo: hi");
        assert_eq!(
            trace.render(10),
            "[think] assistant: {\"answer\":\"x\"}\n[act] tool_result: result of echo: hi"
        );
    }

    #[test]
    fn test_render_keeps_most_recent_window_only() {
        let mut trace = ReasoningTrace::new();
        for i in 0..15 {
            trace.record(Step::Think, Role::Assistant, format!("entry {i}"));
        }
        let rendered = trace.render(DEFAULT_HISTORY_WINDOW);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), 10);
        assert_eq!(lines[0], "[think] assistant: entry 5");
        assert_eq!(lines[9], "[think] assistant: entry 14");
        assert_eq!(trace.len(), 15);
    }

    #[test]
    fn test_truncate_rolls_back() {
        let mut trace = ReasoningTrace::new();
        trace.record(Step::Think, Role::Assistant, "a");
        let mark = trace.len();
        trace.record(Step::Decide, Role::Assistant, "b");
        trace.truncate(mark);
        assert_eq!(trace.last().map(|e| e.content.as_str()), Some("a"));
    }
}
