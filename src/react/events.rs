//! ReAct 过程事件与事件出口
//!
//! 编排循环不直接写日志，而是把结构化事件发给注入的 EventSink：
//! TracingSink 写 tracing 日志，mpsc 发送端可推给前端，NullSink 丢弃。

use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::tools::{ToolInput, ToolName};

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReactEvent {
    /// 开始处理一次顶层查询
    RunStarted { run_id: Uuid, query: String },
    /// 进入第几轮 Think
    IterationStarted {
        run_id: Uuid,
        iteration: usize,
        max_iterations: usize,
    },
    /// 后端回复（预览）
    Thought { run_id: Uuid, iteration: usize, preview: String },
    /// Decide 的结果：action / answer / malformed / unknown_tool
    Decided {
        run_id: Uuid,
        iteration: usize,
        outcome: String,
        detail: String,
    },
    /// 调用工具
    ToolInvoked {
        run_id: Uuid,
        iteration: usize,
        tool: ToolName,
        input: ToolInput,
    },
    /// 工具返回（预览）
    Observation {
        run_id: Uuid,
        iteration: usize,
        tool: ToolName,
        preview: String,
        is_error: bool,
    },
    /// 达到最大迭代次数
    BudgetExhausted { run_id: Uuid, iterations: usize },
    /// 调用方取消
    Cancelled { run_id: Uuid, iteration: usize },
    /// 结束并给出最终文本
    Finished {
        run_id: Uuid,
        iterations: usize,
        answer: String,
    },
}

/// 事件出口
pub trait EventSink: Send + Sync {
    fn emit(&self, event: ReactEvent);
}

/// 丢弃所有事件
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: ReactEvent) {}
}

impl EventSink for mpsc::UnboundedSender<ReactEvent> {
    fn emit(&self, event: ReactEvent) {
        let _ = self.send(event);
    }
}

/// 截断到 max 个字符，超出加 `...`
pub fn preview(text: &str, max: usize) -> String {
    let mut out: String = text.chars().take(max).collect();
    if text.chars().count() > max {
        out.push_str("...");
    }
    out
}
