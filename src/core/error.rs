//! Agent 错误类型
//!
//! 只有构建期错误（配置 / 后端不可用）与取消会越过 `ReactAgent::execute` 的边界；
//! 思考-决策-行动循环内部的解析失败、未知工具、工具故障都在循环内消化。

use thiserror::Error;

/// 越过 Agent 边界、需要调用方处理的错误
#[derive(Error, Debug)]
pub enum AgentError {
    /// 调用方通过 CancellationToken 取消了正在执行的查询
    #[error("Cancelled")]
    Cancelled,

    /// 配置缺失或非法（如 API Key 为空、未知工具名）
    #[error("Config error: {0}")]
    Config(String),
}

/// 工具调用失败；ToolRegistry 会将其转为 `Error: ...` 形式的观察结果，从不向上抛出
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid value '{value}' for parameter '{name}' (expected {expected})")]
    InvalidArgument {
        name: String,
        expected: String,
        value: String,
    },

    #[error("{0}")]
    Failed(String),

    #[error("tool panicked: {0}")]
    Panicked(String),

    #[error("tool timed out after {0}s")]
    Timeout(u64),
}

impl ToolError {
    /// 转为交给推理循环的观察文本
    pub fn to_observation(&self) -> String {
        format!("Error: {self}")
    }
}

impl From<String> for ToolError {
    fn from(msg: String) -> Self {
        ToolError::Failed(msg)
    }
}
