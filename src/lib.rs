//! Scout - Rust ReAct 智能体
//!
//! 模块划分：
//! - **agent**: 对话 Agent（带记忆 / 无记忆回复）与按配置装配
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误类型
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock）与容错生成能力
//! - **memory**: 对话记忆
//! - **observability**: 日志初始化与事件出口
//! - **prompt**: `${key}` 提示模板与内置 ReAct 提示
//! - **react**: 决策解析器、推理轨迹、ReAct 主循环
//! - **tools**: 工具注册表与内置文件检索工具

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod prompt;
pub mod react;
pub mod tools;

pub use agent::{build_agent_from_config, ConversationAgent};
pub use react::{parse_decision, Decision, ReactAgent};
