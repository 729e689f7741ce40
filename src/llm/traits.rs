//! LLM 客户端抽象
//!
//! - `LlmClient`：传输层客户端（OpenAI 兼容 / DeepSeek / Mock），调用可能失败
//! - `GenerativeModel`：编排核心消费的生成能力，约定永不失败；失败以「决策形状」的文本回复表达

use async_trait::async_trait;

use crate::memory::Message;

/// 后端传输客户端：非流式完成
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 对完整消息序列做一次补全
    async fn complete(&self, messages: &[Message]) -> Result<String, String>;

    /// 模型名（用于日志）
    fn model_name(&self) -> &str;
}

/// 生成能力：给定消息序列返回文本。实现方自行吞掉传输错误
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, messages: &[Message]) -> String;

    fn model_name(&self) -> &str;
}
