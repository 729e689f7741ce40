//! 容错生成适配器
//!
//! 包装任意 LlmClient：传输失败或空回复时合成一条 `{"thought", "answer"}` 形状的错误回复，
//! 保证决策解析器永远拿到文本，编排循环把它当作普通的最终回答处理。

use std::sync::Arc;

use async_trait::async_trait;

use crate::llm::{GenerativeModel, LlmClient};
use crate::memory::Message;

pub struct ResilientModel {
    inner: Arc<dyn LlmClient>,
}

impl ResilientModel {
    pub fn new(inner: Arc<dyn LlmClient>) -> Self {
        Self { inner }
    }
}

/// 错误回复：serde_json 负责转义，错误文本里的引号不会破坏 JSON
pub fn error_reply(message: &str) -> String {
    serde_json::json!({
        "thought": format!("the generation backend failed: {message}"),
        "answer": format!("Sorry, the AI service is temporarily unavailable. Error: {message}"),
    })
    .to_string()
}

#[async_trait]
impl GenerativeModel for ResilientModel {
    async fn generate(&self, messages: &[Message]) -> String {
        match self.inner.complete(messages).await {
            Ok(content) if !content.trim().is_empty() => content,
            Ok(_) => {
                tracing::warn!(model = self.inner.model_name(), "backend returned empty content");
                error_reply("empty response from backend")
            }
            Err(e) => {
                tracing::error!(model = self.inner.model_name(), error = %e, "backend call failed");
                error_reply(&e)
            }
        }
    }

    fn model_name(&self) -> &str {
        self.inner.model_name()
    }
}
