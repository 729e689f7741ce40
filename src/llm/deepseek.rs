//! DeepSeek API 客户端（OpenAI 兼容格式）
//!
//! - Base URL: https://api.deepseek.com
//! - 模型: deepseek-chat (常规对话), deepseek-reasoner (思考模式)

use crate::core::AgentError;
use crate::llm::OpenAiClient;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";
pub const DEEPSEEK_REASONER: &str = "deepseek-reasoner";

/// 创建 DeepSeek 客户端
///
/// - api_key 为空时依次读取环境变量 `DEEPSEEK_API_KEY`、`OPENAI_API_KEY`
/// - model 为空时读取 `DEEPSEEK_MODEL`，仍未设置则用 `deepseek-chat`
/// - base_url 为空时用官方地址
pub fn create_deepseek_client(
    model: Option<&str>,
    api_key: Option<&str>,
    base_url: Option<&str>,
) -> Result<OpenAiClient, AgentError> {
    let api_key = api_key
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_API_KEY").ok())
        .or_else(|| std::env::var("OPENAI_API_KEY").ok())
        .ok_or_else(|| {
            AgentError::Config("DeepSeek API key missing; set DEEPSEEK_API_KEY".to_string())
        })?;

    let model = model
        .map(String::from)
        .or_else(|| std::env::var("DEEPSEEK_MODEL").ok())
        .unwrap_or_else(|| DEEPSEEK_CHAT.to_string());

    OpenAiClient::new(base_url.unwrap_or(DEEPSEEK_BASE_URL), &model, &api_key)
}
