//! LLM 层：客户端抽象与实现（OpenAI 兼容 / DeepSeek / Mock），以及供编排核心使用的容错生成能力

pub mod deepseek;
pub mod mock;
pub mod openai;
pub mod resilient;
pub mod traits;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;

pub use deepseek::{create_deepseek_client, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT, DEEPSEEK_REASONER};
pub use mock::{MockLlmClient, ScriptedLlmClient};
pub use openai::{OpenAiClient, OPENAI_BASE_URL, OPENAI_DEFAULT_MODEL};
pub use resilient::{error_reply, ResilientModel};
pub use traits::{GenerativeModel, LlmClient};

/// 按配置创建后端客户端；provider 未知或凭据缺失时返回配置错误
pub fn create_client_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
    let provider = cfg.llm.provider.trim().to_lowercase();
    match provider.as_str() {
        "mock" => {
            tracing::info!("Using Mock LLM");
            Ok(Arc::new(MockLlmClient))
        }
        "deepseek" => {
            let client = create_deepseek_client(
                cfg.llm.model.as_deref(),
                cfg.llm.api_key.as_deref(),
                cfg.llm.base_url.as_deref(),
            )?;
            tracing::info!(model = client.model_name(), "Using DeepSeek LLM");
            Ok(Arc::new(client))
        }
        "openai" => {
            let api_key = cfg
                .llm
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok())
                .unwrap_or_default();
            let base_url = cfg.llm.base_url.as_deref().unwrap_or(OPENAI_BASE_URL);
            let model = cfg.llm.model.as_deref().unwrap_or(OPENAI_DEFAULT_MODEL);
            let client = OpenAiClient::new(base_url, model, &api_key)?;
            tracing::info!(model, "Using OpenAI LLM");
            Ok(Arc::new(client))
        }
        other => Err(AgentError::Config(format!(
            "unknown llm provider '{other}' (expected mock, openai or deepseek)"
        ))),
    }
}

/// 创建编排核心使用的生成能力：传输错误被转换为决策形状的错误回复
pub fn create_model_from_config(cfg: &AppConfig) -> Result<Arc<dyn GenerativeModel>, AgentError> {
    let client = create_client_from_config(cfg)?;
    Ok(Arc::new(ResilientModel::new(client)))
}
