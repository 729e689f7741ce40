//! 对话 Agent 与装配
//!
//! ConversationAgent 持有提示模板、对话记忆与生成能力，提供带记忆 / 不带记忆两种回复方式；
//! build_agent_from_config 从配置装配出可直接 execute 的 ReactAgent。

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::core::AgentError;
use crate::llm::{create_model_from_config, GenerativeModel};
use crate::memory::{ConversationMemory, Message};
use crate::observability::TracingSink;
use crate::prompt::{react_prompt, PromptParams, PromptTemplate};
use crate::react::ReactAgent;
use crate::tools::default_registry;

/// 对话 Agent：记忆由本实例独占，生成能力通过注入获得
pub struct ConversationAgent {
    name: String,
    template: PromptTemplate,
    memory: ConversationMemory,
    model: Arc<dyn GenerativeModel>,
}

impl ConversationAgent {
    pub fn new(
        name: impl Into<String>,
        template: PromptTemplate,
        model: Arc<dyn GenerativeModel>,
    ) -> Self {
        Self {
            name: name.into(),
            template,
            memory: ConversationMemory::new(),
            model,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn template(&self) -> &PromptTemplate {
        &self.template
    }

    pub fn set_template(&mut self, template: PromptTemplate) {
        self.template = template;
    }

    pub fn model(&self) -> &Arc<dyn GenerativeModel> {
        &self.model
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// 用 params 渲染 system 提示，保证下标 0 是唯一的 system 消息
    pub fn refresh_system(&mut self, params: &PromptParams) {
        let system = self.template.render_system(params);
        self.memory.replace_system(system);
    }

    /// 刷新 system、追加 user、以完整序列调用后端、追加 assistant 回复
    pub async fn respond_with_memory(&mut self, query: &str, params: &PromptParams) -> String {
        self.refresh_system(params);
        self.memory.append(Message::user(query));
        let reply = self.model.generate(self.memory.messages()).await;
        tracing::debug!(agent = %self.name, chars = reply.len(), "memory reply");
        self.memory.append(Message::assistant(reply.clone()));
        reply
    }

    /// 临时的 system + user 两条消息，不读也不写记忆
    pub async fn respond_without_memory(&self, query: &str, params: &PromptParams) -> String {
        let messages = [
            Message::system(self.template.render_system(params)),
            Message::user(query),
        ];
        self.model.generate(&messages).await
    }

    pub fn clear(&mut self) {
        self.memory.clear();
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.memory.snapshot()
    }

    pub fn append(&mut self, msg: Message) {
        self.memory.append(msg);
    }
}

/// 按配置装配 ReactAgent：生成能力（带容错包装）、内置工具表、循环参数与 tracing 事件出口
pub fn build_agent_from_config(cfg: &AppConfig) -> Result<ReactAgent, AgentError> {
    if cfg.agent.max_iterations == 0 {
        return Err(AgentError::Config(
            "agent.max_iterations must be at least 1".to_string(),
        ));
    }
    let model = create_model_from_config(cfg)?;
    let root = cfg.tools.root.clone().unwrap_or_else(|| PathBuf::from("."));
    if !root.is_dir() {
        return Err(AgentError::Config(format!(
            "tools.root is not a directory: {}",
            root.display()
        )));
    }
    let registry = default_registry(&root, &cfg.tools.enabled, cfg.tools.tool_timeout_secs)?;

    tracing::info!(
        agent = %cfg.agent.name,
        model = model.model_name(),
        tools = registry.len(),
        root = %root.display(),
        "agent built"
    );

    Ok(ReactAgent::new(model, registry)
        .with_name(cfg.agent.name.clone())
        .with_template(react_prompt())
        .with_max_iterations(cfg.agent.max_iterations)
        .with_history_window(cfg.agent.history_window)
        .with_max_nesting_depth(cfg.agent.max_nesting_depth)
        .with_sink(Arc::new(TracingSink)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ResilientModel, ScriptedLlmClient};
    use crate::memory::Role;

    fn params(pairs: &[(&str, &str)]) -> PromptParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn agent_with(client: Arc<ScriptedLlmClient>) -> ConversationAgent {
        let template = PromptTemplate::new()
            .with_prefix("You are ${name}.");
        ConversationAgent::new("tester", template, Arc::new(ResilientModel::new(client)))
    }

    #[tokio::test]
    async fn test_respond_with_memory_records_exchange() {
        let client = Arc::new(ScriptedLlmClient::new(["first", "second"]));
        let mut agent = agent_with(Arc::clone(&client));

        let reply = agent
            .respond_with_memory("hi", &params(&[("name", "v1")]))
            .await;
        assert_eq!(reply, "first");
        agent
            .respond_with_memory("again", &params(&[("name", "v2")]))
            .await;

        let snapshot = agent.snapshot();
        let roles: Vec<Role> = snapshot.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User, Role::Assistant]
        );
        // system 原地替换，只有一条
        assert_eq!(snapshot[0].content, "You are v2.");
        assert_eq!(snapshot[3].content, "again");

        let seen = client.seen();
        assert_eq!(seen[1].len(), 4);
    }

    #[tokio::test]
    async fn test_respond_without_memory_leaves_memory_untouched() {
        let client = Arc::new(ScriptedLlmClient::new(["ephemeral"]));
        let mut agent = agent_with(Arc::clone(&client));
        agent.append(Message::user("kept"));

        let reply = agent
            .respond_without_memory("q", &params(&[("name", "x")]))
            .await;
        assert_eq!(reply, "ephemeral");
        assert_eq!(agent.snapshot(), vec![Message::user("kept")]);

        let seen = client.seen();
        assert_eq!(
            seen[0],
            vec![Message::system("You are x."), Message::user("q")]
        );
    }

    #[tokio::test]
    async fn test_respond_with_memory_keeps_earlier_user_turn() {
        let client = Arc::new(ScriptedLlmClient::new(["reply"]));
        let mut agent = agent_with(Arc::clone(&client));
        agent.append(Message::user("earlier user turn"));

        agent.respond_with_memory("now", &params(&[("name", "sys")])).await;

        assert_eq!(
            agent.snapshot(),
            vec![
                Message::system("You are sys."),
                Message::user("earlier user turn"),
                Message::user("now"),
                Message::assistant("reply"),
            ]
        );
    }

    #[test]
    fn test_refresh_system_replaces_index_zero() {
        let client = Arc::new(ScriptedLlmClient::new(Vec::<String>::new()));
        let mut agent = agent_with(client);
        agent.refresh_system(&params(&[("name", "a")]));
        agent.append(Message::user("u"));
        agent.refresh_system(&params(&[("name", "b")]));
        assert_eq!(agent.memory().len(), 2);
        assert_eq!(agent.memory().messages()[0], Message::system("You are b."));
        agent.clear();
        assert!(agent.memory().is_empty());
    }

    #[test]
    fn test_build_agent_from_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.tools.root = Some(dir.path().to_path_buf());
        let agent = build_agent_from_config(&cfg).unwrap();
        assert_eq!(agent.registry().len(), 5);
        assert_eq!(agent.max_iterations(), 5);
    }

    #[test]
    fn test_build_agent_rejects_zero_budget() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.tools.root = Some(dir.path().to_path_buf());
        cfg.agent.max_iterations = 0;
        assert!(matches!(
            build_agent_from_config(&cfg),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn test_build_agent_rejects_missing_root() {
        let mut cfg = AppConfig::default();
        cfg.tools.root = Some(PathBuf::from("/nonexistent/scout-root"));
        assert!(matches!(
            build_agent_from_config(&cfg),
            Err(AgentError::Config(_))
        ));
    }
}
