//! ReAct 端到端集成测试：真实文件工具 + 脚本化 / Mock 后端

use std::path::Path;
use std::sync::Arc;

use scout::agent::build_agent_from_config;
use scout::config::AppConfig;
use scout::llm::{LlmClient, ResilientModel, ScriptedLlmClient};
use scout::react::{ReactAgent, MAX_ITERATIONS_REACHED};
use scout::tools::default_registry;

fn workspace() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    std::fs::create_dir_all(root.join("notes/archive")).unwrap();
    std::fs::create_dir_all(root.join("scripts")).unwrap();
    std::fs::write(root.join("notes/todo.txt"), "buy milk").unwrap();
    std::fs::write(root.join("notes/ideas.txt"), "rewrite parser").unwrap();
    std::fs::write(root.join("notes/archive/old.txt"), "old").unwrap();
    std::fs::write(root.join("scripts/player.rs"), "pub struct Player { hp: u32 }").unwrap();
    dir
}

fn scripted_agent(root: &Path, client: &Arc<ScriptedLlmClient>) -> ReactAgent {
    let registry = default_registry(root, &[], 5).unwrap();
    let model = Arc::new(ResilientModel::new(Arc::clone(client) as Arc<dyn LlmClient>));
    ReactAgent::new(model, registry)
}

fn mock_config(root: &Path) -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.llm.provider = "mock".to_string();
    cfg.tools.root = Some(root.to_path_buf());
    cfg
}

#[tokio::test]
async fn test_count_then_answer_with_real_tool() {
    let dir = workspace();
    let client = Arc::new(ScriptedLlmClient::new([
        r#"{
    "thought": "count the notes",
    "action": {
        "name": "COUNT_FILES",
        "reason": "need the total",
        "input": {"path": "notes", "file_pattern": "*.txt", "recursive": true}
    }
}"#,
        r#"{"thought": "the tool said 3", "answer": "There are 3 text notes."}"#,
    ]));
    let mut agent = scripted_agent(dir.path(), &client);

    let answer = agent.execute("how many notes do I have?").await.unwrap();
    assert_eq!(answer, "There are 3 text notes.");

    let seen = client.seen();
    assert_eq!(seen.len(), 2);
    let second_prompt = &seen[1][1].content;
    assert!(second_prompt.contains("result of count_files: count result:"));
    assert!(second_prompt.contains("total: 3"));
    // 工具目录按注册顺序出现在提示里
    assert!(second_prompt.contains("count_files: Count the files"));
}

#[tokio::test]
async fn test_non_recursive_default_applied() {
    let dir = workspace();
    let client = Arc::new(ScriptedLlmClient::new([
        r#"{"action": {"name": "count_files", "input": {"path": "notes"}}}"#,
        r#"{"answer": "ok"}"#,
    ]));
    let mut agent = scripted_agent(dir.path(), &client);
    agent.execute("count").await.unwrap();

    let observation = agent
        .trace()
        .entries()
        .iter()
        .find(|e| e.content.starts_with("result of count_files"))
        .map(|e| e.content.clone())
        .unwrap();
    assert!(observation.contains("total: 2"), "{observation}");
}

#[tokio::test]
async fn test_escape_attempt_is_error_observation() {
    let dir = workspace();
    let client = Arc::new(ScriptedLlmClient::new([
        r#"{"action": {"name": "find_files", "input": {"path": "../.."}}}"#,
        r#"{"answer": "cannot look there"}"#,
    ]));
    let mut agent = scripted_agent(dir.path(), &client);

    assert_eq!(agent.execute("look outside").await.unwrap(), "cannot look there");
    let seen = client.seen();
    assert!(seen[1][1].content.contains("result of find_files: Error: access denied"));
}

#[tokio::test]
async fn test_missing_path_is_plain_observation() {
    let dir = workspace();
    let client = Arc::new(ScriptedLlmClient::new([
        r#"{"action": {"name": "find_files", "input": {"path": "music"}}}"#,
        r#"{"answer": "no music folder"}"#,
    ]));
    let mut agent = scripted_agent(dir.path(), &client);
    agent.execute("find music").await.unwrap();

    let seen = client.seen();
    assert!(seen[1][1]
        .content
        .contains("result of find_files: path does not exist: music"));
}

#[tokio::test]
async fn test_find_scripts_by_content() {
    let dir = workspace();
    let client = Arc::new(ScriptedLlmClient::new([
        r#"{"action": {"name": "find_scripts", "input": {"content_pattern": "Player"}}}"#,
        r#"{"answer": "scripts/player.rs"}"#,
    ]));
    let mut agent = scripted_agent(dir.path(), &client);
    agent.execute("which script defines Player?").await.unwrap();

    let seen = client.seen();
    assert!(seen[1][1].content.contains("found 1 script files:\nscripts/player.rs"));
}

#[tokio::test]
async fn test_mock_backend_from_config_counts_files() {
    let dir = workspace();
    let mut agent = build_agent_from_config(&mock_config(dir.path())).unwrap();

    let answer = agent.execute("count the files").await.unwrap();
    assert!(answer.starts_with("result of count_files:"), "{answer}");
    assert!(answer.contains("total: 4"), "{answer}");
    assert_eq!(agent.iterations(), 2);
}

#[tokio::test]
async fn test_mock_backend_direct_answer() {
    let dir = workspace();
    let mut agent = build_agent_from_config(&mock_config(dir.path())).unwrap();

    let answer = agent.execute("hello there").await.unwrap();
    assert!(answer.contains("ReAct agent"));
    assert_eq!(agent.iterations(), 1);
}

#[tokio::test]
async fn test_budget_from_config() {
    let dir = workspace();
    let mut cfg = mock_config(dir.path());
    cfg.agent.max_iterations = 2;
    let mut agent = build_agent_from_config(&cfg).unwrap();

    assert_eq!(agent.execute("count the files").await.unwrap(), MAX_ITERATIONS_REACHED);
    assert_eq!(agent.iterations(), 2);
}
