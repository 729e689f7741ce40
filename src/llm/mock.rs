//! Mock LLM 客户端（无需 API）
//!
//! - `MockLlmClient`：按查询关键词给出固定的 action / answer，便于本地跑通 ReAct 流程
//! - `ScriptedLlmClient`：按顺序回放预设回复并记录收到的消息，供测试断言

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::LlmClient;
use crate::memory::{Message, Role};

/// 关键词驱动的 Mock：查询含 count / find 时调用对应文件工具，拿到观察后直接总结
#[derive(Debug, Default)]
pub struct MockLlmClient;

fn last_user(messages: &[Message]) -> &str {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
        .unwrap_or("")
}

/// 从渲染后的提示中取出 `Query:` 行
fn extract_query(prompt: &str) -> &str {
    prompt
        .lines()
        .find_map(|l| l.trim_start().strip_prefix("Query:"))
        .map(str::trim)
        .unwrap_or(prompt)
}

/// 取最近一条观察（`result of <tool>: ...`）
fn last_observation(prompt: &str) -> Option<String> {
    let idx = prompt.rfind("result of ")?;
    let rest = &prompt[idx..];
    let end = rest.find("\n\nAvailable tools").unwrap_or(rest.len());
    Some(rest[..end].trim().to_string())
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        let prompt = last_user(messages);
        let query = extract_query(prompt).to_lowercase();

        if let Some(observation) = last_observation(prompt) {
            return Ok(serde_json::json!({
                "thought": "the tool returned what I need",
                "answer": observation,
            })
            .to_string());
        }

        if query.contains("count") {
            return Ok(r#"{
    "thought": "the user wants a file count, count_files fits",
    "action": {
        "name": "COUNT_FILES",
        "reason": "count files under the workspace root",
        "input": {
            "path": ".",
            "file_pattern": "*",
            "recursive": true
        }
    }
}"#
            .to_string());
        }

        if query.contains("find") {
            return Ok(r#"{
    "thought": "the user wants to locate files, find_files fits",
    "action": {
        "name": "FIND_FILES",
        "reason": "list matching files",
        "input": {
            "path": ".",
            "file_pattern": "*",
            "recursive": true
        }
    }
}"#
            .to_string());
        }

        Ok(r#"{
    "thought": "the query is simple enough to answer directly",
    "answer": "I am a ReAct agent. I can find, count and search files in the workspace. Tell me what to look for."
}"#
        .to_string())
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

/// 按顺序回放回复；回放完后要么重复最后一条，要么返回错误
#[derive(Debug, Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    repeat_last: bool,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlmClient {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    /// 永远返回同一条回复
    pub fn repeating(reply: impl Into<String>) -> Self {
        Self {
            repeat_last: true,
            ..Self::new([reply])
        }
    }

    /// 已收到的调用次数
    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 每次调用收到的消息序列
    pub fn seen(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, String> {
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        let next = self
            .replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        match next {
            Some(reply) => {
                *last = Some(reply.clone());
                Ok(reply)
            }
            None if self.repeat_last => last
                .clone()
                .ok_or_else(|| "no scripted reply".to_string()),
            None => Err("scripted replies exhausted".to_string()),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
