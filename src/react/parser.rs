//! 决策解析器
//!
//! 把后端的自由文本回复解析为 Decision（调用工具 / 最终回答 / 无法解析）。回复名义上是 JSON，
//! 但可能带代码围栏、被截断，或把真正的决策再编码成字符串塞进 `content` 字段。
//!
//! 解析刻意不用完整 JSON 反序列化：字段用容错正则提取，`action` / `input` 对象用花括号深度匹配截取，
//! 截断或畸形文本只会让对应字段缺失。任何情况都不会 panic 或返回错误，最差结果是 `Malformed`。

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::tools::{LooseValue, ToolInput, ToolName};

/// `content` 嵌套解包的默认最大层数
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 5;

/// 一次 Decide 步骤的结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decision {
    /// 调用词表内的工具
    Action {
        tool: ToolName,
        /// 回复中原样的工具名
        name: String,
        reason: Option<String>,
        input: ToolInput,
        thought: Option<String>,
    },
    /// 最终回答
    Answer {
        text: String,
        thought: Option<String>,
    },
    /// 无法解析；保留原文用于诊断
    Malformed { raw_text: String, reason: String },
}

impl Decision {
    pub fn kind(&self) -> &'static str {
        match self {
            Decision::Action { .. } => "action",
            Decision::Answer { .. } => "answer",
            Decision::Malformed { .. } => "malformed",
        }
    }

    pub fn thought(&self) -> Option<&str> {
        match self {
            Decision::Action { thought, .. } | Decision::Answer { thought, .. } => thought.as_deref(),
            Decision::Malformed { .. } => None,
        }
    }
}

struct Patterns {
    thought: Regex,
    answer: Regex,
    content: Regex,
    name: Regex,
    reason: Regex,
    action_open: Regex,
    input_open: Regex,
    string_pair: Regex,
    bool_pair: Regex,
}

static PATTERNS: OnceLock<Patterns> = OnceLock::new();

/// `"key": "value"`，value 支持转义引号且非空
fn string_field_re(key: &str) -> Regex {
    Regex::new(&format!(r#""{key}"\s*:\s*"((?:[^"\\]|\\.)+)""#)).expect("field regex")
}

fn object_open_re(key: &str) -> Regex {
    Regex::new(&format!(r#""{key}"\s*:\s*\{{"#)).expect("object regex")
}

fn patterns() -> &'static Patterns {
    PATTERNS.get_or_init(|| Patterns {
        thought: string_field_re("thought"),
        answer: string_field_re("answer"),
        content: string_field_re("content"),
        name: string_field_re("name"),
        reason: string_field_re("reason"),
        action_open: object_open_re("action"),
        input_open: object_open_re("input"),
        string_pair: Regex::new(r#""([^"\\]+)"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("pair regex"),
        bool_pair: Regex::new(r#""([^"\\]+)"\s*:\s*(true|false)\b"#).expect("bool regex"),
    })
}

/// 从回复文本中提取出的原始字段
#[derive(Debug, Default, Clone, PartialEq)]
struct RawFields {
    thought: Option<String>,
    action: Option<RawAction>,
    answer: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq)]
struct RawAction {
    name: Option<String>,
    reason: Option<String>,
    input: ToolInput,
}

impl RawFields {
    fn field_count(&self) -> usize {
        [
            self.thought.is_some(),
            self.action.is_some(),
            self.answer.is_some(),
            self.content.is_some(),
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }

    /// 仅有 content 且其值本身像 JSON 对象时返回内层文本
    fn nested_content(&self) -> Option<String> {
        if self.field_count() != 1 {
            return None;
        }
        self.content
            .as_ref()
            .filter(|inner| inner.trim_start().starts_with('{'))
            .cloned()
    }
}

/// 决策解析器；唯一的参数是 content 嵌套解包的层数上限
#[derive(Debug, Clone, Copy)]
pub struct DecisionParser {
    max_depth: usize,
}

impl Default for DecisionParser {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl DecisionParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn parse(&self, text: &str) -> Decision {
        let mut fields = extract_fields(text);
        let mut depth = 0;
        while depth < self.max_depth {
            let Some(inner) = fields.nested_content() else {
                break;
            };
            depth += 1;
            tracing::debug!(depth, "unwrapping nested content");
            fields = extract_fields(&inner);
        }
        resolve(fields, text)
    }
}

/// 使用默认层数上限解析
pub fn parse_decision(text: &str) -> Decision {
    DecisionParser::default().parse(text)
}

fn resolve(fields: RawFields, raw_text: &str) -> Decision {
    let mut reason = None;

    if let Some(action) = fields.action {
        match action.name {
            Some(name) => match ToolName::parse(&name) {
                Some(tool) => {
                    return Decision::Action {
                        tool,
                        name,
                        reason: action.reason,
                        input: action.input,
                        thought: fields.thought,
                    }
                }
                None => reason = Some(format!("unknown tool name: {name}")),
            },
            None => reason = Some("action object has no name".to_string()),
        }
    }

    if let Some(text) = fields.answer {
        return Decision::Answer {
            text,
            thought: fields.thought,
        };
    }

    Decision::Malformed {
        raw_text: raw_text.to_string(),
        reason: reason.unwrap_or_else(|| "no action or answer found".to_string()),
    }
}

fn extract_fields(text: &str) -> RawFields {
    let json = strip_fences(text);
    let p = patterns();
    RawFields {
        thought: capture_string(&p.thought, json),
        action: object_body(&p.action_open, json).map(parse_action),
        answer: capture_string(&p.answer, json),
        content: capture_string(&p.content, json),
    }
}

fn parse_action(body: &str) -> RawAction {
    let p = patterns();
    RawAction {
        name: capture_string(&p.name, body),
        reason: capture_string(&p.reason, body),
        input: object_body(&p.input_open, body)
            .map(parse_input)
            .unwrap_or_default(),
    }
}

/// 扁平解析 input：只认带引号的字符串与裸 true / false，布尔值覆盖同名字符串
fn parse_input(body: &str) -> ToolInput {
    let p = patterns();
    let mut input = ToolInput::new();
    for caps in p.string_pair.captures_iter(body) {
        input.insert(caps[1].to_string(), LooseValue::Text(unescape(&caps[2])));
    }
    for caps in p.bool_pair.captures_iter(body) {
        input.insert(caps[1].to_string(), LooseValue::Bool(&caps[2] == "true"));
    }
    input
}

/// 去掉首尾空白与 ``` / ```json 围栏
fn strip_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```json") {
        s = rest;
    } else if let Some(rest) = s.strip_prefix("```") {
        s = rest;
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

fn capture_string(re: &Regex, text: &str) -> Option<String> {
    re.captures(text).map(|caps| unescape(&caps[1]))
}

/// 定位 `"key": {`，再按花括号深度找到配对的 `}`，返回两者之间的内容；深度回不到 0 视为缺失
fn object_body<'a>(open_re: &Regex, text: &'a str) -> Option<&'a str> {
    let m = open_re.find(text)?;
    balanced_body(text, m.end() - 1)
}

fn balanced_body(text: &str, open: usize) -> Option<&str> {
    let mut depth = 0usize;
    for (i, b) in text.bytes().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(&text[open + 1..i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// JSON 字符串反转义；原文含裸换行等非法字符时退回逐字符处理
fn unescape(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }
    if let Ok(s) = serde_json::from_str::<String>(&format!("\"{raw}\"")) {
        return s;
    }
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap_in_content(inner: &str, levels: usize) -> String {
        let mut s = inner.to_string();
        for _ in 0..levels {
            s = serde_json::json!({ "content": s }).to_string();
        }
        s
    }

    #[test]
    fn test_flat_answer() {
        let d = parse_decision(r#"{"thought": "easy", "answer": "X"}"#);
        assert_eq!(
            d,
            Decision::Answer {
                text: "X".to_string(),
                thought: Some("easy".to_string()),
            }
        );
    }

    #[test]
    fn test_parse_is_idempotent_on_flat_input() {
        let text = r#"{"answer":"X"}"#;
        assert_eq!(parse_decision(text), parse_decision(text));
        assert!(matches!(parse_decision(text), Decision::Answer { ref text, .. } if text == "X"));
    }

    #[test]
    fn test_action_with_string_and_bool_input() {
        let text = r#"{
            "thought": "count them",
            "action": {
                "name": "COUNT_FILES",
                "reason": "need a number",
                "input": {"path": "src", "file_pattern": "*.rs", "recursive": true}
            }
        }"#;
        match parse_decision(text) {
            Decision::Action { tool, name, reason, input, thought } => {
                assert_eq!(tool, ToolName::CountFiles);
                assert_eq!(name, "COUNT_FILES");
                assert_eq!(reason.as_deref(), Some("need a number"));
                assert_eq!(thought.as_deref(), Some("count them"));
                assert_eq!(input.get("path"), Some(&LooseValue::Text("src".into())));
                assert_eq!(input.get("file_pattern"), Some(&LooseValue::Text("*.rs".into())));
                assert_eq!(input.get("recursive"), Some(&LooseValue::Bool(true)));
            }
            other => panic!("Expected Action, got {other:?}"),
        }
    }

    #[test]
    fn test_code_fence_is_stripped() {
        let text = "```json\n{\"answer\": \"fenced\"}\n```";
        assert!(matches!(parse_decision(text), Decision::Answer { ref text, .. } if text == "fenced"));
        let bare = "```\n{\"answer\": \"bare\"}\n```";
        assert!(matches!(parse_decision(bare), Decision::Answer { ref text, .. } if text == "bare"));
    }

    #[test]
    fn test_nested_braces_in_input_not_truncated() {
        let text = r#"{"action":{"name":"echo","input":{"a":"{nested}"}}}"#;
        match parse_decision(text) {
            Decision::Action { tool, input, .. } => {
                assert_eq!(tool, ToolName::Echo);
                assert_eq!(input.get("a"), Some(&LooseValue::Text("{nested}".into())));
            }
            other => panic!("Expected Action, got {other:?}"),
        }
    }

    #[test]
    fn test_action_wins_over_answer() {
        let text = r#"{"action": {"name": "find_files", "input": {}}, "answer": "done"}"#;
        assert!(matches!(
            parse_decision(text),
            Decision::Action { tool: ToolName::FindFiles, .. }
        ));
    }

    #[test]
    fn test_unknown_tool_name_falls_back_to_answer() {
        let text = r#"{"action": {"name": "launch_rockets"}, "answer": "fallback"}"#;
        assert!(matches!(parse_decision(text), Decision::Answer { ref text, .. } if text == "fallback"));
    }

    #[test]
    fn test_unknown_tool_name_without_answer_is_malformed() {
        let text = r#"{"action": {"name": "launch_rockets", "input": {}}}"#;
        match parse_decision(text) {
            Decision::Malformed { raw_text, reason } => {
                assert_eq!(raw_text, text);
                assert_eq!(reason, "unknown tool name: launch_rockets");
            }
            other => panic!("Expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_action_without_name_is_malformed() {
        let d = parse_decision(r#"{"action": {"reason": "?"}}"#);
        assert!(matches!(d, Decision::Malformed { ref reason, .. } if reason == "action object has no name"));
    }

    #[test]
    fn test_truncated_action_is_absent() {
        let truncated = r#"{"thought": "x", "action": {"name": "echo", "input": {"text": "hi""#;
        assert!(matches!(
            parse_decision(truncated),
            Decision::Malformed { ref reason, .. } if reason == "no action or answer found"
        ));

        let with_answer = r#"{"answer": "still here", "action": {"name": "echo""#;
        assert!(matches!(parse_decision(with_answer), Decision::Answer { ref text, .. } if text == "still here"));
    }

    #[test]
    fn test_garbage_is_malformed_with_raw_text() {
        let d = parse_decision("I think the answer is 42");
        assert_eq!(
            d,
            Decision::Malformed {
                raw_text: "I think the answer is 42".to_string(),
                reason: "no action or answer found".to_string(),
            }
        );
    }

    #[test]
    fn test_single_level_content_unwrap() {
        let text = r#"{"content": "{\"answer\":\"X\"}"}"#;
        assert!(matches!(parse_decision(text), Decision::Answer { ref text, .. } if text == "X"));
    }

    #[test]
    fn test_two_level_content_unwrap() {
        let text = wrap_in_content(r#"{"answer":"X"}"#, 2);
        assert!(matches!(parse_decision(&text), Decision::Answer { ref text, .. } if text == "X"));
    }

    #[test]
    fn test_nested_action_unwrap() {
        let text = wrap_in_content(
            r#"{"action":{"name":"echo","input":{"text":"say \"hi\"","loud":false}}}"#,
            1,
        );
        match parse_decision(&text) {
            Decision::Action { tool, input, .. } => {
                assert_eq!(tool, ToolName::Echo);
                assert_eq!(input.get("text"), Some(&LooseValue::Text("say \"hi\"".into())));
                assert_eq!(input.get("loud"), Some(&LooseValue::Bool(false)));
            }
            other => panic!("Expected Action, got {other:?}"),
        }
    }

    #[test]
    fn test_depth_bound() {
        let at_bound = wrap_in_content(r#"{"answer":"deep"}"#, DEFAULT_MAX_NESTING_DEPTH);
        assert!(matches!(parse_decision(&at_bound), Decision::Answer { ref text, .. } if text == "deep"));

        let beyond = wrap_in_content(r#"{"answer":"deep"}"#, DEFAULT_MAX_NESTING_DEPTH + 1);
        assert!(matches!(parse_decision(&beyond), Decision::Malformed { .. }));

        let shallow = DecisionParser::new().with_max_depth(1);
        let two = wrap_in_content(r#"{"answer":"deep"}"#, 2);
        assert!(matches!(shallow.parse(&two), Decision::Malformed { .. }));
    }

    #[test]
    fn test_content_not_json_is_malformed() {
        let d = parse_decision(r#"{"content": "just prose"}"#);
        assert!(matches!(d, Decision::Malformed { .. }));
    }

    #[test]
    fn test_content_with_other_fields_not_unwrapped() {
        let text = r#"{"content": "{\"answer\":\"inner\"}", "answer": "outer"}"#;
        assert!(matches!(parse_decision(text), Decision::Answer { ref text, .. } if text == "outer"));
    }

    #[test]
    fn test_escaped_quotes_and_raw_newlines_in_answer() {
        let d = parse_decision("{\"answer\": \"line one\nhe said \\\"hi\\\"\"}");
        assert!(matches!(d, Decision::Answer { ref text, .. } if text == "line one\nhe said \"hi\""));
    }
}
