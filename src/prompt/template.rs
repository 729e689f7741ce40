//! 提示模板
//!
//! system 提示 = prefix + 示例段 + suffix，user 提示单独一段；占位符语法为 `${key}`，
//! 按字面替换。缺失的键原样保留，替换后的值不会被再次扫描。

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::{Captures, Regex};

/// 渲染参数：占位符名 -> 替换文本
pub type PromptParams = HashMap<String, String>;

/// few-shot 示例
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub input: String,
    pub output: String,
}

/// 提示模板：纯函数式渲染，不持有任何运行时状态
#[derive(Debug, Clone, Default)]
pub struct PromptTemplate {
    prefix: String,
    examples: Vec<Example>,
    suffix: String,
    user: String,
}

static PLACEHOLDER_RE: OnceLock<Regex> = OnceLock::new();

fn placeholder_re() -> &'static Regex {
    PLACEHOLDER_RE.get_or_init(|| Regex::new(r"\$\{([^{}]+)\}").expect("placeholder regex"))
}

/// 将 `${key}` 替换为 params 中的值；单遍替换，缺失键保留原文
pub fn render(template: &str, params: &PromptParams) -> String {
    if template.is_empty() || params.is_empty() {
        return template.to_string();
    }
    placeholder_re()
        .replace_all(template, |caps: &Captures| {
            params
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

impl PromptTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    pub fn add_example(&mut self, input: impl Into<String>, output: impl Into<String>) {
        self.examples.push(Example {
            input: input.into(),
            output: output.into(),
        });
    }

    pub fn clear_examples(&mut self) {
        self.examples.clear();
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn render_system(&self, params: &PromptParams) -> String {
        format!(
            "{}{}{}",
            render(&self.prefix, params),
            self.examples_section(),
            render(&self.suffix, params)
        )
    }

    pub fn render_user(&self, params: &PromptParams) -> String {
        render(&self.user, params)
    }

    fn examples_section(&self) -> String {
        if self.examples.is_empty() {
            return String::new();
        }
        let mut out = String::from("\n\nExamples:\n");
        for (i, example) in self.examples.iter().enumerate() {
            let _ = writeln!(out, "Example {}:", i + 1);
            let _ = writeln!(out, "Input:\n{}", example.input);
            let _ = writeln!(out, "Output:\n{}\n", example.output);
        }
        out
    }
}
