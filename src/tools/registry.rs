//! 工具注册表
//!
//! 工具名是封闭词表 `ToolName`；每个工具声明参数 schema（名称、类型、可选默认值），
//! 由 ToolRegistry 在 Agent 构建时显式注册。invoke 负责把解析器给出的松散值（文本 / 布尔）
//! 转为参数声明的类型，并把所有失败（类型转换、工具内部错误、panic、超时）转为 `Error: ...` 观察文本。

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::core::ToolError;

/// 封闭的工具词表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolName {
    CountFiles,
    FindFiles,
    SearchAssets,
    FindScripts,
    Echo,
}

impl ToolName {
    pub const ALL: [ToolName; 5] = [
        ToolName::CountFiles,
        ToolName::FindFiles,
        ToolName::SearchAssets,
        ToolName::FindScripts,
        ToolName::Echo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::CountFiles => "count_files",
            ToolName::FindFiles => "find_files",
            ToolName::SearchAssets => "search_assets",
            ToolName::FindScripts => "find_scripts",
            ToolName::Echo => "echo",
        }
    }

    /// 大小写不敏感，`-` 视同 `_`：COUNT_FILES / count_files / Count-Files 都能解析
    pub fn parse(name: &str) -> Option<Self> {
        let normalized = name.trim().to_lowercase().replace('-', "_");
        Self::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = ToolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ToolError::UnknownTool(s.to_string()))
    }
}

/// 解析器能给出的松散值：只有带引号的字符串与裸 true / false
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseValue {
    Text(String),
    Bool(bool),
}

impl fmt::Display for LooseValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LooseValue::Text(s) => f.write_str(s),
            LooseValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for LooseValue {
    fn from(s: &str) -> Self {
        LooseValue::Text(s.to_string())
    }
}

impl From<String> for LooseValue {
    fn from(s: String) -> Self {
        LooseValue::Text(s)
    }
}

impl From<bool> for LooseValue {
    fn from(b: bool) -> Self {
        LooseValue::Bool(b)
    }
}

/// 工具输入：参数名 -> 松散值
pub type ToolInput = BTreeMap<String, LooseValue>;

/// 参数声明的类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    String,
    Boolean,
    Integer,
    Float,
}

impl ParamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Boolean => "boolean",
            ParamType::Integer => "integer",
            ParamType::Float => "float",
        }
    }
}

/// 转换后的强类型参数值
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    Str(String),
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Str(s) => write!(f, "{s:?}"),
            ArgValue::Bool(b) => write!(f, "{b}"),
            ArgValue::Int(i) => write!(f, "{i}"),
            ArgValue::Float(x) => write!(f, "{x}"),
        }
    }
}

/// 单个参数声明
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub ty: ParamType,
    pub default: Option<ArgValue>,
}

impl ParamSpec {
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
        }
    }

    pub fn with_default(name: impl Into<String>, ty: ParamType, default: ArgValue) -> Self {
        Self {
            name: name.into(),
            ty,
            default: Some(default),
        }
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    fn describe(&self) -> String {
        match &self.default {
            Some(d) => format!("{}: {} = {}", self.name, self.ty.as_str(), d),
            None => format!("{}: {}", self.name, self.ty.as_str()),
        }
    }
}

/// 将松散值转为声明类型；布尔按标准 true/false 解析，数值按标准数值解析
pub fn coerce(param: &ParamSpec, value: &LooseValue) -> Result<ArgValue, ToolError> {
    let invalid = || ToolError::InvalidArgument {
        name: param.name.clone(),
        expected: param.ty.as_str().to_string(),
        value: value.to_string(),
    };
    match (param.ty, value) {
        (ParamType::String, v) => Ok(ArgValue::Str(v.to_string())),
        (ParamType::Boolean, LooseValue::Bool(b)) => Ok(ArgValue::Bool(*b)),
        (ParamType::Boolean, LooseValue::Text(s)) => s
            .trim()
            .to_lowercase()
            .parse::<bool>()
            .map(ArgValue::Bool)
            .map_err(|_| invalid()),
        (ParamType::Integer, LooseValue::Bool(b)) => Ok(ArgValue::Int(i64::from(*b))),
        (ParamType::Integer, LooseValue::Text(s)) => {
            s.trim().parse::<i64>().map(ArgValue::Int).map_err(|_| invalid())
        }
        (ParamType::Float, LooseValue::Bool(b)) => Ok(ArgValue::Float(if *b { 1.0 } else { 0.0 })),
        (ParamType::Float, LooseValue::Text(s)) => {
            s.trim().parse::<f64>().map(ArgValue::Float).map_err(|_| invalid())
        }
    }
}

/// 转换后的参数集合；缺失且无默认值的参数不在其中
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolArgs {
    values: HashMap<String, ArgValue>,
}

impl ToolArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ArgValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values.get(name)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ArgValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn bool(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ArgValue::Bool(b)) => Some(*b),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ArgValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ArgValue::Float(x)) => Some(*x),
            _ => None,
        }
    }

    /// 必填字符串参数
    pub fn require_str(&self, name: &str) -> Result<&str, String> {
        self.str(name)
            .ok_or_else(|| format!("missing required argument '{name}'"))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// 工具能力：同步本地工作（文件 / 系统查询），由注册表放到阻塞线程池执行
pub trait ToolCapability: Send + Sync {
    /// 工具描述（供 LLM 理解功能）
    fn description(&self) -> &str;

    /// 参数 schema，顺序即展示顺序
    fn parameters(&self) -> Vec<ParamSpec>;

    fn invoke(&self, args: &ToolArgs) -> Result<String, String>;
}

/// 注册后的工具：名称、描述、参数与能力，注册后不可变
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: ToolName,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    capability: Arc<dyn ToolCapability>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters", &self.parameters)
            .finish()
    }
}

impl ToolDescriptor {
    /// 按参数声明转换输入：有则转换，缺失用默认值，否则不设置；未声明的键忽略
    pub fn bind(&self, input: &ToolInput) -> Result<ToolArgs, ToolError> {
        let mut args = ToolArgs::new();
        for param in &self.parameters {
            if let Some(value) = input.get(&param.name) {
                args.insert(param.name.clone(), coerce(param, value)?);
            } else if let Some(default) = &param.default {
                args.insert(param.name.clone(), default.clone());
            }
        }
        Ok(args)
    }

    /// `name: description (params: ...)`
    pub fn describe(&self) -> String {
        if self.parameters.is_empty() {
            return format!("{}: {}", self.name, self.description);
        }
        let params: Vec<String> = self.parameters.iter().map(ParamSpec::describe).collect();
        format!("{}: {} (params: {})", self.name, self.description, params.join(", "))
    }
}

/// 工具注册表：按插入顺序保存，重复注册同名工具原地替换
pub struct ToolRegistry {
    tools: Vec<ToolDescriptor>,
    timeout: Duration,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register(&mut self, name: ToolName, capability: impl ToolCapability + 'static) {
        self.register_arc(name, Arc::new(capability));
    }

    pub fn register_arc(&mut self, name: ToolName, capability: Arc<dyn ToolCapability>) {
        let descriptor = ToolDescriptor {
            name,
            description: capability.description().to_string(),
            parameters: capability.parameters(),
            capability,
        };
        match self.tools.iter_mut().find(|t| t.name == name) {
            Some(existing) => *existing = descriptor,
            None => self.tools.push(descriptor),
        }
    }

    pub fn lookup(&self, name: ToolName) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn contains(&self, name: ToolName) -> bool {
        self.lookup(name).is_some()
    }

    pub fn tool_names(&self) -> Vec<ToolName> {
        self.tools.iter().map(|t| t.name).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 供 Think 提示使用的工具目录，按注册顺序每行一个
    pub fn describe_all(&self) -> String {
        self.tools
            .iter()
            .map(ToolDescriptor::describe)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 调用工具，永远返回文本；任何失败都是 `Error: ...` 观察
    pub async fn invoke(&self, name: ToolName, input: &ToolInput) -> String {
        match self.try_invoke(name, input).await {
            Ok(output) => output,
            Err(e) => e.to_observation(),
        }
    }

    async fn try_invoke(&self, name: ToolName, input: &ToolInput) -> Result<String, ToolError> {
        let start = Instant::now();
        let descriptor = self
            .lookup(name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;

        let result = match descriptor.bind(input) {
            Ok(args) => self.run(descriptor, args).await,
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(_) => "ok",
            Err(ToolError::Timeout(_)) => "timeout",
            Err(ToolError::Panicked(_)) => "panic",
            Err(ToolError::InvalidArgument { .. }) => "invalid_argument",
            Err(_) => "error",
        };
        tracing::info!(
            tool = %name,
            outcome,
            duration_ms = start.elapsed().as_millis() as u64,
            "tool audit"
        );
        if let Err(e) = &result {
            tracing::warn!(tool = %name, error = %e, "tool invocation failed");
        }
        result
    }

    async fn run(&self, descriptor: &ToolDescriptor, args: ToolArgs) -> Result<String, ToolError> {
        let capability = Arc::clone(&descriptor.capability);
        let handle = tokio::task::spawn_blocking(move || capability.invoke(&args));

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(result)) => result.map_err(ToolError::Failed),
            Ok(Err(join_err)) => Err(ToolError::Panicked(panic_message(join_err))),
            Err(_) => {
                // spawn_blocking 无法中断，线程会跑完后结果被丢弃
                tracing::warn!(
                    tool = %descriptor.name,
                    timeout_secs = self.timeout.as_secs(),
                    "tool timed out, blocking worker abandoned"
                );
                Err(ToolError::Timeout(self.timeout.as_secs()))
            }
        }
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return err.to_string();
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
