//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `SCOUT__*` 覆盖（双下划线表示嵌套，如 `SCOUT__LLM__PROVIDER=openai`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub agent: AgentSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
}

/// [agent] 段：编排循环参数
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub name: String,
    /// 迭代计数达到此值即停止（默认 5）
    pub max_iterations: usize,
    /// 渲染进提示的最近 trace 条数
    pub history_window: usize,
    /// content 嵌套解包的最大层数
    pub max_nesting_depth: usize,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            name: "scout".to_string(),
            max_iterations: 5,
            history_window: 10,
            max_nesting_depth: 5,
        }
    }
}

/// [llm] 段：后端选择
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// mock / openai / deepseek
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    /// 未设置时回退到 OPENAI_API_KEY / DEEPSEEK_API_KEY
    pub api_key: Option<String>,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: None,
            base_url: None,
            api_key: None,
        }
    }
}

/// [tools] 段：文件工具根目录、单次调用超时、启用的工具
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 文件工具的沙箱根目录，未设置时用当前目录
    pub root: Option<PathBuf>,
    pub tool_timeout_secs: u64,
    /// 为空表示启用全部内置工具
    pub enabled: Vec<String>,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            root: None,
            tool_timeout_secs: 30,
            enabled: Vec::new(),
        }
    }
}

/// 从 config 目录加载配置，环境变量 SCOUT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 SCOUT__*
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("SCOUT")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
