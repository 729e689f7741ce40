pub mod echo;
pub mod files;
pub mod registry;

use std::path::Path;
use std::time::Duration;

use crate::core::AgentError;

pub use echo::EchoTool;
pub use files::{CountFilesTool, FindFilesTool, FindScriptsTool, SafeFs, SearchAssetsTool};
pub use registry::{
    coerce, ArgValue, LooseValue, ParamSpec, ParamType, ToolArgs, ToolCapability, ToolDescriptor,
    ToolInput, ToolName, ToolRegistry,
};

/// 按固定表注册内置工具；enabled 为空表示全部启用，出现未知工具名则返回配置错误
pub fn default_registry(
    root: &Path,
    enabled: &[String],
    timeout_secs: u64,
) -> Result<ToolRegistry, AgentError> {
    let wanted: Vec<ToolName> = if enabled.is_empty() {
        ToolName::ALL.to_vec()
    } else {
        enabled
            .iter()
            .map(|n| {
                ToolName::parse(n)
                    .ok_or_else(|| AgentError::Config(format!("unknown tool in tools.enabled: {n}")))
            })
            .collect::<Result<_, _>>()?
    };

    let mut registry = ToolRegistry::new().with_timeout(Duration::from_secs(timeout_secs));
    for name in wanted {
        match name {
            ToolName::CountFiles => registry.register(name, CountFilesTool::new(root)),
            ToolName::FindFiles => registry.register(name, FindFilesTool::new(root)),
            ToolName::SearchAssets => registry.register(name, SearchAssetsTool::new(root)),
            ToolName::FindScripts => registry.register(name, FindScriptsTool::new(root)),
            ToolName::Echo => registry.register(name, EchoTool),
        }
    }
    Ok(registry)
}
