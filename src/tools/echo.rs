//! Echo 工具（测试用）

use crate::tools::{ParamSpec, ParamType, ToolArgs, ToolCapability};

/// Echo 工具：回显文本
pub struct EchoTool;

impl ToolCapability for EchoTool {
    fn description(&self) -> &str {
        "Echo the given text back (for testing)"
    }

    fn parameters(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::required("text", ParamType::String)]
    }

    fn invoke(&self, args: &ToolArgs) -> Result<String, String> {
        args.require_str("text").map(str::to_string)
    }
}
