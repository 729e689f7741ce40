//! 提示层：`${key}` 模板与内置 ReAct 提示

pub mod react;
pub mod template;

pub use react::react_prompt;
pub use template::{render, Example, PromptParams, PromptTemplate};
