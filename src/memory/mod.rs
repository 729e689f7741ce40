//! 记忆层：对话消息与带记忆模式使用的消息序列

pub mod conversation;

pub use conversation::{ConversationMemory, Message, Role};
