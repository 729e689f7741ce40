//! 认知层：决策解析、推理轨迹、过程事件与 ReAct 主循环

pub mod events;
pub mod loop_;
pub mod parser;
pub mod trace;

pub use events::{EventSink, NullSink, ReactEvent};
pub use loop_::{ReactAgent, DEFAULT_MAX_ITERATIONS, MAX_ITERATIONS_REACHED, NO_ANSWER_FALLBACK};
pub use parser::{parse_decision, Decision, DecisionParser, DEFAULT_MAX_NESTING_DEPTH};
pub use trace::{ReasoningTrace, Step, TraceEntry, DEFAULT_HISTORY_WINDOW, EMPTY_HISTORY};
