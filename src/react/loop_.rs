//! ReAct 主循环
//!
//! Thinking -> Deciding -> Acting -> Thinking ... -> Done。
//! 每次 execute 先清空推理轨迹与迭代计数；Thinking 先自增计数，达到上限即以固定文本结束。
//! 解析失败、未注册的工具、工具报错都只写入轨迹并回到 Thinking，不会中止循环；
//! 只有取消会作为错误返回给调用方。

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::agent::ConversationAgent;
use crate::core::AgentError;
use crate::llm::GenerativeModel;
use crate::memory::{ConversationMemory, Message, Role};
use crate::prompt::{react_prompt, PromptParams, PromptTemplate};
use crate::react::events::preview;
use crate::react::{
    Decision, DecisionParser, EventSink, NullSink, ReactEvent, ReasoningTrace, Step,
    DEFAULT_HISTORY_WINDOW,
};
use crate::tools::{ToolInput, ToolName, ToolRegistry};

/// 默认最大迭代次数（计数达到即停止）
pub const DEFAULT_MAX_ITERATIONS: usize = 5;
/// 达到最大迭代次数时写入轨迹并返回的文本
pub const MAX_ITERATIONS_REACHED: &str = "max iterations reached";
/// 轨迹为空时的兜底回答
pub const NO_ANSWER_FALLBACK: &str = "unable to produce an answer";

/// 思考内容预览最大字符数
const THOUGHT_PREVIEW_CHARS: usize = 800;
/// Observation 预览最大字符数
const OBSERVATION_PREVIEW_CHARS: usize = 200;

enum LoopState {
    Thinking,
    Deciding(String),
    Acting { tool: ToolName, input: ToolInput },
    Done,
}

/// ReAct Agent：同一实例上的 execute 必须串行（&mut self 保证）
pub struct ReactAgent {
    agent: ConversationAgent,
    registry: ToolRegistry,
    parser: DecisionParser,
    trace: ReasoningTrace,
    iterations: usize,
    max_iterations: usize,
    history_window: usize,
    sink: Arc<dyn EventSink>,
}

impl ReactAgent {
    pub fn new(model: Arc<dyn GenerativeModel>, registry: ToolRegistry) -> Self {
        Self {
            agent: ConversationAgent::new("scout", react_prompt(), model),
            registry,
            parser: DecisionParser::new(),
            trace: ReasoningTrace::new(),
            iterations: 0,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            history_window: DEFAULT_HISTORY_WINDOW,
            sink: Arc::new(NullSink),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.agent.set_name(name);
        self
    }

    pub fn with_template(mut self, template: PromptTemplate) -> Self {
        self.agent.set_template(template);
        self
    }

    /// 至少为 1：计数在检查前自增，0 会让计数超过上限
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations.max(1);
        self
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    pub fn with_parser(mut self, parser: DecisionParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_max_nesting_depth(self, depth: usize) -> Self {
        self.with_parser(DecisionParser::new().with_max_depth(depth))
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn name(&self) -> &str {
        self.agent.name()
    }

    pub fn trace(&self) -> &ReasoningTrace {
        &self.trace
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn memory(&self) -> &ConversationMemory {
        self.agent.memory()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// 运行到结束
    pub async fn execute(&mut self, query: &str) -> Result<String, AgentError> {
        self.execute_with_cancel(query, CancellationToken::new()).await
    }

    /// 与 execute 相同，但每个挂起点都与 cancel 竞争。
    /// 取消时回滚到本轮迭代开始前的计数与轨迹，记忆不动
    pub async fn execute_with_cancel(
        &mut self,
        query: &str,
        cancel: CancellationToken,
    ) -> Result<String, AgentError> {
        let run_id = Uuid::new_v4();
        self.trace.clear();
        self.iterations = 0;
        self.agent.clear();
        self.sink.emit(ReactEvent::RunStarted {
            run_id,
            query: query.to_string(),
        });

        // 本轮迭代开始前的 (计数, 轨迹长度)，取消时回滚到这里
        let mut mark = (0usize, 0usize);
        let mut state = LoopState::Thinking;

        loop {
            state = match state {
                LoopState::Thinking => {
                    mark = (self.iterations, self.trace.len());
                    if cancel.is_cancelled() {
                        return Err(self.abandon(run_id, mark));
                    }

                    self.iterations += 1;
                    if self.iterations >= self.max_iterations {
                        self.trace
                            .record(Step::Think, Role::System, MAX_ITERATIONS_REACHED);
                        self.sink.emit(ReactEvent::BudgetExhausted {
                            run_id,
                            iterations: self.iterations,
                        });
                        LoopState::Done
                    } else {
                        self.sink.emit(ReactEvent::IterationStarted {
                            run_id,
                            iteration: self.iterations,
                            max_iterations: self.max_iterations,
                        });
                        let params = self.prompt_params(query);
                        let user = self.agent.template().render_user(&params);
                        let reply = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => None,
                            reply = self.agent.respond_without_memory(&user, &params) => Some(reply),
                        };
                        let Some(reply) = reply else {
                            return Err(self.abandon(run_id, mark));
                        };

                        self.sink.emit(ReactEvent::Thought {
                            run_id,
                            iteration: self.iterations,
                            preview: preview(&reply, THOUGHT_PREVIEW_CHARS),
                        });
                        self.trace.record(Step::Think, Role::Assistant, reply.clone());
                        LoopState::Deciding(reply)
                    }
                }

                LoopState::Deciding(reply) => self.decide(run_id, &reply),

                LoopState::Acting { tool, input } => {
                    self.sink.emit(ReactEvent::ToolInvoked {
                        run_id,
                        iteration: self.iterations,
                        tool,
                        input: input.clone(),
                    });
                    let observation = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => None,
                        out = self.registry.invoke(tool, &input) => Some(out),
                    };
                    let Some(observation) = observation else {
                        return Err(self.abandon(run_id, mark));
                    };

                    self.sink.emit(ReactEvent::Observation {
                        run_id,
                        iteration: self.iterations,
                        tool,
                        preview: preview(&observation, OBSERVATION_PREVIEW_CHARS),
                        is_error: observation.starts_with("Error:"),
                    });
                    self.trace.record(
                        Step::Act,
                        Role::ToolResult,
                        format!("result of {tool}: {observation}"),
                    );
                    LoopState::Thinking
                }

                LoopState::Done => break,
            };
        }

        let answer = self
            .trace
            .last()
            .map(|e| e.content.clone())
            .unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string());

        let params = self.prompt_params(query);
        self.agent.refresh_system(&params);
        self.agent.append(Message::user(query));
        self.agent.append(Message::assistant(answer.clone()));

        self.sink.emit(ReactEvent::Finished {
            run_id,
            iterations: self.iterations,
            answer: answer.clone(),
        });
        Ok(answer)
    }

    fn decide(&mut self, run_id: Uuid, reply: &str) -> LoopState {
        let iteration = self.iterations;
        let (next, outcome, detail) = match self.parser.parse(reply) {
            Decision::Action { tool, input, .. } if self.registry.contains(tool) => {
                let text = format!("using tool: {tool}");
                self.trace.record(Step::Decide, Role::Assistant, text);
                (LoopState::Acting { tool, input }, "action", tool.to_string())
            }
            Decision::Action { tool, .. } => {
                let text = format!("tool does not exist: {tool}");
                self.trace.record(Step::Decide, Role::Assistant, text);
                (LoopState::Thinking, "unknown_tool", tool.to_string())
            }
            Decision::Answer { text, .. } => {
                let detail = preview(&text, OBSERVATION_PREVIEW_CHARS);
                self.trace.record(Step::Decide, Role::Assistant, text);
                (LoopState::Done, "answer", detail)
            }
            Decision::Malformed { reason, .. } => {
                let text = format!("parse error, rethinking: {reason}");
                self.trace.record(Step::Decide, Role::Assistant, text);
                (LoopState::Thinking, "malformed", reason)
            }
        };
        self.sink.emit(ReactEvent::Decided {
            run_id,
            iteration,
            outcome: outcome.to_string(),
            detail,
        });
        next
    }

    fn prompt_params(&self, query: &str) -> PromptParams {
        let mut params = PromptParams::new();
        params.insert("agent_name".into(), self.agent.name().to_string());
        params.insert("query".into(), query.to_string());
        params.insert("history".into(), self.trace.render(self.history_window));
        params.insert("tools".into(), self.registry.describe_all());
        params
    }

    fn abandon(&mut self, run_id: Uuid, mark: (usize, usize)) -> AgentError {
        let (iterations, trace_len) = mark;
        self.iterations = iterations;
        self.trace.truncate(trace_len);
        self.sink.emit(ReactEvent::Cancelled {
            run_id,
            iteration: iterations + 1,
        });
        AgentError::Cancelled
    }
}
