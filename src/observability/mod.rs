//! 可观测性：tracing 初始化与 ReAct 事件的日志出口

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::react::{EventSink, ReactEvent};

/// 安装全局订阅者：RUST_LOG 可覆盖，默认 info；日志写 stderr，stdout 留给回答
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// 把 ReactEvent 写成结构化 tracing 日志
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: ReactEvent) {
        match event {
            ReactEvent::RunStarted { run_id, query } => {
                tracing::info!(%run_id, query = %query, "react run started");
            }
            ReactEvent::IterationStarted {
                run_id,
                iteration,
                max_iterations,
            } => {
                tracing::debug!(%run_id, iteration, max_iterations, "thinking");
            }
            ReactEvent::Thought {
                run_id,
                iteration,
                preview,
            } => {
                tracing::debug!(%run_id, iteration, reply = %preview, "backend reply");
            }
            ReactEvent::Decided {
                run_id,
                iteration,
                outcome,
                detail,
            } => match outcome.as_str() {
                "malformed" | "unknown_tool" => {
                    tracing::warn!(%run_id, iteration, outcome = %outcome, detail = %detail, "rethinking")
                }
                _ => tracing::info!(%run_id, iteration, outcome = %outcome, detail = %detail, "decided"),
            },
            ReactEvent::ToolInvoked {
                run_id,
                iteration,
                tool,
                input,
            } => {
                tracing::info!(%run_id, iteration, tool = %tool, input = ?input, "invoking tool");
            }
            ReactEvent::Observation {
                run_id,
                iteration,
                tool,
                preview,
                is_error,
            } => {
                if is_error {
                    tracing::warn!(%run_id, iteration, tool = %tool, observation = %preview, "tool returned error");
                } else {
                    tracing::debug!(%run_id, iteration, tool = %tool, observation = %preview, "observation");
                }
            }
            ReactEvent::BudgetExhausted { run_id, iterations } => {
                tracing::warn!(%run_id, iterations, "max iterations reached");
            }
            ReactEvent::Cancelled { run_id, iteration } => {
                tracing::info!(%run_id, iteration, "react run cancelled");
            }
            ReactEvent::Finished {
                run_id,
                iterations,
                answer,
            } => {
                tracing::info!(%run_id, iterations, chars = answer.chars().count(), "react run finished");
            }
        }
    }
}
