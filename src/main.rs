//! Scout - ReAct 文件检索智能体
//!
//! 入口：加载配置、装配 Agent；带查询参数时单次运行，否则逐行读取 stdin。
//! Ctrl-C 取消当前正在执行的查询；空闲时 Ctrl-C 退出进程。

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use scout::agent::build_agent_from_config;
use scout::config::load_config;
use scout::core::AgentError;
use scout::react::{ReactAgent, ReactEvent};

#[derive(Parser)]
#[command(
    name = "scout",
    about = "Scout - a ReAct agent that reasons over the files in a workspace",
    version
)]
struct Cli {
    /// Run a single query; without it queries are read line by line from stdin
    query: Option<String>,

    /// Extra config file layered over config/default.toml
    #[arg(short, long, env = "SCOUT_CONFIG")]
    config: Option<PathBuf>,

    /// Override llm.provider (mock, openai, deepseek)
    #[arg(short, long)]
    provider: Option<String>,

    /// Override agent.max_iterations
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Override tools.root
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Print every ReAct event as JSON on stderr
    #[arg(long)]
    events: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    scout::observability::init();

    let mut cfg = load_config(cli.config.clone()).context("Failed to load config")?;
    if let Some(provider) = cli.provider {
        cfg.llm.provider = provider;
    }
    if let Some(n) = cli.max_iterations {
        cfg.agent.max_iterations = n;
    }
    if let Some(root) = cli.root {
        cfg.tools.root = Some(root);
    }

    let mut agent = build_agent_from_config(&cfg).context("Failed to build agent")?;

    let active = ActiveQuery::default();
    spawn_interrupt_handler(active.clone());

    let printer = if cli.events {
        let (tx, rx) = mpsc::unbounded_channel::<ReactEvent>();
        agent = agent.with_sink(Arc::new(tx));
        Some(tokio::spawn(print_events(rx)))
    } else {
        None
    };

    match cli.query {
        Some(query) => run_query(&mut agent, &active, &query).await?,
        None => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
                let query = line.trim();
                if query.is_empty() {
                    continue;
                }
                run_query(&mut agent, &active, query).await?;
            }
        }
    }

    // 关闭事件通道，等打印任务把剩余事件写完
    drop(agent);
    if let Some(handle) = printer {
        let _ = handle.await;
    }
    Ok(())
}

/// 正在执行的查询的取消令牌；空闲时为 None
#[derive(Clone, Default)]
struct ActiveQuery {
    token: Arc<Mutex<Option<CancellationToken>>>,
}

impl ActiveQuery {
    /// 登记一次新查询并返回它的令牌
    fn begin(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = Some(token.clone());
        token
    }

    fn finish(&self) {
        *self.token.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// 有查询在跑则取消并返回 true；空闲返回 false
    fn interrupt(&self) -> bool {
        match self.token.lock().unwrap_or_else(|e| e.into_inner()).as_ref() {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

/// 进程级唯一的 Ctrl-C 监听：有查询在跑就取消它，否则退出
fn spawn_interrupt_handler(active: ActiveQuery) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !active.interrupt() {
                eprintln!("interrupted");
                std::process::exit(130);
            }
        }
    });
}

async fn run_query(
    agent: &mut ReactAgent,
    active: &ActiveQuery,
    query: &str,
) -> anyhow::Result<()> {
    let token = active.begin();
    let result = agent.execute_with_cancel(query, token).await;
    active.finish();

    match result {
        Ok(answer) => {
            println!("{answer}");
            Ok(())
        }
        Err(AgentError::Cancelled) => {
            eprintln!("cancelled");
            Ok(())
        }
        Err(e) => Err(e).context("Query failed"),
    }
}

async fn print_events(mut rx: mpsc::UnboundedReceiver<ReactEvent>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(line) => eprintln!("{line}"),
            Err(e) => tracing::warn!(error = %e, "failed to serialize event"),
        }
    }
}
