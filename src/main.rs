//! 应用程序入口 (Application Entrypoint)
//!
//! 负责 CLI 指令解析、遥测层初始化、管线装配及系统生命周期管理。

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use webguard::core::config::AppConfig;
use webguard::core::event::{EventReceiver, GuardEvent, create_event_channel};
use webguard::core::model::{Decision, RequestDetails, ResourceType};
use webguard::engine::{BatchOutcome, BatchRunner, parse_requests};
use webguard::network::OrderedWebRequest;
use webguard::network::policies::{RequestLogger, install_extension_blocking_filter};

/// 命令行界面脚手架 (CLI Scaffolding)
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// 配置文件路径（默认 ./webguard.toml）
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 判定一个或多个 URL
    Check {
        /// 待判定的地址
        #[arg(required = true)]
        urls: Vec<String>,
        /// 资源类型 (mainFrame / script / xhr ...)
        #[arg(short, long, value_parser = parse_resource_type, default_value = "other")]
        resource_type: ResourceType,
        /// 以 JSON Lines 输出
        #[arg(long)]
        json: bool,
    },
    /// 从 JSON Lines 文件重放请求描述符
    Replay {
        /// 每行一个请求描述符
        file: PathBuf,
        /// 以 JSON Lines 输出
        #[arg(long)]
        json: bool,
    },
}

/// 单行输出
#[derive(Serialize)]
struct Verdict<'a> {
    id: u64,
    url: &'a str,
    decision: Decision,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = Arc::new(match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    });

    // 遥测层初始化 (Telemetry Layer Initialization)
    // 标准输出留给判定结果，日志写入 stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // 管线装配 (Pipeline Assembly)
    let (event_sender, event_receiver) = create_event_channel();
    let web_request = Arc::new(build_pipeline(&config).with_events(event_sender));
    let reporter = tokio::spawn(report_events(event_receiver));

    // 信号处理与优雅退出 (Signal Handling)
    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            shutdown_clone.cancel();
        }
    });

    let runner = BatchRunner::new(web_request, &config.dispatch).with_shutdown(shutdown);

    let (requests, json) = match cli.command {
        Commands::Check {
            urls,
            resource_type,
            json,
        } => {
            let requests: Vec<RequestDetails> = urls
                .into_iter()
                .enumerate()
                .map(|(i, url)| {
                    RequestDetails::new(i as u64 + 1, url).with_resource_type(resource_type)
                })
                .collect();
            (requests, json)
        }
        Commands::Replay { file, json } => {
            let content = tokio::fs::read_to_string(&file).await?;
            let (requests, errors) = parse_requests(&content);
            for (line, e) in &errors {
                tracing::warn!(file = %file.display(), line, error = %e, "跳过无效请求描述符");
            }
            (requests, json)
        }
    };

    let summary = runner.run(requests, |outcome| print_outcome(outcome, json)).await;

    // 释放管线（及其事件发送端），等待诊断通道收尾
    drop(runner);
    let failures = reporter.await?;

    tracing::info!(
        total = summary.total,
        cancelled = summary.cancelled,
        allowed = summary.allowed,
        handler_failures = failures,
        "Execution flow completed"
    );

    Ok(())
}

/// 按配置组装管线：安全策略在前，遥测在后
fn build_pipeline(config: &AppConfig) -> OrderedWebRequest {
    let web_request = OrderedWebRequest::from_config(&config.pipeline);

    if config.pipeline.extension_filter {
        install_extension_blocking_filter(&web_request);
    } else {
        tracing::warn!("扩展拦截过滤器已禁用");
    }

    if config.pipeline.log_requests {
        web_request
            .on_before_request
            .add_event_listener(Arc::new(RequestLogger::new()));
    }

    web_request
}

/// 消费诊断事件，返回拦截器故障次数
async fn report_events(receiver: EventReceiver) -> usize {
    let mut failures = 0;
    while let Some(event) = receiver.recv_async().await {
        match event {
            GuardEvent::HandlerFailed {
                request_id,
                handler,
                error,
                ..
            } => {
                failures += 1;
                tracing::debug!(id = request_id, handler = %handler, error = %error, "诊断: 拦截器故障");
            }
            GuardEvent::RequestCancelled { .. } => {}
        }
    }
    failures
}

fn print_outcome(outcome: &BatchOutcome, json: bool) {
    let verdict = Verdict {
        id: outcome.details.id,
        url: &outcome.details.url,
        decision: outcome.decision,
    };

    if json {
        match serde_json::to_string(&verdict) {
            Ok(line) => println!("{line}"),
            Err(e) => tracing::error!(error = %e, "序列化输出失败"),
        }
    } else {
        let label = if verdict.decision.is_cancel() {
            "cancel"
        } else {
            "allow"
        };
        println!("{label}\t{}", verdict.url);
    }
}

/// 资源类型解析（未知名称归入 other）
fn parse_resource_type(s: &str) -> std::result::Result<ResourceType, String> {
    Ok(ResourceType::parse_lossy(s))
}
