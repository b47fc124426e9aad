mod cli;
mod output;
mod state;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use linkscout_core::{
    load_config_or_default, metrics, validate_config, CancelHandle, DownloadParams, DownloadTask,
    EventReceiver, FetchRequest, Orchestrator, OrchestratorEvent, ResourceCategory, ResourceItem,
    TaskDescriptor,
};

use cli::{Cli, Command, DownloadArgs, FetchArgs, SniffArgs};
use state::AppState;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            eprintln!("error: {:#}", e);
            std::process::exit(2);
        }
    }
}

/// Returns whether the command succeeded.
async fn run() -> Result<bool> {
    let cli = Cli::parse();
    init_logging(cli.json);

    info!("Loading configuration from {:?}", cli.config);
    let config = load_config_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    validate_config(&config).context("Configuration validation failed")?;

    if cli.metrics {
        metrics::register_metrics();
    }

    let state = AppState::new(config)?;
    let success = match cli.command {
        Command::Sniff(args) => sniff(&state, args, cli.json).await?,
        Command::Download(args) => download(&state, args, cli.json).await?,
        Command::Select { url } => select(&state, &url, cli.json)?,
        Command::Fetch(args) => fetch(&state, args, cli.json).await?,
        Command::Experience => experience(&state, cli.json)?,
    };

    if cli.metrics {
        eprint!("{}", metrics::encode_metrics().context("Failed to encode metrics")?);
    }
    Ok(success)
}

/// Logs go to stderr so that stdout carries only results.
fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn sniff(state: &AppState, args: SniffArgs, json: bool) -> Result<bool> {
    let (orchestrator, mut rx) = state.orchestrator();
    let completion = run_task(
        &orchestrator,
        &mut rx,
        TaskDescriptor::sniff(args.url.clone()),
        json,
    )
    .await?;

    let OrchestratorEvent::SniffFinished { result, .. } = completion else {
        bail!("unexpected completion event for sniff");
    };
    if !result.is_success() {
        return Ok(false);
    }
    let Some(selection) = args.download else {
        return Ok(true);
    };

    let indices = cli::parse_selection(&selection, result.items.len())
        .map_err(|e| anyhow::anyhow!(e))
        .context("Invalid --download selection")?;
    let dest = args
        .dest
        .unwrap_or_else(|| state.config.download.output_dir.clone());
    let tasks = indices
        .into_iter()
        .map(|i| DownloadTask::new(args.url.clone(), result.items[i].clone(), dest.clone()))
        .collect();
    run_downloads(&orchestrator, &mut rx, tasks, json).await
}

async fn download(state: &AppState, args: DownloadArgs, json: bool) -> Result<bool> {
    let dest: PathBuf = args
        .dest
        .unwrap_or_else(|| state.config.download.output_dir.clone());
    if args.filename.is_some() && args.urls.len() > 1 {
        bail!("--filename needs exactly one URL");
    }
    let params = DownloadParams {
        filename: args.filename,
        merge_output_format: args.merge_output_format,
    };

    let tasks = args
        .urls
        .iter()
        .map(|url| {
            let item = match &args.format {
                Some(format) => ResourceItem::media(url.as_str(), format.as_str(), ResourceCategory::Video),
                None => ResourceItem::direct(url.as_str(), None),
            };
            DownloadTask::new(url.as_str(), item, dest.clone()).with_params(params.clone())
        })
        .collect();

    let (orchestrator, mut rx) = state.orchestrator();
    run_downloads(&orchestrator, &mut rx, tasks, json).await
}

async fn run_downloads(
    orchestrator: &Orchestrator,
    rx: &mut EventReceiver,
    tasks: Vec<DownloadTask>,
    json: bool,
) -> Result<bool> {
    let completion = run_task(orchestrator, rx, TaskDescriptor::download(tasks), json).await?;
    match completion {
        OrchestratorEvent::QueueFinished { summary, .. } => {
            Ok(summary.completed == summary.total())
        }
        _ => bail!("unexpected completion event for download"),
    }
}

/// Submit `task`, print its events and return its completion event.
///
/// Ctrl-C or SIGTERM stops the task; its completion event still arrives.
async fn run_task(
    orchestrator: &Orchestrator,
    rx: &mut EventReceiver,
    task: TaskDescriptor,
    json: bool,
) -> Result<OrchestratorEvent> {
    let task_id = orchestrator
        .submit(task)
        .await
        .context("Failed to submit task")?;

    let stopper = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            warn!("Interrupted, stopping task");
            orchestrator.stop().await;
        })
    };

    let completion = loop {
        let Some(event) = rx.recv().await else {
            stopper.abort();
            bail!("event stream closed before the task finished");
        };
        print_event(&event, json)?;
        if event.is_completion() && event.task_id() == Some(task_id.as_str()) {
            break event;
        }
    };
    stopper.abort();
    Ok(completion)
}

fn print_event(event: &OrchestratorEvent, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(event)?);
    } else if let Some(line) = output::render_event(event) {
        println!("{}", line);
    }
    Ok(())
}

fn select(state: &AppState, url: &str, json: bool) -> Result<bool> {
    let queue = state.scorer.select(url);
    let rule = state.scorer.rule_for(url);
    let scores = state.scorer.score(url);

    if json {
        let value = serde_json::json!({
            "url": url,
            "rule": rule,
            "queue": queue,
            "scores": scores,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(!queue.is_empty());
    }

    match &rule {
        Some(_) => println!("rule match"),
        None => println!("{:<18} {:>6} {:>7} {:>7} {:>7}", "strategy", "base", "factor", "bonus", "score"),
    }
    if rule.is_none() {
        for s in &scores {
            println!(
                "{:<18} {:>6.1} {:>7.1} {:>7.1} {:>7.2}",
                s.kind.as_str(),
                s.base,
                s.penalty,
                s.experience_bonus,
                s.score
            );
        }
    }
    if queue.is_empty() {
        println!("queue: (empty)");
    } else {
        let names: Vec<&str> = queue.iter().map(|k| k.as_str()).collect();
        println!("queue: {}", names.join(" -> "));
    }
    Ok(!queue.is_empty())
}

async fn fetch(state: &AppState, args: FetchArgs, json: bool) -> Result<bool> {
    let method = linkscout_core::fetch::Method::from_bytes(args.method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("Invalid method {:?}", args.method))?;
    let mut request = FetchRequest::new(method, args.url.as_str())
        .ignore_robots(args.ignore_robots);
    for raw in &args.headers {
        let (name, value) = cli::parse_header(raw)
            .with_context(|| format!("Invalid header {:?}, expected `Name: value`", raw))?;
        request = request.header(name, value);
    }
    for raw in &args.query {
        let (name, value) = cli::parse_pair(raw)
            .with_context(|| format!("Invalid query parameter {:?}, expected `name=value`", raw))?;
        request = request.query(name, value);
    }
    if let Some(data) = &args.data {
        let body: serde_json::Value = serde_json::from_str(data).context("--data is not valid JSON")?;
        request = request.json(body);
    }
    if !args.form.is_empty() {
        let fields = args
            .form
            .iter()
            .map(|raw| {
                cli::parse_pair(raw)
                    .with_context(|| format!("Invalid form field {:?}, expected `name=value`", raw))
            })
            .collect::<Result<Vec<_>>>()?;
        request = request.form(fields);
    }
    if let Some(engine) = args.start_engine {
        request = request.start_engine(engine);
    }
    if let Some(previous) = args.previous_url {
        request = request.previous_url(previous);
    }
    if let Some(secs) = args.timeout_secs {
        request = request.timeout(std::time::Duration::from_secs(secs));
    }

    let cancel = CancelHandle::new();
    let stopper = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            cancel.cancel().await;
        })
    };
    let result = state.escalator.fetch(&request, &cancel).await;
    stopper.abort();
    let response = result.context("Fetch failed")?;

    if json {
        let value = serde_json::json!({
            "engine": response.engine,
            "status": response.status,
            "final_url": response.final_url,
            "headers": response.headers,
            "body": response.body,
        });
        println!("{}", serde_json::to_string(&value)?);
    } else {
        if args.include_headers {
            println!("HTTP {} ({}) {}", response.status, response.engine, response.final_url);
            for (name, value) in &response.headers {
                println!("{}: {}", name, value);
            }
            println!();
        }
        print!("{}", response.body);
    }
    Ok(response.is_success())
}

fn experience(state: &AppState, json: bool) -> Result<bool> {
    let snapshot = state.scorer.experience().snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(true);
    }
    if snapshot.is_empty() {
        println!("no experience recorded");
    }
    for (domain, strategies) in &snapshot {
        for (strategy, count) in strategies {
            println!("{:<32} {:<18} {}", domain, strategy, count);
        }
    }
    Ok(true)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
