//! anna — autonomous conversational agent, cognitive core
//!
//! Usage:
//!   anna                        → start with ~/.anna/anna.toml (or defaults)
//!   anna --config path.toml     → explicit config
//!   anna print-config           → emit the default config as TOML
//!   anna version                → show version

use anna_buffer::ThoughtBuffer;
use anna_core::{AnnaConfig, ThoughtSource};
use anna_llm::{LanguageModel, OllamaClient};
use anna_memory::HttpMemory;
use anna_mind::{Mind, MindConfig};
use anna_tools::{builtin_factories, register_builtins, ToolContext, ToolManager};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(
    name = "anna",
    about = "Autonomous conversational agent — cognitive core",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory scanned for tool descriptors (overrides config)
    #[arg(long)]
    tools_dir: Option<PathBuf>,

    /// Root for tool-owned data files (overrides config)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Write logs to a file (in addition to stderr)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit the default configuration as TOML
    PrintConfig,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::PrintConfig) => {
            print!("{}", AnnaConfig::default().to_toml());
            return Ok(());
        }
        Some(Commands::Version) => {
            println!("anna v{}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        None => {}
    }

    let _log_guard = init_tracing(cli.log_file.as_deref());
    run(cli).await
}

fn init_tracing(log_file: Option<&std::path::Path>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "anna=info".into());
    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer());

    match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let name = path.file_name().map(PathBuf::from).unwrap_or_else(|| "anna.log".into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            registry
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            registry.init();
            None
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| anna_home().join("anna.toml"));
    let mut config = AnnaConfig::load(&config_path);
    if let Some(dir) = cli.tools_dir {
        config.tools.install_dir = Some(dir);
    }
    if let Some(dir) = cli.data_dir {
        config.tools.data_dir = Some(dir);
    }

    // --- Thought buffer + tool manager ---------------------------------
    let buffer = Arc::new(ThoughtBuffer::new(config.buffer.clone()));
    let manager = Arc::new(ToolManager::new(buffer.sink(), &config.tools));

    let data_dir = config
        .tools
        .data_dir
        .clone()
        .unwrap_or_else(ToolContext::default_dir);
    std::fs::create_dir_all(&data_dir)?;
    let ctx = ToolContext::new(data_dir);

    let registered = match &config.tools.install_dir {
        Some(dir) => manager.discover(dir, &builtin_factories(), &ctx).await,
        None => register_builtins(&manager, &ctx).await,
    };
    if manager.is_empty() {
        anyhow::bail!("startup failed: no tool could be registered");
    }
    tracing::info!(registered, "tool manager ready");

    // --- Language model + memory ---------------------------------------
    let model = OllamaClient::from_config(&config.language_model);
    let grace = Duration::from_secs(config.language_model.startup_grace_secs);
    if let Err(e) = model.ping(grace).await {
        manager.shutdown().await;
        anyhow::bail!(
            "startup failed: model server at {} unreachable: {}",
            config.language_model.base_url,
            e
        );
    }
    let model: Arc<dyn LanguageModel> = Arc::new(model);
    let memory = Arc::from(HttpMemory::from_config(&config.memory));

    // --- Persona -------------------------------------------------------
    let persona = match &config.persona_file {
        Some(path) => std::fs::read_to_string(path).unwrap_or_else(|e| {
            tracing::warn!(path = %path.display(), error = %e, "persona file unreadable, using fallback");
            config.scheduler.persona.clone()
        }),
        None => config.scheduler.persona.clone(),
    };

    // --- Wire the mind -------------------------------------------------
    let (reply_tx, mut reply_rx) = mpsc::channel::<String>(64);
    let mind = Mind::new(
        buffer.clone(),
        manager.clone(),
        model,
        memory,
        reply_tx,
        MindConfig::from_config(&config, persona),
    );
    let handle = mind.handle();
    let mut mind_task = tokio::spawn(mind.run());

    // Reply sink: print to stdout.
    let reply_task = tokio::spawn(async move {
        while let Some(reply) = reply_rx.recv().await {
            println!("Anna> {}", reply);
        }
    });

    // Stdin pump: each line becomes a user_input thought.
    let stdin_sink = buffer.sink();
    tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if line.trim().is_empty() {
                continue;
            }
            if let Err(e) = stdin_sink.add(&line, ThoughtSource::UserInput, Some("cli"), None, None)
            {
                tracing::warn!(error = %e, "failed to enqueue user input");
            }
        }
    });

    tracing::info!("anna is awake — ctrl-c to shut down");

    // --- Lifecycle -----------------------------------------------------
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested, draining current cycle");
    handle.request_shutdown();

    if tokio::time::timeout(SHUTDOWN_GRACE, &mut mind_task).await.is_err() {
        tracing::warn!("grace period expired, cancelling in-flight calls");
        handle.force_shutdown();
        if tokio::time::timeout(Duration::from_secs(2), &mut mind_task)
            .await
            .is_err()
        {
            tracing::warn!("thinking loop did not stop, aborting");
            mind_task.abort();
        }
    }

    manager.shutdown().await;
    drop(reply_task);
    tracing::info!("clean shutdown");
    Ok(())
}

fn anna_home() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".anna")
}
