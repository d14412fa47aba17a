//! Warden CLI - line-oriented chat REPL.
//!
//! ```text
//! stdin line -> Session::turn() -> model -> (tool call -> consent prompt) -> stdout
//! ```
//!
//! Turns run one at a time on a current-thread runtime. The consent prompt
//! reads from the same stdin stream as the chat prompt, so a pending
//! question always gets the next line the user types.

mod consent;

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use warden_engine::{
    ModelClient, OpenAiClient, Session, ToolSettings, Toolbox, WardenConfig, config_path,
};

use consent::{SharedLines, TerminalConsent};

#[derive(Parser)]
#[command(name = "warden")]
#[command(about = "Chat with a model that can read and write project files, with your consent", long_about = None)]
struct Cli {
    /// Project folder that file operations are confined to (default: current directory).
    #[arg(long, conflicts_with = "no_root")]
    root: Option<PathBuf>,

    /// Run without a project folder; every file operation is rejected.
    #[arg(long)]
    no_root: bool,

    /// Override the model from the config file.
    #[arg(long)]
    model: Option<String>,

    /// Override the API base URL (any OpenAI-compatible server).
    #[arg(long)]
    base_url: Option<String>,

    /// Config file path (default: ~/.warden/config.toml).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // Logs never go to stdout/stderr; the terminal belongs to the chat.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, std::fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!(
                "Failed to create log dir {}: {e}",
                parent.display()
            ));
            continue;
        }

        match OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!(
                    "Failed to open log file {}: {e}",
                    candidate.display()
                ));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Primary: ~/.warden/logs/warden.log
    if let Some(config_path) = config_path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("warden.log"));
    }

    // Fallback: ./.warden/logs/warden.log
    candidates.push(PathBuf::from(".warden").join("logs").join("warden.log"));

    candidates
}

fn trusted_root(cli: &Cli) -> Result<Option<PathBuf>> {
    if cli.no_root {
        return Ok(None);
    }
    match &cli.root {
        Some(root) => Ok(Some(root.clone())),
        None => std::env::current_dir()
            .map(Some)
            .context("failed to determine the current directory"),
    }
}

enum Command {
    Quit,
    Clear,
    Chat,
    Empty,
}

fn classify(line: &str) -> Command {
    match line.trim() {
        "" => Command::Empty,
        "/quit" | "/exit" => Command::Quit,
        "/clear" => Command::Clear,
        _ => Command::Chat,
    }
}

fn prompt() {
    print!("\n> ");
    let _ = std::io::stdout().flush();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = WardenConfig::load(cli.config.as_deref())?.unwrap_or_default();
    let api_config = config.api_config(cli.model.as_deref(), cli.base_url.as_deref())?;
    let model = OpenAiClient::new(api_config).context("failed to build the HTTP client")?;

    let tools = Toolbox::builtin(ToolSettings::from_config(config.tools.as_ref()))?
        .with_app_config(&config.app.unwrap_or_default());
    let root = trusted_root(&cli)?;

    tracing::info!(
        model = model.model(),
        root = ?root,
        "Session started"
    );
    match &root {
        Some(root) => println!("warden - model {} - project {}", model.model(), root.display()),
        None => println!("warden - model {} - no project folder", model.model()),
    }
    println!("Type /clear to start over, /quit to exit.");

    let lines: SharedLines = Arc::new(tokio::sync::Mutex::new(
        BufReader::new(tokio::io::stdin()).lines(),
    ));
    let gate = TerminalConsent::new(Arc::clone(&lines));
    let mut session = Session::new();

    loop {
        prompt();
        let line = match lines.lock().await.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(err) => {
                tracing::error!(error = %err, "Failed to read input");
                break;
            }
        };

        match classify(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Clear => {
                session.reset();
                println!("Conversation cleared.");
            }
            Command::Chat => {
                let reply = session
                    .turn(line.trim(), root.as_deref(), &model, &gate, &tools)
                    .await;
                println!("\n{reply}");
            }
        }
    }

    tracing::info!(messages = session.transcript().len(), "Session ended");
    Ok(())
}
