use std::fs::OpenOptions;
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use ragchat_core::{Config, HttpGateway, Mode, Session};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod cli;
mod handler;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "ragchat")]
#[command(version, about = "Chat with an indexed codebase through a RAG answering service")]
struct Cli {
    /// Service base URL (overrides RAG_API_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive terminal UI (default)
    Tui,
    /// Ask a single question and print the answer
    Chat {
        /// Your question
        message: String,
        /// chat, architecture or code-review
        #[arg(short, long, value_parser = parse_mode)]
        mode: Option<Mode>,
    },
    /// Index a repository, then print the corpus status
    Index {
        /// Repository name
        repo: String,
        /// Filesystem root on the service host
        #[arg(short, long)]
        root: Option<String>,
    },
    /// Backfill embeddings for chunks that are missing them
    Reindex,
    /// Print corpus status
    Status,
    /// Print the chunks the service would retrieve for a question
    Retrieve {
        question: String,
    },
}

fn parse_mode(value: &str) -> Result<Mode, String> {
    Mode::from_str(value).ok_or_else(|| {
        let known: Vec<&str> = Mode::ALL.iter().map(|m| m.as_str()).collect();
        format!("unknown mode '{}' (expected one of: {})", value, known.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let interactive = matches!(cli.command, None | Some(Commands::Tui));

    // The TUI owns the terminal, so its logs go to a file instead of stderr.
    if interactive {
        init_file_logging()?;
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable config");
        Config::new()
    });
    let base_url = match cli.base_url {
        Some(url) => config.resolve_base_url(Some(url)),
        None => config.base_url(),
    };
    info!(base_url = %base_url, "starting ragchat v{}", env!("CARGO_PKG_VERSION"));

    let session = Session::with_mode(HttpGateway::new(&base_url), config.default_mode());

    match cli.command {
        None | Some(Commands::Tui) => run_tui(session, base_url).await,
        Some(Commands::Chat { message, mode }) => cli::chat(&session, &message, mode).await,
        Some(Commands::Index { repo, root }) => cli::index(&session, &repo, root.as_deref()).await,
        Some(Commands::Reindex) => cli::reindex(&session).await,
        Some(Commands::Status) => cli::status(&session).await,
        Some(Commands::Retrieve { question }) => cli::retrieve(&session, &question).await,
    }
}

fn init_file_logging() -> Result<()> {
    let dir = Config::config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let path = dir.join("ragchat.log");
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| anyhow!("Could not open log file {:?}: {}", path, e))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

async fn run_tui(session: Session<HttpGateway>, base_url: String) -> Result<()> {
    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let mut app = App::new(Arc::new(session), base_url, events.sender());

    let result = async {
        while !app.should_quit {
            app.refresh();
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            app.activate();

            if let Some(event) = events.next().await {
                handler::handle_event(&mut app, event).await?;
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;
    result
}
