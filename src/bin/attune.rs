//! CLI binary for attune.

use std::path::PathBuf;
use std::sync::Arc;

use attune::audio::{CpalPlayback, MicRecorder};
use attune::server::AttuneServer;
use attune::{AttuneConfig, SessionId, SessionState};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Attune: an emotion-aware voice assistant.
#[derive(Parser)]
#[command(name = "attune", version, about)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP trigger surface.
    Serve {
        /// Override the configured port.
        #[arg(long)]
        port: Option<u16>,
    },

    /// Record and answer one turn in the terminal.
    Turn {
        /// Continue an existing conversation.
        #[arg(long)]
        session: Option<String>,
    },

    /// Print a session's conversation.
    History {
        #[arg(long)]
        session: String,
    },

    /// List stored sessions.
    Sessions,

    /// List available audio devices.
    Devices,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("attune=info,hyper=warn,reqwest=warn")),
        )
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => AttuneConfig::from_file(path)?,
        None => {
            let default_path = AttuneConfig::default_config_path();
            if default_path.is_file() {
                AttuneConfig::from_file(&default_path)?
            } else {
                AttuneConfig::default()
            }
        }
    };

    match cli.command.unwrap_or(Command::Serve { port: None }) {
        Command::Serve { port } => serve(config, port).await,
        Command::Turn { session } => run_turn(config, session).await,
        Command::History { session } => print_history(config, &session).await,
        Command::Sessions => list_sessions(config).await,
        Command::Devices => list_devices(),
    }
}

async fn serve(config: AttuneConfig, port: Option<u16>) -> anyhow::Result<()> {
    println!("Attune v{}", env!("CARGO_PKG_VERSION"));
    let service = Arc::new(attune::startup::build_service(&config)?);
    let port = port.unwrap_or_else(|| config.server.effective_port());
    let server = AttuneServer::start(service, &config.server.host, port).await?;

    println!("Serving on http://{}. Press Ctrl+C to stop.", server.addr());
    tokio::signal::ctrl_c().await?;
    info!("received Ctrl+C, shutting down...");
    server.shutdown();
    Ok(())
}

async fn run_turn(config: AttuneConfig, session: Option<String>) -> anyhow::Result<()> {
    let service = attune::startup::build_service(&config)?;
    let id = match session {
        Some(raw) => SessionId::parse(&raw)?,
        None => SessionId::generate(),
    };
    println!("Session {id}. Speak after \"Recording...\".");

    let on_progress = |s: &SessionState| println!("  {}", s.status);
    let finished = service.run_turn(&id, &on_progress).await?;

    if let Some(latest) = service.latest_turn(id.as_str()).await?
        && finished.status == attune::session::state::status::COMPLETE
    {
        println!("\nYou ({}): {}", latest.emotion_display, latest.user_text);
        println!("Attune: {}", latest.response_text);
    }
    Ok(())
}

async fn print_history(config: AttuneConfig, session: &str) -> anyhow::Result<()> {
    let service = attune::startup::build_service(&config)?;
    let turns = service.history(session).await?;
    if turns.is_empty() {
        println!("No messages for session {session}.");
    }
    for turn in turns {
        println!("You ({}): {}", turn.emotion_display, turn.user_text);
        println!("Attune: {}\n", turn.response_text);
    }
    Ok(())
}

async fn list_sessions(config: AttuneConfig) -> anyhow::Result<()> {
    let service = attune::startup::build_service(&config)?;
    for summary in service.sessions().await? {
        println!("{}  {}", summary.session_id, summary.preview);
    }
    Ok(())
}

fn list_devices() -> anyhow::Result<()> {
    println!("Input devices:");
    for name in MicRecorder::list_input_devices()? {
        println!("  - {name}");
    }

    println!("\nOutput devices:");
    for name in CpalPlayback::list_output_devices()? {
        println!("  - {name}");
    }

    Ok(())
}
