//! netrpc server - JSON-RPC over stdio.
//!
//! `serve` takes over stdin/stdout and answers netrpc requests until the
//! peer closes its end. Logs always go to stderr.

use anyhow::Result;
use clap::{Parser, Subcommand};
use netrpc_core::{plugins, Registry};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "netrpc-server")]
#[command(about = "JSON-RPC server for netrpc services")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the registry over stdin/stdout (default)
    Serve,

    /// List discovered plugin binaries
    Plugins {
        /// Plugins directory (defaults to the user config directory)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Set up logging; stdout belongs to the RPC channel
    let log_level = if args.debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_lowercase()));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            info!("Starting netrpc server");
            serve().await
        }
        Command::Plugins { dir, json } => list_plugins(dir, json),
    }
}

async fn serve() -> Result<()> {
    let registry = Arc::new(Registry::new());
    netrpc_server::serve_stdio(registry).await?;
    info!("Peer closed the channel, exiting");
    Ok(())
}

fn list_plugins(dir: Option<PathBuf>, json: bool) -> Result<()> {
    let found = match dir {
        Some(dir) => plugins::discover(&dir)?,
        None => plugins::discover_default()?,
    };

    // Listing output is the command's result, not a log line
    if json {
        println!("{}", serde_json::to_string_pretty(&found)?);
    } else {
        for plugin in &found {
            println!("{}\t{}", plugin.name, plugin.path.display());
        }
    }
    Ok(())
}
