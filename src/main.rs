//! VFMP - filesystem path index daemon
//!
//! Entry point for the daemon and its one-shot client commands.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use clap::{Parser, Subcommand};
use vfmp::client::Client;
use vfmp::protocol::{default_max_results, SearchRequest, SearchResults};
use vfmp::server::{config_from_env, init_tracing, App, ServerConfig};
use vfmp::{Config, Result};

/// VFMP - filesystem path index daemon
#[derive(Parser, Debug)]
#[command(name = "vfmp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the index snapshot
    #[arg(short, long, env = "VFMP_DATA_DIR", default_value = "/var/lib/vfmp", global = true)]
    data_dir: std::path::PathBuf,

    /// Host address to bind to or connect to
    #[arg(long, env = "VFMP_HOST", default_value = "127.0.0.1", global = true)]
    host: String,

    /// Port to listen on or connect to
    #[arg(short, long, env = "VFMP_PORT", default_value = "32768", global = true)]
    port: u16,

    /// Log level (trace, debug, info, warn, error) [env: VFMP_LOG_LEVEL]
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable JSON logging output [env: VFMP_LOG_JSON]
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the daemon (default)
    Serve,
    /// Check that a daemon is running
    Ping,
    /// Count the files under a directory
    Count {
        /// Directory to walk
        dir: String,
    },
    /// Index the files under a directory, replacing the previous index
    Index {
        /// Directory to walk
        dir: String,
    },
    /// Search the last index
    Search {
        /// Filename (exact) or query (with --fuzzy)
        query: String,
        /// Rank every indexed path against the query
        #[arg(short, long)]
        fuzzy: bool,
        /// Minimum fuzzy score
        #[arg(long, default_value = "0")]
        score: i64,
        /// Maximum number of results
        #[arg(short, long, default_value_t = default_max_results())]
        max: usize,
    },
    /// Stop the daemon
    Kill {
        /// Reason recorded in the daemon's log
        reason: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let tracing_config = config_from_env();
    let log_level = cli.log_level.unwrap_or(tracing_config.level);
    init_tracing(&log_level, cli.log_json || tracing_config.json);

    let config = Config {
        data_dir: cli.data_dir,
        host: cli.host,
        port: cli.port,
        log_level,
        ..Config::default()
    };

    tracing::debug!(?config, "Configuration loaded");

    config.validate()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            serve(&config).await?;
            // Walks still running on the blocking pool are abandoned
            std::process::exit(0);
        }
        Command::Ping => {
            Client::connect(config.server_addr()).await?.ping().await?;
            println!("pong");
        }
        Command::Count { dir } => {
            let mut client = Client::connect(config.server_addr()).await?;
            let total = client
                .count(&dir, |n| tracing::info!(count = n, "Counting"))
                .await?;
            println!("{total}");
        }
        Command::Index { dir } => {
            let mut client = Client::connect(config.server_addr()).await?;
            let total = client
                .index(&dir, |n| tracing::info!(count = n, "Indexing"))
                .await?;
            println!("{total}");
        }
        Command::Search {
            query,
            fuzzy,
            score,
            max,
        } => {
            let request = SearchRequest {
                dir: std::env::current_dir()
                    .map(|d| d.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                search: query,
                fuzzy,
                min_score: score,
                max_results: max,
            };
            let mut client = Client::connect(config.server_addr()).await?;
            match client.search(&request).await? {
                SearchResults::Exact(paths) => {
                    for path in paths {
                        println!("{path}");
                    }
                }
                SearchResults::Fuzzy(matches) => {
                    for m in matches {
                        println!("{:>5} {}", m.score, m.path);
                    }
                }
            }
        }
        Command::Kill { reason } => {
            Client::connect(config.server_addr()).await?.kill(reason).await?;
        }
    }

    Ok(())
}

async fn serve(config: &Config) -> Result<()> {
    tracing::info!("VFMP v{} starting...", env!("CARGO_PKG_VERSION"));

    config.ensure_data_dir()?;

    tracing::info!(
        "Server will bind to {}, snapshot at {:?}",
        config.server_addr(),
        config.snapshot_path()
    );

    App::new(ServerConfig::from(config)).run().await
}
