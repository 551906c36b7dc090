use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "iap")]
#[command(about = "In-app purchase reconciliation CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate layered config and product partitions; print a JSON summary
    ConfigCheck {
        /// Paths in merge order (base -> env overrides...)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Run a full session against the in-memory store; events as JSON lines
    Simulate {
        /// Layered config paths in merge order
        #[arg(long = "config", required = true)]
        config_paths: Vec<String>,

        /// Product already owned before connect (repeatable)
        #[arg(long = "own")]
        own: Vec<String>,

        /// Product to buy after connect (repeatable, in order)
        #[arg(long = "buy")]
        buy: Vec<String>,

        /// Drop the store connection after purchases
        #[arg(long, default_value_t = false)]
        disconnect: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::ConfigCheck { paths } => commands::config::check(&paths)?,
        Commands::ConfigHash { paths } => commands::config::hash(&paths)?,
        Commands::Simulate {
            config_paths,
            own,
            buy,
            disconnect,
        } => {
            commands::simulate::run(commands::simulate::SimulateArgs {
                config_paths,
                own,
                buy,
                disconnect,
            })
            .await?
        }
    }
    Ok(())
}

/// Logs go to stderr; stdout carries machine-readable output only.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
