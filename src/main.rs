use anyhow::Result;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use modelmig::commands::{self, GenerateArgs};
use modelmig::config::{self, ConfigBuilder};
use modelmig::constants::CONFIG_FILENAME;
use modelmig::ephemeral::docker;
use modelmig::pipeline::ShutdownSignal;
use modelmig::pipeline::shutdown::wait_for_shutdown_signal;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(long, default_value = CONFIG_FILENAME, global = true)]
    config_file: String,

    /// Enable verbose output (info level)
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress all non-essential output (error level only)
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Enable debug output (debug level)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate migration statements from the model
    Generate(GenerateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();
    initialize_logging(&cli);

    let shutdown = ShutdownSignal::new();
    let watching = matches!(&cli.command, Commands::Generate(args) if args.dev);

    // Watch mode stops between iterations; a single run is cancelled outright
    let result = if watching {
        shutdown.listen();
        run_main(cli, &shutdown).await
    } else {
        tokio::select! {
            result = run_main(cli, &shutdown) => result,
            _ = wait_for_shutdown_signal() => {
                info!("Received shutdown signal, cleaning up...");
                Ok(())
            }
        }
    };

    if let Err(e) = docker::cleanup_all_containers().await {
        eprintln!("Warning: Failed to cleanup Docker containers: {}", e);
    }

    result
}

fn initialize_logging(cli: &Cli) {
    let level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };

    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(level)
    };

    fmt().with_env_filter(filter).with_target(false).init();
}

async fn run_main(cli: Cli, shutdown: &ShutdownSignal) -> Result<()> {
    let (file_config, root_dir) = config::load_config(&cli.config_file)?;

    match &cli.command {
        Commands::Generate(args) => {
            let config = ConfigBuilder::new()
                .with_file(file_config)
                .with_cli_args(args.config_input())
                .resolve()?;
            commands::cmd_generate(&config, &root_dir, args, shutdown).await
        }
    }
}
