use clap::{Parser, Subcommand};
use logsink::cli::run::RunArgs;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logsink")]
#[command(about = "Persist stdin to a size-bounded, rotating log file", long_about = None)]
struct Cli {
    /// YAML config file. Flags override values from it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    run: RunArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sink stdin into the log file (the default)
    Run(RunArgs),
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a starter config file
    Init {
        #[arg(long)]
        stdout: bool,
    },
    /// Load and validate the config file
    Validate,
}

#[tokio::main]
async fn main() {
    // Diagnostics go to stderr; stdout is left alone
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logsink=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config_path = logsink::config::resolve_config_path(cli.config.as_deref());

    let result = match cli.command {
        None => run_sink(config_path, cli.run).await,
        // Flags after `run` win over those before it
        Some(Commands::Run(args)) => run_sink(config_path, args.or(cli.run)).await,
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => logsink::cli::config::init(stdout),
            ConfigAction::Validate => logsink::cli::config::validate(config_path),
        },
    };

    // Exit explicitly: the blocking stdin reader can't be cancelled and would
    // otherwise hold up runtime shutdown.
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!(error = %e, "logsink failed");
            std::process::exit(1);
        }
    }
}

async fn run_sink(
    config_path: Option<PathBuf>,
    args: RunArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let summary = logsink::cli::run::run(config_path, args).await?;
    info!(
        bytes_written = summary.bytes_written,
        rotations = summary.rotations,
        "logsink finished"
    );
    Ok(())
}
