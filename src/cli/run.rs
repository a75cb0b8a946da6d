use crate::compress::CompressionDispatcher;
use crate::config::parse::{load_config, normalize, validate_config, ConfigError};
use crate::config::types::{mode_format, Config, LineCounting, ReadErrorPolicy};
use crate::sink::{run_with, SinkError, SinkSummary, StopReason};
use clap::Args;
use std::path::PathBuf;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sink(#[from] SinkError),
}

/// Flags for the sink. Anything given here overrides the config file.
#[derive(Debug, Clone, Default, Args)]
pub struct RunArgs {
    /// Full log file path including filename. [default: ./pid-<pid>.log]
    #[arg(long)]
    pub logfile: Option<PathBuf>,

    /// Log file permission, in octal. [default: 0640]
    #[arg(long, value_name = "MODE", value_parser = parse_mode_arg)]
    pub logfile_perm: Option<u32>,

    /// Max log file size in MB. [default: 10]
    #[arg(long, value_name = "MB")]
    pub max_size: Option<u64>,

    /// Max log file lines. If both max-size and max-lines are set, the file
    /// rolls over when either threshold is reached. 0 disables it.
    #[arg(long)]
    pub max_lines: Option<u64>,

    /// Max read buffer size in bytes. [default: 4096]
    #[arg(long, value_name = "BYTES")]
    pub buf_size: Option<usize>,

    /// Compress rotated files in the background.
    #[arg(long)]
    pub compress: bool,

    /// How lines are counted for --max-lines: newlines or reads.
    #[arg(long, value_name = "MODE")]
    pub line_counting: Option<LineCounting>,

    /// What to do when reading stdin fails: abort or retry.
    #[arg(long, value_name = "POLICY")]
    pub on_read_error: Option<ReadErrorPolicy>,
}

impl RunArgs {
    /// Fills every flag left unset here from `fallback`. Used to merge the
    /// flags given after `run` with those given before it.
    pub fn or(self, fallback: RunArgs) -> RunArgs {
        RunArgs {
            logfile: self.logfile.or(fallback.logfile),
            logfile_perm: self.logfile_perm.or(fallback.logfile_perm),
            max_size: self.max_size.or(fallback.max_size),
            max_lines: self.max_lines.or(fallback.max_lines),
            buf_size: self.buf_size.or(fallback.buf_size),
            compress: self.compress || fallback.compress,
            line_counting: self.line_counting.or(fallback.line_counting),
            on_read_error: self.on_read_error.or(fallback.on_read_error),
        }
    }
}

fn parse_mode_arg(s: &str) -> Result<u32, String> {
    mode_format::parse_mode(s)
}

/// Layers command-line flags on top of `config`.
pub fn apply_overrides(config: &mut Config, args: &RunArgs) {
    if let Some(path) = &args.logfile {
        config.sink.path = path.clone();
    }
    // 0 keeps whatever the file (or the default) says
    if let Some(mode) = args.logfile_perm.filter(|&m| m != 0) {
        config.sink.mode = mode;
    }
    if let Some(mb) = args.max_size {
        config.sink.max_size = mb.saturating_mul(1024 * 1024);
    }
    if let Some(lines) = args.max_lines {
        config.sink.max_lines = Some(lines);
    }
    if let Some(size) = args.buf_size {
        config.sink.buffer_size = size;
    }
    if args.compress {
        config.compression.enabled = true;
    }
    if let Some(counting) = args.line_counting {
        config.sink.line_counting = counting;
    }
    if let Some(policy) = args.on_read_error {
        config.sink.read_errors.policy = policy;
    }
}

/// Builds the effective config: file (or defaults), then flags, then validation.
pub fn resolve_config(config_path: Option<&PathBuf>, args: &RunArgs) -> Result<Config, ConfigError> {
    let mut config = match config_path {
        Some(path) => {
            info!(config_path = %path.display(), "Loading configuration");
            load_config(path)?
        }
        None => Config::default(),
    };

    apply_overrides(&mut config, args);
    normalize(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Sinks stdin until end-of-stream or a termination signal.
pub async fn run(config_path: Option<PathBuf>, args: RunArgs) -> Result<SinkSummary, RunError> {
    let config = resolve_config(config_path.as_ref(), &args)?;

    let dispatcher = config
        .compression
        .enabled
        .then(|| CompressionDispatcher::from_config(&config.compression));

    let shutdown = CancellationToken::new();
    let signal_task = tokio::spawn(wait_for_shutdown_signal(shutdown.clone()));

    let result = run_with(&config, dispatcher.clone(), tokio::io::stdin(), shutdown).await;
    signal_task.abort();

    if let Some(dispatcher) = dispatcher.filter(|_| config.compression.drain_on_exit) {
        let outstanding = dispatcher.outstanding();
        if outstanding > 0 {
            info!(outstanding, "Waiting for compression to finish");
        }
        dispatcher.drain().await;
    }

    let summary = result?;
    if summary.stop_reason == StopReason::Shutdown {
        info!("Stopped on shutdown signal");
    }
    Ok(summary)
}

async fn wait_for_shutdown_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => {
                        if let Err(e) = res {
                            warn!(error = %e, "Failed listening for Ctrl+C");
                            terminate.recv().await;
                        }
                    }
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed listening for SIGTERM");
                if tokio::signal::ctrl_c().await.is_err() {
                    return;
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
    }

    info!("Shutdown signal received");
    token.cancel();
}
