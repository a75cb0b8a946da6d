pub mod counters;
pub mod naming;
pub mod rotation;

pub use counters::RotationCounters;
pub use naming::{rotated_files, RotatedNamer};
pub use rotation::RotatingSink;

use crate::compress::CompressionDispatcher;
use crate::config::types::Config;
use std::path::PathBuf;
use thiserror::Error;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

/// Terminal failures of the rotation loop. Each one means the sink can no
/// longer vouch for the data it was handed.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed opening log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed getting log file stat for {path}: {source}")]
    Stat {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed writing buffer to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed closing {path}: {source}")]
    Close {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed renaming {from} to {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed reading input: {source}")]
    Read {
        #[source]
        source: std::io::Error,
    },

    #[error("log file {path} is not open")]
    NotOpen { path: PathBuf },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StopReason {
    #[default]
    EndOfStream,
    Shutdown,
}

/// What a finished run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkSummary {
    /// Bytes written during this run (not counting pre-existing content)
    pub bytes_written: u64,
    pub rotations: u64,
    /// Read errors skipped under the retry policy
    pub read_errors: u64,
    pub stop_reason: StopReason,
}

/// Runs a sink over `input` until end-of-stream.
///
/// Compression, when enabled, is fire-and-forget: tasks still running when
/// this returns are not waited for. Use [`run_with`] to keep a handle on the
/// dispatcher.
pub async fn run<R>(config: &Config, input: R) -> Result<SinkSummary, SinkError>
where
    R: AsyncRead + Unpin,
{
    let dispatcher = config
        .compression
        .enabled
        .then(|| CompressionDispatcher::from_config(&config.compression));
    run_with(config, dispatcher, input, CancellationToken::new()).await
}

/// Runs a sink with an explicit dispatcher and shutdown token.
pub async fn run_with<R>(
    config: &Config,
    dispatcher: Option<CompressionDispatcher>,
    input: R,
    shutdown: CancellationToken,
) -> Result<SinkSummary, SinkError>
where
    R: AsyncRead + Unpin,
{
    RotatingSink::open(config.sink.clone(), dispatcher)
        .await?
        .run_until(input, shutdown)
        .await
}
