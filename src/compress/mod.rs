//! Background compression of rotated files.
//!
//! The rotation loop hands a rotated path to [`CompressionDispatcher::dispatch`]
//! and moves on. Each dispatch spawns one detached task; failures are logged and
//! dropped. [`CompressionDispatcher::drain`] lets the process wait for
//! outstanding work before it exits.

mod command;
mod gzip;

pub use command::CommandCompressor;
pub use gzip::GzipCompressor;

use crate::config::types::{CompressionConfig, CompressionMethod};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("failed to spawn '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("compression task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Replaces a file with its compressed form.
#[async_trait]
pub trait Compressor: Send + Sync {
    /// Compress `path` in place and return the path of the compressed artifact.
    async fn compress(&self, path: &Path) -> Result<PathBuf, CompressError>;

    /// Short name used in log fields.
    fn name(&self) -> &str;

    /// Suffix appended to the compressed artifact.
    fn suffix(&self) -> &str;
}

/// Builds the compressor selected by the config.
pub fn compressor_from_config(config: &CompressionConfig) -> Arc<dyn Compressor> {
    match config.method {
        CompressionMethod::Command => Arc::new(CommandCompressor::new(
            config.program.clone(),
            config.args.clone(),
            config.suffix.clone(),
        )),
        CompressionMethod::Builtin => {
            Arc::new(GzipCompressor::new(config.level, config.suffix.clone()))
        }
    }
}

/// `<path><suffix>`, e.g. `app.log.1700000000000.gz`
pub fn compressed_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

/// Fire-and-forget launcher for compression tasks.
#[derive(Clone)]
pub struct CompressionDispatcher {
    compressor: Arc<dyn Compressor>,
    tracker: TaskTracker,
}

impl CompressionDispatcher {
    pub fn new(compressor: Arc<dyn Compressor>) -> Self {
        Self {
            compressor,
            tracker: TaskTracker::new(),
        }
    }

    pub fn from_config(config: &CompressionConfig) -> Self {
        Self::new(compressor_from_config(config))
    }

    /// Spawns compression of `path` and returns immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, path: PathBuf) {
        let compressor = self.compressor.clone();
        debug!(path = %path.display(), compressor = compressor.name(), "Dispatching compression");

        self.tracker.spawn(async move {
            match compressor.compress(&path).await {
                Ok(output) => info!(
                    path = %path.display(),
                    output = %output.display(),
                    "Compressed rotated file"
                ),
                Err(e) => error!(
                    path = %path.display(),
                    compressor = compressor.name(),
                    error = %e,
                    "Failed to compress rotated file"
                ),
            }
        });
    }

    pub fn suffix(&self) -> &str {
        self.compressor.suffix()
    }

    /// Number of compression tasks that have not finished yet.
    pub fn outstanding(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for every dispatched task to finish. Tasks dispatched after the
    /// drain started are waited for as well.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

impl std::fmt::Debug for CompressionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompressionDispatcher")
            .field("compressor", &self.compressor.name())
            .field("outstanding", &self.tracker.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    struct SlowCompressor {
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl Compressor for SlowCompressor {
        async fn compress(&self, path: &Path) -> Result<PathBuf, CompressError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CompressError::Io {
                    path: path.to_path_buf(),
                    source: std::io::Error::other("disk on fire"),
                });
            }
            Ok(compressed_path(path, ".gz"))
        }

        fn name(&self) -> &str {
            "slow"
        }

        fn suffix(&self) -> &str {
            ".gz"
        }
    }

    #[test]
    fn test_compressed_path_appends_suffix() {
        assert_eq!(
            compressed_path(Path::new("/var/log/app.log.1700000000000"), ".gz"),
            PathBuf::from("/var/log/app.log.1700000000000.gz")
        );
    }

    #[tokio::test]
    async fn test_dispatch_does_not_wait() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = CompressionDispatcher::new(Arc::new(SlowCompressor {
            calls: calls.clone(),
            fail: false,
        }));

        dispatcher.dispatch(PathBuf::from("/tmp/a"));
        dispatcher.dispatch(PathBuf::from("/tmp/b"));

        // Returned before any task finished
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(dispatcher.outstanding(), 2);

        dispatcher.drain().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(dispatcher.outstanding(), 0);
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let dispatcher = CompressionDispatcher::new(Arc::new(SlowCompressor {
            calls: calls.clone(),
            fail: true,
        }));

        dispatcher.dispatch(PathBuf::from("/tmp/a"));
        dispatcher.drain().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Still usable after a drain
        dispatcher.dispatch(PathBuf::from("/tmp/b"));
        dispatcher.drain().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_from_config_builtin() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log.1");
        std::fs::write(&path, b"hello\n").unwrap();

        let config = CompressionConfig {
            enabled: true,
            method: CompressionMethod::Builtin,
            ..CompressionConfig::default()
        };
        let dispatcher = CompressionDispatcher::from_config(&config);
        dispatcher.dispatch(path.clone());
        dispatcher.drain().await;

        assert!(!path.exists());
        assert!(dir.path().join("app.log.1.gz").exists());
    }
}
