use super::counters::RotationCounters;
use super::naming::RotatedNamer;
use super::{SinkError, SinkSummary, StopReason};
use crate::compress::CompressionDispatcher;
use crate::config::types::{ReadErrorPolicy, SinkConfig};
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Appends an input stream to a file and rotates it on size or line thresholds.
///
/// Owns the only writable handle to the active file. Counters live on the
/// instance, so independent sinks can run side by side.
pub struct RotatingSink {
    config: SinkConfig,
    file: Option<File>,
    counters: RotationCounters,
    namer: RotatedNamer,
    dispatcher: Option<CompressionDispatcher>,
    summary: SinkSummary,
}

impl RotatingSink {
    /// Opens (or creates) the active file and seeds the byte counter from its
    /// current size.
    pub async fn open(
        config: SinkConfig,
        dispatcher: Option<CompressionDispatcher>,
    ) -> Result<Self, SinkError> {
        let file = open_active(&config.path, config.mode).await?;
        let existing = file
            .metadata()
            .await
            .map_err(|source| SinkError::Stat {
                path: config.path.clone(),
                source,
            })?
            .len();

        info!(
            path = %config.path.display(),
            existing_bytes = existing,
            max_size = config.max_size,
            max_lines = ?config.line_threshold(),
            compression = dispatcher.is_some(),
            "Opened log file"
        );

        let namer = RotatedNamer::new(
            config.path.clone(),
            dispatcher.as_ref().map(|d| d.suffix().to_string()),
        );

        Ok(Self {
            config,
            file: Some(file),
            counters: RotationCounters::seeded(existing),
            namer,
            dispatcher,
            summary: SinkSummary::default(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }

    pub fn counters(&self) -> RotationCounters {
        self.counters
    }

    pub fn summary(&self) -> &SinkSummary {
        &self.summary
    }

    /// Copies `input` until end-of-stream, then closes the active file.
    pub async fn run<R>(self, input: R) -> Result<SinkSummary, SinkError>
    where
        R: AsyncRead + Unpin,
    {
        self.run_until(input, CancellationToken::new()).await
    }

    /// Like [`run`](Self::run), but also stops (cleanly) once `shutdown` is
    /// cancelled. Bytes already read are always written before stopping.
    pub async fn run_until<R>(
        mut self,
        mut input: R,
        shutdown: CancellationToken,
    ) -> Result<SinkSummary, SinkError>
    where
        R: AsyncRead + Unpin,
    {
        match self.pump(&mut input, &shutdown).await {
            Ok(reason) => self.close(reason).await,
            Err(e) => {
                self.abandon().await;
                Err(e)
            }
        }
    }

    async fn pump<R>(
        &mut self,
        input: &mut R,
        shutdown: &CancellationToken,
    ) -> Result<StopReason, SinkError>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = vec![0u8; self.config.buffer_size];

        loop {
            let read = tokio::select! {
                biased;
                _ = shutdown.cancelled() => return Ok(StopReason::Shutdown),
                read = input.read(&mut buf) => read,
            };

            match read {
                Ok(0) => return Ok(StopReason::EndOfStream),
                Ok(n) => self.write_chunk(&buf[..n]).await?,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => match self.config.read_errors.policy {
                    ReadErrorPolicy::Abort => return Err(SinkError::Read { source: e }),
                    ReadErrorPolicy::Retry => {
                        self.summary.read_errors += 1;
                        warn!(error = %e, "Failed reading input, retrying");
                        tokio::select! {
                            _ = shutdown.cancelled() => return Ok(StopReason::Shutdown),
                            _ = tokio::time::sleep(self.config.read_errors.retry_delay) => {}
                        }
                    }
                },
            }
        }
    }

    /// Writes one chunk to the active file and rotates if a threshold was
    /// reached by it. A failed or short write is fatal.
    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), SinkError> {
        if chunk.is_empty() {
            return Ok(());
        }

        let path = &self.config.path;
        let file = self.file.as_mut().ok_or_else(|| SinkError::NotOpen {
            path: path.clone(),
        })?;

        let write_err = |source| SinkError::Write {
            path: path.clone(),
            source,
        };
        file.write_all(chunk).await.map_err(write_err)?;
        file.flush().await.map_err(write_err)?;

        self.counters.record(chunk, self.config.line_counting);
        self.summary.bytes_written += chunk.len() as u64;

        if self
            .counters
            .threshold_reached(self.config.max_size, self.config.line_threshold())
        {
            self.rotate().await?;
        }

        Ok(())
    }

    /// Close, rename out of the way, hand off to compression, reopen, reset.
    pub async fn rotate(&mut self) -> Result<PathBuf, SinkError> {
        if let Some(file) = self.file.take() {
            close_file(file, &self.config.path).await?;
        }

        let rotated = self.namer.next_name(Utc::now().timestamp_millis()).await;
        tokio::fs::rename(&self.config.path, &rotated)
            .await
            .map_err(|source| SinkError::Rename {
                from: self.config.path.clone(),
                to: rotated.clone(),
                source,
            })?;

        info!(
            path = %self.config.path.display(),
            rotated = %rotated.display(),
            bytes = self.counters.bytes,
            lines = self.counters.lines,
            "Rotated log file"
        );

        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.dispatch(rotated.clone());
        }

        self.file = Some(open_active(&self.config.path, self.config.mode).await?);
        self.counters.reset();
        self.summary.rotations += 1;

        Ok(rotated)
    }

    /// Flushes, syncs and closes the active file.
    pub async fn close(mut self, reason: StopReason) -> Result<SinkSummary, SinkError> {
        if let Some(file) = self.file.take() {
            close_file(file, &self.config.path).await?;
        }

        self.summary.stop_reason = reason;
        info!(
            path = %self.config.path.display(),
            bytes_written = self.summary.bytes_written,
            rotations = self.summary.rotations,
            reason = ?reason,
            "Closed log file"
        );

        Ok(self.summary)
    }

    // Best-effort close after a fatal error; the original error wins.
    async fn abandon(&mut self) {
        if let Some(file) = self.file.take() {
            if let Err(e) = close_file(file, &self.config.path).await {
                warn!(path = %self.config.path.display(), error = %e, "Failed closing log file after error");
            }
        }
    }
}

async fn open_active(path: &Path, mode: u32) -> Result<File, SinkError> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    options.mode(mode);

    let file = options.open(path).await.map_err(|source| SinkError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), mode = %format!("{:04o}", mode), "Opened active file");
    Ok(file)
}

async fn close_file(mut file: File, path: &Path) -> Result<(), SinkError> {
    let close_err = |source| SinkError::Close {
        path: path.to_path_buf(),
        source,
    };
    file.flush().await.map_err(close_err)?;
    file.sync_all().await.map_err(close_err)?;
    Ok(())
}
