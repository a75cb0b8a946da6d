use super::{compressed_path, CompressError, Compressor};
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// In-process gzip on the blocking pool.
///
/// Writes `<path><suffix>.partial`, renames it into place and only then removes
/// the source, so a crash never leaves a truncated `.gz` next to a missing
/// original.
#[derive(Debug, Clone)]
pub struct GzipCompressor {
    level: u32,
    suffix: String,
}

impl GzipCompressor {
    pub fn new(level: u32, suffix: String) -> Self {
        Self {
            level: level.min(9),
            suffix,
        }
    }
}

impl Default for GzipCompressor {
    fn default() -> Self {
        Self::new(6, ".gz".to_string())
    }
}

#[async_trait]
impl Compressor for GzipCompressor {
    async fn compress(&self, path: &Path) -> Result<PathBuf, CompressError> {
        let source = path.to_path_buf();
        let target = compressed_path(path, &self.suffix);
        let level = Compression::new(self.level);

        tokio::task::spawn_blocking(move || gzip_file(&source, &target, level)).await?
    }

    fn name(&self) -> &str {
        "builtin-gzip"
    }

    fn suffix(&self) -> &str {
        &self.suffix
    }
}

fn gzip_file(source: &Path, target: &Path, level: Compression) -> Result<PathBuf, CompressError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| CompressError::Io { path, source }
    };

    let partial = compressed_path(target, ".partial");

    let input = File::open(source).map_err(io_err(source))?;
    let output = File::create(&partial).map_err(io_err(&partial))?;

    let mut encoder = GzEncoder::new(BufWriter::new(output), level);
    let copied = io::copy(&mut BufReader::new(input), &mut encoder);
    let finished = copied.and_then(|_| encoder.finish()).and_then(|mut w| {
        w.flush()?;
        w.get_ref().sync_all()
    });
    if let Err(e) = finished {
        let _ = fs::remove_file(&partial);
        return Err(io_err(&partial)(e));
    }

    fs::rename(&partial, target).map_err(io_err(target))?;
    fs::remove_file(source).map_err(io_err(source))?;

    Ok(target.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_round_trip_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log.1700000000000");
        let payload = b"Log line1\nLog line2\n".repeat(100);
        std::fs::write(&path, &payload).unwrap();

        let output = GzipCompressor::default().compress(&path).await.unwrap();

        assert_eq!(output, dir.path().join("app.log.1700000000000.gz"));
        assert!(!path.exists());
        assert!(!dir.path().join("app.log.1700000000000.gz.partial").exists());

        let mut decoded = Vec::new();
        GzDecoder::new(File::open(&output).unwrap())
            .read_to_end(&mut decoded)
            .unwrap();
        assert_eq!(decoded, payload);
    }

    #[tokio::test]
    async fn test_missing_source_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gone.log.1");

        let err = GzipCompressor::default().compress(&path).await.unwrap_err();

        assert!(matches!(err, CompressError::Io { .. }));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
