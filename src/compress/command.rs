use super::{compressed_path, CompressError, Compressor};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Runs an external tool (gzip by default) against the rotated file.
///
/// The tool is expected to replace `<path>` with `<path><suffix>` itself, the
/// way `gzip <file>` does.
#[derive(Debug, Clone)]
pub struct CommandCompressor {
    program: String,
    args: Vec<String>,
    suffix: String,
}

impl CommandCompressor {
    pub fn new(program: String, args: Vec<String>, suffix: String) -> Self {
        Self {
            program,
            args,
            suffix,
        }
    }

    pub fn gzip() -> Self {
        Self::new("gzip".to_string(), Vec::new(), ".gz".to_string())
    }
}

#[async_trait]
impl Compressor for CommandCompressor {
    async fn compress(&self, path: &Path) -> Result<PathBuf, CompressError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| CompressError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CompressError::CommandFailed {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(compressed_path(path, &self.suffix))
    }

    fn name(&self) -> &str {
        &self.program
    }

    fn suffix(&self) -> &str {
        &self.suffix
    }
}
