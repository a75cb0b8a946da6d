//! Names for rotated files.
//!
//! A rotated file is `<path>.<unix-millis>`. Two rotations inside the same
//! millisecond would collide, so the second one gets `<path>.<unix-millis>.1`,
//! the third `.2` and so on. A name is also skipped when it, or its compressed
//! form, already exists on disk (e.g. left over from a previous run).
//!
//! Only `<path>.<millis>[.<seq>]` optionally followed by the compressed suffix
//! counts as a rotated file. Compressor scratch files such as
//! `<path>.<millis>.gz.partial` do not.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct RotatedNamer {
    base: PathBuf,
    compressed_suffix: Option<String>,
    last_stamp: Option<i64>,
    next_seq: u32,
}

impl RotatedNamer {
    pub fn new(base: impl Into<PathBuf>, compressed_suffix: Option<String>) -> Self {
        Self {
            base: base.into(),
            compressed_suffix,
            last_stamp: None,
            next_seq: 0,
        }
    }

    /// Picks the name for a rotation happening at `millis`.
    pub async fn next_name(&mut self, millis: i64) -> PathBuf {
        if self.last_stamp != Some(millis) {
            self.last_stamp = Some(millis);
            self.next_seq = 0;
        }

        loop {
            let candidate = rotated_name(&self.base, millis, self.next_seq);
            self.next_seq += 1;
            if !self.is_taken(&candidate).await {
                return candidate;
            }
        }
    }

    // A failed lookup counts as free; the rename that follows reports the error.
    async fn is_taken(&self, candidate: &Path) -> bool {
        if exists(candidate).await {
            return true;
        }
        match &self.compressed_suffix {
            Some(suffix) => {
                let mut name = candidate.as_os_str().to_os_string();
                name.push(suffix);
                exists(Path::new(&name)).await
            }
            None => false,
        }
    }
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

/// `<base>.<millis>` for `seq == 0`, `<base>.<millis>.<seq>` otherwise.
pub fn rotated_name(base: &Path, millis: i64, seq: u32) -> PathBuf {
    let mut name: OsString = base.as_os_str().to_os_string();
    name.push(format!(".{}", millis));
    if seq > 0 {
        name.push(format!(".{}", seq));
    }
    PathBuf::from(name)
}

/// Parses the `(millis, seq)` stamp out of a rotated file name. The name may
/// end in `compressed_suffix`; anything else after the stamp means it isn't a
/// rotation of `base`.
pub fn parse_stamp(
    base: &Path,
    candidate: &Path,
    compressed_suffix: Option<&str>,
) -> Option<(i64, u32)> {
    let base_name = base.file_name()?.to_str()?;
    let name = candidate.file_name()?.to_str()?;
    let mut rest = name.strip_prefix(base_name)?.strip_prefix('.')?;
    if let Some(stripped) = compressed_suffix
        .filter(|suffix| !suffix.is_empty())
        .and_then(|suffix| rest.strip_suffix(suffix))
    {
        rest = stripped;
    }

    let mut parts = rest.split('.');
    let millis = parts.next()?.parse::<i64>().ok()?;
    let seq = match parts.next() {
        Some(part) => part.parse::<u32>().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((millis, seq))
}

/// Lists rotated files of `base` (plain or compressed) in rotation order.
pub fn rotated_files(
    base: &Path,
    compressed_suffix: Option<&str>,
) -> std::io::Result<Vec<PathBuf>> {
    let dir = match base.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut found = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        if let Some(stamp) = parse_stamp(base, &path, compressed_suffix) {
            found.push((stamp, path));
        }
    }
    found.sort();

    Ok(found.into_iter().map(|(_, path)| path).collect())
}
