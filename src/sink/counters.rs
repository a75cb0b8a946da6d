use crate::config::types::LineCounting;

/// Bytes and lines written to the active file since it was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RotationCounters {
    pub bytes: u64,
    pub lines: u64,
}

impl RotationCounters {
    /// Starts from the size of an existing file. Lines can't be recovered from
    /// the file, so they start at zero.
    pub fn seeded(existing_bytes: u64) -> Self {
        Self {
            bytes: existing_bytes,
            lines: 0,
        }
    }

    pub fn record(&mut self, chunk: &[u8], counting: LineCounting) {
        self.bytes += chunk.len() as u64;
        self.lines += match counting {
            LineCounting::Newlines => chunk.iter().filter(|&&b| b == b'\n').count() as u64,
            LineCounting::Reads => 1,
        };
    }

    pub fn threshold_reached(&self, max_size: u64, max_lines: Option<u64>) -> bool {
        self.bytes >= max_size || max_lines.is_some_and(|max| self.lines >= max)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
