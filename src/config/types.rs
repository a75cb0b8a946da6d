use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MODE: u32 = 0o640;
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_BUFFER_SIZE: usize = 4 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sink: SinkConfig,
    pub compression: CompressionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub path: PathBuf,
    #[serde(with = "mode_format")]
    pub mode: u32,
    #[serde(with = "size_format")]
    pub max_size: u64,
    /// Line threshold. `None` (or 0 in the file) rotates on size alone.
    pub max_lines: Option<u64>,
    pub buffer_size: usize,
    pub line_counting: LineCounting,
    pub read_errors: ReadErrorConfig,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            path: default_log_path(),
            mode: DEFAULT_MODE,
            max_size: DEFAULT_MAX_SIZE_BYTES,
            max_lines: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            line_counting: LineCounting::default(),
            read_errors: ReadErrorConfig::default(),
        }
    }
}

impl SinkConfig {
    /// Convenience constructor used by embedders and tests.
    pub fn new(path: impl Into<PathBuf>, max_size: u64) -> Self {
        Self {
            path: path.into(),
            max_size,
            ..Self::default()
        }
    }

    /// Line threshold with the "0 means unset" rule applied.
    pub fn line_threshold(&self) -> Option<u64> {
        self.max_lines.filter(|&n| n > 0)
    }
}

/// `./pid-<pid>.log`
pub fn default_log_path() -> PathBuf {
    PathBuf::from(format!("./pid-{}.log", std::process::id()))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineCounting {
    /// Count `\n` bytes in every chunk written.
    #[default]
    Newlines,
    /// Count one line per read call that produced data.
    Reads,
}

impl std::str::FromStr for LineCounting {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newlines" => Ok(Self::Newlines),
            "reads" => Ok(Self::Reads),
            other => Err(format!(
                "invalid line counting '{}', expected 'newlines' or 'reads'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadErrorConfig {
    pub policy: ReadErrorPolicy,
    #[serde(with = "duration_format")]
    pub retry_delay: Duration,
}

impl Default for ReadErrorConfig {
    fn default() -> Self {
        Self {
            policy: ReadErrorPolicy::Abort,
            retry_delay: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadErrorPolicy {
    #[default]
    Abort,
    Retry,
}

impl std::str::FromStr for ReadErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "retry" => Ok(Self::Retry),
            other => Err(format!(
                "invalid read error policy '{}', expected 'abort' or 'retry'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub method: CompressionMethod,
    /// External program for the `command` method. The rotated path is appended
    /// as the last argument.
    pub program: String,
    pub args: Vec<String>,
    /// gzip level for the `builtin` method (0-9).
    pub level: u32,
    /// Suffix the compressed artifact carries.
    pub suffix: String,
    /// Wait for outstanding compressions before the process exits.
    pub drain_on_exit: bool,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            method: CompressionMethod::Command,
            program: "gzip".to_string(),
            args: Vec::new(),
            level: 6,
            suffix: ".gz".to_string(),
            drain_on_exit: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionMethod {
    #[default]
    Command,
    Builtin,
}

// Durations like "100ms", "5s", "2m", "1h"
pub mod duration_format {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_duration(*duration))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_duration(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty duration string".to_string());
        }

        let (value_str, unit) = if let Some(v) = s.strip_suffix("ms") {
            (v, "ms")
        } else if let Some(v) = s.strip_suffix('s') {
            (v, "s")
        } else if let Some(v) = s.strip_suffix('m') {
            (v, "m")
        } else if let Some(v) = s.strip_suffix('h') {
            (v, "h")
        } else {
            return Err(format!("invalid duration format: {}", s));
        };

        let value: u64 = value_str
            .trim()
            .parse()
            .map_err(|_| format!("invalid numeric value: {}", value_str))?;

        let duration = match unit {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            _ => return Err(format!("unknown unit: {}", unit)),
        };

        Ok(duration)
    }

    pub fn format_duration(d: Duration) -> String {
        let secs = d.as_secs();
        if d.subsec_nanos() != 0 || secs == 0 {
            format!("{}ms", d.as_millis())
        } else if secs % 3600 == 0 {
            format!("{}h", secs / 3600)
        } else if secs % 60 == 0 {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

// Sizes like "10MB", "512KB", "1GB" or a bare byte count. Units are binary.
pub mod size_format {
    use serde::{self, Deserialize, Deserializer, Serializer};

    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;
    const GB: u64 = 1024 * MB;

    pub fn serialize<S>(bytes: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_size(*bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bytes(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Bytes(n) => Ok(n),
            Raw::Text(s) => parse_size(&s).map_err(serde::de::Error::custom),
        }
    }

    pub fn parse_size(s: &str) -> Result<u64, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty size string".to_string());
        }

        let upper = s.to_ascii_uppercase();
        let (value_str, multiplier) = if let Some(v) = upper.strip_suffix("GB") {
            (v, GB)
        } else if let Some(v) = upper.strip_suffix("MB") {
            (v, MB)
        } else if let Some(v) = upper.strip_suffix("KB") {
            (v, KB)
        } else if let Some(v) = upper.strip_suffix('B') {
            (v, 1)
        } else {
            (upper.as_str(), 1)
        };

        let value: u64 = value_str
            .trim()
            .parse()
            .map_err(|_| format!("invalid size: {}", s))?;

        value
            .checked_mul(multiplier)
            .ok_or_else(|| format!("size overflows: {}", s))
    }

    pub fn format_size(bytes: u64) -> String {
        if bytes >= GB && bytes % GB == 0 {
            format!("{}GB", bytes / GB)
        } else if bytes >= MB && bytes % MB == 0 {
            format!("{}MB", bytes / MB)
        } else if bytes >= KB && bytes % KB == 0 {
            format!("{}KB", bytes / KB)
        } else {
            format!("{}", bytes)
        }
    }
}

// Octal permission bits written as "0640" or "640".
pub mod mode_format {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(mode: &u32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{:04o}", mode))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_mode(&s).map_err(serde::de::Error::custom)
    }

    pub fn parse_mode(s: &str) -> Result<u32, String> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0o")
            .or_else(|| s.strip_prefix("0O"))
            .unwrap_or(s);
        if digits.is_empty() {
            return Err("empty file mode".to_string());
        }
        u32::from_str_radix(digits, 8).map_err(|_| format!("invalid octal file mode: {}", s))
    }
}
