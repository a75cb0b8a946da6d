use super::types::*;
use crate::config::{env_var_pattern, expand_env_vars, expand_tilde};
use std::fs::File;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to open config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut yaml_string = String::new();
    file.read_to_string(&mut yaml_string).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let config = parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })?;

    Ok(config)
}

/// Parse, normalize and validate a YAML document.
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    // Expand environment variables in the YAML string before parsing
    let yaml = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml)?;

    // An empty document means "all defaults"
    let mut config: Config = if yaml.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml::from_str(&yaml)?
    };

    normalize(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let mut unexpanded_vars: Vec<String> = env_var_pattern()
        .captures_iter(yaml_string)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=/path/to/directory\n\
             2. Replace $env{{{0}}} in the config file with an actual path",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables (e.g., export LOG_DIR=/var/log/app)\n\
             2. Replace the variables in the config file with actual paths",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

/// Applies tilde expansion and the "0 lines means unset" rule.
pub fn normalize(config: &mut Config) {
    config.sink.path = expand_tilde(&config.sink.path);
    if config.sink.max_lines == Some(0) {
        config.sink.max_lines = None;
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    let sink = &config.sink;
    if sink.path.as_os_str().is_empty() {
        errors.push("sink.path must not be empty".to_string());
    } else if sink.path.file_name().is_none() {
        errors.push(format!(
            "sink.path '{}' does not name a file",
            sink.path.display()
        ));
    }
    if sink.max_size == 0 {
        errors.push("sink.max_size must be greater than 0".to_string());
    }
    if sink.buffer_size == 0 {
        errors.push("sink.buffer_size must be greater than 0".to_string());
    }
    if sink.mode > 0o7777 {
        errors.push(format!(
            "sink.mode {:o} is not a valid permission mask",
            sink.mode
        ));
    }

    let compression = &config.compression;
    if compression.enabled {
        match compression.method {
            CompressionMethod::Command => {
                if compression.program.trim().is_empty() {
                    errors.push(
                        "compression.program must be set when method is 'command'".to_string(),
                    );
                }
            }
            CompressionMethod::Builtin => {
                if compression.level > 9 {
                    errors.push(format!(
                        "compression.level {} is out of range (0-9)",
                        compression.level
                    ));
                }
            }
        }
        if compression.suffix.is_empty() {
            errors.push("compression.suffix must not be empty".to_string());
        }
    }

    match errors.len() {
        0 => Ok(()),
        1 => Err(ConfigError::Validation(errors.remove(0))),
        _ => Err(ConfigError::ValidationList(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.sink.max_size, DEFAULT_MAX_SIZE_BYTES);
        assert_eq!(config.sink.buffer_size, DEFAULT_BUFFER_SIZE);
        assert!(config
            .sink
            .path
            .to_string_lossy()
            .starts_with("./pid-"));
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let config = parse_config("sink:\n  path: /tmp/app.log\n  max_size: 12\n").unwrap();
        assert_eq!(config.sink.path, PathBuf::from("/tmp/app.log"));
        assert_eq!(config.sink.max_size, 12);
        assert_eq!(config.sink.mode, DEFAULT_MODE);
        assert_eq!(config.sink.read_errors.retry_delay, Duration::from_millis(100));
        assert!(!config.compression.enabled);
    }

    #[test]
    fn test_zero_max_lines_normalized() {
        let config = parse_config("sink:\n  path: /tmp/app.log\n  max_lines: 0\n").unwrap();
        assert_eq!(config.sink.max_lines, None);
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = parse_config("sink:\n  path: /tmp/app.log\n  max_size: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("max_size"));
    }

    #[test]
    fn test_multiple_errors_listed() {
        let yaml = "sink:\n  path: /tmp/app.log\n  max_size: 0\n  buffer_size: 0\n";
        match parse_config(yaml).unwrap_err() {
            ConfigError::ValidationList(errors) => {
                assert_eq!(errors.len(), 2);
                assert!(errors.iter().any(|e| e.contains("max_size")));
                assert!(errors.iter().any(|e| e.contains("buffer_size")));
            }
            other => panic!("expected ValidationList, got {other:?}"),
        }
    }

    #[test]
    fn test_compression_validation_only_when_enabled() {
        let yaml = "compression:\n  enabled: false\n  method: builtin\n  level: 42\n";
        assert!(parse_config(yaml).is_ok());

        let yaml = "compression:\n  enabled: true\n  method: builtin\n  level: 42\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("compression.level"));

        let yaml = "compression:\n  enabled: true\n  method: command\n  program: ''\n";
        let err = parse_config(yaml).unwrap_err();
        assert!(err.to_string().contains("compression.program"));
    }

    #[test]
    fn test_env_var_expansion_in_path() {
        std::env::set_var("LOGSINK_PARSE_TEST_DIR", "/srv/logs");
        let config = parse_config("sink:\n  path: $env{LOGSINK_PARSE_TEST_DIR}/app.log\n").unwrap();
        assert_eq!(config.sink.path, PathBuf::from("/srv/logs/app.log"));
        std::env::remove_var("LOGSINK_PARSE_TEST_DIR");
    }

    #[test]
    fn test_unset_env_var_reported() {
        let err = parse_config("sink:\n  path: $env{LOGSINK_SURELY_UNSET_VAR}/app.log\n")
            .unwrap_err();
        assert!(err.to_string().contains("LOGSINK_SURELY_UNSET_VAR"));
    }

    #[test]
    fn test_unknown_enum_value_is_parse_error() {
        let err = parse_config("sink:\n  line_counting: words\n").unwrap_err();
        assert!(matches!(err, ConfigError::YamlParse(_)));
    }
}
