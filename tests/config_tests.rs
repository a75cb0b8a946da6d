use logsink::cli::run::{resolve_config, RunArgs};
use logsink::config::types::{CompressionMethod, LineCounting, ReadErrorPolicy};
use logsink::config::{generate::generate_starter_config, load_config, ConfigError};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_generated_config_is_valid() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(&config_path, generate_starter_config()).unwrap();

    let config = load_config(&config_path).expect("Generated config should be valid");

    assert_eq!(config.sink.path, PathBuf::from("/var/log/app/current.log"));
    assert_eq!(config.sink.max_size, 10 * 1024 * 1024);
    assert_eq!(config.sink.buffer_size, 4096);
    assert!(!config.compression.enabled);
}

#[test]
fn test_full_config() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");

    let config_yaml = r#"
sink:
  path: /srv/logs/api.log
  mode: '0600'
  max_size: 512KB
  max_lines: 10000
  line_counting: reads
  buffer_size: 8192
  read_errors:
    policy: retry
    retry_delay: 2s

compression:
  enabled: true
  method: builtin
  level: 9
  suffix: .gz
  drain_on_exit: false
"#;
    fs::write(&config_path, config_yaml).unwrap();

    let config = load_config(&config_path).unwrap();

    assert_eq!(config.sink.path, PathBuf::from("/srv/logs/api.log"));
    assert_eq!(config.sink.mode, 0o600);
    assert_eq!(config.sink.max_size, 512 * 1024);
    assert_eq!(config.sink.max_lines, Some(10000));
    assert_eq!(config.sink.line_counting, LineCounting::Reads);
    assert_eq!(config.sink.buffer_size, 8192);
    assert_eq!(config.sink.read_errors.policy, ReadErrorPolicy::Retry);
    assert_eq!(config.sink.read_errors.retry_delay, Duration::from_secs(2));
    assert!(config.compression.enabled);
    assert_eq!(config.compression.method, CompressionMethod::Builtin);
    assert_eq!(config.compression.level, 9);
    assert!(!config.compression.drain_on_exit);
}

#[test]
fn test_missing_file_names_path() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("nope.yml");

    let err = load_config(&config_path).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
    assert!(err.to_string().contains("nope.yml"));
}

#[test]
fn test_malformed_yaml_names_path() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("bad.yml");
    fs::write(&config_path, "sink: [unclosed\n").unwrap();

    let err = load_config(&config_path).unwrap_err();
    assert!(err.to_string().contains("bad.yml"));
}

#[test]
fn test_invalid_values_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        "sink:\n  path: /tmp/x.log\n  max_size: 0\n  buffer_size: 0\n",
    )
    .unwrap();

    match load_config(&config_path).unwrap_err() {
        ConfigError::ValidationList(errors) => assert_eq!(errors.len(), 2),
        other => panic!("expected ValidationList, got {other:?}"),
    }
}

#[test]
fn test_flags_override_file() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.yml");
    fs::write(
        &config_path,
        "sink:\n  path: /tmp/from-file.log\n  max_size: 1MB\n  buffer_size: 1024\n",
    )
    .unwrap();

    let args = RunArgs {
        logfile: Some(PathBuf::from("/tmp/from-flag.log")),
        max_size: Some(5),
        compress: true,
        ..RunArgs::default()
    };
    let config = resolve_config(Some(&config_path), &args).unwrap();

    assert_eq!(config.sink.path, PathBuf::from("/tmp/from-flag.log"));
    assert_eq!(config.sink.max_size, 5 * 1024 * 1024);
    // Untouched by flags
    assert_eq!(config.sink.buffer_size, 1024);
    assert!(config.compression.enabled);
}
