pub fn generate_starter_config() -> String {
    r#"# =============================================================================
# LOGSINK CONFIGURATION
# =============================================================================
# logsink copies everything it reads on stdin into a size-bounded log file,
# renaming the file out of the way whenever a threshold is crossed.
#
#   some-service 2>&1 | logsink --config /etc/logsink/config.yml
#
# Config file locations (in order of precedence):
#   1. Path specified via --config argument
#   2. ~/.config/logsink/config.yml
#   3. /etc/logsink/config.yml
#
# Command-line flags override values from this file. Values may reference
# environment variables with $env{NAME} and paths may start with ~/.

# =============================================================================
# SINK
# =============================================================================
sink:
  # Active log file. Rotated files are written next to it as
  # <path>.<unix-millis>, with a .<n> suffix if two rotations share a millisecond.
  path: /var/log/app/current.log

  # Permission bits used when the file is created (octal)
  mode: '0640'

  # Rotate once the active file reaches this size (B, KB, MB, GB)
  max_size: 10MB

  # Rotate once this many lines were written since the last rotation.
  # 0 disables the line threshold.
  max_lines: 0

  # How lines are counted for max_lines:
  #   newlines - count newline characters written
  #   reads    - count one line per read from stdin
  line_counting: newlines

  # Bytes requested from stdin per read
  buffer_size: 4096

  read_errors:
    # abort - stop the sink on the first read error
    # retry - log the error, wait retry_delay and read again
    policy: abort
    retry_delay: 100ms

# =============================================================================
# COMPRESSION
# =============================================================================
compression:
  enabled: false

  # command - run `<program> <args...> <rotated file>`
  # builtin - gzip in-process
  method: command
  program: gzip
  args: []

  # gzip level for the builtin method (0-9)
  level: 6

  # Suffix of the compressed file
  suffix: .gz

  # Wait for pending compressions before exiting
  drain_on_exit: true
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::config::types::{CompressionMethod, LineCounting, ReadErrorPolicy};

    #[test]
    fn test_starter_config_parses() {
        let config = parse_config(&generate_starter_config()).unwrap();
        assert_eq!(
            config.sink.path,
            std::path::PathBuf::from("/var/log/app/current.log")
        );
        assert_eq!(config.sink.mode, 0o640);
        assert_eq!(config.sink.max_size, 10 * 1024 * 1024);
        assert_eq!(config.sink.max_lines, None);
        assert_eq!(config.sink.line_counting, LineCounting::Newlines);
        assert_eq!(config.sink.read_errors.policy, ReadErrorPolicy::Abort);
        assert!(!config.compression.enabled);
        assert_eq!(config.compression.method, CompressionMethod::Command);
    }
}
