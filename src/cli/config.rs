use crate::config::generate::generate_starter_config;
use crate::config::{load_config, system_config_path, user_config_path};
use std::fs;
use std::path::PathBuf;

pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config_content = generate_starter_config();

    if stdout {
        print!("{}", config_content);
        return Ok(());
    }

    // Try ~/.config/logsink/config.yml first
    let config_path = match user_config_path() {
        Some(user_config) => match user_config.parent().map(fs::create_dir_all) {
            Some(Err(_)) => {
                eprintln!("Warning: Could not create directory for {}", user_config.display());
                eprintln!("Falling back to {}", system_config_path().display());
                system_config_path()
            }
            _ => user_config,
        },
        None => system_config_path(),
    };

    if config_path.exists() {
        return Err(format!(
            "Config file already exists at {}. Remove it first or use --stdout to print the config",
            config_path.display()
        )
        .into());
    }

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&config_path, config_content)?;

    println!("Config file written to {}", config_path.display());
    Ok(())
}

pub fn validate(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path.ok_or("No config file found. Use --config to specify a path.")?;

    println!("Validating config file: {}", path.display());

    match load_config(&path) {
        Ok(config) => {
            println!("✓ Config is valid");
            println!("  log file:    {}", config.sink.path.display());
            println!("  max size:    {} bytes", config.sink.max_size);
            match config.sink.max_lines {
                Some(lines) => println!("  max lines:   {}", lines),
                None => println!("  max lines:   (size only)"),
            }
            println!(
                "  compression: {}",
                if config.compression.enabled { "on" } else { "off" }
            );
            Ok(())
        }
        Err(e) => Err(format!("✗ Config validation failed:\n{}", e).into()),
    }
}
