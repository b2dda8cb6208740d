mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    tracing::debug!("Loaded config from {:?}", path);
    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./vidtrim.toml",
        "~/.config/vidtrim/config.toml",
        "/etc/vidtrim/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.remux.buffer_size == 0 {
        anyhow::bail!("remux.buffer_size cannot be 0");
    }

    if config.remux.max_buffer_size < config.remux.buffer_size {
        anyhow::bail!(
            "remux.max_buffer_size ({}) is smaller than remux.buffer_size ({})",
            config.remux.max_buffer_size,
            config.remux.buffer_size
        );
    }

    if config.worker.queue_depth == 0 {
        anyhow::bail!("worker.queue_depth must be at least 1");
    }

    if config.output.prefix.contains(std::path::is_separator) {
        anyhow::bail!("output.prefix cannot contain a path separator");
    }

    if config.output.extension.is_empty() {
        tracing::warn!("output.extension is empty; trimmed files will have no extension");
    }

    Ok(())
}
