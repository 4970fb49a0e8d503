//! Initialize the configuration directory: create ~/.polyglot and a template config.

use anyhow::{Context, Result};
use std::path::Path;

use crate::config::{ChannelConfig, Config, DeepLConfig, DiscordConfig};

/// Config written by `polyglot init`: four channels with placeholder ids to fill in.
pub fn template_config() -> Config {
    let channels = [("RU", 1), ("EN-US", 2), ("DE", 3), ("PT-PT", 4)]
        .into_iter()
        .map(|(language, channel_id)| ChannelConfig {
            language: language.to_string(),
            channel_id,
        })
        .collect();
    Config {
        discord: DiscordConfig {
            token: Some(String::new()),
            ..DiscordConfig::default()
        },
        deepl: DeepLConfig {
            api_key: Some(String::new()),
            base_url: None,
        },
        log_file: Some("polyglot.log".into()),
        channels,
        ..Config::default()
    }
}

/// Create the config directory and write the template config if the file does not exist.
/// Returns true when a new file was written.
pub fn init_config(config_path: &Path) -> Result<bool> {
    let config_dir = config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if config_path.exists() {
        log::debug!("config already exists at {}, skipping", config_path.display());
        return Ok(false);
    }
    let body = serde_json::to_string_pretty(&template_config()).context("serializing template config")?;
    std::fs::write(config_path, body)
        .with_context(|| format!("writing template config to {}", config_path.display()))?;
    log::info!("created template config at {}", config_path.display());
    Ok(true)
}
