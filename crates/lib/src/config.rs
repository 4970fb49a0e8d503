//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.polyglot/config.json`) and environment.
//! Startup fails fast on a missing file, malformed JSON, a non-integer channel id,
//! or missing credentials.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::discord::snowflake;
use crate::error::ConfigError;
use crate::relay::{ChannelRoutingTable, DEFAULT_WEBHOOK_NAME};
use crate::translate::DEFAULT_ATTACHMENT_PLACEHOLDER;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Discord bot settings.
    #[serde(default)]
    pub discord: DiscordConfig,

    /// DeepL settings.
    #[serde(default)]
    pub deepl: DeepLConfig,

    /// Log file; relative paths are resolved against the config file's directory.
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Relay tuning.
    #[serde(default)]
    pub relay: RelaySettings,

    /// Relay channels and their languages, in fan-out order.
    #[serde(default)]
    pub channels: Vec<ChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordConfig {
    /// Bot token. Overridden by DISCORD_TOKEN env when set.
    pub token: Option<String>,
    /// Name given to webhooks the relay creates (default "TR").
    #[serde(default = "default_webhook_name")]
    pub webhook_name: String,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            webhook_name: default_webhook_name(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepLConfig {
    /// API key. Overridden by DEEPL_API_KEY env when set.
    pub api_key: Option<String>,
    /// API base URL. When absent, chosen from the key (":fx" keys use the free endpoint).
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaySettings {
    /// Text translated in place of an empty message (attachments only).
    #[serde(default = "default_placeholder")]
    pub attachment_placeholder: String,
    /// Timeout for each external call (webhook creation, translation, delivery).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Consecutive gateway reconnects before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            attachment_placeholder: default_placeholder(),
            request_timeout_secs: default_request_timeout_secs(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

/// One relay channel: messages posted here are in `language`; relayed posts are translated into it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelConfig {
    /// DeepL target language code (e.g. "RU", "EN-US", "DE", "PT-PT").
    pub language: String,
    /// Channel id, as an integer or an integer string.
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub channel_id: u64,
}

fn default_webhook_name() -> String {
    DEFAULT_WEBHOOK_NAME.to_string()
}

fn default_placeholder() -> String {
    DEFAULT_ATTACHMENT_PLACEHOLDER.to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("POLYGLOT_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".polyglot").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from `path` (or the default path). A missing file is an error.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf), ConfigError> {
    let path = path.unwrap_or_else(default_config_path);
    if !path.exists() {
        return Err(ConfigError::NotFound(path));
    }
    let s = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    let config = serde_json::from_str(&s).map_err(|source| ConfigError::Parse {
        path: path.clone(),
        source,
    })?;
    log::debug!("loaded config from {}", path.display());
    Ok((config, path))
}

/// Env value if set and non-blank, else the trimmed config value if non-blank.
fn resolve_secret(
    env: &dyn Fn(&str) -> Option<String>,
    var: &str,
    configured: Option<&String>,
) -> Option<String> {
    env(var)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| {
            configured
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
}

/// Validated runtime settings derived from [`Config`].
#[derive(Clone)]
pub struct Settings {
    pub discord_token: String,
    pub deepl_api_key: String,
    pub deepl_base_url: Option<String>,
    pub webhook_name: String,
    pub attachment_placeholder: String,
    pub request_timeout: Duration,
    pub max_reconnect_attempts: u32,
    pub log_file: Option<PathBuf>,
    pub routes: ChannelRoutingTable,
}

impl Settings {
    /// Validate `config`, applying DISCORD_TOKEN / DEEPL_API_KEY from the environment.
    pub fn resolve(config: &Config, config_path: &Path) -> Result<Self, ConfigError> {
        Self::resolve_with_env(config, config_path, &|k: &str| std::env::var(k).ok())
    }

    pub fn resolve_with_env(
        config: &Config,
        config_path: &Path,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let discord_token = resolve_secret(env, "DISCORD_TOKEN", config.discord.token.as_ref())
            .ok_or(ConfigError::Missing("discord.token"))?;
        let deepl_api_key = resolve_secret(env, "DEEPL_API_KEY", config.deepl.api_key.as_ref())
            .ok_or(ConfigError::Missing("deepl.apiKey"))?;
        if config.relay.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "relay.requestTimeoutSecs must be greater than zero".to_string(),
            ));
        }
        let webhook_name = config.discord.webhook_name.trim();
        if webhook_name.is_empty() {
            return Err(ConfigError::Invalid("discord.webhookName is empty".to_string()));
        }
        let routes = ChannelRoutingTable::from_channels(&config.channels)?;
        Ok(Self {
            discord_token,
            deepl_api_key,
            deepl_base_url: config.deepl.base_url.clone(),
            webhook_name: webhook_name.to_string(),
            attachment_placeholder: config.relay.attachment_placeholder.clone(),
            request_timeout: Duration::from_secs(config.relay.request_timeout_secs),
            max_reconnect_attempts: config.relay.max_reconnect_attempts,
            log_file: config
                .log_file
                .as_deref()
                .map(|p| resolve_relative(p, config_path)),
            routes,
        })
    }
}

// Credentials never reach log output.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("discord_token", &"<redacted>")
            .field("deepl_api_key", &"<redacted>")
            .field("deepl_base_url", &self.deepl_base_url)
            .field("webhook_name", &self.webhook_name)
            .field("attachment_placeholder", &self.attachment_placeholder)
            .field("request_timeout", &self.request_timeout)
            .field("max_reconnect_attempts", &self.max_reconnect_attempts)
            .field("log_file", &self.log_file)
            .field("routes", &self.routes)
            .finish()
    }
}

/// Resolve `path` against the config file's parent when relative.
pub fn resolve_relative(path: &Path, config_path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
        .join(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "discord": { "token": "bot-token" },
        "deepl": { "apiKey": "key:fx" },
        "logFile": "polyglot.log",
        "channels": [
            { "language": "RU", "channelId": 111 },
            { "language": "EN-US", "channelId": "222" },
            { "language": "DE", "channelId": 333 },
            { "language": "PT-PT", "channelId": "444" }
        ]
    }"#;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn parses_numeric_and_string_channel_ids() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        let ids: Vec<u64> = config.channels.iter().map(|c| c.channel_id).collect();
        assert_eq!(ids, vec![111, 222, 333, 444]);
        assert_eq!(config.discord.webhook_name, "TR");
        assert_eq!(config.relay.attachment_placeholder, "file attached");
        assert_eq!(config.relay.request_timeout_secs, 15);
    }

    #[test]
    fn rejects_non_integer_channel_id() {
        let bad = SAMPLE.replace("\"222\"", "\"general\"");
        assert!(serde_json::from_str::<Config>(&bad).is_err());
    }

    #[test]
    fn settings_resolve_log_file_against_config_dir() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        let s = Settings::resolve_with_env(&config, Path::new("/etc/polyglot/config.json"), &no_env).unwrap();
        assert_eq!(s.log_file, Some(PathBuf::from("/etc/polyglot/polyglot.log")));
        assert_eq!(s.discord_token, "bot-token");
        assert_eq!(s.routes.routes_for(111).len(), 3);
        assert_eq!(s.request_timeout, Duration::from_secs(15));
    }

    #[test]
    fn env_overrides_config_secrets() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        let env = |k: &str| match k {
            "DISCORD_TOKEN" => Some("from-env".to_string()),
            "DEEPL_API_KEY" => Some("   ".to_string()),
            _ => None,
        };
        let s = Settings::resolve_with_env(&config, Path::new("config.json"), &env).unwrap();
        assert_eq!(s.discord_token, "from-env");
        assert_eq!(s.deepl_api_key, "key:fx");
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let config: Config = serde_json::from_str(SAMPLE).unwrap();
        let s = Settings::resolve_with_env(&config, Path::new("config.json"), &no_env).unwrap();
        let printed = format!("{:?}", s);
        assert!(!printed.contains("bot-token"));
        assert!(!printed.contains("key:fx"));
        assert!(printed.contains("<redacted>"));
        assert!(printed.contains("webhook_name: \"TR\""));
    }

    #[test]
    fn missing_token_is_fatal() {
        let mut config: Config = serde_json::from_str(SAMPLE).unwrap();
        config.discord.token = None;
        let err = Settings::resolve_with_env(&config, Path::new("config.json"), &no_env).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("discord.token")));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut config: Config = serde_json::from_str(SAMPLE).unwrap();
        config.relay.request_timeout_secs = 0;
        assert!(Settings::resolve_with_env(&config, Path::new("config.json"), &no_env).is_err());
    }

    #[test]
    fn missing_file_is_not_found() {
        let path = std::env::temp_dir().join("polyglot-no-such-dir").join("config.json");
        assert!(matches!(load_config(Some(path)), Err(ConfigError::NotFound(_))));
    }
}
