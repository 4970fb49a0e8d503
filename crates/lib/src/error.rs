//! Error taxonomy for the relay.
//!
//! `ConfigError` and `ConnectionError` are fatal and surface to the CLI.
//! `WebhookError`, `TranslationError`, and `DeliveryError` belong to a single
//! fan-out leg; the dispatch loop logs them and moves on.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("reading config from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("missing required config key: {0}")]
    Missing(&'static str),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("missing permission to create webhook in channel {channel_id}")]
    Forbidden { channel_id: u64 },
    #[error("webhook creation failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook api error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("webhook creation timed out")]
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("translation request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("translation provider rejected the credentials")]
    Auth,
    #[error("translation quota exceeded")]
    QuotaExceeded,
    #[error("translation provider is rate limiting requests")]
    RateLimited,
    #[error("translation rejected: {0}")]
    Rejected(String),
    #[error("translation api error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("translation provider returned no text")]
    EmptyResponse,
    #[error("translation timed out")]
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook no longer exists")]
    UnknownWebhook,
    #[error("downloading attachment {filename}: {reason}")]
    Attachment { filename: String, reason: String },
    #[error("delivery api error: {status} {body}")]
    Api { status: u16, body: String },
    #[error("delivery timed out")]
    Timeout,
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("gateway websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
    #[error("gateway protocol error: {0}")]
    Protocol(String),
    #[error("gateway rejected authentication: {0}")]
    Auth(String),
    #[error("gateway disconnected after {attempts} reconnect attempt(s)")]
    Exhausted { attempts: u32 },
}

/// Why a single fan-out leg was abandoned.
#[derive(Debug, thiserror::Error)]
pub enum LegError {
    #[error(transparent)]
    Webhook(#[from] WebhookError),
    #[error(transparent)]
    Translation(#[from] TranslationError),
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
}
