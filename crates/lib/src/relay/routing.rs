//! Channel routing table: source channel -> ordered (language, channel) targets.
//!
//! Built once at startup as a full mesh over the configured channels, so every
//! relay channel fans out to every other one in configuration order.

use std::collections::HashMap;

use crate::config::ChannelConfig;
use crate::error::ConfigError;

/// One fan-out target: translate into `language` and post to `channel_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingEntry {
    pub language: String,
    pub channel_id: u64,
}

/// Immutable mapping from source channel id to its fan-out targets.
#[derive(Debug, Clone, Default)]
pub struct ChannelRoutingTable {
    routes: HashMap<u64, Vec<RoutingEntry>>,
    /// Channel ids in configuration order.
    order: Vec<u64>,
}

impl ChannelRoutingTable {
    /// Build the full mesh. Rejects fewer than two channels, duplicate ids, and blank languages.
    pub fn from_channels(channels: &[ChannelConfig]) -> Result<Self, ConfigError> {
        if channels.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "at least two relay channels are required, got {}",
                channels.len()
            )));
        }
        let mut order = Vec::with_capacity(channels.len());
        for c in channels {
            if c.language.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "channel {} has an empty language code",
                    c.channel_id
                )));
            }
            if order.contains(&c.channel_id) {
                return Err(ConfigError::Invalid(format!(
                    "channel {} is listed more than once",
                    c.channel_id
                )));
            }
            order.push(c.channel_id);
        }

        let routes = channels
            .iter()
            .map(|source| {
                let targets = channels
                    .iter()
                    .filter(|t| t.channel_id != source.channel_id)
                    .map(|t| RoutingEntry {
                        language: t.language.trim().to_string(),
                        channel_id: t.channel_id,
                    })
                    .collect();
                (source.channel_id, targets)
            })
            .collect();
        Ok(Self { routes, order })
    }

    /// Targets for a source channel; empty for channels that are not relayed.
    pub fn routes_for(&self, source_channel_id: u64) -> &[RoutingEntry] {
        self.routes
            .get(&source_channel_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_relay_channel(&self, channel_id: u64) -> bool {
        self.routes.contains_key(&channel_id)
    }

    /// Relay channel ids in configuration order.
    pub fn channel_ids(&self) -> &[u64] {
        &self.order
    }
}
