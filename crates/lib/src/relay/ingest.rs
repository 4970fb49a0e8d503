//! Ingestion handler: filters gateway events and enqueues relay candidates.
//!
//! The message path only filters, snapshots, and enqueues. Translation and
//! delivery happen in the dispatch loop so gateway intake never stalls.

use async_trait::async_trait;
use std::sync::Arc;

use super::{ChannelRoutingTable, ChatPlatform, RelayMessage, RelayQueue};
use crate::discord::{EventHandler, MessageCreate, ReadyEvent};

pub struct IngestionHandler {
    queue: Arc<RelayQueue>,
    routes: Arc<ChannelRoutingTable>,
    platform: Arc<dyn ChatPlatform>,
}

impl IngestionHandler {
    pub fn new(
        queue: Arc<RelayQueue>,
        routes: Arc<ChannelRoutingTable>,
        platform: Arc<dyn ChatPlatform>,
    ) -> Self {
        Self {
            queue,
            routes,
            platform,
        }
    }

    /// Enqueue `event` unless it is bot-authored or outside the relay channels.
    /// Returns whether it was enqueued.
    pub fn ingest(&self, event: &MessageCreate) -> bool {
        if event.author.bot {
            log::debug!("ignoring bot message {} in channel {}", event.id, event.channel_id);
            return false;
        }
        if !self.routes.is_relay_channel(event.channel_id) {
            return false;
        }
        let message = RelayMessage::from_event(event);
        log::info!(
            "queued message {} from channel {}: {}",
            message.id,
            message.source_channel_id,
            message.preview()
        );
        self.queue.enqueue(message);
        true
    }
}

#[async_trait]
impl EventHandler for IngestionHandler {
    async fn on_ready(&self, ready: &ReadyEvent) {
        log::info!(
            "logged in as {} ({}) in {} guild(s)",
            ready.user.username,
            ready.user.id,
            ready.guilds.len()
        );
        for guild in &ready.guilds {
            log::info!("guild {}", guild.id);
        }
        let platform = self.platform.clone();
        let routes = self.routes.clone();
        let guild_ids: Vec<u64> = ready.guilds.iter().map(|g| g.id).collect();
        tokio::spawn(async move {
            verify_channels(platform.as_ref(), &routes, &guild_ids).await;
        });
    }

    fn on_message(&self, event: MessageCreate) {
        self.ingest(&event);
    }
}

/// Look up every relay channel and warn about the ones the bot cannot reach.
/// Returns the ids of unreachable channels.
pub async fn verify_channels(
    platform: &dyn ChatPlatform,
    routes: &ChannelRoutingTable,
    guild_ids: &[u64],
) -> Vec<u64> {
    let mut unreachable = Vec::new();
    for &channel_id in routes.channel_ids() {
        match platform.lookup_channel(channel_id).await {
            Ok(Some(info)) => match info.guild_id {
                Some(g) if guild_ids.is_empty() || guild_ids.contains(&g) => {
                    log::info!(
                        "relay channel {} (#{}) ready",
                        channel_id,
                        info.name.as_deref().unwrap_or("?")
                    );
                }
                other => {
                    log::warn!(
                        "relay channel {} belongs to guild {:?}, which the bot is not in",
                        channel_id,
                        other
                    );
                    unreachable.push(channel_id);
                }
            },
            Ok(None) => {
                log::error!("relay channel {} not found", channel_id);
                unreachable.push(channel_id);
            }
            Err(e) => {
                log::warn!("looking up relay channel {}: {:#}", channel_id, e);
                unreachable.push(channel_id);
            }
        }
    }
    unreachable
}
