//! Discord client: REST API (webhooks, channels) and Gateway (events).

mod api;
mod gateway;
mod model;

pub use api::{DiscordApi, DISCORD_API_BASE};
pub use gateway::{EventHandler, GatewayClient, GATEWAY_URL};
pub use model::{
    snowflake, Attachment, ChannelInfo, Member, MessageCreate, ReadyEvent, ReferencedMessage,
    UnavailableGuild, User, WebhookHandle,
};
