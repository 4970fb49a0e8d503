//! Relay core: queue, routing table, webhook cache, ingestion, and dispatch.
//!
//! Gateway events enter through [`IngestionHandler`], wait in the
//! [`RelayQueue`], and are fanned out by the [`Dispatcher`] to every target in
//! the [`ChannelRoutingTable`].

mod dispatch;
mod ingest;
mod message;
mod platform;
mod queue;
mod routing;
mod webhooks;

pub use dispatch::{DispatchState, Dispatcher, LegOutcome, MESSAGE_CONTENT_LIMIT, WEBHOOK_USERNAME_LIMIT};
pub use ingest::{verify_channels, IngestionHandler};
pub use message::{AttachmentRef, Author, RelayMessage, ReplyRef};
pub use platform::{AttachmentFile, ChatPlatform, WebhookMessage};
pub use queue::RelayQueue;
pub use routing::{ChannelRoutingTable, RoutingEntry};
pub use webhooks::{WebhookCache, DEFAULT_WEBHOOK_NAME};
