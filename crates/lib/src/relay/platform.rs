//! Chat platform boundary used by the relay core.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

use super::AttachmentRef;
use crate::discord::{ChannelInfo, WebhookHandle};
use crate::error::{DeliveryError, WebhookError};

/// Attachment bytes fetched once per message and re-uploaded on every leg.
#[derive(Clone, PartialEq, Eq)]
pub struct AttachmentFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Arc<[u8]>,
}

impl fmt::Debug for AttachmentFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttachmentFile")
            .field("filename", &self.filename)
            .field("content_type", &self.content_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A relayed post: translated text shown under the original author's name and avatar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookMessage {
    pub content: String,
    pub username: String,
    pub avatar_url: String,
    pub attachments: Vec<AttachmentFile>,
}

/// Operations the relay needs from the chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Create a webhook bound to `channel_id`.
    async fn create_webhook(&self, channel_id: u64, name: &str)
        -> Result<WebhookHandle, WebhookError>;

    /// Post through a webhook.
    async fn send_via_webhook(
        &self,
        handle: &WebhookHandle,
        message: &WebhookMessage,
    ) -> Result<(), DeliveryError>;

    /// Download a source attachment.
    async fn fetch_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, DeliveryError>;

    /// Look up a channel; `None` when it does not exist or is not visible to the bot.
    async fn lookup_channel(&self, channel_id: u64) -> anyhow::Result<Option<ChannelInfo>>;
}
