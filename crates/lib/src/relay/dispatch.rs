//! Dispatch loop: the single consumer of the relay queue.
//!
//! Each message fans out to its routing targets one leg at a time:
//! resolve webhook, translate, deliver. A failing leg is logged and dropped;
//! the other legs and later messages are unaffected.

use std::sync::Arc;
use std::time::Duration;

use super::{
    AttachmentFile, ChannelRoutingTable, ChatPlatform, RelayMessage, RelayQueue, RoutingEntry, WebhookCache,
    WebhookMessage,
};
use crate::discord::WebhookHandle;
use crate::error::{DeliveryError, LegError};
use crate::translate::TranslationGateway;

/// Discord rejects message content longer than this many characters.
pub const MESSAGE_CONTENT_LIMIT: usize = 2000;
/// Discord rejects webhook usernames longer than this many characters.
pub const WEBHOOK_USERNAME_LIMIT: usize = 80;
/// Substrings Discord refuses in webhook usernames (case-insensitive).
const RESERVED_USERNAME_WORDS: [&str; 2] = ["discord", "clyde"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Draining,
}

/// Result of one fan-out leg.
#[derive(Debug)]
pub struct LegOutcome {
    pub language: String,
    pub channel_id: u64,
    pub result: Result<(), LegError>,
}

impl LegOutcome {
    pub fn is_delivered(&self) -> bool {
        self.result.is_ok()
    }
}

pub struct Dispatcher {
    queue: Arc<RelayQueue>,
    routes: Arc<ChannelRoutingTable>,
    webhooks: Arc<WebhookCache>,
    translator: TranslationGateway,
    platform: Arc<dyn ChatPlatform>,
    timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        queue: Arc<RelayQueue>,
        routes: Arc<ChannelRoutingTable>,
        webhooks: Arc<WebhookCache>,
        translator: TranslationGateway,
        platform: Arc<dyn ChatPlatform>,
        timeout: Duration,
    ) -> Self {
        Self {
            queue,
            routes,
            webhooks,
            translator,
            platform,
            timeout,
        }
    }

    /// Drain the queue forever, parking while it is empty.
    pub async fn run(&self) {
        log::info!("dispatch loop started");
        let mut state = DispatchState::Idle;
        loop {
            match self.queue.try_dequeue() {
                Some(message) => {
                    if state == DispatchState::Idle {
                        state = DispatchState::Draining;
                        log::debug!("dispatch: draining ({} queued)", self.queue.len() + 1);
                    }
                    self.process_message(message).await;
                }
                None => {
                    if state == DispatchState::Draining {
                        state = DispatchState::Idle;
                        log::debug!("dispatch: idle");
                    }
                    self.queue.wait().await;
                }
            }
        }
    }

    /// Run every leg for one message, in routing order.
    pub async fn process_message(&self, message: RelayMessage) -> Vec<LegOutcome> {
        let routes = self.routes.routes_for(message.source_channel_id);
        if routes.is_empty() {
            log::warn!(
                "no routes for channel {}, dropping message {}",
                message.source_channel_id,
                message.id
            );
            return Vec::new();
        }
        log::info!(
            "relaying message {} from channel {} to {} channel(s)",
            message.id,
            message.source_channel_id,
            routes.len()
        );
        let files = match self.fetch_attachments(&message).await {
            Ok(files) => files,
            Err(e) => {
                log::error!("message {} not relayed: {}", message.id, e);
                let (filename, reason) = match e {
                    DeliveryError::Attachment { filename, reason } => (filename, reason),
                    other => (String::new(), other.to_string()),
                };
                return routes
                    .iter()
                    .map(|entry| LegOutcome {
                        language: entry.language.clone(),
                        channel_id: entry.channel_id,
                        result: Err(DeliveryError::Attachment {
                            filename: filename.clone(),
                            reason: reason.clone(),
                        }
                        .into()),
                    })
                    .collect();
            }
        };
        let text = self.translator.prepare(&message);
        let mut outcomes = Vec::with_capacity(routes.len());
        for entry in routes {
            let result = self.relay_leg(&message, &text, &files, entry).await;
            match &result {
                Ok(()) => log::info!(
                    "message {} delivered to channel {} ({})",
                    message.id,
                    entry.channel_id,
                    entry.language
                ),
                Err(e) => log::error!(
                    "message {} not relayed to channel {} ({}): {}",
                    message.id,
                    entry.channel_id,
                    entry.language,
                    e
                ),
            }
            outcomes.push(LegOutcome {
                language: entry.language.clone(),
                channel_id: entry.channel_id,
                result,
            });
        }
        outcomes
    }

    async fn relay_leg(
        &self,
        message: &RelayMessage,
        text: &str,
        files: &[AttachmentFile],
        entry: &RoutingEntry,
    ) -> Result<(), LegError> {
        let handle = self.webhooks.resolve(entry.channel_id).await?;
        let translated = self.translator.translate(text, &entry.language).await?;
        let post = WebhookMessage {
            content: clamp_chars(&translated, MESSAGE_CONTENT_LIMIT),
            username: webhook_username(&message.author.display_name),
            avatar_url: message.author.avatar_url.clone(),
            attachments: files.to_vec(),
        };
        match self.deliver(&handle, &post).await {
            Err(DeliveryError::UnknownWebhook) => {
                log::warn!(
                    "webhook {} for channel {} is gone, recreating",
                    handle.id,
                    entry.channel_id
                );
                self.webhooks.invalidate(entry.channel_id).await;
                let handle = self.webhooks.resolve(entry.channel_id).await?;
                self.deliver(&handle, &post).await?;
            }
            other => other?,
        }
        Ok(())
    }

    /// Download every attachment once; all legs share the bytes.
    async fn fetch_attachments(&self, message: &RelayMessage) -> Result<Vec<AttachmentFile>, DeliveryError> {
        let mut files = Vec::with_capacity(message.attachments.len());
        for attachment in &message.attachments {
            let data = tokio::time::timeout(self.timeout, self.platform.fetch_attachment(attachment))
                .await
                .map_err(|_| DeliveryError::Attachment {
                    filename: attachment.filename.clone(),
                    reason: "download timed out".to_string(),
                })??;
            files.push(AttachmentFile {
                filename: attachment.filename.clone(),
                content_type: attachment.content_type.clone(),
                data: data.into(),
            });
        }
        Ok(files)
    }

    async fn deliver(&self, handle: &WebhookHandle, post: &WebhookMessage) -> Result<(), DeliveryError> {
        tokio::time::timeout(self.timeout, self.platform.send_via_webhook(handle, post))
            .await
            .map_err(|_| DeliveryError::Timeout)?
    }
}

/// Display name usable as a webhook username: reserved words are broken with
/// a zero-width space, blank names get a stand-in, and the result is clamped.
fn webhook_username(name: &str) -> String {
    let name = name.trim();
    let mut out = if name.is_empty() { "unknown".to_string() } else { name.to_string() };
    for word in RESERVED_USERNAME_WORDS {
        out = break_word(&out, word);
    }
    clamp_chars(&out, WEBHOOK_USERNAME_LIMIT)
}

/// Insert U+200B after the first letter of every case-insensitive `word` in `s`.
/// `word` must be lowercase ASCII.
fn break_word(s: &str, word: &str) -> String {
    // ASCII lowercasing keeps byte offsets, so match positions index `s` too.
    let lower = s.to_ascii_lowercase();
    let mut out = String::with_capacity(s.len() + 3);
    let mut last = 0;
    for (idx, _) in lower.match_indices(word) {
        out.push_str(&s[last..idx + 1]);
        out.push('\u{200B}');
        last = idx + 1;
    }
    out.push_str(&s[last..]);
    out
}

/// First `max` characters of `s`.
fn clamp_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_chars_respects_char_boundaries() {
        assert_eq!(clamp_chars("héllo", 2), "hé");
        assert_eq!(clamp_chars("abc", 10), "abc");
        assert_eq!(clamp_chars(&"ж".repeat(2100), MESSAGE_CONTENT_LIMIT).chars().count(), 2000);
    }

    #[test]
    fn webhook_username_breaks_reserved_words() {
        assert_eq!(webhook_username("Discord Fan"), "D\u{200B}iscord Fan");
        assert_eq!(webhook_username("xCLYDEx"), "xC\u{200B}LYDEx");
        assert_eq!(webhook_username("Ölga discord"), "Ölga d\u{200B}iscord");
        assert_eq!(webhook_username("alice"), "alice");
        assert_eq!(webhook_username("   "), "unknown");
        assert_eq!(webhook_username(&"n".repeat(100)).chars().count(), WEBHOOK_USERNAME_LIMIT);
    }
}
