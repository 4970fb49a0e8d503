//! Translation gateway: input normalization, per-call timeout, provider errors.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::error::TranslationError;
use crate::relay::RelayMessage;

/// Stand-in text for messages that carry only attachments.
pub const DEFAULT_ATTACHMENT_PLACEHOLDER: &str = "file attached";

/// A translation provider.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` into `target_lang` (provider language code, e.g. "EN-US").
    async fn translate_text(&self, text: &str, target_lang: &str) -> Result<String, TranslationError>;
}

/// Text to translate for a message: the content, or the placeholder when the
/// content is blank, with the replied-to author's mention in front.
pub fn normalize_input(message: &RelayMessage, placeholder: &str) -> String {
    let content = if message.content.trim().is_empty() {
        placeholder
    } else {
        message.content.as_str()
    };
    match &message.reply {
        Some(reply) => format!("{} {}", reply.author_mention, content),
        None => content.to_string(),
    }
}

#[derive(Clone)]
pub struct TranslationGateway {
    provider: Arc<dyn Translator>,
    placeholder: String,
    timeout: Duration,
}

impl TranslationGateway {
    pub fn new(provider: Arc<dyn Translator>, placeholder: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider,
            placeholder: placeholder.into(),
            timeout,
        }
    }

    /// Normalized input for `message`; computed once and shared by all legs.
    pub fn prepare(&self, message: &RelayMessage) -> String {
        normalize_input(message, &self.placeholder)
    }

    /// Translate already-normalized text.
    pub async fn translate(&self, text: &str, target_lang: &str) -> Result<String, TranslationError> {
        let translated = tokio::time::timeout(self.timeout, self.provider.translate_text(text, target_lang))
            .await
            .map_err(|_| TranslationError::Timeout)??;
        log::debug!("translated into {} ({} chars)", target_lang, translated.chars().count());
        Ok(translated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relay::{Author, AttachmentRef, ReplyRef};

    fn message(content: &str, reply: Option<&str>, attachments: usize) -> RelayMessage {
        RelayMessage {
            id: 1,
            source_channel_id: 2,
            guild_id: None,
            author: Author {
                id: 3,
                display_name: "Bob".to_string(),
                avatar_url: String::new(),
                is_bot: false,
            },
            content: content.to_string(),
            attachments: (0..attachments)
                .map(|i| AttachmentRef {
                    filename: format!("f{}.png", i),
                    url: format!("https://cdn.example/f{}.png", i),
                    content_type: None,
                    size: 1,
                })
                .collect(),
            reply: reply.map(|m| ReplyRef {
                author_mention: m.to_string(),
            }),
        }
    }

    #[test]
    fn blank_content_becomes_placeholder() {
        let m = message("   \n", None, 1);
        assert_eq!(normalize_input(&m, DEFAULT_ATTACHMENT_PLACEHOLDER), "file attached");
    }

    #[test]
    fn reply_mention_is_prepended() {
        let m = message("hi", Some("@Alice"), 0);
        assert_eq!(normalize_input(&m, DEFAULT_ATTACHMENT_PLACEHOLDER), "@Alice hi");
    }

    #[test]
    fn reply_with_blank_content_uses_placeholder_after_mention() {
        let m = message("", Some("<@5>"), 1);
        assert_eq!(normalize_input(&m, "file"), "<@5> file");
    }

    #[test]
    fn plain_content_passes_through() {
        let m = message("  hello  ", None, 0);
        assert_eq!(normalize_input(&m, DEFAULT_ATTACHMENT_PLACEHOLDER), "  hello  ");
    }

    struct Slow;

    #[async_trait]
    impl Translator for Slow {
        async fn translate_text(&self, text: &str, _target_lang: &str) -> Result<String, TranslationError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(text.to_string())
        }
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let gw = TranslationGateway::new(Arc::new(Slow), DEFAULT_ATTACHMENT_PLACEHOLDER, Duration::from_millis(10));
        assert!(matches!(gw.translate("x", "DE").await, Err(TranslationError::Timeout)));
    }
}
