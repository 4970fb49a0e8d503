//! In-memory fakes for the chat platform and translation provider.

#![allow(dead_code)]

use async_trait::async_trait;
use lib::config::ChannelConfig;
use lib::discord::{ChannelInfo, MessageCreate, WebhookHandle};
use lib::error::{DeliveryError, TranslationError, WebhookError};
use lib::relay::{AttachmentRef, ChannelRoutingTable, ChatPlatform, WebhookMessage};
use lib::translate::Translator;
use std::collections::HashSet;
use std::sync::Mutex;

pub const RU: u64 = 101;
pub const EN: u64 = 102;
pub const DE: u64 = 103;
pub const PT: u64 = 104;

/// EN first so that its targets are RU, DE, PT in that order.
pub fn routes() -> ChannelRoutingTable {
    let channels: Vec<ChannelConfig> = [("EN-US", EN), ("RU", RU), ("DE", DE), ("PT-PT", PT)]
        .into_iter()
        .map(|(language, channel_id)| ChannelConfig {
            language: language.to_string(),
            channel_id,
        })
        .collect();
    ChannelRoutingTable::from_channels(&channels).expect("valid channels")
}

/// MESSAGE_CREATE event as the gateway would deliver it.
pub fn event(channel_id: u64, content: &str, bot: bool) -> MessageCreate {
    serde_json::from_value(serde_json::json!({
        "id": "9000",
        "channel_id": channel_id.to_string(),
        "guild_id": "1",
        "content": content,
        "author": {"id": "500", "username": "alice", "bot": bot},
    }))
    .expect("valid event")
}

#[derive(Default)]
pub struct FakeTranslator {
    pub calls: Mutex<Vec<(String, String)>>,
    pub failing: Mutex<HashSet<String>>,
}

impl FakeTranslator {
    pub fn fail_for(&self, lang: &str) {
        self.failing.lock().unwrap().insert(lang.to_string());
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate_text(&self, text: &str, target_lang: &str) -> Result<String, TranslationError> {
        self.calls
            .lock()
            .unwrap()
            .push((text.to_string(), target_lang.to_string()));
        if self.failing.lock().unwrap().contains(target_lang) {
            return Err(TranslationError::QuotaExceeded);
        }
        Ok(format!("[{}] {}", target_lang, text))
    }
}

#[derive(Default)]
pub struct FakePlatform {
    pub creates: Mutex<Vec<u64>>,
    pub sends: Mutex<Vec<(u64, u64, WebhookMessage)>>,
    pub forbidden: Mutex<HashSet<u64>>,
    /// Channels whose current webhook was deleted remotely; the next send fails once.
    pub deleted: Mutex<HashSet<u64>>,
    pub channels: Mutex<Vec<ChannelInfo>>,
    /// Urls of every attachment download, in order.
    pub fetches: Mutex<Vec<String>>,
    /// Attachment urls whose download fails.
    pub broken: Mutex<HashSet<String>>,
}

impl FakePlatform {
    pub fn creates(&self) -> Vec<u64> {
        self.creates.lock().unwrap().clone()
    }

    /// (channel id, content) of every delivered post, in order.
    pub fn delivered(&self) -> Vec<(u64, String)> {
        self.sends
            .lock()
            .unwrap()
            .iter()
            .map(|(channel, _, m)| (*channel, m.content.clone()))
            .collect()
    }

    pub fn sends(&self) -> Vec<(u64, u64, WebhookMessage)> {
        self.sends.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatPlatform for FakePlatform {
    async fn create_webhook(&self, channel_id: u64, _name: &str) -> Result<WebhookHandle, WebhookError> {
        if self.forbidden.lock().unwrap().contains(&channel_id) {
            return Err(WebhookError::Forbidden { channel_id });
        }
        let mut creates = self.creates.lock().unwrap();
        creates.push(channel_id);
        let id = creates.len() as u64;
        Ok(WebhookHandle {
            id,
            token: format!("token-{}", id),
            channel_id,
        })
    }

    async fn send_via_webhook(
        &self,
        handle: &WebhookHandle,
        message: &WebhookMessage,
    ) -> Result<(), DeliveryError> {
        if self.deleted.lock().unwrap().remove(&handle.channel_id) {
            return Err(DeliveryError::UnknownWebhook);
        }
        self.sends
            .lock()
            .unwrap()
            .push((handle.channel_id, handle.id, message.clone()));
        Ok(())
    }

    async fn fetch_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, DeliveryError> {
        self.fetches.lock().unwrap().push(attachment.url.clone());
        if self.broken.lock().unwrap().contains(&attachment.url) {
            return Err(DeliveryError::Attachment {
                filename: attachment.filename.clone(),
                reason: "status 404 Not Found".to_string(),
            });
        }
        Ok(format!("bytes of {}", attachment.filename).into_bytes())
    }

    async fn lookup_channel(&self, channel_id: u64) -> anyhow::Result<Option<ChannelInfo>> {
        Ok(self
            .channels
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.id == channel_id)
            .cloned())
    }
}
