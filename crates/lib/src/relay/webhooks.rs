//! Webhook cache: one delivery identity per destination channel.
//!
//! Resolves are serialized through a single async lock, so concurrent first
//! resolves for the same channel create exactly one webhook. Failed creations
//! are not cached; the next resolve tries again.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use super::ChatPlatform;
use crate::discord::WebhookHandle;
use crate::error::WebhookError;

pub const DEFAULT_WEBHOOK_NAME: &str = "TR";

pub struct WebhookCache {
    platform: Arc<dyn ChatPlatform>,
    name: String,
    timeout: Duration,
    inner: Mutex<HashMap<u64, WebhookHandle>>,
}

impl WebhookCache {
    pub fn new(platform: Arc<dyn ChatPlatform>, name: impl Into<String>, timeout: Duration) -> Self {
        Self {
            platform,
            name: name.into(),
            timeout,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached webhook for `channel_id`, creating it on a miss.
    pub async fn resolve(&self, channel_id: u64) -> Result<WebhookHandle, WebhookError> {
        let mut cache = self.inner.lock().await;
        if let Some(handle) = cache.get(&channel_id) {
            log::debug!("webhook cache hit for channel {}", channel_id);
            return Ok(handle.clone());
        }
        log::info!("creating webhook {:?} in channel {}", self.name, channel_id);
        let handle = tokio::time::timeout(
            self.timeout,
            self.platform.create_webhook(channel_id, &self.name),
        )
        .await
        .map_err(|_| WebhookError::Timeout)??;
        cache.insert(channel_id, handle.clone());
        Ok(handle)
    }

    /// Forget the webhook for `channel_id` (e.g. it was deleted remotely).
    pub async fn invalidate(&self, channel_id: u64) -> Option<WebhookHandle> {
        self.inner.lock().await.remove(&channel_id)
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
