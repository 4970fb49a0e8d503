//! Discord REST API client: webhooks, channel lookup, attachment download.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::StatusCode;
use std::time::Duration;

use super::model::{
    AllowedMentions, ApiErrorBody, ChannelInfo, ExecuteWebhookPayload, PartialAttachment,
    WebhookHandle, WebhookResponse,
};
use crate::error::{DeliveryError, WebhookError};
use crate::relay::{AttachmentRef, ChatPlatform, WebhookMessage};

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Discord error code for a deleted or unknown webhook.
const UNKNOWN_WEBHOOK_CODE: u64 = 10015;

/// Bot-authenticated client for the subset of the REST API the relay uses.
#[derive(Clone)]
pub struct DiscordApi {
    base_url: String,
    token: String,
    client: reqwest::Client,
}

impl DiscordApi {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Self {
        Self::with_base_url(token, DISCORD_API_BASE, timeout)
    }

    /// Client against a custom API base (tests, proxies).
    pub fn with_base_url(token: impl Into<String>, base_url: &str, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        }
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    /// POST /channels/{id}/webhooks
    pub async fn create_webhook(&self, channel_id: u64, name: &str) -> Result<WebhookHandle, WebhookError> {
        let url = format!("{}/channels/{}/webhooks", self.base_url, channel_id);
        let res = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await?;
        let status = res.status();
        if status == StatusCode::FORBIDDEN {
            return Err(WebhookError::Forbidden { channel_id });
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(WebhookError::Api {
                status: status.as_u16(),
                body,
            });
        }
        let data: WebhookResponse = res.json().await?;
        let token = data.token.ok_or_else(|| WebhookError::Api {
            status: status.as_u16(),
            body: "webhook response has no token".to_string(),
        })?;
        Ok(WebhookHandle {
            id: data.id,
            token,
            channel_id: data.channel_id,
        })
    }

    /// POST /webhooks/{id}/{token}; attachments are uploaded as multipart files.
    pub async fn execute_webhook(
        &self,
        handle: &WebhookHandle,
        message: &WebhookMessage,
    ) -> Result<(), DeliveryError> {
        let url = format!("{}/webhooks/{}/{}?wait=true", self.base_url, handle.id, handle.token);
        let payload = ExecuteWebhookPayload {
            content: &message.content,
            username: &message.username,
            avatar_url: &message.avatar_url,
            allowed_mentions: AllowedMentions {
                parse: vec!["users"],
            },
            attachments: message
                .attachments
                .iter()
                .enumerate()
                .map(|(id, a)| PartialAttachment {
                    id,
                    filename: &a.filename,
                })
                .collect(),
        };
        let req = self.client.post(&url);
        let req = if message.attachments.is_empty() {
            req.json(&payload)
        } else {
            let payload_json = serde_json::to_string(&payload).map_err(|e| DeliveryError::Api {
                status: 0,
                body: e.to_string(),
            })?;
            let mut form = Form::new().part(
                "payload_json",
                Part::text(payload_json).mime_str("application/json")?,
            );
            for (i, attachment) in message.attachments.iter().enumerate() {
                let mut part = Part::bytes(attachment.data.to_vec()).file_name(attachment.filename.clone());
                if let Some(ct) = attachment.content_type.as_deref() {
                    part = part.mime_str(ct)?;
                }
                form = form.part(format!("files[{}]", i), part);
            }
            req.multipart(form)
        };
        let res = req.send().await?;
        let status = res.status();
        if status.is_success() {
            return Ok(());
        }
        let body = res.text().await.unwrap_or_default();
        if is_unknown_webhook(status, &body) {
            return Err(DeliveryError::UnknownWebhook);
        }
        Err(DeliveryError::Api {
            status: status.as_u16(),
            body,
        })
    }

    /// GET /channels/{id}; 403/404 mean the bot cannot see the channel.
    pub async fn get_channel(&self, channel_id: u64) -> anyhow::Result<Option<ChannelInfo>> {
        let url = format!("{}/channels/{}", self.base_url, channel_id);
        let res = self
            .client
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth())
            .send()
            .await?;
        let status = res.status();
        if status == StatusCode::NOT_FOUND || status == StatusCode::FORBIDDEN {
            return Ok(None);
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("get channel failed: {} {}", status, body);
        }
        Ok(Some(res.json().await?))
    }

    /// GET an attachment from the CDN. Every failure is `DeliveryError::Attachment`.
    pub async fn download_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, DeliveryError> {
        let fail = |reason: String| DeliveryError::Attachment {
            filename: attachment.filename.clone(),
            reason,
        };
        let res = self
            .client
            .get(&attachment.url)
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !res.status().is_success() {
            return Err(fail(format!("status {}", res.status())));
        }
        let bytes = res.bytes().await.map_err(|e| fail(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

fn is_unknown_webhook(status: StatusCode, body: &str) -> bool {
    if status != StatusCode::NOT_FOUND {
        return false;
    }
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(err) => err.code == UNKNOWN_WEBHOOK_CODE || err.code == 0,
        Err(_) => true,
    }
}

#[async_trait]
impl ChatPlatform for DiscordApi {
    async fn create_webhook(&self, channel_id: u64, name: &str) -> Result<WebhookHandle, WebhookError> {
        DiscordApi::create_webhook(self, channel_id, name).await
    }

    async fn send_via_webhook(
        &self,
        handle: &WebhookHandle,
        message: &WebhookMessage,
    ) -> Result<(), DeliveryError> {
        self.execute_webhook(handle, message).await
    }

    async fn fetch_attachment(&self, attachment: &AttachmentRef) -> Result<Vec<u8>, DeliveryError> {
        self.download_attachment(attachment).await
    }

    async fn lookup_channel(&self, channel_id: u64) -> anyhow::Result<Option<ChannelInfo>> {
        self.get_channel(channel_id).await
    }
}
