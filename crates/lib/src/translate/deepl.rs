//! DeepL API client (https://api.deepl.com or https://api-free.deepl.com).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Translator;
use crate::error::TranslationError;

pub const DEEPL_PRO_BASE_URL: &str = "https://api.deepl.com";
pub const DEEPL_FREE_BASE_URL: &str = "https://api-free.deepl.com";

/// Client for the DeepL v2 translate endpoint.
#[derive(Clone)]
pub struct DeepLClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: [&'a str; 1],
    target_lang: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
struct Translation {
    #[serde(default)]
    detected_source_language: Option<String>,
    text: String,
}

impl DeepLClient {
    /// Free-tier keys end in `:fx` and must use the free endpoint unless `base_url` overrides it.
    pub fn new(api_key: impl Into<String>, base_url: Option<String>, timeout: Duration) -> Self {
        let api_key = api_key.into();
        let base_url = base_url
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| default_base_url(&api_key).to_string());
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            base_url,
            api_key,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

pub(crate) fn default_base_url(api_key: &str) -> &'static str {
    if api_key.trim_end().ends_with(":fx") {
        DEEPL_FREE_BASE_URL
    } else {
        DEEPL_PRO_BASE_URL
    }
}

#[async_trait]
impl Translator for DeepLClient {
    /// POST /v2/translate with a single text.
    async fn translate_text(&self, text: &str, target_lang: &str) -> Result<String, TranslationError> {
        let url = format!("{}/v2/translate", self.base_url);
        let body = TranslateRequest {
            text: [text],
            target_lang,
        };
        let res = self
            .client
            .post(&url)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("DeepL-Auth-Key {}", self.api_key),
            )
            .json(&body)
            .send()
            .await?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                400 => TranslationError::Rejected(body),
                401 | 403 => TranslationError::Auth,
                429 => TranslationError::RateLimited,
                456 => TranslationError::QuotaExceeded,
                code => TranslationError::Api { status: code, body },
            });
        }
        let data: TranslateResponse = res.json().await?;
        let first = data
            .translations
            .into_iter()
            .next()
            .ok_or(TranslationError::EmptyResponse)?;
        if let Some(lang) = first.detected_source_language.as_deref() {
            log::debug!("deepl detected source language {}", lang);
        }
        Ok(first.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_keys_use_free_endpoint() {
        assert_eq!(default_base_url("abc:fx"), DEEPL_FREE_BASE_URL);
        assert_eq!(default_base_url("abc"), DEEPL_PRO_BASE_URL);
    }

    #[test]
    fn base_url_override_is_trimmed() {
        let c = DeepLClient::new("k:fx", Some("http://127.0.0.1:9/".to_string()), Duration::from_secs(1));
        assert_eq!(c.base_url(), "http://127.0.0.1:9");
        let c = DeepLClient::new("k", Some(String::new()), Duration::from_secs(1));
        assert_eq!(c.base_url(), DEEPL_PRO_BASE_URL);
    }
}
