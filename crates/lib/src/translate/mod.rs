//! Translation: provider trait, the relay-facing gateway, and the DeepL client.

mod deepl;
mod gateway;

pub use deepl::{DeepLClient, DEEPL_FREE_BASE_URL, DEEPL_PRO_BASE_URL};
pub use gateway::{normalize_input, TranslationGateway, Translator, DEFAULT_ATTACHMENT_PLACEHOLDER};
