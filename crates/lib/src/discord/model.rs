//! Discord payload types used by the relay (REST responses and gateway dispatch data).

use serde::{Deserialize, Serialize};

const CDN_BASE: &str = "https://cdn.discordapp.com";

/// Serde helpers for Discord snowflakes, which arrive as strings but are
/// accepted as integers too (config files often hold raw numbers).
pub mod snowflake {
    use serde::de::{self, Deserializer, Visitor};
    use std::fmt;

    struct SnowflakeVisitor;

    impl<'de> Visitor<'de> for SnowflakeVisitor {
        type Value = u64;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an integer id or a string holding an integer id")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<u64, E> {
            Ok(v)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<u64, E> {
            u64::try_from(v).map_err(|_| E::custom(format!("negative id: {}", v)))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<u64, E> {
            v.trim()
                .parse()
                .map_err(|_| E::custom(format!("non-integer id: {:?}", v)))
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        d.deserialize_any(SnowflakeVisitor)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer};

        #[derive(Deserialize)]
        struct Wrapped(#[serde(deserialize_with = "super::deserialize")] u64);

        pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
            Ok(Option::<Wrapped>::deserialize(d)?.map(|w| w.0))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub global_name: Option<String>,
    #[serde(default)]
    pub discriminator: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

impl User {
    /// Mention token that pings this user when posted.
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }

    /// Avatar on the CDN, or the default avatar Discord assigns when none is set.
    pub fn avatar_url(&self) -> String {
        if let Some(hash) = self.avatar.as_deref().filter(|h| !h.is_empty()) {
            let ext = if hash.starts_with("a_") { "gif" } else { "png" };
            return format!("{}/avatars/{}/{}.{}", CDN_BASE, self.id, hash, ext);
        }
        let index = match self.discriminator.as_deref().and_then(|d| d.parse::<u64>().ok()) {
            Some(d) if d != 0 => d % 5,
            _ => (self.id >> 22) % 6,
        };
        format!("{}/embed/avatars/{}.png", CDN_BASE, index)
    }
}

/// Guild member fields attached to MESSAGE_CREATE in guild channels.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub nick: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// The message a reply points at, as resolved by Discord.
#[derive(Debug, Clone, Deserialize)]
pub struct ReferencedMessage {
    pub author: User,
}

/// `MESSAGE_CREATE` dispatch data.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageCreate {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub channel_id: u64,
    #[serde(default, deserialize_with = "snowflake::option::deserialize")]
    pub guild_id: Option<u64>,
    #[serde(default)]
    pub content: String,
    pub author: User,
    #[serde(default)]
    pub member: Option<Member>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub referenced_message: Option<Box<ReferencedMessage>>,
}

impl MessageCreate {
    /// Name shown in the guild: nickname, then global display name, then username.
    pub fn display_name(&self) -> String {
        let non_blank = |n: &&String| !n.trim().is_empty();
        self.member
            .as_ref()
            .and_then(|m| m.nick.as_ref())
            .filter(non_blank)
            .or_else(|| self.author.global_name.as_ref().filter(non_blank))
            .unwrap_or(&self.author.username)
            .clone()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UnavailableGuild {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
}

/// `READY` dispatch data (subset).
#[derive(Debug, Clone, Deserialize)]
pub struct ReadyEvent {
    pub user: User,
    pub session_id: String,
    /// Endpoint to use when resuming this session.
    #[serde(default)]
    pub resume_gateway_url: Option<String>,
    #[serde(default)]
    pub guilds: Vec<UnavailableGuild>,
}

/// Channel lookup result.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "snowflake::option::deserialize")]
    pub guild_id: Option<u64>,
}

/// Delivery identity bound to one channel. The token makes it executable
/// without the bot token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookHandle {
    pub id: u64,
    pub token: String,
    pub channel_id: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WebhookResponse {
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub id: u64,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(deserialize_with = "snowflake::deserialize")]
    pub channel_id: u64,
}

/// JSON part of an execute-webhook request.
#[derive(Debug, Serialize)]
pub(crate) struct ExecuteWebhookPayload<'a> {
    pub content: &'a str,
    pub username: &'a str,
    pub avatar_url: &'a str,
    pub allowed_mentions: AllowedMentions,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<PartialAttachment<'a>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AllowedMentions {
    pub parse: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct PartialAttachment<'a> {
    pub id: usize,
    pub filename: &'a str,
}

/// Discord JSON error body (`{"code": 10015, "message": "Unknown Webhook"}`).
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub code: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: u64, avatar: Option<&str>, discriminator: Option<&str>) -> User {
        User {
            id,
            username: "alice".to_string(),
            global_name: None,
            discriminator: discriminator.map(String::from),
            avatar: avatar.map(String::from),
            bot: false,
        }
    }

    #[test]
    fn avatar_url_uses_hash_when_set() {
        let u = user(42, Some("abc"), None);
        assert_eq!(u.avatar_url(), "https://cdn.discordapp.com/avatars/42/abc.png");
        let u = user(42, Some("a_abc"), None);
        assert_eq!(u.avatar_url(), "https://cdn.discordapp.com/avatars/42/a_abc.gif");
    }

    #[test]
    fn default_avatar_for_migrated_and_legacy_usernames() {
        let id = 80351110224678912u64;
        let u = user(id, None, Some("0"));
        assert_eq!(
            u.avatar_url(),
            format!("https://cdn.discordapp.com/embed/avatars/{}.png", (id >> 22) % 6)
        );
        let u = user(id, None, Some("1337"));
        assert_eq!(u.avatar_url(), "https://cdn.discordapp.com/embed/avatars/2.png");
    }

    #[test]
    fn message_create_parses_reply_member_and_attachments() {
        let json = r#"{
            "id": "1000",
            "channel_id": "2000",
            "guild_id": "3000",
            "content": "hi",
            "author": {"id": "4000", "username": "bob", "global_name": "Bobby", "avatar": null},
            "member": {"nick": "Bob the Builder"},
            "attachments": [
                {"id": "5", "filename": "cat.png", "url": "https://cdn.example/cat.png", "content_type": "image/png", "size": 12}
            ],
            "referenced_message": {
                "id": "999",
                "author": {"id": "4001", "username": "alice", "bot": false}
            }
        }"#;
        let msg: MessageCreate = serde_json::from_str(json).unwrap();
        assert_eq!(msg.channel_id, 2000);
        assert_eq!(msg.guild_id, Some(3000));
        assert_eq!(msg.display_name(), "Bob the Builder");
        assert_eq!(msg.attachments.len(), 1);
        assert_eq!(msg.attachments[0].filename, "cat.png");
        assert_eq!(
            msg.referenced_message.unwrap().author.mention(),
            "<@4001>"
        );
    }

    #[test]
    fn display_name_falls_back_to_username() {
        let json = r#"{
            "id": "1", "channel_id": "2",
            "author": {"id": "3", "username": "carol", "global_name": null}
        }"#;
        let msg: MessageCreate = serde_json::from_str(json).unwrap();
        assert_eq!(msg.display_name(), "carol");
        assert!(msg.referenced_message.is_none());
        assert!(msg.guild_id.is_none());
        assert!(msg.content.is_empty());
    }

    #[test]
    fn blank_nick_falls_back_to_global_name() {
        let json = r#"{
            "id": "1", "channel_id": "2",
            "author": {"id": "3", "username": "carol", "global_name": "Carol C"},
            "member": {"nick": "  "}
        }"#;
        let msg: MessageCreate = serde_json::from_str(json).unwrap();
        assert_eq!(msg.display_name(), "Carol C");
    }

    #[test]
    fn snowflake_rejects_non_integer_strings() {
        let json = r#"{"id": "abc", "username": "x"}"#;
        assert!(serde_json::from_str::<User>(json).is_err());
    }
}
