//! Relay message snapshot: everything the dispatch loop needs from an inbound event.

use crate::discord::{Attachment, MessageCreate};

/// Author fields captured at ingestion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: u64,
    pub display_name: String,
    pub avatar_url: String,
    pub is_bot: bool,
}

/// A file posted with the source message; re-uploaded on every leg.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRef {
    pub filename: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size: u64,
}

impl From<&Attachment> for AttachmentRef {
    fn from(a: &Attachment) -> Self {
        Self {
            filename: a.filename.clone(),
            url: a.url.clone(),
            content_type: a.content_type.clone(),
            size: a.size,
        }
    }
}

/// Resolved reply target; only the mention survives into the relayed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyRef {
    pub author_mention: String,
}

/// Immutable snapshot of an inbound message awaiting relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage {
    pub id: u64,
    pub source_channel_id: u64,
    pub guild_id: Option<u64>,
    pub author: Author,
    pub content: String,
    pub attachments: Vec<AttachmentRef>,
    pub reply: Option<ReplyRef>,
}

impl RelayMessage {
    pub fn from_event(event: &MessageCreate) -> Self {
        Self {
            id: event.id,
            source_channel_id: event.channel_id,
            guild_id: event.guild_id,
            author: Author {
                id: event.author.id,
                display_name: event.display_name(),
                avatar_url: event.author.avatar_url(),
                is_bot: event.author.bot,
            },
            content: event.content.clone(),
            attachments: event.attachments.iter().map(AttachmentRef::from).collect(),
            reply: event.referenced_message.as_ref().map(|r| ReplyRef {
                author_mention: r.author.mention(),
            }),
        }
    }

    /// Short form of the content for log lines.
    pub fn preview(&self) -> String {
        const MAX: usize = 60;
        let mut s: String = self.content.chars().take(MAX).collect();
        if self.content.chars().count() > MAX {
            s.push('…');
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_copies_event_fields() {
        let json = r#"{
            "id": "10", "channel_id": "20", "guild_id": "30",
            "content": "hello there",
            "author": {"id": "40", "username": "dave", "avatar": "hash", "bot": false},
            "attachments": [{"id": "1", "filename": "a.txt", "url": "https://cdn.example/a.txt", "size": 3}],
            "referenced_message": {"author": {"id": "50", "username": "erin"}}
        }"#;
        let event: MessageCreate = serde_json::from_str(json).unwrap();
        let msg = RelayMessage::from_event(&event);
        assert_eq!(msg.source_channel_id, 20);
        assert_eq!(msg.guild_id, Some(30));
        assert_eq!(msg.author.display_name, "dave");
        assert_eq!(msg.author.avatar_url, "https://cdn.discordapp.com/avatars/40/hash.png");
        assert!(!msg.author.is_bot);
        assert_eq!(msg.attachments[0].filename, "a.txt");
        assert_eq!(msg.reply.unwrap().author_mention, "<@50>");
    }

    #[test]
    fn preview_truncates_long_content() {
        let json = format!(
            r#"{{"id": "1", "channel_id": "2", "content": "{}", "author": {{"id": "3", "username": "x"}}}}"#,
            "a".repeat(100)
        );
        let event: MessageCreate = serde_json::from_str(&json).unwrap();
        let msg = RelayMessage::from_event(&event);
        assert_eq!(msg.preview().chars().count(), 61);
    }
}
