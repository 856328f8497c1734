use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdError {
    #[error("{kind} cannot be empty")]
    Empty { kind: &'static str },

    #[error("{kind} exceeds {max} characters")]
    TooLong { kind: &'static str, max: usize },
}

macro_rules! typed_id {
    ($name:ident, $max:expr) => {
        #[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            const MAX_LENGTH: usize = $max;

            pub fn new(id: impl Into<String>) -> Result<Self, IdError> {
                let id = id.into().trim().to_string();
                if id.is_empty() {
                    return Err(IdError::Empty {
                        kind: stringify!($name),
                    });
                }
                if id.len() > Self::MAX_LENGTH {
                    return Err(IdError::TooLong {
                        kind: stringify!($name),
                        max: Self::MAX_LENGTH,
                    });
                }
                Ok(Self(id))
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

typed_id!(ConversationId, 128);
typed_id!(UserId, 128);
typed_id!(MessageId, 128);

/// Server-assigned change marker returned by the update probe.
///
/// Only ever compared for ordering; the core never interprets it as wall time.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChangeTimestamp(pub i64);

impl ChangeTimestamp {
    pub const ZERO: Self = Self(0);

    #[must_use]
    pub const fn value(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn is_newer_than(self, other: Self) -> bool {
        self.0 > other.0
    }
}

impl fmt::Display for ChangeTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unix timestamp in milliseconds
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnixTimeMs(pub u64);

impl UnixTimeMs {
    pub fn now() -> Self {
        Self(
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        )
    }

    #[must_use]
    pub fn elapsed_since(self, earlier: Self) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Tag carried by every probe and fetch so a late completion can be matched
/// against the session that issued it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LastMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub preview: String,
    pub sent_at: UnixTimeMs,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ConversationSummary {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub participants: Vec<UserId>,
    #[serde(default)]
    pub last_message: Option<LastMessage>,
    #[serde(default)]
    pub unread_count: u32,
    pub updated_at: UnixTimeMs,
}

impl ConversationSummary {
    pub const PREVIEW_LENGTH: usize = 80;

    #[must_use]
    pub fn has_unread(&self) -> bool {
        self.unread_count > 0
    }

    /// Last message text cut to [`Self::PREVIEW_LENGTH`] characters.
    #[must_use]
    pub fn preview(&self) -> String {
        let Some(message) = &self.last_message else {
            return String::new();
        };
        let text = message.preview.trim();
        if text.chars().count() <= Self::PREVIEW_LENGTH {
            return text.to_string();
        }
        let mut cut: String = text.chars().take(Self::PREVIEW_LENGTH - 3).collect();
        cut.push_str("...");
        cut
    }
}

/// The conversation list as last materialised by a successful fetch.
///
/// Snapshots are immutable; each successful fetch publishes a new one with a
/// bumped `generation`.
#[derive(Clone, Debug, PartialEq)]
pub struct ConversationListSnapshot {
    pub items: Arc<[ConversationSummary]>,
    pub generation: u64,
    pub session: Option<SessionId>,
    pub fetched_at: Option<UnixTimeMs>,
}

impl Default for ConversationListSnapshot {
    fn default() -> Self {
        Self {
            items: Arc::from(Vec::new()),
            generation: 0,
            session: None,
            fetched_at: None,
        }
    }
}

impl ConversationListSnapshot {
    #[must_use]
    pub fn replaced_by(&self, items: Vec<ConversationSummary>, session: SessionId) -> Self {
        Self {
            items: items.into(),
            generation: self.generation + 1,
            session: Some(session),
            fetched_at: Some(UnixTimeMs::now()),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn total_unread(&self) -> u64 {
        self.items.iter().map(|c| u64::from(c.unread_count)).sum()
    }

    #[must_use]
    pub fn find(&self, id: &ConversationId) -> Option<&ConversationSummary> {
        self.items.iter().find(|c| &c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: &str, unread: u32) -> ConversationSummary {
        ConversationSummary {
            id: ConversationId::new(id).unwrap(),
            title: None,
            participants: vec![],
            last_message: None,
            unread_count: unread,
            updated_at: UnixTimeMs(0),
        }
    }

    #[test]
    fn test_conversation_id_validation() {
        assert!(ConversationId::new("conv-1").is_ok());
        assert_eq!(
            ConversationId::new("   "),
            Err(IdError::Empty {
                kind: "ConversationId"
            })
        );
        assert!(ConversationId::new("a".repeat(129)).is_err());
        assert_eq!(ConversationId::new("  c1 ").unwrap().as_str(), "c1");
    }

    #[test]
    fn test_conversation_id_rejects_empty_on_deserialize() {
        let result: Result<ConversationId, _> = serde_json::from_str("\"\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_change_timestamp_ordering() {
        assert!(ChangeTimestamp(100).is_newer_than(ChangeTimestamp(50)));
        assert!(!ChangeTimestamp(100).is_newer_than(ChangeTimestamp(100)));
        assert_eq!(ChangeTimestamp::default(), ChangeTimestamp::ZERO);
    }

    #[test]
    fn test_snapshot_replacement_bumps_generation() {
        let session = SessionId::generate();
        let empty = ConversationListSnapshot::default();
        let next = empty.replaced_by(vec![summary("a", 2), summary("b", 3)], session);

        assert_eq!(next.generation, 1);
        assert_eq!(next.len(), 2);
        assert_eq!(next.total_unread(), 5);
        assert_eq!(next.session, Some(session));
        assert!(empty.is_empty());
        assert!(next.find(&ConversationId::new("b").unwrap()).is_some());
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let mut convo = summary("a", 0);
        convo.last_message = Some(LastMessage {
            id: MessageId::new("m1").unwrap(),
            sender_id: UserId::new("u1").unwrap(),
            preview: "日".repeat(100),
            sent_at: UnixTimeMs(1),
        });
        let preview = convo.preview();
        assert_eq!(preview.chars().count(), ConversationSummary::PREVIEW_LENGTH);
        assert!(preview.ends_with("..."));
        assert_eq!(summary("b", 0).preview(), "");
    }
}
