use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{ConversationId, MessageId};

/// What caused a dispatch. Carried into logs and metrics only; every trigger
/// goes through the same probe/fetch admission path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Timer,
    Notification,
    Manual,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Timer => "timer",
            Self::Notification => "notification",
            Self::Manual => "manual",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum PushKind {
    NewMessage,
    ConversationUpdated,
    #[default]
    Other,
}

impl From<String> for PushKind {
    fn from(kind: String) -> Self {
        match kind.as_str() {
            "new_message" => Self::NewMessage,
            "conversation_updated" => Self::ConversationUpdated,
            _ => Self::Other,
        }
    }
}

/// A message delivered by the push channel while the screen is mounted.
///
/// The payload is informational: the bridge never trusts it as data, it only
/// uses its arrival as a hint to run a change check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushMessage {
    #[serde(default)]
    pub message_id: Option<MessageId>,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    #[serde(default)]
    pub kind: PushKind,
}

impl PushMessage {
    #[must_use]
    pub fn new(kind: PushKind) -> Self {
        Self {
            message_id: None,
            conversation_id: None,
            kind,
        }
    }

    #[must_use]
    pub fn for_conversation(conversation_id: ConversationId, kind: PushKind) -> Self {
        Self {
            message_id: None,
            conversation_id: Some(conversation_id),
            kind,
        }
    }
}
