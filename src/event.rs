use serde::{Deserialize, Serialize};

use crate::state::ConversationState;

/// Identifies one `start_conversation` call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Observable playback milestones, queued until the host drains them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlaybackEvent {
    StateChanged {
        from: ConversationState,
        to: ConversationState,
    },
    LineShown {
        conversation: String,
        index: usize,
        speaker: String,
        text: String,
        language: String,
        is_fallback: bool,
    },
    LineSkipped {
        conversation: String,
        index: usize,
        reason: String,
    },
    Branched {
        from: String,
        to: String,
        line: usize,
    },
    LanguageRefreshed {
        language: String,
        text: String,
    },
    Completed {
        session: SessionId,
    },
}

impl PlaybackEvent {
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }
}
