//! Conversations and the dialogue lines they are made of.
//!
//! These structures arrive fully populated from the import pipeline and are never mutated by
//! playback.

use std::collections::BTreeSet;
use std::time::Duration;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::action::LineAction;
use crate::character::{AssetRef, CharacterProfile, DisplayOptionsOverride, ExpressionId};

/// One (language, text) pair. A missing language tag makes the entry unusable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LocalizedText {
    pub language: Option<String>,
    pub text: String,
}

impl LocalizedText {
    pub fn new(language: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            language: Some(language.into()),
            text: text.into(),
        }
    }
}

/// Voice clip attached to a line or played by an action.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioClip {
    pub asset: AssetRef,
    /// Clip length in seconds, used when waiting on the clip without polling the player.
    #[serde(default)]
    pub duration_secs: f32,
}

impl AudioClip {
    pub fn duration(&self) -> Duration {
        secs(self.duration_secs)
    }
}

/// How a line hands control to the next one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Progression {
    /// Wait for the UI to signal an advance.
    #[default]
    UserInput,
    /// Wait a fixed number of seconds.
    Timed { duration_secs: f32 },
}

/// Where playback goes after a line completes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Continuation {
    #[default]
    Continue,
    EndConversation,
    /// Pick a conversation from a container of the library.
    ContainerBranch {
        container: Option<String>,
        #[serde(default)]
        alias: Option<String>,
        #[serde(default)]
        push_return_point: bool,
    },
    /// Follow a named entry of the player's branch table.
    Branch {
        key: String,
        #[serde(default)]
        push_return_point: bool,
    },
}

/// Slot a representation selection is shown in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RepresentationSlot {
    Primary,
    Secondary,
    Tertiary,
}

/// Which representation and expression a character shows on a line.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LineRepresentation {
    pub character_id: String,
    #[serde(default)]
    pub representation: String,
    #[serde(default)]
    pub expression: Option<ExpressionId>,
    #[serde(default)]
    pub display_override: Option<DisplayOptionsOverride>,
}

/// One beat of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DialogueLine {
    pub line_id: String,
    pub conversation_id: String,
    pub index: usize,
    pub character_id: String,
    #[serde(default)]
    pub texts: Vec<LocalizedText>,
    #[serde(default)]
    pub audio: Option<AudioClip>,
    /// `None` entries are authored holes; they are reported and skipped.
    #[serde(default)]
    pub before_actions: Vec<Option<LineAction>>,
    #[serde(default)]
    pub after_actions: Vec<Option<LineAction>>,
    #[serde(default)]
    pub progression: Progression,
    #[serde(default)]
    pub primary: Option<LineRepresentation>,
    #[serde(default)]
    pub secondary: Option<LineRepresentation>,
    #[serde(default)]
    pub tertiary: Option<LineRepresentation>,
    #[serde(default)]
    pub continuation: Continuation,
}

impl DialogueLine {
    pub fn new(
        conversation_id: impl Into<String>,
        index: usize,
        character_id: impl Into<String>,
    ) -> Self {
        let conversation_id = conversation_id.into();
        Self {
            line_id: format!("{conversation_id}:{index}"),
            conversation_id,
            index,
            character_id: character_id.into(),
            texts: Vec::new(),
            audio: None,
            before_actions: Vec::new(),
            after_actions: Vec::new(),
            progression: Progression::UserInput,
            primary: None,
            secondary: None,
            tertiary: None,
            continuation: Continuation::Continue,
        }
    }

    pub fn with_text(mut self, language: &str, text: &str) -> Self {
        self.texts.push(LocalizedText::new(language, text));
        self
    }

    pub fn with_progression(mut self, progression: Progression) -> Self {
        self.progression = progression;
        self
    }

    pub fn with_continuation(mut self, continuation: Continuation) -> Self {
        self.continuation = continuation;
        self
    }

    /// Present representation selections, in slot order.
    pub fn representations(&self) -> impl Iterator<Item = (RepresentationSlot, &LineRepresentation)> {
        [
            (RepresentationSlot::Primary, self.primary.as_ref()),
            (RepresentationSlot::Secondary, self.secondary.as_ref()),
            (RepresentationSlot::Tertiary, self.tertiary.as_ref()),
        ]
        .into_iter()
        .filter_map(|(slot, selection)| selection.map(|selection| (slot, selection)))
    }
}

/// Ordered lines plus the roster of characters taking part.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub participants: Vec<CharacterProfile>,
    #[serde(default)]
    pub lines: Vec<DialogueLine>,
}

/// A data problem found by [`Conversation::validate`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataIssue {
    pub conversation_id: String,
    pub line_index: Option<usize>,
    pub kind: DataIssueKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataIssueKind {
    /// Line index differs from its position in the list.
    LineIndexMismatch { expected: usize, found: usize },
    UnknownSpeaker(String),
    MissingTranslations,
    DuplicateExpressionId { character: String, representation: String },
    NullAction,
    DanglingContainerEntry { container: String, alias: String },
}

impl Conversation {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            participants: Vec::new(),
            lines: Vec::new(),
        }
    }

    pub fn line(&self, index: usize) -> Option<&DialogueLine> {
        self.lines.get(index)
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn participant(&self, character_id: &str) -> Option<&CharacterProfile> {
        self.participants
            .iter()
            .find(|profile| profile.id == character_id)
    }

    /// The roster's player-flagged profile, if any.
    pub fn player_profile(&self) -> Option<&CharacterProfile> {
        self.participants.iter().find(|profile| profile.is_player)
    }

    /// Clamps an authored start index into the line range; empty conversations start at 0.
    pub fn clamp_line_index(&self, index: usize) -> usize {
        index.min(self.lines.len().saturating_sub(1))
    }

    /// Reports authoring problems without rejecting the data.
    pub fn validate(&self) -> Vec<DataIssue> {
        let mut issues = Vec::new();
        let issue = |line_index, kind| DataIssue {
            conversation_id: self.id.clone(),
            line_index,
            kind,
        };

        for profile in &self.participants {
            for representation in &profile.representations {
                let mut seen = BTreeSet::new();
                if representation
                    .expression_ids()
                    .into_iter()
                    .any(|id| !seen.insert(id))
                {
                    issues.push(issue(
                        None,
                        DataIssueKind::DuplicateExpressionId {
                            character: profile.id.clone(),
                            representation: representation.name.clone(),
                        },
                    ));
                }
            }
        }

        for (position, line) in self.lines.iter().enumerate() {
            if line.index != position {
                issues.push(issue(
                    Some(position),
                    DataIssueKind::LineIndexMismatch {
                        expected: position,
                        found: line.index,
                    },
                ));
            }
            if self.participant(&line.character_id).is_none() {
                issues.push(issue(
                    Some(position),
                    DataIssueKind::UnknownSpeaker(line.character_id.clone()),
                ));
            }
            if line.texts.is_empty() {
                issues.push(issue(Some(position), DataIssueKind::MissingTranslations));
            }
            let null_actions = line
                .before_actions
                .iter()
                .chain(&line.after_actions)
                .filter(|action| action.is_none())
                .count();
            for _ in 0..null_actions {
                issues.push(issue(Some(position), DataIssueKind::NullAction));
            }
        }

        issues
    }
}

/// Converts authored seconds into a duration, treating negative or NaN values as zero.
pub(crate) fn secs(value: f32) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f32(value)
    } else {
        Duration::ZERO
    }
}

#[cfg(test)]
#[path = "tests/dialogue_tests.rs"]
mod tests;
