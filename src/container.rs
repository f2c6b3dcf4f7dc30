//! Conversation containers: playlists and single-pick selectors.
//!
//! # Contracts
//! - **Invariant**: entries that are disabled or lack a resolvable conversation are never picked.
//! - **Invariant**: the sequential cursor belongs to the container instance and survives across
//!   sessions; it is never reset by playback.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dialogue::{secs, Conversation};
use crate::library::ConversationLibrary;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ContainerMode {
    /// Plays entries one after another.
    #[default]
    Playlist,
    /// Resolves to a single entry.
    Selector,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    #[default]
    First,
    Sequential,
    Random,
    WeightedRandom,
}

/// One slot of a container.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ContainerEntry {
    #[serde(default)]
    pub alias: String,
    /// Id of the referenced conversation in the library.
    pub conversation: Option<String>,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_weight")]
    pub weight: f32,
    #[serde(default)]
    pub start_line_index: usize,
    /// Pause after this entry finishes, in seconds (playlists only).
    #[serde(default)]
    pub post_delay_secs: f32,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f32 {
    1.0
}

impl ContainerEntry {
    pub fn new(alias: impl Into<String>, conversation: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            conversation: Some(conversation.into()),
            enabled: true,
            weight: 1.0,
            start_line_index: 0,
            post_delay_secs: 0.0,
            tags: Vec::new(),
        }
    }

    pub fn post_delay(&self) -> std::time::Duration {
        secs(self.post_delay_secs)
    }
}

/// Rotating index shared by every caller of one container.
#[derive(Debug, Default)]
pub struct SequentialCursor(AtomicUsize);

impl SequentialCursor {
    /// Returns the current slot modulo `count` and moves the cursor forward.
    pub fn next(&self, count: usize) -> usize {
        if count == 0 {
            return 0;
        }
        let previous = self
            .0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |value| {
                Some((value % count + 1) % count)
            })
            .unwrap_or_default();
        previous % count
    }

    pub fn peek(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Clone for SequentialCursor {
    fn clone(&self) -> Self {
        Self(AtomicUsize::new(self.peek()))
    }
}

impl PartialEq for SequentialCursor {
    fn eq(&self, other: &Self) -> bool {
        self.peek() == other.peek()
    }
}

/// Named, ordered list of conversation entries.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConversationContainer {
    pub name: String,
    #[serde(default)]
    pub mode: ContainerMode,
    #[serde(default)]
    pub selection: SelectionMode,
    /// Playlist only: start over after the last entry.
    #[serde(default)]
    pub looped: bool,
    #[serde(default)]
    pub entries: Vec<ContainerEntry>,
    #[serde(skip)]
    #[schemars(skip)]
    cursor: SequentialCursor,
}

/// Result of resolving a container for a branch.
#[derive(Clone, Debug)]
pub struct BranchSelection {
    pub conversation: Arc<Conversation>,
    pub start_line: usize,
    pub alias: String,
}

impl ConversationContainer {
    pub fn new(name: impl Into<String>, mode: ContainerMode, selection: SelectionMode) -> Self {
        Self {
            name: name.into(),
            mode,
            selection,
            looped: false,
            entries: Vec::new(),
            cursor: SequentialCursor::default(),
        }
    }

    pub fn with_entry(mut self, entry: ContainerEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn sequential_cursor(&self) -> usize {
        self.cursor.peek()
    }

    /// Enabled entries whose conversation resolves in `library`, in authored order.
    fn candidates(&self, library: &ConversationLibrary) -> Vec<(&ContainerEntry, Arc<Conversation>)> {
        self.entries
            .iter()
            .filter(|entry| entry.enabled)
            .filter_map(|entry| {
                library
                    .resolve_reference(entry.conversation.as_deref())
                    .map(|conversation| (entry, conversation))
            })
            .collect()
    }

    /// Picks one conversation and its clamped start line for a branch.
    ///
    /// An alias filter that matches nothing is ignored rather than failing the branch.
    /// Playlists used as branch targets behave like `First`.
    pub fn resolve_for_branch<R: Rng + ?Sized>(
        &self,
        library: &ConversationLibrary,
        alias_or_name: Option<&str>,
        rng: &mut R,
    ) -> Option<BranchSelection> {
        let mut candidates = self.candidates(library);
        if candidates.is_empty() {
            warn!(container = %self.name, "container has no selectable entries");
            return None;
        }

        if let Some(filter) = alias_or_name.map(str::trim).filter(|value| !value.is_empty()) {
            let narrowed: Vec<_> = candidates
                .iter()
                .filter(|(entry, conversation)| matches_alias_or_name(entry, conversation, filter))
                .cloned()
                .collect();
            if narrowed.is_empty() {
                warn!(
                    container = %self.name,
                    alias = filter,
                    "no entry matches alias, selecting among all entries"
                );
            } else {
                candidates = narrowed;
            }
        }

        let mode = match self.mode {
            ContainerMode::Selector => self.selection,
            ContainerMode::Playlist => {
                warn!(
                    container = %self.name,
                    "playlist container used as a branch target, selecting the first entry"
                );
                SelectionMode::First
            }
        };

        let index = match mode {
            SelectionMode::First => 0,
            SelectionMode::Random => rng.gen_range(0..candidates.len()),
            SelectionMode::Sequential => self.cursor.next(candidates.len()),
            SelectionMode::WeightedRandom => {
                pick_weighted(candidates.iter().map(|(entry, _)| entry.weight), rng)
            }
        };

        let (entry, conversation) = candidates.swap_remove(index);
        let start_line = conversation.clamp_line_index(entry.start_line_index);
        debug!(
            container = %self.name,
            alias = %entry.alias,
            conversation = %conversation.id,
            start_line,
            "container resolved"
        );
        Some(BranchSelection {
            conversation,
            start_line,
            alias: entry.alias.clone(),
        })
    }

    /// Index of the entry a playlist should start from.
    ///
    /// Tries an alias match first, then a conversation name match, both case-insensitive,
    /// and defaults to the first entry.
    pub fn start_index(&self, library: &ConversationLibrary, alias_or_name: Option<&str>) -> usize {
        let Some(filter) = alias_or_name.map(str::trim).filter(|value| !value.is_empty()) else {
            return 0;
        };
        if let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.alias.eq_ignore_ascii_case(filter))
        {
            return index;
        }
        self.entries
            .iter()
            .position(|entry| {
                library
                    .conversation(entry.conversation.as_deref().unwrap_or_default())
                    .is_some_and(|conversation| conversation.name.eq_ignore_ascii_case(filter))
            })
            .unwrap_or(0)
    }
}

fn matches_alias_or_name(entry: &ContainerEntry, conversation: &Conversation, filter: &str) -> bool {
    entry.alias.eq_ignore_ascii_case(filter) || conversation.name.eq_ignore_ascii_case(filter)
}

/// Cumulative-weight sampling. Falls back to the first slot when no weight is positive.
///
/// Weights are summed in `f64` so a handful of huge `f32` weights cannot overflow the total.
fn pick_weighted<R: Rng + ?Sized>(weights: impl Iterator<Item = f32> + Clone, rng: &mut R) -> usize {
    let usable = |weight: f32| {
        if weight.is_finite() {
            f64::from(weight.max(0.0))
        } else {
            0.0
        }
    };
    let total: f64 = weights.clone().map(usable).sum();
    if !total.is_finite() || total <= 0.0 {
        return 0;
    }
    let draw = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    let mut last_positive = 0;
    for (index, weight) in weights.enumerate() {
        let weight = usable(weight);
        if weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        last_positive = index;
        if cumulative >= draw {
            return index;
        }
    }
    last_positive
}

#[cfg(test)]
#[path = "tests/container_tests.rs"]
mod tests;
