//! Linear playback of a container's entries, one conversation after another.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::container::ConversationContainer;
use crate::dialogue::Conversation;
use crate::error::ConvoResult;
use crate::event::SessionId;
use crate::library::ConversationLibrary;

/// Something that can play a conversation and report when it is done.
pub trait ConversationRunner {
    fn play_conversation(
        &mut self,
        conversation: Arc<Conversation>,
        start_line: usize,
    ) -> ConvoResult<SessionId>;

    fn has_completed(&self, session: SessionId) -> bool;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaylistStatus {
    Running,
    Finished,
}

#[derive(Clone, Debug)]
struct PlaylistItem {
    alias: String,
    conversation: Arc<Conversation>,
    enabled: bool,
    start_line: usize,
    post_delay: Duration,
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    Select,
    Waiting {
        session: SessionId,
        post_delay: Duration,
    },
    Delay {
        remaining: Duration,
    },
    Finished,
}

/// Plays a container's entries in order, wrapping from the start entry, optionally forever.
#[derive(Clone, Debug)]
pub struct PlaylistPlayback {
    container: String,
    items: Vec<PlaylistItem>,
    start: usize,
    offset: usize,
    looped: bool,
    phase: Phase,
}

impl PlaylistPlayback {
    /// Prepares playback of `container`.
    ///
    /// Entries without a resolvable conversation are dropped with a warning. The start entry is
    /// found by alias, then by conversation name; a dropped start entry moves to the next kept
    /// one. `loop_override` replaces the container's own `looped` flag.
    pub fn new(
        container: &ConversationContainer,
        library: &ConversationLibrary,
        start_alias_or_name: Option<&str>,
        loop_override: Option<bool>,
    ) -> Self {
        let start_entry = container.start_index(library, start_alias_or_name);
        let mut start = None;
        let mut items = Vec::with_capacity(container.entries.len());
        for (index, entry) in container.entries.iter().enumerate() {
            let Some(conversation) = library.resolve_reference(entry.conversation.as_deref()) else {
                warn!(
                    container = %container.name,
                    alias = %entry.alias,
                    "dropping playlist entry without a conversation"
                );
                continue;
            };
            if start.is_none() && index >= start_entry {
                start = Some(items.len());
            }
            items.push(PlaylistItem {
                alias: entry.alias.clone(),
                conversation,
                enabled: entry.enabled,
                start_line: entry.start_line_index,
                post_delay: entry.post_delay(),
            });
        }

        let phase = if items.iter().any(|item| item.enabled) {
            Phase::Select
        } else {
            warn!(container = %container.name, "playlist has no playable entries");
            Phase::Finished
        };
        Self {
            container: container.name.clone(),
            items,
            start: start.unwrap_or(0),
            offset: 0,
            looped: loop_override.unwrap_or(container.looped),
            phase,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Finished)
    }

    pub fn is_looping(&self) -> bool {
        self.looped
    }

    /// Alias of the entry that plays first.
    pub fn start_alias(&self) -> Option<&str> {
        self.items.get(self.start).map(|item| item.alias.as_str())
    }

    /// Advances the playlist. Starts at most one conversation per call; the runner has to make
    /// progress before the next one can begin.
    pub fn tick<R: ConversationRunner + ?Sized>(
        &mut self,
        runner: &mut R,
        dt: Duration,
    ) -> ConvoResult<PlaylistStatus> {
        let mut dt = dt;
        loop {
            let elapsed = std::mem::take(&mut dt);
            match &mut self.phase {
                Phase::Finished => return Ok(PlaylistStatus::Finished),
                Phase::Select => {
                    if self.offset == self.items.len() {
                        if !self.looped {
                            info!(container = %self.container, "playlist finished");
                            self.phase = Phase::Finished;
                            continue;
                        }
                        debug!(container = %self.container, "playlist wrapping around");
                        self.offset = 0;
                    }
                    let index = (self.start + self.offset) % self.items.len();
                    self.offset += 1;
                    let item = &self.items[index];
                    if !item.enabled {
                        debug!(alias = %item.alias, "skipping disabled playlist entry");
                        continue;
                    }

                    debug!(
                        container = %self.container,
                        alias = %item.alias,
                        conversation = %item.conversation.id,
                        "playlist entry starting"
                    );
                    let post_delay = item.post_delay;
                    let started =
                        runner.play_conversation(Arc::clone(&item.conversation), item.start_line);
                    let session = match started {
                        Ok(session) => session,
                        Err(err) => {
                            self.phase = Phase::Finished;
                            return Err(err);
                        }
                    };
                    self.phase = Phase::Waiting {
                        session,
                        post_delay,
                    };
                    return Ok(PlaylistStatus::Running);
                }
                Phase::Waiting {
                    session,
                    post_delay,
                } => {
                    if !runner.has_completed(*session) {
                        return Ok(PlaylistStatus::Running);
                    }
                    let delay = *post_delay;
                    self.phase = if delay.is_zero() {
                        Phase::Select
                    } else {
                        Phase::Delay { remaining: delay }
                    };
                }
                Phase::Delay { remaining } => {
                    *remaining = remaining.saturating_sub(elapsed);
                    if !remaining.is_zero() {
                        return Ok(PlaylistStatus::Running);
                    }
                    self.phase = Phase::Select;
                }
            }
        }
    }
}
