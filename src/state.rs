//! Playback session lifecycle.

use serde::{Deserialize, Serialize};

/// Lifecycle of a playback session: `Idle -> Starting -> Playing -> Ended -> Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    #[default]
    Idle,
    Starting,
    Playing,
    Ended,
}

impl ConversationState {
    /// The only state reachable from `self`.
    pub fn next(self) -> Self {
        match self {
            ConversationState::Idle => ConversationState::Starting,
            ConversationState::Starting => ConversationState::Playing,
            ConversationState::Playing => ConversationState::Ended,
            ConversationState::Ended => ConversationState::Idle,
        }
    }

    pub fn can_transition_to(self, to: Self) -> bool {
        self.next() == to
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConversationState::Idle => "idle",
            ConversationState::Starting => "starting",
            ConversationState::Playing => "playing",
            ConversationState::Ended => "ended",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_form_a_cycle() {
        let mut state = ConversationState::Idle;
        let mut seen = Vec::new();
        for _ in 0..4 {
            let next = state.next();
            assert!(state.can_transition_to(next));
            seen.push(next);
            state = next;
        }
        assert_eq!(
            seen,
            [
                ConversationState::Starting,
                ConversationState::Playing,
                ConversationState::Ended,
                ConversationState::Idle
            ]
        );
        assert!(!ConversationState::Idle.can_transition_to(ConversationState::Playing));
    }
}
