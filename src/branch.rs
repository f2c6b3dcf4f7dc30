//! Named branch tables.
//!
//! Each entry maps a case-insensitive key to a jump target. Resolution never fails: targets that
//! cannot be satisfied degrade to ending the conversation.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::dialogue::Conversation;
use crate::library::ConversationLibrary;

/// Where a branch entry points.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum BranchTarget {
    /// First line of a conversation (the current one when unset).
    ConversationStart { conversation: Option<String> },
    /// A specific line, clamped into range.
    ConversationLine {
        conversation: Option<String>,
        line_index: usize,
    },
    /// A uniformly random line from a pool, each clamped into range.
    RandomFromList {
        conversation: Option<String>,
        line_indices: Vec<usize>,
    },
    UseConversationContainer {
        container: String,
        #[serde(default)]
        alias: Option<String>,
    },
    EndConversation,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BranchEntry {
    pub key: String,
    #[serde(flatten)]
    pub target: BranchTarget,
}

/// Outcome of resolving a branch.
#[derive(Clone, Debug)]
pub enum BranchOutcome {
    Jump {
        conversation: Arc<Conversation>,
        line_index: usize,
    },
    End,
}

/// Inputs a branch needs besides its own entry.
pub struct BranchContext<'a, R: Rng + ?Sized> {
    pub library: &'a ConversationLibrary,
    pub current: Option<&'a Arc<Conversation>>,
    pub rng: &'a mut R,
}

/// Case-insensitive, string-keyed table of branch entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConversationBranchContainer {
    pub name: String,
    #[serde(default)]
    pub entries: Vec<BranchEntry>,
}

impl ConversationBranchContainer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Vec::new(),
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, target: BranchTarget) -> Self {
        self.entries.push(BranchEntry {
            key: key.into(),
            target,
        });
        self
    }

    pub fn entry(&self, key: &str) -> Option<&BranchEntry> {
        let key = key.trim();
        self.entries
            .iter()
            .find(|entry| entry.key.eq_ignore_ascii_case(key))
    }

    /// Resolves `key`; unknown keys yield `None` so the caller can decide how to degrade.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        key: &str,
        ctx: &mut BranchContext<'_, R>,
    ) -> Option<BranchOutcome> {
        let entry = self.entry(key)?;
        Some(resolve_target(&entry.target, ctx))
    }
}

/// Resolves a single branch target against the context.
pub fn resolve_target<R: Rng + ?Sized>(
    target: &BranchTarget,
    ctx: &mut BranchContext<'_, R>,
) -> BranchOutcome {
    match target {
        BranchTarget::EndConversation => BranchOutcome::End,
        BranchTarget::ConversationStart { conversation } => {
            match target_conversation(conversation.as_deref(), ctx) {
                Some(conversation) => BranchOutcome::Jump {
                    conversation,
                    line_index: 0,
                },
                None => BranchOutcome::End,
            }
        }
        BranchTarget::ConversationLine {
            conversation,
            line_index,
        } => match target_conversation(conversation.as_deref(), ctx) {
            Some(conversation) => {
                let line_index = conversation.clamp_line_index(*line_index);
                BranchOutcome::Jump {
                    conversation,
                    line_index,
                }
            }
            None => BranchOutcome::End,
        },
        BranchTarget::RandomFromList {
            conversation,
            line_indices,
        } => {
            let Some(conversation) = target_conversation(conversation.as_deref(), ctx) else {
                return BranchOutcome::End;
            };
            match line_indices.choose(&mut *ctx.rng) {
                Some(index) => {
                    let line_index = conversation.clamp_line_index(*index);
                    BranchOutcome::Jump {
                        conversation,
                        line_index,
                    }
                }
                None => {
                    warn!(conversation = %conversation.id, "random branch has an empty pool");
                    BranchOutcome::End
                }
            }
        }
        BranchTarget::UseConversationContainer { container, alias } => {
            let Some(found) = ctx.library.container(container) else {
                warn!(container = %container, "branch references an unknown container");
                return BranchOutcome::End;
            };
            match found.resolve_for_branch(ctx.library, alias.as_deref(), &mut *ctx.rng) {
                Some(selection) => BranchOutcome::Jump {
                    conversation: selection.conversation,
                    line_index: selection.start_line,
                },
                None => BranchOutcome::End,
            }
        }
    }
}

fn target_conversation<R: Rng + ?Sized>(
    reference: Option<&str>,
    ctx: &BranchContext<'_, R>,
) -> Option<Arc<Conversation>> {
    let found = match reference.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => ctx.library.conversation(id),
        None => ctx.current.cloned(),
    };
    if found.is_none() {
        warn!(
            conversation = reference.unwrap_or("<current>"),
            "branch target conversation is missing"
        );
    }
    found
}

#[cfg(test)]
#[path = "tests/branch_tests.rs"]
mod tests;
