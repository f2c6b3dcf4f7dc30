//! Registry of loaded conversations, containers and branch tables.

use std::collections::BTreeMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::branch::ConversationBranchContainer;
use crate::container::ConversationContainer;
use crate::dialogue::{Conversation, DataIssue, DataIssueKind};
use crate::error::{ConvoError, ConvoResult};

/// Serialized form handed over by the import pipeline.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ConversationBundle {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
    #[serde(default)]
    pub containers: Vec<ConversationContainer>,
    #[serde(default)]
    pub branch_tables: Vec<ConversationBranchContainer>,
}

impl ConversationBundle {
    pub fn from_json(input: &str) -> ConvoResult<Self> {
        serde_json::from_str(input).map_err(|err| ConvoError::from_json(&err, input))
    }

    pub fn to_json(&self) -> ConvoResult<String> {
        serde_json::to_string_pretty(self).map_err(ConvoError::serialization)
    }
}

/// Shared lookup tables. Containers are held behind `Arc` so their selection cursors are shared
/// by every session using this library.
#[derive(Clone, Debug, Default)]
pub struct ConversationLibrary {
    conversations: BTreeMap<String, Arc<Conversation>>,
    containers: BTreeMap<String, Arc<ConversationContainer>>,
    branch_tables: BTreeMap<String, Arc<ConversationBranchContainer>>,
}

impl ConversationLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a library from a bundle. Duplicate ids are rejected.
    pub fn from_bundle(bundle: ConversationBundle) -> ConvoResult<Self> {
        let mut library = Self::new();
        for conversation in bundle.conversations {
            let id = conversation.id.clone();
            if library.conversations.contains_key(&id) {
                return Err(ConvoError::InvalidData(format!(
                    "duplicate conversation id '{id}'"
                )));
            }
            library.insert_conversation(conversation);
        }
        for container in bundle.containers {
            let name = container.name.clone();
            if library.containers.contains_key(&name) {
                return Err(ConvoError::InvalidData(format!(
                    "duplicate container name '{name}'"
                )));
            }
            library.insert_container(container);
        }
        for table in bundle.branch_tables {
            let name = table.name.clone();
            if library.branch_tables.contains_key(&name) {
                return Err(ConvoError::InvalidData(format!(
                    "duplicate branch table '{name}'"
                )));
            }
            library.insert_branch_table(table);
        }
        Ok(library)
    }

    pub fn insert_conversation(&mut self, conversation: Conversation) -> Arc<Conversation> {
        let conversation = Arc::new(conversation);
        self.conversations
            .insert(conversation.id.clone(), Arc::clone(&conversation));
        conversation
    }

    pub fn insert_container(&mut self, container: ConversationContainer) -> Arc<ConversationContainer> {
        let container = Arc::new(container);
        self.containers
            .insert(container.name.clone(), Arc::clone(&container));
        container
    }

    pub fn insert_branch_table(
        &mut self,
        table: ConversationBranchContainer,
    ) -> Arc<ConversationBranchContainer> {
        let table = Arc::new(table);
        self.branch_tables
            .insert(table.name.clone(), Arc::clone(&table));
        table
    }

    pub fn conversation(&self, id: &str) -> Option<Arc<Conversation>> {
        self.conversations.get(id).cloned()
    }

    pub fn container(&self, name: &str) -> Option<Arc<ConversationContainer>> {
        self.containers.get(name).cloned()
    }

    pub fn branch_table(&self, name: &str) -> Option<Arc<ConversationBranchContainer>> {
        self.branch_tables.get(name).cloned()
    }

    pub fn conversations(&self) -> impl Iterator<Item = &Arc<Conversation>> {
        self.conversations.values()
    }

    /// Looks up a conversation referenced by a container entry.
    ///
    /// Unset or dangling references resolve to `None`.
    pub fn resolve_reference(&self, reference: Option<&str>) -> Option<Arc<Conversation>> {
        let id = reference?.trim();
        if id.is_empty() {
            return None;
        }
        let found = self.conversation(id);
        if found.is_none() {
            warn!(conversation = id, "container references an unknown conversation");
        }
        found
    }

    /// Runs every conversation's validation plus container reference checks.
    pub fn validate(&self) -> Vec<DataIssue> {
        let mut issues: Vec<DataIssue> = self
            .conversations
            .values()
            .flat_map(|conversation| conversation.validate())
            .collect();
        for container in self.containers.values() {
            for entry in &container.entries {
                let dangling = match entry.conversation.as_deref() {
                    Some(id) => !self.conversations.contains_key(id),
                    None => true,
                };
                if dangling {
                    issues.push(DataIssue {
                        conversation_id: entry.conversation.clone().unwrap_or_default(),
                        line_index: None,
                        kind: DataIssueKind::DanglingContainerEntry {
                            container: container.name.clone(),
                            alias: entry.alias.clone(),
                        },
                    });
                }
            }
        }
        issues
    }
}
