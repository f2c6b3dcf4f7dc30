//! JSON schema of the authored data model, for tools that produce bundles.

use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::error::{ConvoError, ConvoResult};
use crate::library::ConversationBundle;

pub fn conversation_schema() -> RootSchema {
    schema_for!(ConversationBundle)
}

pub fn conversation_schema_json() -> ConvoResult<String> {
    serde_json::to_string_pretty(&conversation_schema()).map_err(ConvoError::serialization)
}
