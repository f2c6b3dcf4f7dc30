//! Per-line text resolution with first-entry fallback.

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MISSING_TRANSLATION_TEXT;
use crate::dialogue::LocalizedText;

/// Outcome of resolving a line's text. Absence is a value here, never an error.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizationResult {
    pub success: bool,
    pub text: String,
    pub used_language: String,
    pub is_fallback: bool,
    pub diagnostic: String,
}

impl LocalizationResult {
    fn failure(placeholder: &str, diagnostic: String) -> Self {
        Self {
            success: false,
            text: placeholder.to_string(),
            used_language: String::new(),
            is_fallback: false,
            diagnostic,
        }
    }
}

/// Resolves the text for `current_language` using the default placeholder.
pub fn resolve_line_text(texts: &[LocalizedText], current_language: &str) -> LocalizationResult {
    resolve_line_text_with(texts, current_language, DEFAULT_MISSING_TRANSLATION_TEXT)
}

/// Resolves the text for `current_language`.
///
/// Matching is case-sensitive; callers pass an already canonicalized language code.
/// When the language is missing, the first entry carrying a language tag is used.
pub fn resolve_line_text_with(
    texts: &[LocalizedText],
    current_language: &str,
    placeholder: &str,
) -> LocalizationResult {
    if texts.is_empty() {
        return LocalizationResult::failure(
            placeholder,
            "line has no localized text entries".to_string(),
        );
    }

    if let Some(entry) = texts
        .iter()
        .find(|entry| entry.language.as_deref() == Some(current_language))
    {
        return LocalizationResult {
            success: true,
            text: entry.text.clone(),
            used_language: current_language.to_string(),
            is_fallback: false,
            diagnostic: String::new(),
        };
    }

    let first_tagged = texts.iter().find_map(|entry| {
        entry
            .language
            .as_deref()
            .filter(|language| !language.is_empty())
            .map(|language| (language, entry))
    });
    match first_tagged {
        Some((language, entry)) => LocalizationResult {
            success: true,
            text: entry.text.clone(),
            used_language: language.to_string(),
            is_fallback: true,
            diagnostic: format!(
                "no '{current_language}' text for line, fell back to '{language}'"
            ),
        },
        None => LocalizationResult::failure(
            placeholder,
            format!(
                "line has {} text entries but none carries a language tag",
                texts.len()
            ),
        ),
    }
}

/// Replaces the player placeholder token with the player's name.
///
/// Text passes through untouched unless both the token and the name are non-empty.
pub fn substitute_player_name(text: &str, placeholder: Option<&str>, name: Option<&str>) -> String {
    match (placeholder, name) {
        (Some(token), Some(name)) if !token.is_empty() && !name.is_empty() => {
            text.replace(token, name)
        }
        _ => text.to_string(),
    }
}
