//! Engine configuration loaded from TOML.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConvoError, ConvoResult};
use crate::language::LanguageSettings;

pub const DEFAULT_MISSING_TRANSLATION_TEXT: &str = "[Missing Translation]";

/// Settings shared by every playback session created from them.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    pub default_language: String,
    pub supported_languages: Vec<String>,
    /// Shown in place of text when a line has no usable translation.
    pub missing_translation_text: String,
    /// Seeds random container and branch selection; `None` draws from entropy.
    pub rng_seed: Option<u64>,
    /// Upper bound on instant phase transitions processed in a single tick.
    pub max_steps_per_tick: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            supported_languages: vec!["en".to_string()],
            missing_translation_text: DEFAULT_MISSING_TRANSLATION_TEXT.to_string(),
            rng_seed: None,
            max_steps_per_tick: 4_096,
        }
    }
}

impl EngineConfig {
    /// Loads a config from a TOML file.
    pub fn load(path: &Path) -> ConvoResult<Self> {
        if !path.exists() {
            return Err(ConvoError::ConfigNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> ConvoResult<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        Ok(config)
    }

    /// Saves the config as pretty TOML.
    pub fn save(&self, path: &Path) -> ConvoResult<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Builds the language context, starting on the default language.
    pub fn language_settings(&self) -> LanguageSettings {
        let mut supported = self.supported_languages.clone();
        if !supported
            .iter()
            .any(|code| code.eq_ignore_ascii_case(&self.default_language))
        {
            supported.insert(0, self.default_language.clone());
        }
        LanguageSettings::new(supported, &self.default_language)
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
