//! Current-language context shared with playback sessions.

use tracing::{debug, warn};

use crate::error::{ConvoError, ConvoResult};

/// Supported languages plus the active one.
///
/// The revision counter changes whenever the active language does, so a player can notice a
/// switch between ticks without holding a callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LanguageSettings {
    supported: Vec<String>,
    current: String,
    revision: u64,
}

impl LanguageSettings {
    pub fn new(supported: Vec<String>, current: &str) -> Self {
        let mut settings = Self {
            supported,
            current: current.trim().to_string(),
            revision: 0,
        };
        if let Some(canonical) = settings.canonical(current).map(str::to_string) {
            settings.current = canonical;
        }
        settings
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn supported(&self) -> &[String] {
        &self.supported
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Case-insensitive lookup returning the supported spelling of `code`.
    pub fn canonical(&self, code: &str) -> Option<&str> {
        let code = code.trim();
        self.supported
            .iter()
            .find(|candidate| candidate.eq_ignore_ascii_case(code))
            .map(String::as_str)
    }

    /// Switches the active language. Returns whether it changed.
    pub fn set_language(&mut self, code: &str) -> ConvoResult<bool> {
        let Some(canonical) = self.canonical(code).map(str::to_string) else {
            warn!(language = code, "rejecting unsupported language");
            return Err(ConvoError::UnsupportedLanguage(code.to_string()));
        };
        if canonical == self.current {
            return Ok(false);
        }
        debug!(from = %self.current, to = %canonical, "language changed");
        self.current = canonical;
        self.revision = self.revision.wrapping_add(1);
        Ok(true)
    }
}
