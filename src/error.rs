use std::path::PathBuf;

use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

pub type ConvoResult<T> = Result<T, ConvoError>;

#[derive(Debug, Error, Diagnostic)]
pub enum ConvoError {
    #[error("no conversation data assigned")]
    #[diagnostic(
        code("convo.missing_conversation"),
        help("assign conversation data before starting playback")
    )]
    MissingConversation,
    #[error("container '{0}' has nothing to play")]
    #[diagnostic(
        code("convo.empty_container"),
        help("check that the container exists and has enabled entries with conversations")
    )]
    EmptyContainer(String),
    #[error("language '{0}' is not supported")]
    #[diagnostic(code("convo.unsupported_language"))]
    UnsupportedLanguage(String),
    #[error("invalid conversation data: {0}")]
    #[diagnostic(code("convo.invalid_data"))]
    InvalidData(String),
    #[error("config file not found at {0}")]
    #[diagnostic(code("convo.config_not_found"))]
    ConfigNotFound(PathBuf),
    #[error("failed to parse config: {0}")]
    #[diagnostic(code("convo.config_parse"))]
    ConfigParse(#[from] toml::de::Error),
    #[error("failed to write config: {0}")]
    #[diagnostic(code("convo.config_write"))]
    ConfigWrite(#[from] toml::ser::Error),
    #[error("io error: {0}")]
    #[diagnostic(code("convo.io"))]
    Io(#[from] std::io::Error),
    #[error("serialization error: {message}")]
    #[diagnostic(code("convo.serialization"))]
    Serialization {
        message: String,
        #[source_code]
        src: String,
        #[label("here")]
        span: SourceSpan,
    },
}

impl ConvoError {
    /// Serialization failure with no source text to point into.
    pub fn serialization(message: impl std::fmt::Display) -> Self {
        Self::Serialization {
            message: message.to_string(),
            src: String::new(),
            span: (0, 0).into(),
        }
    }

    /// Wraps a serde_json error, pointing the label at the failing line and column.
    pub fn from_json(err: &serde_json::Error, src: &str) -> Self {
        let offset = line_col_to_offset(src, err.line(), err.column());
        Self::Serialization {
            message: err.to_string(),
            src: src.to_string(),
            span: (offset, 0).into(),
        }
    }
}

fn line_col_to_offset(src: &str, line: usize, column: usize) -> usize {
    if line == 0 {
        return 0;
    }
    let line_start: usize = src
        .split_inclusive('\n')
        .take(line - 1)
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(src.len())
}
