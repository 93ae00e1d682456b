//! Error types for kodex-parser.

use crate::language::Language;

/// Recoverable failure to turn one source file into code units.
///
/// Callers log it against the file path and move on to the next file.
#[derive(Debug, thiserror::Error)]
pub enum ParseFailure {
    /// Source bytes are not valid UTF-8.
    #[error("source is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),

    /// The tree contained syntax errors and no structurally sound unit survived.
    #[error("syntax errors in {path}")]
    Syntax { path: String },

    /// Grammar could not be loaded into the parsing engine.
    #[error("grammar setup failed: {0}")]
    Grammar(String),

    /// The parsing engine returned no tree.
    #[error("parser produced no tree for {path}")]
    NoTree { path: String },

    /// Grammar for this language is not compiled in.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(Language),
}

/// Result type alias using `ParseFailure`.
pub type Result<T> = std::result::Result<T, ParseFailure>;
