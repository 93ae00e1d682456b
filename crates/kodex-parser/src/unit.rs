//! The code-unit record produced by every language parser.

use serde::{Deserialize, Serialize};

use crate::language::Language;

/// Kind of callable a unit represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnitKind {
    Function,
    Method,
    /// Reserved for languages without method-level decomposition; none of the
    /// supported languages emit it.
    ClassBlock,
}

impl UnitKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Method => "method",
            Self::ClassBlock => "class-block",
        }
    }
}

/// Lexical scope a unit is declared in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Global,
    Class,
    Local,
}

impl Scope {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "global",
            Self::Class => "class",
            Self::Local => "local",
        }
    }
}

/// One declared parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Argument {
    pub name: String,
    /// Declared type text, when the grammar exposes one.
    pub type_name: Option<String>,
}

impl Argument {
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: Option<String>) -> Self {
        Self {
            name: name.into(),
            type_name,
        }
    }
}

/// One extracted function or method with its source span and derived metadata.
///
/// `code` is exactly lines `start_line..=end_line` (1-based) of the source,
/// joined by `\n`, including any documentation comment block attached above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeUnit {
    pub name: String,
    pub code: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub start_column: usize,
    pub end_column: usize,
    pub language: Language,
    pub kind: UnitKind,
    pub arguments: Vec<Argument>,
    pub return_type: Option<String>,
    pub docstring: Option<String>,
    pub comments: Vec<String>,
    pub modifiers: Vec<String>,
    pub scope: Scope,
    pub imports: Vec<String>,
    pub calls: Vec<String>,
    pub complexity: u32,
    pub loc: usize,
    pub comment_lines: usize,
}

impl CodeUnit {
    /// Argument names in declaration order.
    #[must_use]
    pub fn argument_names(&self) -> Vec<&str> {
        self.arguments.iter().map(|a| a.name.as_str()).collect()
    }
}
