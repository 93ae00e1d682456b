//! Multi-language structural parsing into function-level code units.
//!
//! Tree-sitter grammars for Python, Rust, Go, Java, C and C++ share one
//! extraction engine ([`parser::SyntaxParser`]); each language contributes a
//! rule set describing where names, parameters, docs and branches live.
//! A [`ParserRegistry`] owns one parser per language and must not be shared
//! between threads.

pub mod error;
pub mod lang;
pub mod language;
pub mod metrics;
pub mod parser;
pub mod registry;
pub(crate) mod syntax;
pub mod unit;

pub use error::{ParseFailure, Result};
pub use language::{Language, UnknownLanguage, detect_language};
pub use parser::LanguageParser;
pub use registry::ParserRegistry;
pub use unit::{Argument, CodeUnit, Scope, UnitKind};
