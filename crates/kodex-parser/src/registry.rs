//! Lazily populated language-to-parser map.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::error::{ParseFailure, Result};
use crate::language::Language;
use crate::parser::LanguageParser;

/// One parser per language, built on first use and reused afterwards.
///
/// Parsers wrap a non-reentrant engine, so a registry belongs to exactly one
/// worker; concurrent workers each construct their own.
#[derive(Default)]
pub struct ParserRegistry {
    parsers: HashMap<Language, Box<dyn LanguageParser>>,
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserRegistry")
            .field("loaded", &self.loaded())
            .finish()
    }
}

impl ParserRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parser for `language`, constructing it the first time it is requested.
    ///
    /// # Errors
    ///
    /// Returns [`ParseFailure::UnsupportedLanguage`] when the grammar is not
    /// compiled in, or a grammar error if the engine rejects it.
    pub fn for_language(&mut self, language: Language) -> Result<&mut dyn LanguageParser> {
        let parser = match self.parsers.entry(language) {
            Entry::Occupied(slot) => slot.into_mut(),
            Entry::Vacant(slot) => {
                let parser = build(language)?;
                tracing::debug!(%language, "parser constructed");
                slot.insert(parser)
            }
        };
        Ok(parser.as_mut())
    }

    /// Drop a parser whose internal state can no longer be trusted (after a
    /// panic inside the engine). The next request rebuilds it.
    pub fn evict(&mut self, language: Language) {
        self.parsers.remove(&language);
    }

    /// Languages with a constructed parser, sorted.
    #[must_use]
    pub fn loaded(&self) -> Vec<Language> {
        let mut langs: Vec<Language> = self.parsers.keys().copied().collect();
        langs.sort();
        langs
    }
}

fn build(language: Language) -> Result<Box<dyn LanguageParser>> {
    use crate::lang;

    let parser: Box<dyn LanguageParser> = match language {
        #[cfg(feature = "lang-python")]
        Language::Python => Box::new(lang::python::PythonParser::new()?),
        #[cfg(feature = "lang-rust")]
        Language::Rust => Box::new(lang::rust::RustParser::new()?),
        #[cfg(feature = "lang-go")]
        Language::Go => Box::new(lang::go::GoParser::new()?),
        #[cfg(feature = "lang-java")]
        Language::Java => Box::new(lang::java::JavaParser::new()?),
        #[cfg(feature = "lang-c")]
        Language::C => Box::new(lang::c::CParser::new()?),
        #[cfg(feature = "lang-cpp")]
        Language::Cpp => Box::new(lang::cpp::CppParser::new()?),
        #[allow(unreachable_patterns)]
        other => return Err(ParseFailure::UnsupportedLanguage(other)),
    };
    Ok(parser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsers_are_built_once_per_language() {
        let mut registry = ParserRegistry::new();
        assert!(registry.loaded().is_empty());

        let units = registry
            .for_language(Language::Python)
            .unwrap()
            .parse(b"def a():\n    pass\n", "a.py")
            .unwrap();
        assert_eq!(units.len(), 1);

        registry.for_language(Language::Python).unwrap();
        registry.for_language(Language::Go).unwrap();
        assert_eq!(registry.loaded(), vec![Language::Python, Language::Go]);
    }

    #[test]
    fn every_language_resolves_to_matching_parser() {
        let mut registry = ParserRegistry::new();
        for lang in Language::ALL {
            let parser = registry.for_language(lang).unwrap();
            assert_eq!(parser.language(), lang);
        }
    }

    #[test]
    fn evict_forces_rebuild() {
        let mut registry = ParserRegistry::new();
        registry.for_language(Language::C).unwrap();
        registry.evict(Language::C);
        assert!(registry.loaded().is_empty());
        registry.for_language(Language::C).unwrap();
        assert_eq!(registry.loaded(), vec![Language::C]);
    }
}
