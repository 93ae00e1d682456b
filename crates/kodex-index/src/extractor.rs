//! Per-file fault isolation around parsing.

use std::panic::{AssertUnwindSafe, catch_unwind};

use kodex_parser::{CodeUnit, ParserRegistry};

use crate::filter::ScanTarget;

/// Units of one file, plus whether the file failed.
#[derive(Debug, Default)]
pub struct FileOutcome {
    pub units: Vec<CodeUnit>,
    /// Read, decode, parse or engine failure. `units` is empty when set.
    pub failed: bool,
}

impl FileOutcome {
    fn failed() -> Self {
        Self {
            units: Vec::new(),
            failed: true,
        }
    }
}

/// Read `target`, parse it with the registry's parser for its language and
/// return the units. Never propagates: every failure is logged against the
/// file path and yields an empty, failed outcome.
pub fn extract(target: &ScanTarget, registry: &mut ParserRegistry) -> FileOutcome {
    let source = match std::fs::read(&target.path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(file = %target.rel_path, error = %e, "failed to read file");
            return FileOutcome::failed();
        }
    };

    let parser = match registry.for_language(target.language) {
        Ok(parser) => parser,
        Err(e) => {
            tracing::warn!(file = %target.rel_path, error = %e, "no parser available");
            return FileOutcome::failed();
        }
    };

    let parsed = catch_unwind(AssertUnwindSafe(|| {
        parser.parse(&source, &target.rel_path)
    }));
    match parsed {
        Ok(Ok(units)) => {
            tracing::debug!(file = %target.rel_path, units = units.len(), "parsed");
            FileOutcome {
                units,
                failed: false,
            }
        }
        Ok(Err(e)) => {
            tracing::warn!(file = %target.rel_path, error = %e, "failed to parse file");
            FileOutcome::failed()
        }
        Err(_) => {
            tracing::warn!(file = %target.rel_path, language = %target.language, "parser panicked, rebuilding");
            registry.evict(target.language);
            FileOutcome::failed()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use kodex_parser::Language;

    use super::*;

    fn target(dir: &tempfile::TempDir, name: &str, body: &[u8], language: Language) -> ScanTarget {
        let path = dir.path().join(name);
        std::fs::write(&path, body).unwrap();
        ScanTarget {
            path,
            rel_path: name.to_string(),
            language,
        }
    }

    #[test]
    fn three_python_functions() {
        let dir = tempfile::tempdir().unwrap();
        let t = target(
            &dir,
            "funcs.py",
            b"def a():\n    pass\n\ndef b(x):\n    return x\n\ndef c(x, y):\n    return x + y\n",
            Language::Python,
        );
        let mut registry = ParserRegistry::new();
        let outcome = extract(&t, &mut registry);
        assert!(!outcome.failed);
        let names: Vec<&str> = outcome.units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(outcome.units.iter().all(|u| u.file_path == "funcs.py"));
    }

    #[test]
    fn syntax_error_fails_file() {
        let dir = tempfile::tempdir().unwrap();
        let t = target(&dir, "broken.py", b"def (:\n  ]]]\n", Language::Python);
        let outcome = extract(&t, &mut ParserRegistry::new());
        assert!(outcome.failed);
        assert!(outcome.units.is_empty());
    }

    #[test]
    fn invalid_utf8_fails_file() {
        let dir = tempfile::tempdir().unwrap();
        let t = target(&dir, "latin1.go", b"package x\n// \xff\xfe\n", Language::Go);
        assert!(extract(&t, &mut ParserRegistry::new()).failed);
    }

    #[test]
    fn missing_file_fails_without_panicking() {
        let t = ScanTarget {
            path: PathBuf::from("/no/such/file.rs"),
            rel_path: "file.rs".into(),
            language: Language::Rust,
        };
        assert!(extract(&t, &mut ParserRegistry::new()).failed);
    }

    #[test]
    fn file_without_functions_is_not_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let t = target(&dir, "consts.py", b"X = 1\nY = 2\n", Language::Python);
        let outcome = extract(&t, &mut ParserRegistry::new());
        assert!(!outcome.failed);
        assert!(outcome.units.is_empty());
    }
}
