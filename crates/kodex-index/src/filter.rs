//! Source tree walk deciding which files reach a parser.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use ignore::{DirEntry, WalkBuilder};
use kodex_parser::{Language, detect_language};

/// Bytes inspected for a NUL when classifying binary files.
pub const BINARY_SNIFF_LEN: u64 = 8192;

/// Gitignore-style patterns anchored at the scan root.
#[derive(Debug, Clone)]
pub struct IgnoreRules {
    matcher: Gitignore,
}

impl IgnoreRules {
    /// Compile `spec`, one pattern per line. Blank lines and `#` comments are
    /// skipped.
    ///
    /// # Errors
    ///
    /// Returns the first pattern that fails to compile.
    pub fn parse(root: &Path, spec: &str) -> Result<Self, ignore::Error> {
        let mut builder = GitignoreBuilder::new(root);
        for line in spec.lines() {
            builder.add_line(None, line)?;
        }
        Ok(Self {
            matcher: builder.build()?,
        })
    }

    /// Whether `rel_path` (relative to the root) or any of its parent
    /// directories is excluded.
    #[must_use]
    pub fn is_ignored(&self, rel_path: &Path, is_dir: bool) -> bool {
        self.matcher
            .matched_path_or_any_parents(rel_path, is_dir)
            .is_ignore()
    }

    #[must_use]
    pub fn pattern_count(&self) -> u64 {
        self.matcher.num_ignores()
    }
}

/// A file admitted for parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub path: PathBuf,
    /// Path relative to the scan root with `/` separators.
    pub rel_path: String,
    pub language: Language,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Ignored,
    Binary,
    /// I/O error while sniffing; handled like a binary file.
    Unreadable,
    UnsupportedExtension,
    LanguageExcluded,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::Binary => "binary",
            Self::Unreadable => "unreadable",
            Self::UnsupportedExtension => "unsupported extension",
            Self::LanguageExcluded => "language excluded",
        }
    }
}

/// Outcome of inspecting one regular file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovered {
    Target(ScanTarget),
    Skipped { path: PathBuf, reason: SkipReason },
}

/// Walks a root directory and classifies every regular file.
///
/// Checks run in order: ignore patterns, binary sniff, extension table,
/// language allowlist. Ignored directories are pruned without descending.
#[derive(Debug, Clone)]
pub struct IngestFilter {
    root: PathBuf,
    rules: Arc<IgnoreRules>,
    languages: Vec<Language>,
}

impl IngestFilter {
    /// # Errors
    ///
    /// Returns an error if `ignore_spec` contains an invalid pattern.
    pub fn new(
        root: impl Into<PathBuf>,
        ignore_spec: &str,
        languages: Vec<Language>,
    ) -> Result<Self, ignore::Error> {
        let root = root.into();
        let rules = IgnoreRules::parse(&root, ignore_spec)?;
        Ok(Self {
            root,
            rules: Arc::new(rules),
            languages,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walk the root in file-name order.
    pub fn eligible(&self) -> impl Iterator<Item = Discovered> + '_ {
        let root = self.root.clone();
        let rules = Arc::clone(&self.rules);
        let walker = WalkBuilder::new(&self.root)
            .standard_filters(false)
            .hidden(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| keep_entry(&root, &rules, entry))
            .build();

        walker.filter_map(move |entry| match entry {
            Ok(entry) if entry.file_type().is_some_and(|ft| ft.is_file()) => {
                Some(self.classify(entry.into_path()))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "directory walk error");
                None
            }
        })
    }

    fn classify(&self, path: PathBuf) -> Discovered {
        let rel = relative(&self.root, &path);
        if self.rules.is_ignored(&rel, false) {
            return skipped(path, SkipReason::Ignored);
        }
        match sniff_binary(&path) {
            Ok(true) => return skipped(path, SkipReason::Binary),
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(file = %path.display(), error = %e, "unreadable file treated as binary");
                return skipped(path, SkipReason::Unreadable);
            }
        }
        let Some(language) = detect_language(&path) else {
            return skipped(path, SkipReason::UnsupportedExtension);
        };
        if !self.languages.is_empty() && !self.languages.contains(&language) {
            return skipped(path, SkipReason::LanguageExcluded);
        }
        Discovered::Target(ScanTarget {
            rel_path: rel.to_string_lossy().replace('\\', "/"),
            path,
            language,
        })
    }
}

fn skipped(path: PathBuf, reason: SkipReason) -> Discovered {
    tracing::debug!(file = %path.display(), reason = reason.as_str(), "skipped");
    Discovered::Skipped { path, reason }
}

fn relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

fn keep_entry(root: &Path, rules: &IgnoreRules, entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_some_and(|ft| ft.is_dir()) {
        return true;
    }
    !rules.is_ignored(&relative(root, entry.path()), true)
}

/// True when the first [`BINARY_SNIFF_LEN`] bytes contain a NUL.
fn sniff_binary(path: &Path) -> std::io::Result<bool> {
    let mut head = Vec::with_capacity(usize::try_from(BINARY_SNIFF_LEN).unwrap_or(8192));
    File::open(path)?
        .take(BINARY_SNIFF_LEN)
        .read_to_end(&mut head)?;
    Ok(head.contains(&0))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use proptest::prelude::*;

    use super::*;

    fn write(root: &Path, rel: &str, contents: &[u8]) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    fn targets(filter: &IngestFilter) -> Vec<String> {
        filter
            .eligible()
            .filter_map(|d| match d {
                Discovered::Target(t) => Some(t.rel_path),
                Discovered::Skipped { .. } => None,
            })
            .collect()
    }

    fn reason_of(filter: &IngestFilter, rel: &str) -> Option<SkipReason> {
        let wanted = filter.root().join(rel);
        filter.eligible().find_map(|d| match d {
            Discovered::Skipped { path, reason } if path == wanted => Some(reason),
            _ => None,
        })
    }

    #[test]
    fn pyc_ignored_single_target() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "app.py", b"def a():\n    pass\n");
        write(dir.path(), "app.pyc", b"\x00\x01compiled");
        let filter = IngestFilter::new(dir.path(), "*.pyc\n", vec![]).unwrap();

        assert_eq!(targets(&filter), vec!["app.py"]);
        assert_eq!(reason_of(&filter, "app.pyc"), Some(SkipReason::Ignored));
    }

    #[test]
    fn gitignore_semantics() {
        let dir = tempfile::tempdir().unwrap();
        for rel in [
            "build/gen.c",
            "src/build/keep.c",
            "src/main.c",
            "src/out",
            "out/x.go",
            "a/b/generated/z.rs",
            "vendor.rs",
        ] {
            write(dir.path(), rel, b"int x;\n");
        }
        let spec = "# comment line\n\n/build\nout/\n**/generated/\nvendor.*\n";
        let filter = IngestFilter::new(dir.path(), spec, vec![]).unwrap();

        let mut got = targets(&filter);
        got.sort();
        assert_eq!(got, vec!["src/build/keep.c", "src/main.c"]);
        // `out/` is directory-only, so the file src/out is skipped for its extension
        assert_eq!(
            reason_of(&filter, "src/out"),
            Some(SkipReason::UnsupportedExtension)
        );
    }

    #[test]
    fn nul_byte_marks_binary_for_every_language() {
        let dir = tempfile::tempdir().unwrap();
        let exts = ["py", "rs", "go", "java", "c", "h", "cpp", "cc", "cxx", "hpp", "hh", "hxx"];
        for ext in exts {
            let mut body = b"int f() { return 0; }\n".to_vec();
            body.push(0);
            write(dir.path(), &format!("bin.{ext}"), &body);
        }
        let filter = IngestFilter::new(dir.path(), "", vec![]).unwrap();
        assert!(targets(&filter).is_empty());
        for ext in exts {
            assert_eq!(
                reason_of(&filter, &format!("bin.{ext}")),
                Some(SkipReason::Binary)
            );
        }
    }

    #[test]
    fn nul_after_sniff_window_is_not_binary() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = vec![b'#'; 8192];
        body.push(0);
        write(dir.path(), "late.py", &body);
        let filter = IngestFilter::new(dir.path(), "", vec![]).unwrap();
        assert_eq!(targets(&filter), vec!["late.py"]);
    }

    #[test]
    fn allowlist_and_extension_table() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.py", b"x = 1\n");
        write(dir.path(), "b.RS", b"fn b() {}\n");
        write(dir.path(), "c.go", b"package c\n");
        write(dir.path(), "d.js", b"function d() {}\n");
        let filter =
            IngestFilter::new(dir.path(), "", vec![Language::Python, Language::Rust]).unwrap();

        assert_eq!(targets(&filter), vec!["a.py", "b.RS"]);
        assert_eq!(reason_of(&filter, "c.go"), Some(SkipReason::LanguageExcluded));
        assert_eq!(
            reason_of(&filter, "d.js"),
            Some(SkipReason::UnsupportedExtension)
        );
    }

    #[test]
    fn hidden_files_are_walked() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), ".tools/gen.py", b"def g():\n    pass\n");
        let filter = IngestFilter::new(dir.path(), "", vec![]).unwrap();
        assert_eq!(targets(&filter), vec![".tools/gen.py"]);
    }

    #[test]
    fn ignore_rules_count_patterns() {
        let rules = IgnoreRules::parse(Path::new("/src"), "# c\n*.o\n\nbuild/\n").unwrap();
        assert_eq!(rules.pattern_count(), 2);
        assert!(rules.is_ignored(Path::new("x/y.o"), false));
        assert!(rules.is_ignored(Path::new("build/a.c"), false));
        assert!(!rules.is_ignored(Path::new("src/y.c"), false));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn walk_agrees_with_per_path_matching(
            files in proptest::collection::btree_set("[ab]{1,2}/[cd]{1,2}\\.(py|c|txt)", 1..12),
            patterns in proptest::collection::vec("(a|b|ab|c|d)(/|\\.py|\\.c)?", 0..4),
        ) {
            let dir = tempfile::tempdir().unwrap();
            for rel in &files {
                write(dir.path(), rel, b"x\n");
            }
            let spec = patterns.join("\n");
            let filter = IngestFilter::new(dir.path(), &spec, vec![]).unwrap();
            let rules = IgnoreRules::parse(dir.path(), &spec).unwrap();

            let mut walked = targets(&filter);
            walked.sort();
            let expected: Vec<String> = files
                .iter()
                .filter(|rel| !rules.is_ignored(Path::new(rel.as_str()), false))
                .filter(|rel| !rel.ends_with(".txt"))
                .cloned()
                .collect();
            prop_assert_eq!(walked, expected);
        }
    }
}
