//! Tree-walking helpers shared by every language variant.

use std::ops::Range;

use tree_sitter::Node;

/// Source text covered by `node`.
pub(crate) fn text<'s>(node: Node<'_>, src: &'s str) -> &'s str {
    &src[node.byte_range()]
}

/// Owned text of an optional field child.
pub(crate) fn field_text(node: Node<'_>, field: &str, src: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| text(n, src).trim().to_string())
        .filter(|s| !s.is_empty())
}

pub(crate) fn children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

pub(crate) fn named_children(node: Node<'_>) -> Vec<Node<'_>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Pre-order visit of `node` and every descendant.
pub(crate) fn for_each_descendant<'t>(node: Node<'t>, mut f: impl FnMut(Node<'t>)) {
    let mut cursor = node.walk();
    loop {
        f(cursor.node());
        if cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// True when only whitespace precedes `node` on its first line.
pub(crate) fn starts_line(node: Node<'_>, src: &str) -> bool {
    let start = node.start_byte();
    let line_start = src[..start].rfind('\n').map_or(0, |i| i + 1);
    src[line_start..start].trim().is_empty()
}

/// Last row holding text of `node`. Nodes that swallow their trailing
/// newline end at column 0 of the following row.
pub(crate) fn last_row(node: Node<'_>) -> usize {
    let start = node.start_position();
    let end = node.end_position();
    if end.column == 0 && end.row > start.row {
        end.row - 1
    } else {
        end.row
    }
}

/// `&&` / `||` binary expression, spelled the same in every C-family grammar.
pub(crate) fn is_short_circuit(node: Node<'_>) -> bool {
    node.kind() == "binary_expression"
        && node
            .child_by_field_name("operator")
            .is_some_and(|op| matches!(op.kind(), "&&" | "||"))
}

/// Strip comment markers and `*` gutters, keeping non-empty lines.
pub(crate) fn comment_body_lines(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    let inner = if let Some(rest) = trimmed.strip_prefix("/*") {
        let rest = rest.strip_suffix("*/").unwrap_or(rest);
        rest.trim_start_matches(['*', '!'])
    } else {
        trimmed
    };

    inner
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line
                .strip_prefix("///")
                .or_else(|| line.strip_prefix("//!"))
                .or_else(|| line.strip_prefix("//"))
                .or_else(|| line.strip_prefix('#'))
                .or_else(|| line.strip_prefix('*'))
                .unwrap_or(line);
            line.trim().to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

/// Join the cleaned bodies of a comment block; `None` when nothing is left.
pub(crate) fn join_comment_block<'a>(
    raws: impl IntoIterator<Item = &'a str>,
    sep: &str,
) -> Option<String> {
    let lines: Vec<String> = raws.into_iter().flat_map(comment_body_lines).collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join(sep))
    }
}

/// Remove string-literal quoting (`"`, `'`, triple quotes, `<>` for system includes).
pub(crate) fn unquote(raw: &str) -> String {
    let s = raw.trim();
    let s = match s.find(['"', '\'']) {
        Some(i) if i <= 3 && s[..i].chars().all(|c| c.is_ascii_alphabetic()) => &s[i..],
        _ => s,
    };
    for q in ["\"\"\"", "'''", "\"", "'", "`"] {
        if let Some(inner) = s.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner.trim().to_string();
        }
    }
    if let Some(inner) = s.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
        return inner.trim().to_string();
    }
    s.to_string()
}

/// Rightmost identifier of a callee expression: `a.b.c` gives `c`,
/// `x::y` gives `y`, `f::<T>` gives `f`.
pub(crate) fn trailing_name(node: Node<'_>, src: &str) -> Option<String> {
    let mut current = node;
    while let Some(next) = ["attribute", "field", "name", "function"]
        .iter()
        .find_map(|f| current.child_by_field_name(f))
    {
        current = next;
    }
    let name = text(current, src).trim();
    let is_ident = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '~');
    is_ident.then(|| name.to_string())
}

pub(crate) fn push_unique(list: &mut Vec<String>, value: String) {
    if !value.is_empty() && !list.contains(&value) {
        list.push(value);
    }
}

/// Byte offsets of line starts, for slicing whole-line spans.
pub(crate) struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub(crate) fn new(src: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(src.match_indices('\n').map(|(i, _)| i + 1));
        Self {
            starts,
            len: src.len(),
        }
    }

    /// Byte range of rows `first..=last` (0-based), excluding the final `\n`.
    pub(crate) fn span(&self, first: usize, last: usize) -> Range<usize> {
        let start = self.starts.get(first).copied().unwrap_or(self.len);
        let end = self
            .starts
            .get(last + 1)
            .map_or(self.len, |next| next.saturating_sub(1));
        start..end.max(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comment_body_lines_strips_markers() {
        assert_eq!(comment_body_lines("/// Adds two"), vec!["Adds two"]);
        assert_eq!(comment_body_lines("# note"), vec!["note"]);
        assert_eq!(
            comment_body_lines("/**\n * Greet a person\n * by name\n */"),
            vec!["Greet a person", "by name"]
        );
        assert!(comment_body_lines("/* */").is_empty());
    }

    #[test]
    fn join_comment_block_none_when_empty() {
        assert_eq!(join_comment_block(["//", "//"], "\n"), None);
        assert_eq!(
            join_comment_block(["// a", "// b"], "\n").as_deref(),
            Some("a\nb")
        );
    }

    #[test]
    fn unquote_variants() {
        assert_eq!(unquote("\"fmt\""), "fmt");
        assert_eq!(unquote("<stdio.h>"), "stdio.h");
        assert_eq!(unquote("\"\"\"Doc string.\"\"\""), "Doc string.");
        assert_eq!(unquote("r'raw'"), "raw");
    }

    #[test]
    fn push_unique_keeps_first_order() {
        let mut list = Vec::new();
        for name in ["b", "a", "b", "", "c"] {
            push_unique(&mut list, name.to_string());
        }
        assert_eq!(list, vec!["b", "a", "c"]);
    }

    #[test]
    fn line_index_span_excludes_trailing_newline() {
        let src = "one\ntwo\nthree\n";
        let idx = LineIndex::new(src);
        assert_eq!(&src[idx.span(0, 0)], "one");
        assert_eq!(&src[idx.span(1, 2)], "two\nthree");
        assert_eq!(&src[idx.span(3, 3)], "");
    }
}
