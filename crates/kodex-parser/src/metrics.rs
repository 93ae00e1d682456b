//! Derived metrics shared by all language variants: line classification and
//! the cyclomatic-complexity approximation.

use std::ops::Range;

use tree_sitter::Node;

use crate::syntax::for_each_descendant;

/// Line classification of a unit's span.
///
/// `effective + blank + comment == total` always holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LineCounts {
    pub total: usize,
    pub blank: usize,
    pub comment: usize,
    pub effective: usize,
}

/// Classify every line of `source[span]`.
///
/// A line is a comment line when it is not blank and every non-whitespace
/// byte on it lies inside one of `comments` (absolute byte ranges into
/// `source`, sorted and non-overlapping). Everything else that is not blank
/// is effective code.
#[must_use]
pub fn count_lines(source: &str, span: Range<usize>, comments: &[Range<usize>]) -> LineCounts {
    let mut counts = LineCounts::default();
    let mut offset = span.start;

    for line in source[span].split('\n') {
        counts.total += 1;
        let line_start = offset;
        offset += line.len() + 1;

        if line.trim().is_empty() {
            counts.blank += 1;
            continue;
        }

        let all_comment = line
            .char_indices()
            .filter(|(_, c)| !c.is_whitespace())
            .all(|(i, _)| {
                let at = line_start + i;
                let idx = comments.partition_point(|r| r.end <= at);
                comments.get(idx).is_some_and(|r| r.contains(&at))
            });

        if all_comment {
            counts.comment += 1;
        } else {
            counts.effective += 1;
        }
    }

    counts
}

/// One plus the number of nodes under `body` accepted by `is_branch`.
///
/// An approximation of `McCabe` complexity: each language supplies the node
/// kinds it treats as decision points (conditionals, loops, case arms,
/// handlers, short-circuit operators).
#[must_use]
pub fn cyclomatic_complexity(body: Option<Node<'_>>, is_branch: impl Fn(Node<'_>) -> bool) -> u32 {
    let mut complexity = 1u32;
    if let Some(body) = body {
        for_each_descendant(body, |node| {
            if is_branch(node) {
                complexity = complexity.saturating_add(1);
            }
        });
    }
    complexity
}
