//! Tree-sitter extraction of function-level code units.
//!
//! [`SyntaxParser`] drives one parse pass and builds [`CodeUnit`]s; the
//! per-language knowledge (which node kinds are callables, where names,
//! parameters and docs live) comes from a [`LanguageRules`] implementation.

use std::ops::Range;

use tree_sitter::{Node, Parser};

use crate::error::{ParseFailure, Result};
use crate::language::Language;
use crate::metrics::{count_lines, cyclomatic_complexity};
use crate::syntax::{
    LineIndex, for_each_descendant, is_short_circuit, last_row, push_unique, starts_line, text,
};
use crate::unit::{Argument, CodeUnit, Scope, UnitKind};

/// Shared contract of every language variant.
pub trait LanguageParser: Send {
    fn language(&self) -> Language;

    /// Parse one file and return its units in source order.
    ///
    /// # Errors
    ///
    /// Returns [`ParseFailure`] when the bytes are not UTF-8, the engine
    /// yields no tree, or the tree has syntax errors and no sound unit.
    fn parse(&mut self, source: &[u8], file_path: &str) -> Result<Vec<CodeUnit>>;
}

/// Per-language hooks consulted by [`SyntaxParser`].
pub trait LanguageRules: Default + Send + 'static {
    const LANGUAGE: Language;

    /// Node kinds emitted as units.
    fn unit_kinds(&self) -> &'static [&'static str];

    /// Node kinds that make a directly nested unit a member (`class` scope).
    fn container_kinds(&self) -> &'static [&'static str];

    fn comment_kinds(&self) -> &'static [&'static str] {
        &["comment"]
    }

    /// Sibling kinds that may precede a unit as part of its leading block.
    fn leading_kinds(&self) -> &'static [&'static str] {
        self.comment_kinds()
    }

    fn name(&self, node: Node<'_>, src: &str) -> Option<String>;

    fn arguments(&self, node: Node<'_>, src: &str) -> Vec<Argument>;

    fn return_type(&self, _node: Node<'_>, _src: &str) -> Option<String> {
        None
    }

    fn modifiers(&self, _node: Node<'_>, _src: &str) -> Vec<String> {
        Vec::new()
    }

    fn body<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        node.child_by_field_name("body")
    }

    /// Byte range whose comments belong to the unit's `comments`.
    fn body_range(&self, node: Node<'_>) -> Option<Range<usize>> {
        self.body(node).map(|b| b.byte_range())
    }

    /// Documentation text, given the unit node and its leading comment block.
    fn docstring(&self, node: Node<'_>, leading: &[Node<'_>], src: &str) -> Option<String>;

    /// Node kinds counted as decision points (besides `&&`/`||`).
    fn branch_kinds(&self) -> &'static [&'static str];

    /// Extra branch test for kinds that need to look at the node itself.
    fn is_branch(&self, node: Node<'_>, _src: &str) -> bool {
        self.branch_kinds().contains(&node.kind()) || is_short_circuit(node)
    }

    /// Name of the callee when `node` is a call site.
    fn callee(&self, node: Node<'_>, src: &str) -> Option<String>;

    /// Import/include directives visible at file scope.
    fn imports(&self, root: Node<'_>, src: &str) -> Vec<String>;

    /// Node whose preceding siblings carry the unit's leading block
    /// (decorated or templated wrappers).
    fn anchor<'t>(&self, node: Node<'t>) -> Node<'t> {
        node
    }

    /// Block whose leading comments the grammar attaches to the block's
    /// owner instead, when `node` opens such a block.
    fn hoisting_block<'t>(&self, _node: Node<'t>) -> Option<Node<'t>> {
        None
    }

    /// Scope decided by the unit itself rather than by lexical nesting.
    fn scope_hint(&self, _node: Node<'_>) -> Option<Scope> {
        None
    }
}

/// Tree-sitter backed implementation of [`LanguageParser`].
///
/// Owns a non-reentrant `tree_sitter::Parser`; one instance must not be used
/// from two threads at once, which `&mut self` on [`LanguageParser::parse`]
/// enforces.
pub struct SyntaxParser<R: LanguageRules> {
    parser: Parser,
    rules: R,
}

impl<R: LanguageRules> std::fmt::Debug for SyntaxParser<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyntaxParser")
            .field("language", &R::LANGUAGE)
            .finish_non_exhaustive()
    }
}

impl<R: LanguageRules> SyntaxParser<R> {
    /// Build the grammar and a parser bound to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the grammar feature is disabled or the grammar
    /// ABI is incompatible with the linked tree-sitter runtime.
    pub fn new() -> Result<Self> {
        let grammar = R::LANGUAGE
            .grammar()
            .ok_or(ParseFailure::UnsupportedLanguage(R::LANGUAGE))?;

        let mut parser = Parser::new();
        parser
            .set_language(&grammar)
            .map_err(|e| ParseFailure::Grammar(format!("set_language failed: {e}")))?;

        Ok(Self {
            parser,
            rules: R::default(),
        })
    }
}

impl<R: LanguageRules> LanguageParser for SyntaxParser<R> {
    fn language(&self) -> Language {
        R::LANGUAGE
    }

    fn parse(&mut self, source: &[u8], file_path: &str) -> Result<Vec<CodeUnit>> {
        let src = std::str::from_utf8(source)?;
        let tree = self
            .parser
            .parse(src, None)
            .ok_or_else(|| ParseFailure::NoTree {
                path: file_path.to_string(),
            })?;
        let root = tree.root_node();

        let ctx = FileCtx {
            src,
            file_path,
            lines: LineIndex::new(src),
            imports: self.rules.imports(root, src),
            comments: comment_ranges(&self.rules, root),
        };

        let unit_kinds = self.rules.unit_kinds();
        let mut candidates = Vec::new();
        for_each_descendant(root, |node| {
            if unit_kinds.contains(&node.kind()) {
                candidates.push(node);
            }
        });

        let mut units = Vec::with_capacity(candidates.len());
        let mut rejected = 0usize;
        for node in candidates {
            if node.has_error() {
                rejected += 1;
                continue;
            }
            units.push(build_unit(&self.rules, &ctx, node));
        }

        if root.has_error() {
            if units.is_empty() {
                return Err(ParseFailure::Syntax {
                    path: file_path.to_string(),
                });
            }
            tracing::debug!(
                file = file_path,
                recovered = units.len(),
                rejected,
                "partial parse"
            );
        }

        Ok(units)
    }
}

/// Per-file state shared by every unit built from one tree.
struct FileCtx<'a> {
    src: &'a str,
    file_path: &'a str,
    lines: LineIndex,
    imports: Vec<String>,
    comments: Vec<Range<usize>>,
}

fn comment_ranges<R: LanguageRules>(rules: &R, root: Node<'_>) -> Vec<Range<usize>> {
    let kinds = rules.comment_kinds();
    let mut ranges = Vec::new();
    for_each_descendant(root, |node| {
        if kinds.contains(&node.kind()) {
            ranges.push(node.byte_range());
        }
    });
    ranges
}

fn build_unit<R: LanguageRules>(rules: &R, ctx: &FileCtx<'_>, node: Node<'_>) -> CodeUnit {
    let src = ctx.src;
    let anchor = rules.anchor(node);
    let leading = leading_block(rules, anchor, src);
    let first = leading.first().copied().unwrap_or(anchor);

    let first_row = first.start_position().row;
    let end_row = last_row(anchor);
    let end_column = if end_row == anchor.end_position().row {
        anchor.end_position().column
    } else {
        let line = ctx.lines.span(end_row, end_row);
        line.end - line.start
    };
    let span = ctx.lines.span(first_row, end_row);

    let scope = rules
        .scope_hint(node)
        .unwrap_or_else(|| lexical_scope(rules, node));
    let kind = if scope == Scope::Class {
        UnitKind::Method
    } else {
        UnitKind::Function
    };

    let body = rules.body(node);
    let comments = rules
        .body_range(node)
        .map(|range| {
            comments_within(&ctx.comments, range)
                .iter()
                .map(|c| src[c.clone()].trim().to_string())
                .collect()
        })
        .unwrap_or_default();

    let mut calls = Vec::new();
    if let Some(b) = body {
        for_each_descendant(b, |n| {
            if let Some(name) = rules.callee(n, src) {
                push_unique(&mut calls, name);
            }
        });
    }

    let line_counts = count_lines(
        src,
        span.clone(),
        comments_within(&ctx.comments, span.clone()),
    );

    CodeUnit {
        name: rules
            .name(node, src)
            .unwrap_or_else(|| "<anonymous>".to_string()),
        code: src[span].to_string(),
        file_path: ctx.file_path.to_string(),
        start_line: first_row + 1,
        end_line: end_row + 1,
        start_column: first.start_position().column,
        end_column,
        language: R::LANGUAGE,
        kind,
        arguments: rules.arguments(node, src),
        return_type: rules.return_type(node, src),
        docstring: rules.docstring(node, &leading, src),
        comments,
        modifiers: rules.modifiers(node, src),
        scope,
        imports: ctx.imports.clone(),
        calls,
        complexity: cyclomatic_complexity(body, |n| rules.is_branch(n, src)),
        loc: line_counts.effective,
        comment_lines: line_counts.comment,
    }
}

/// Contiguous run of comment-like siblings directly above `anchor`, in
/// source order. A blank line or a trailing comment ends the run.
fn leading_block<'t, R: LanguageRules>(rules: &R, anchor: Node<'t>, src: &str) -> Vec<Node<'t>> {
    let kinds = rules.leading_kinds();
    let mut block = Vec::new();
    let mut top_row = anchor.start_position().row;
    let mut cursor = preceding(rules, anchor);

    while let Some(prev) = cursor {
        if !kinds.contains(&prev.kind())
            || last_row(prev) + 1 < top_row
            || !starts_line(prev, src)
        {
            break;
        }
        top_row = prev.start_position().row;
        block.push(prev);
        cursor = preceding(rules, prev);
    }

    block.reverse();
    block
}

/// Previous named sibling, stepping out of a block whose opening comments
/// were hoisted to its owner.
fn preceding<'t, R: LanguageRules>(rules: &R, node: Node<'t>) -> Option<Node<'t>> {
    node.prev_named_sibling()
        .or_else(|| rules.hoisting_block(node)?.prev_named_sibling())
}

/// Comments lying entirely inside `range`. `comments` is in source order.
fn comments_within(comments: &[Range<usize>], range: Range<usize>) -> &[Range<usize>] {
    let from = comments.partition_point(|c| c.start < range.start);
    let to = from + comments[from..].partition_point(|c| c.end <= range.end);
    &comments[from..to]
}

/// Nearest enclosing callable makes a unit `local`, nearest enclosing type
/// makes it `class`, otherwise `global`.
fn lexical_scope<R: LanguageRules>(rules: &R, node: Node<'_>) -> Scope {
    let units = rules.unit_kinds();
    let containers = rules.container_kinds();
    let mut parent = node.parent();
    while let Some(p) = parent {
        if units.contains(&p.kind()) {
            return Scope::Local;
        }
        if containers.contains(&p.kind()) {
            return Scope::Class;
        }
        parent = p.parent();
    }
    Scope::Global
}

/// Text of the leading block's comments, for rules that accept any style.
pub(crate) fn leading_texts<'s>(leading: &[Node<'_>], src: &'s str) -> Vec<&'s str> {
    leading.iter().map(|n| text(*n, src)).collect()
}
