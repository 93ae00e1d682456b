use tree_sitter::Node;

use crate::language::Language;
use crate::parser::{LanguageRules, SyntaxParser};
use crate::syntax::{
    children, field_text, join_comment_block, named_children, push_unique, text, trailing_name,
};
use crate::unit::Argument;

pub type RustParser = SyntaxParser<RustRules>;

const FUNCTION_MODIFIERS: &[&str] = &["async", "unsafe", "const", "default"];

#[derive(Debug, Default)]
pub struct RustRules;

impl LanguageRules for RustRules {
    const LANGUAGE: Language = Language::Rust;

    fn unit_kinds(&self) -> &'static [&'static str] {
        &["function_item"]
    }

    fn container_kinds(&self) -> &'static [&'static str] {
        &["impl_item", "trait_item"]
    }

    fn comment_kinds(&self) -> &'static [&'static str] {
        &["line_comment", "block_comment"]
    }

    fn leading_kinds(&self) -> &'static [&'static str] {
        &["line_comment", "block_comment", "attribute_item"]
    }

    fn name(&self, node: Node<'_>, src: &str) -> Option<String> {
        field_text(node, "name", src)
    }

    fn arguments(&self, node: Node<'_>, src: &str) -> Vec<Argument> {
        let Some(params) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };
        named_children(params)
            .into_iter()
            .filter(|p| p.kind() == "parameter")
            .filter_map(|p| {
                let name = field_text(p, "pattern", src)?;
                Some(Argument::new(name, field_text(p, "type", src)))
            })
            .collect()
    }

    fn return_type(&self, node: Node<'_>, src: &str) -> Option<String> {
        field_text(node, "return_type", src)
    }

    fn modifiers(&self, node: Node<'_>, src: &str) -> Vec<String> {
        let mut modifiers = Vec::new();
        for child in children(node) {
            match child.kind() {
                "visibility_modifier" => push_unique(&mut modifiers, text(child, src).to_string()),
                "function_modifiers" => {
                    for m in children(child) {
                        if m.kind() == "extern_modifier" {
                            push_unique(&mut modifiers, "extern".to_string());
                        } else if FUNCTION_MODIFIERS.contains(&m.kind()) {
                            push_unique(&mut modifiers, m.kind().to_string());
                        }
                    }
                }
                _ => {}
            }
        }
        modifiers
    }

    /// `///`, `//!` and `/** */` comments of the leading block; plain
    /// comments and attributes are skipped.
    fn docstring(&self, _node: Node<'_>, leading: &[Node<'_>], src: &str) -> Option<String> {
        let docs = leading.iter().map(|n| text(*n, src)).filter(|raw| {
            let raw = raw.trim_start();
            raw.starts_with("///") || raw.starts_with("//!") || raw.starts_with("/**")
        });
        join_comment_block(docs, "\n")
    }

    fn branch_kinds(&self) -> &'static [&'static str] {
        &[
            "if_expression",
            "for_expression",
            "while_expression",
            "match_arm",
        ]
    }

    fn callee(&self, node: Node<'_>, src: &str) -> Option<String> {
        if node.kind() != "call_expression" {
            return None;
        }
        trailing_name(node.child_by_field_name("function")?, src)
    }

    fn imports(&self, root: Node<'_>, src: &str) -> Vec<String> {
        let mut imports = Vec::new();
        for item in named_children(root) {
            if item.kind() != "use_declaration" {
                continue;
            }
            if let Some(arg) = item.child_by_field_name("argument") {
                let path = text(arg, src).split_whitespace().collect::<Vec<_>>().join(" ");
                push_unique(&mut imports, path);
            }
        }
        imports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseFailure;
    use crate::lang::testing::{find, parse};
    use crate::parser::LanguageParser;
    use crate::unit::{Scope, UnitKind};

    const SAMPLE: &str = r#"use std::collections::HashMap;
use std::fmt::{self, Display};

/// Adds two numbers.
///
/// Returns the sum.
pub fn add(a: i32, b: i32) -> i32 {
    a + b
}

// helper kept private

fn helper() {}

pub struct Counter {
    hits: HashMap<String, u32>,
}

impl Counter {
    #[must_use]
    pub(crate) async fn bump(&mut self, key: &str) -> u32 {
        // count it
        let n = self.hits.entry(key.to_string()).or_insert(0);
        if *n > 10 && key.is_empty() {
            return 0;
        }
        match key {
            "a" => 1,
            _ => helper_two(),
        }
    }
}

unsafe fn raw() {
    fn nested() {}
    nested();
}
"#;

    #[test]
    fn extracts_free_functions_methods_and_nested() {
        let units = parse::<RustRules>(SAMPLE);
        let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["add", "helper", "bump", "raw", "nested"]);
    }

    #[test]
    fn doc_comment_block_is_part_of_span() {
        let units = parse::<RustRules>(SAMPLE);
        let add = find(&units, "add");
        assert_eq!(add.start_line, 4);
        assert_eq!(add.end_line, 9);
        assert!(add.code.starts_with("/// Adds two numbers."));
        assert_eq!(
            add.docstring.as_deref(),
            Some("Adds two numbers.\nReturns the sum.")
        );
        assert_eq!(add.argument_names(), vec!["a", "b"]);
        assert_eq!(add.arguments[1].type_name.as_deref(), Some("i32"));
        assert_eq!(add.return_type.as_deref(), Some("i32"));
        assert_eq!(add.modifiers, vec!["pub"]);
        assert_eq!(add.complexity, 1);
        assert_eq!(add.scope, Scope::Global);
        assert_eq!(
            add.imports,
            vec!["std::collections::HashMap", "std::fmt::{self, Display}"]
        );
    }

    #[test]
    fn comment_separated_by_blank_line_is_not_attached() {
        let units = parse::<RustRules>(SAMPLE);
        let helper = find(&units, "helper");
        assert_eq!(helper.start_line, 13);
        assert_eq!(helper.code, "fn helper() {}");
        assert_eq!(helper.docstring, None);
    }

    #[test]
    fn impl_method_metadata() {
        let units = parse::<RustRules>(SAMPLE);
        let bump = find(&units, "bump");

        assert_eq!(bump.kind, UnitKind::Method);
        assert_eq!(bump.scope, Scope::Class);
        assert!(bump.code.starts_with("    #[must_use]"));
        assert_eq!(bump.argument_names(), vec!["key"]);
        assert_eq!(bump.modifiers, vec!["pub(crate)", "async"]);
        assert_eq!(bump.comments, vec!["// count it"]);
        // if + && + two match arms
        assert_eq!(bump.complexity, 5);
        for call in ["entry", "to_string", "or_insert", "is_empty", "helper_two"] {
            assert!(bump.calls.iter().any(|c| c == call), "missing {call}");
        }
        assert_eq!(bump.calls.len(), 5);
    }

    #[test]
    fn nested_fn_is_local() {
        let units = parse::<RustRules>(SAMPLE);
        let raw = find(&units, "raw");
        assert_eq!(raw.modifiers, vec!["unsafe"]);
        assert_eq!(raw.calls, vec!["nested"]);
        assert_eq!(find(&units, "nested").scope, Scope::Local);
    }

    #[test]
    fn unrecoverable_source_fails() {
        let mut parser = RustParser::new().unwrap();
        let err = parser.parse(b"fn (", "broken.rs");
        assert!(matches!(err, Err(ParseFailure::Syntax { .. })));
    }
}
