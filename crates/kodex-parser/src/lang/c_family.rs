//! Declarator handling shared by the C and C++ rules.
//!
//! Both grammars wrap a function's name and parameters in a chain of
//! pointer/reference/parenthesized declarators; names, parameter lists and
//! pointer markers on the return type all come from walking that chain.

use tree_sitter::Node;

use crate::parser::leading_texts;
use crate::syntax::{
    children, for_each_descendant, is_short_circuit, join_comment_block, named_children,
    push_unique, text, trailing_name, unquote,
};
use crate::unit::Argument;

pub(super) const BRANCH_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "while_statement",
    "do_statement",
    "conditional_expression",
];

fn inner_declarator(node: Node<'_>) -> Option<Node<'_>> {
    node.child_by_field_name("declarator")
        .or_else(|| node.named_child(0))
}

/// The `function_declarator` under a definition, plus the `*`/`&` markers
/// crossed on the way down.
pub(super) fn function_declarator<'t>(node: Node<'t>, src: &str) -> Option<(Node<'t>, String)> {
    let mut current = node.child_by_field_name("declarator")?;
    let mut markers = String::new();
    loop {
        match current.kind() {
            "function_declarator" => return Some((current, markers)),
            "pointer_declarator" => markers.push('*'),
            "reference_declarator" => {
                markers.push_str(if text(current, src).starts_with("&&") {
                    "&&"
                } else {
                    "&"
                });
            }
            "parenthesized_declarator" | "attributed_declarator" => {}
            _ => return None,
        }
        current = inner_declarator(current)?;
    }
}

/// Function name with any `ns::Type::` qualification dropped.
pub(super) fn function_name(node: Node<'_>, src: &str) -> Option<String> {
    let (decl, _) = function_declarator(node, src)?;
    let mut target = decl.child_by_field_name("declarator")?;
    while matches!(target.kind(), "qualified_identifier" | "template_function") {
        target = target.child_by_field_name("name")?;
    }
    Some(text(target, src).trim().to_string())
}

/// Identifier bound by a (possibly nested) parameter declarator.
fn declared_name(mut node: Node<'_>, src: &str) -> Option<String> {
    loop {
        match node.kind() {
            "identifier" | "field_identifier" => return Some(text(node, src).to_string()),
            "pointer_declarator"
            | "reference_declarator"
            | "array_declarator"
            | "function_declarator"
            | "parenthesized_declarator"
            | "attributed_declarator" => node = inner_declarator(node)?,
            _ => return None,
        }
    }
}

fn declarator_markers(mut node: Node<'_>) -> String {
    let mut markers = String::new();
    loop {
        match node.kind() {
            "pointer_declarator" => markers.push('*'),
            "reference_declarator" => markers.push('&'),
            "parenthesized_declarator" | "attributed_declarator" => {}
            _ => return markers,
        }
        match inner_declarator(node) {
            Some(next) => node = next,
            None => return markers,
        }
    }
}

/// `const` prefix, base type text and pointer markers.
fn spelled_type(owner: Node<'_>, markers: &str, src: &str) -> Option<String> {
    let base = owner.child_by_field_name("type")?;
    let is_const = children(owner)
        .into_iter()
        .take_while(|c| c.id() != base.id())
        .any(|c| c.kind() == "type_qualifier" && text(c, src) == "const");
    let prefix = if is_const { "const " } else { "" };
    Some(format!("{prefix}{}{markers}", text(base, src).trim()))
}

pub(super) fn return_type(node: Node<'_>, src: &str) -> Option<String> {
    let (_, markers) = function_declarator(node, src)?;
    spelled_type(node, &markers, src)
}

pub(super) fn arguments(node: Node<'_>, src: &str) -> Vec<Argument> {
    let Some((decl, _)) = function_declarator(node, src) else {
        return Vec::new();
    };
    let Some(params) = decl.child_by_field_name("parameters") else {
        return Vec::new();
    };

    named_children(params)
        .into_iter()
        .filter(|p| {
            matches!(
                p.kind(),
                "parameter_declaration" | "optional_parameter_declaration"
            )
        })
        .filter_map(|p| {
            let declarator = p.child_by_field_name("declarator")?;
            let name = declared_name(declarator, src)?;
            let markers = declarator_markers(declarator);
            Some(Argument::new(name, spelled_type(p, &markers, src)))
        })
        .collect()
}

/// Keywords from `keywords` spelled before the declarator.
pub(super) fn leading_keywords(node: Node<'_>, keywords: &[&str], src: &str) -> Vec<String> {
    let declarator = node.child_by_field_name("declarator").map(|d| d.id());
    let mut found = Vec::new();
    for child in children(node)
        .into_iter()
        .take_while(|c| Some(c.id()) != declarator)
    {
        let word = text(child, src).trim();
        if keywords.contains(&word) {
            push_unique(&mut found, word.to_string());
        }
    }
    found
}

pub(super) fn docstring(leading: &[Node<'_>], src: &str) -> Option<String> {
    join_comment_block(leading_texts(leading, src), "\n")
}

/// `case` labels with a value; `default:` is not a decision point.
pub(super) fn is_branch(node: Node<'_>, extra: &[&str]) -> bool {
    let kind = node.kind();
    if kind == "case_statement" {
        return node.child_by_field_name("value").is_some();
    }
    BRANCH_KINDS.contains(&kind) || extra.contains(&kind) || is_short_circuit(node)
}

pub(super) fn callee(node: Node<'_>, src: &str) -> Option<String> {
    if node.kind() != "call_expression" {
        return None;
    }
    trailing_name(node.child_by_field_name("function")?, src)
}

/// `#include` targets anywhere at file level, including inside
/// conditional-compilation blocks.
pub(super) fn includes(root: Node<'_>, src: &str) -> Vec<String> {
    let mut includes = Vec::new();
    for_each_descendant(root, |node| {
        if node.kind() == "preproc_include"
            && let Some(path) = node.child_by_field_name("path")
        {
            push_unique(&mut includes, unquote(text(path, src)));
        }
    });
    includes
}
