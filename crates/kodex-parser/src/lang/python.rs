use std::ops::Range;

use tree_sitter::Node;

use crate::language::Language;
use crate::parser::{LanguageRules, SyntaxParser};
use crate::syntax::{field_text, named_children, push_unique, text, trailing_name, unquote};
use crate::unit::Argument;

pub type PythonParser = SyntaxParser<PythonRules>;

const DECORATOR_MODIFIERS: &[&str] = &["staticmethod", "classmethod", "property", "abstractmethod"];

#[derive(Debug, Default)]
pub struct PythonRules;

impl LanguageRules for PythonRules {
    const LANGUAGE: Language = Language::Python;

    fn unit_kinds(&self) -> &'static [&'static str] {
        &["function_definition"]
    }

    fn container_kinds(&self) -> &'static [&'static str] {
        &["class_definition"]
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
            .filter_map(|param| {
                let (name_node, type_name) = match param.kind() {
                    "identifier" => (Some(param), None),
                    "default_parameter" => (param.child_by_field_name("name"), None),
                    "typed_default_parameter" => (
                        param.child_by_field_name("name"),
                        field_text(param, "type", src),
                    ),
                    "typed_parameter" => (param.named_child(0), field_text(param, "type", src)),
                    "list_splat_pattern" | "dictionary_splat_pattern" => (Some(param), None),
                    _ => (None, None),
                };
                let name = bare_name(name_node?, src);
                (name != "self" && !name.is_empty()).then(|| Argument::new(name, type_name))
            })
            .collect()
    }

    fn return_type(&self, node: Node<'_>, src: &str) -> Option<String> {
        field_text(node, "return_type", src)
    }

    fn modifiers(&self, node: Node<'_>, src: &str) -> Vec<String> {
        let mut modifiers = Vec::new();
        if node.child(0).is_some_and(|c| c.kind() == "async") {
            modifiers.push("async".to_string());
        }
        if let Some(decorated) = node.parent().filter(|p| p.kind() == "decorated_definition") {
            for decorator in named_children(decorated)
                .into_iter()
                .filter(|c| c.kind() == "decorator")
            {
                let expr = text(decorator, src).trim_start_matches('@').trim();
                let head = expr.split('(').next().unwrap_or(expr);
                let last = head.rsplit('.').next().unwrap_or(head).trim();
                if DECORATOR_MODIFIERS.contains(&last) {
                    push_unique(&mut modifiers, last.to_string());
                }
            }
        }
        modifiers
    }

    /// First statement of the body when it is a bare string literal.
    fn docstring(&self, node: Node<'_>, _leading: &[Node<'_>], src: &str) -> Option<String> {
        let first = self.body(node)?.named_child(0)?;
        if first.kind() != "expression_statement" {
            return None;
        }
        let literal = first.named_child(0).filter(|n| n.kind() == "string")?;
        let raw = unquote(text(literal, src));
        let cleaned: Vec<&str> = raw.lines().map(str::trim).collect();
        let joined = cleaned.join("\n").trim().to_string();
        (!joined.is_empty()).then_some(joined)
    }

    fn branch_kinds(&self) -> &'static [&'static str] {
        &[
            "if_statement",
            "elif_clause",
            "for_statement",
            "while_statement",
            "except_clause",
            "conditional_expression",
            "boolean_operator",
            "case_clause",
            "for_in_clause",
            "if_clause",
        ]
    }

    fn callee(&self, node: Node<'_>, src: &str) -> Option<String> {
        if node.kind() != "call" {
            return None;
        }
        trailing_name(node.child_by_field_name("function")?, src)
    }

    fn imports(&self, root: Node<'_>, src: &str) -> Vec<String> {
        let mut imports = Vec::new();
        for stmt in named_children(root) {
            match stmt.kind() {
                "import_statement" => {
                    for name in named_children(stmt) {
                        push_unique(&mut imports, imported_name(name, src));
                    }
                }
                "import_from_statement" => {
                    let Some(module) = stmt.child_by_field_name("module_name") else {
                        continue;
                    };
                    let module_text = text(module, src).to_string();
                    for name in named_children(stmt) {
                        if name.id() == module.id() {
                            continue;
                        }
                        let symbol = if name.kind() == "wildcard_import" {
                            "*".to_string()
                        } else {
                            imported_name(name, src)
                        };
                        push_unique(&mut imports, format!("{module_text}.{symbol}"));
                    }
                }
                _ => {}
            }
        }
        imports
    }

    /// Comments opening a block hang off the definition ahead of the
    /// `block` node, so the range starts right after the header's `:`.
    fn body_range(&self, node: Node<'_>) -> Option<Range<usize>> {
        let body = self.body(node)?;
        let mut cursor = node.walk();
        let start = node
            .children(&mut cursor)
            .filter(|c| c.kind() == ":" && c.end_byte() <= body.start_byte())
            .last()
            .map_or(body.start_byte(), |colon| colon.end_byte());
        Some(start..node.end_byte())
    }

    fn anchor<'t>(&self, node: Node<'t>) -> Node<'t> {
        node.parent()
            .filter(|p| p.kind() == "decorated_definition")
            .unwrap_or(node)
    }

    fn hoisting_block<'t>(&self, node: Node<'t>) -> Option<Node<'t>> {
        node.parent().filter(|p| p.kind() == "block")
    }
}

/// `*args` and `**kwargs` are reported without their sigils.
fn bare_name(node: Node<'_>, src: &str) -> String {
    text(node, src).trim_start_matches('*').trim().to_string()
}

fn imported_name(node: Node<'_>, src: &str) -> String {
    let target = if node.kind() == "aliased_import" {
        node.child_by_field_name("name").unwrap_or(node)
    } else {
        node
    };
    text(target, src).to_string()
}
