use tree_sitter::Node;

use crate::language::Language;
use crate::parser::{LanguageRules, SyntaxParser, leading_texts};
use crate::syntax::{
    field_text, for_each_descendant, join_comment_block, named_children, push_unique, text,
    trailing_name, unquote,
};
use crate::unit::{Argument, Scope};

pub type GoParser = SyntaxParser<GoRules>;

#[derive(Debug, Default)]
pub struct GoRules;

impl LanguageRules for GoRules {
    const LANGUAGE: Language = Language::Go;

    fn unit_kinds(&self) -> &'static [&'static str] {
        &["function_declaration", "method_declaration"]
    }

    fn container_kinds(&self) -> &'static [&'static str] {
        &[]
    }

    fn name(&self, node: Node<'_>, src: &str) -> Option<String> {
        field_text(node, "name", src)
    }

    /// Receivers are not arguments; `a, b int` yields two arguments.
    fn arguments(&self, node: Node<'_>, src: &str) -> Vec<Argument> {
        let Some(params) = node.child_by_field_name("parameters") else {
            return Vec::new();
        };

        let mut arguments = Vec::new();
        for decl in named_children(params) {
            if !matches!(
                decl.kind(),
                "parameter_declaration" | "variadic_parameter_declaration"
            ) {
                continue;
            }
            let type_name = field_text(decl, "type", src);
            let mut cursor = decl.walk();
            for name in decl.children_by_field_name("name", &mut cursor) {
                arguments.push(Argument::new(text(name, src), type_name.clone()));
            }
        }
        arguments
    }

    fn return_type(&self, node: Node<'_>, src: &str) -> Option<String> {
        field_text(node, "result", src)
    }

    fn docstring(&self, _node: Node<'_>, leading: &[Node<'_>], src: &str) -> Option<String> {
        join_comment_block(leading_texts(leading, src), "\n")
    }

    fn branch_kinds(&self) -> &'static [&'static str] {
        &[
            "if_statement",
            "for_statement",
            "expression_case",
            "type_case",
            "communication_case",
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
        for decl in named_children(root) {
            if decl.kind() != "import_declaration" {
                continue;
            }
            for_each_descendant(decl, |spec| {
                if spec.kind() == "import_spec"
                    && let Some(path) = spec.child_by_field_name("path")
                {
                    push_unique(&mut imports, unquote(text(path, src)));
                }
            });
        }
        imports
    }

    fn scope_hint(&self, node: Node<'_>) -> Option<Scope> {
        (node.kind() == "method_declaration").then_some(Scope::Class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::testing::{find, parse};
    use crate::unit::UnitKind;

    const SAMPLE: &str = r#"package main

import (
	"fmt"
	"strings"
)

// Greet returns a greeting.
// It never fails.
func Greet(first, last string, extra ...int) (string, error) {
	if first == "" || last == "" {
		return "", fmt.Errorf("empty")
	}
	return strings.Join([]string{first, last}, " "), nil
}

type Point struct{ X, Y int }

// Move shifts the point.
func (p *Point) Move(dx int) {
	switch {
	case dx > 0:
		p.X += dx
	default:
		p.X -= dx
	}
}
"#;

    #[test]
    fn function_with_grouped_params_and_doc() {
        let units = parse::<GoRules>(SAMPLE);
        assert_eq!(units.len(), 2);

        let greet = find(&units, "Greet");
        assert_eq!(greet.start_line, 8);
        assert_eq!(greet.argument_names(), vec!["first", "last", "extra"]);
        assert_eq!(greet.arguments[0].type_name.as_deref(), Some("string"));
        assert_eq!(greet.return_type.as_deref(), Some("(string, error)"));
        assert_eq!(
            greet.docstring.as_deref(),
            Some("Greet returns a greeting.\nIt never fails.")
        );
        assert_eq!(greet.complexity, 3);
        assert_eq!(greet.calls, vec!["Errorf", "Join"]);
        assert_eq!(greet.imports, vec!["fmt", "strings"]);
        assert_eq!(greet.scope, Scope::Global);
        assert_eq!(greet.kind, UnitKind::Function);
        assert_eq!(greet.comment_lines, 2);
    }

    #[test]
    fn method_excludes_receiver() {
        let units = parse::<GoRules>(SAMPLE);
        let mv = find(&units, "Move");
        assert_eq!(mv.kind, UnitKind::Method);
        assert_eq!(mv.scope, Scope::Class);
        assert_eq!(mv.argument_names(), vec!["dx"]);
        assert_eq!(mv.docstring.as_deref(), Some("Move shifts the point."));
        assert_eq!(mv.return_type, None);
        // one expression_case; default does not count
        assert_eq!(mv.complexity, 2);
    }
}
