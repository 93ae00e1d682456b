use tree_sitter::Node;

use crate::language::Language;
use crate::parser::{LanguageRules, SyntaxParser};
use crate::syntax::{
    children, field_text, is_short_circuit, join_comment_block, named_children, push_unique, text,
    trailing_name,
};
use crate::unit::Argument;

pub type JavaParser = SyntaxParser<JavaRules>;

const MODIFIER_KEYWORDS: &[&str] = &[
    "public",
    "private",
    "protected",
    "static",
    "final",
    "abstract",
    "synchronized",
    "native",
];

#[derive(Debug, Default)]
pub struct JavaRules;

impl LanguageRules for JavaRules {
    const LANGUAGE: Language = Language::Java;

    fn unit_kinds(&self) -> &'static [&'static str] {
        &["method_declaration", "constructor_declaration"]
    }

    fn container_kinds(&self) -> &'static [&'static str] {
        &[
            "class_declaration",
            "interface_declaration",
            "enum_declaration",
            "record_declaration",
            "annotation_type_declaration",
            "object_creation_expression",
        ]
    }

    fn comment_kinds(&self) -> &'static [&'static str] {
        &["line_comment", "block_comment"]
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
            .filter_map(|param| match param.kind() {
                "formal_parameter" => Some(Argument::new(
                    field_text(param, "name", src)?,
                    field_text(param, "type", src),
                )),
                "spread_parameter" => {
                    let declarator = named_children(param)
                        .into_iter()
                        .find(|c| c.kind() == "variable_declarator")?;
                    Some(Argument::new(field_text(declarator, "name", src)?, None))
                }
                _ => None,
            })
            .collect()
    }

    fn return_type(&self, node: Node<'_>, src: &str) -> Option<String> {
        field_text(node, "type", src)
    }

    fn modifiers(&self, node: Node<'_>, src: &str) -> Vec<String> {
        let mut modifiers = Vec::new();
        for group in children(node).into_iter().filter(|c| c.kind() == "modifiers") {
            for m in children(group) {
                let keyword = text(m, src);
                if MODIFIER_KEYWORDS.contains(&keyword) {
                    push_unique(&mut modifiers, keyword.to_string());
                }
            }
        }
        modifiers
    }

    /// Javadoc (`/** */`) directly above the declaration, flattened to one line.
    fn docstring(&self, _node: Node<'_>, leading: &[Node<'_>], src: &str) -> Option<String> {
        let javadoc = leading
            .iter()
            .rev()
            .map(|n| text(*n, src))
            .find(|raw| raw.starts_with("/**"))?;
        join_comment_block([javadoc], " ")
    }

    fn branch_kinds(&self) -> &'static [&'static str] {
        &[
            "if_statement",
            "for_statement",
            "enhanced_for_statement",
            "while_statement",
            "do_statement",
            "catch_clause",
            "ternary_expression",
        ]
    }

    fn is_branch(&self, node: Node<'_>, src: &str) -> bool {
        if node.kind() == "switch_label" {
            return text(node, src).trim_start().starts_with("case");
        }
        self.branch_kinds().contains(&node.kind()) || is_short_circuit(node)
    }

    fn callee(&self, node: Node<'_>, src: &str) -> Option<String> {
        if node.kind() != "method_invocation" {
            return None;
        }
        trailing_name(node, src)
    }

    fn imports(&self, root: Node<'_>, src: &str) -> Vec<String> {
        let mut imports = Vec::new();
        for decl in named_children(root) {
            if decl.kind() != "import_declaration" {
                continue;
            }
            let path: String = text(decl, src)
                .trim()
                .trim_start_matches("import")
                .trim_end_matches(';')
                .trim()
                .trim_start_matches("static ")
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            push_unique(&mut imports, path);
        }
        imports
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::testing::{find, parse};
    use crate::unit::{Scope, UnitKind};

    #[test]
    fn public_class_with_public_and_private_method() {
        let src = r"public class Sample {
    public int add(int a, int b) {
        return a + b;
    }

    private void reset() {
    }
}
";
        let units = parse::<JavaRules>(src);
        assert_eq!(units.len(), 2);

        let add = find(&units, "add");
        assert_eq!(add.scope, Scope::Class);
        assert_eq!(add.kind, UnitKind::Method);
        assert_eq!(add.modifiers, vec!["public"]);
        assert_eq!(add.argument_names(), vec!["a", "b"]);
        assert_eq!(add.return_type.as_deref(), Some("int"));

        let reset = find(&units, "reset");
        assert_eq!(reset.scope, Scope::Class);
        assert_eq!(reset.modifiers, vec!["private"]);
        assert!(reset.arguments.is_empty());
    }

    const GREETER: &str = r"package demo;

import java.util.List;
import static java.lang.Math.max;

public class Greeter {
    private final String prefix;

    /**
     * Creates a greeter.
     * @param prefix the prefix
     */
    public Greeter(String prefix) {
        this.prefix = prefix;
    }

    @Override
    public String greet(String name, int... times) {
        // build it
        return prefix + name.trim();
    }

    private static int clamp(int v) {
        return v > 10 ? 10 : max(v, 0);
    }
}
";

    #[test]
    fn constructor_with_javadoc() {
        let units = parse::<JavaRules>(GREETER);
        assert_eq!(units.len(), 3);

        let ctor = find(&units, "Greeter");
        assert_eq!(ctor.start_line, 9);
        assert!(ctor.code.trim_start().starts_with("/**"));
        assert_eq!(
            ctor.docstring.as_deref(),
            Some("Creates a greeter. @param prefix the prefix")
        );
        assert_eq!(ctor.modifiers, vec!["public"]);
        assert_eq!(ctor.return_type, None);
        assert_eq!(ctor.comment_lines, 4);
        assert_eq!(ctor.imports, vec!["java.util.List", "java.lang.Math.max"]);
    }

    #[test]
    fn annotated_method_and_varargs() {
        let units = parse::<JavaRules>(GREETER);

        let greet = find(&units, "greet");
        assert!(greet.code.trim_start().starts_with("@Override"));
        assert_eq!(greet.argument_names(), vec!["name", "times"]);
        assert_eq!(greet.return_type.as_deref(), Some("String"));
        assert_eq!(greet.comments, vec!["// build it"]);
        assert_eq!(greet.calls, vec!["trim"]);
        assert_eq!(greet.modifiers, vec!["public"]);

        let clamp = find(&units, "clamp");
        assert_eq!(clamp.modifiers, vec!["private", "static"]);
        assert_eq!(clamp.complexity, 2);
        assert_eq!(clamp.calls, vec!["max"]);
    }
}
