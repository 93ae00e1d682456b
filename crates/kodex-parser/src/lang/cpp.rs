use tree_sitter::Node;

use super::c_family;
use crate::language::Language;
use crate::parser::{LanguageRules, SyntaxParser};
use crate::syntax::{children, push_unique, text};
use crate::unit::Argument;

pub type CppParser = SyntaxParser<CppRules>;

const LEADING_MODIFIERS: &[&str] = &[
    "static",
    "extern",
    "inline",
    "virtual",
    "explicit",
    "constexpr",
];

const TRAILING_MODIFIERS: &[&str] = &["const", "override", "final"];

const CLASS_KINDS: &[&str] = &["class_specifier", "struct_specifier", "union_specifier"];

#[derive(Debug, Default)]
pub struct CppRules;

impl CppRules {
    /// Access level of a member definition: the nearest preceding
    /// `public:`/`private:`/`protected:` label, else the class-key default.
    fn access(anchor: Node<'_>, src: &str) -> Option<String> {
        let list = anchor
            .parent()
            .filter(|p| p.kind() == "field_declaration_list")?;
        let class = list.parent().filter(|p| CLASS_KINDS.contains(&p.kind()))?;

        let mut cursor = anchor.prev_named_sibling();
        while let Some(prev) = cursor {
            if prev.kind() == "access_specifier" {
                return Some(text(prev, src).trim_end_matches(':').trim().to_string());
            }
            cursor = prev.prev_named_sibling();
        }

        let default = if class.kind() == "class_specifier" {
            "private"
        } else {
            "public"
        };
        Some(default.to_string())
    }
}

impl LanguageRules for CppRules {
    const LANGUAGE: Language = Language::Cpp;

    fn unit_kinds(&self) -> &'static [&'static str] {
        &["function_definition"]
    }

    fn container_kinds(&self) -> &'static [&'static str] {
        CLASS_KINDS
    }

    fn name(&self, node: Node<'_>, src: &str) -> Option<String> {
        c_family::function_name(node, src)
    }

    fn arguments(&self, node: Node<'_>, src: &str) -> Vec<Argument> {
        c_family::arguments(node, src)
    }

    fn return_type(&self, node: Node<'_>, src: &str) -> Option<String> {
        c_family::return_type(node, src)
    }

    fn modifiers(&self, node: Node<'_>, src: &str) -> Vec<String> {
        let anchor = self.anchor(node);
        let mut modifiers: Vec<String> = Self::access(anchor, src).into_iter().collect();

        if node.parent().is_some_and(|p| p.kind() == "friend_declaration") {
            push_unique(&mut modifiers, "friend".to_string());
        }
        for keyword in c_family::leading_keywords(node, LEADING_MODIFIERS, src) {
            push_unique(&mut modifiers, keyword);
        }

        if let Some((decl, _)) = c_family::function_declarator(node, src) {
            let params = decl.child_by_field_name("parameters").map(|p| p.id());
            for child in children(decl)
                .into_iter()
                .skip_while(|c| Some(c.id()) != params)
                .skip(1)
            {
                let word = text(child, src).trim();
                if TRAILING_MODIFIERS.contains(&word) {
                    push_unique(&mut modifiers, word.to_string());
                } else if word.starts_with("noexcept") {
                    push_unique(&mut modifiers, "noexcept".to_string());
                }
            }
        }
        modifiers
    }

    fn docstring(&self, _node: Node<'_>, leading: &[Node<'_>], src: &str) -> Option<String> {
        c_family::docstring(leading, src)
    }

    fn branch_kinds(&self) -> &'static [&'static str] {
        c_family::BRANCH_KINDS
    }

    fn is_branch(&self, node: Node<'_>, _src: &str) -> bool {
        c_family::is_branch(node, &["for_range_loop", "catch_clause"])
    }

    fn callee(&self, node: Node<'_>, src: &str) -> Option<String> {
        c_family::callee(node, src)
    }

    fn imports(&self, root: Node<'_>, src: &str) -> Vec<String> {
        c_family::includes(root, src)
    }

    fn anchor<'t>(&self, node: Node<'t>) -> Node<'t> {
        let mut anchor = node;
        while let Some(parent) = anchor
            .parent()
            .filter(|p| matches!(p.kind(), "template_declaration" | "friend_declaration"))
        {
            anchor = parent;
        }
        anchor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::testing::{find, parse};
    use crate::unit::{Scope, UnitKind};

    const SAMPLE: &str = r"#include <string>
#include <vector>

namespace geo {

/// Base shape.
class Shape {
public:
    explicit Shape(int sides) : sides_(sides) {}

    virtual double area() const {
        return 0.0;
    }

    int sides() const noexcept { return sides_; }

private:
    int sides_;
    void reset(int value = 0) {
        sides_ = value;
    }
};

struct Point {
    int x;
    int y;
    int sum() const { return x + y; }
};

// Bounds a value.
template <typename T>
T clamp(T v, T lo, T hi) {
    return v < lo ? lo : (v > hi ? hi : v);
}

}  // namespace geo

double Circle::area() const {
    return 3.14 * r_ * r_;
}
";

    #[test]
    fn class_members_carry_access_and_specifiers() {
        let units = parse::<CppRules>(SAMPLE);
        let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["Shape", "area", "sides", "reset", "sum", "clamp", "area"]
        );

        let ctor = find(&units, "Shape");
        assert_eq!(ctor.scope, Scope::Class);
        assert_eq!(ctor.kind, UnitKind::Method);
        assert_eq!(ctor.modifiers, vec!["public", "explicit"]);
        assert_eq!(ctor.return_type, None);
        assert_eq!(ctor.argument_names(), vec!["sides"]);

        let area = find(&units, "area");
        assert_eq!(area.modifiers, vec!["public", "virtual", "const"]);
        assert_eq!(area.return_type.as_deref(), Some("double"));

        let sides = find(&units, "sides");
        assert_eq!(sides.modifiers, vec!["public", "const", "noexcept"]);
    }

    #[test]
    fn private_section_and_defaulted_parameter() {
        let units = parse::<CppRules>(SAMPLE);
        let reset = find(&units, "reset");
        assert_eq!(reset.modifiers, vec!["private"]);
        assert_eq!(reset.argument_names(), vec!["value"]);
        assert_eq!(reset.arguments[0].type_name.as_deref(), Some("int"));
    }

    #[test]
    fn struct_members_default_to_public() {
        let units = parse::<CppRules>(SAMPLE);
        let sum = find(&units, "sum");
        assert_eq!(sum.scope, Scope::Class);
        assert_eq!(sum.modifiers, vec!["public", "const"]);
    }

    #[test]
    fn template_function_includes_template_line_and_comment() {
        let units = parse::<CppRules>(SAMPLE);
        let clamp = find(&units, "clamp");
        assert!(clamp.code.starts_with("// Bounds a value.\ntemplate <typename T>"));
        assert_eq!(clamp.docstring.as_deref(), Some("Bounds a value."));
        assert_eq!(clamp.scope, Scope::Global);
        assert_eq!(clamp.argument_names(), vec!["v", "lo", "hi"]);
        assert_eq!(clamp.return_type.as_deref(), Some("T"));
        assert_eq!(clamp.complexity, 3);
        assert!(clamp.modifiers.is_empty());
    }

    #[test]
    fn out_of_line_definition_is_lexically_global() {
        let units = parse::<CppRules>(SAMPLE);
        let circle_area = units.last().unwrap();
        assert_eq!(circle_area.name, "area");
        assert_eq!(circle_area.scope, Scope::Global);
        assert_eq!(circle_area.kind, UnitKind::Function);
        assert_eq!(circle_area.modifiers, vec!["const"]);
        assert_eq!(circle_area.imports, vec!["string", "vector"]);
    }
}
