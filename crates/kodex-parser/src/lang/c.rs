use tree_sitter::Node;

use super::c_family;
use crate::language::Language;
use crate::parser::{LanguageRules, SyntaxParser};
use crate::unit::Argument;

pub type CParser = SyntaxParser<CRules>;

const STORAGE_MODIFIERS: &[&str] = &["static", "extern", "inline"];

#[derive(Debug, Default)]
pub struct CRules;

impl LanguageRules for CRules {
    const LANGUAGE: Language = Language::C;

    fn unit_kinds(&self) -> &'static [&'static str] {
        &["function_definition"]
    }

    fn container_kinds(&self) -> &'static [&'static str] {
        &[]
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
        c_family::leading_keywords(node, STORAGE_MODIFIERS, src)
    }

    fn docstring(&self, _node: Node<'_>, leading: &[Node<'_>], src: &str) -> Option<String> {
        c_family::docstring(leading, src)
    }

    fn branch_kinds(&self) -> &'static [&'static str] {
        c_family::BRANCH_KINDS
    }

    fn is_branch(&self, node: Node<'_>, _src: &str) -> bool {
        c_family::is_branch(node, &[])
    }

    fn callee(&self, node: Node<'_>, src: &str) -> Option<String> {
        c_family::callee(node, src)
    }

    fn imports(&self, root: Node<'_>, src: &str) -> Vec<String> {
        c_family::includes(root, src)
    }
}
