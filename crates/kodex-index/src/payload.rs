//! Flat point payload consumed by the search layer.

use std::collections::HashMap;

use kodex_parser::CodeUnit;
use serde_json::{Value, json};

/// Keys present in every payload.
pub const PAYLOAD_KEYS: [&str; 17] = [
    "function_name",
    "file_path",
    "start_line",
    "end_line",
    "language",
    "function_type",
    "code",
    "arguments",
    "return_type",
    "docstring",
    "modifiers",
    "scope",
    "imports",
    "calls",
    "complexity",
    "loc",
    "comment_lines",
];

#[must_use]
pub fn build_payload(unit: &CodeUnit) -> HashMap<String, Value> {
    let values = [
        json!(unit.name),
        json!(unit.file_path),
        json!(unit.start_line),
        json!(unit.end_line),
        json!(unit.language.id()),
        json!(unit.kind.as_str()),
        json!(unit.code),
        json!(unit.argument_names()),
        json!(unit.return_type),
        json!(unit.docstring),
        json!(unit.modifiers),
        json!(unit.scope.as_str()),
        json!(unit.imports),
        json!(unit.calls),
        json!(unit.complexity),
        json!(unit.loc),
        json!(unit.comment_lines),
    ];
    PAYLOAD_KEYS
        .iter()
        .map(|k| (*k).to_string())
        .zip(values)
        .collect()
}

#[cfg(test)]
mod tests {
    use kodex_parser::{Argument, Language, Scope, UnitKind};

    use super::*;

    fn unit() -> CodeUnit {
        CodeUnit {
            name: "multiply".into(),
            code: "static int multiply(int a, int b) {\n    return a * b;\n}".into(),
            file_path: "src/math.c".into(),
            start_line: 3,
            end_line: 5,
            start_column: 0,
            end_column: 1,
            language: Language::C,
            kind: UnitKind::Function,
            arguments: vec![
                Argument::new("a", Some("int".into())),
                Argument::new("b", Some("int".into())),
            ],
            return_type: Some("int".into()),
            docstring: None,
            comments: vec![],
            modifiers: vec!["static".into()],
            scope: Scope::Global,
            imports: vec!["stdio.h".into()],
            calls: vec![],
            complexity: 1,
            loc: 3,
            comment_lines: 0,
        }
    }

    #[test]
    fn payload_has_exactly_the_fixed_keys() {
        let payload = build_payload(&unit());
        assert_eq!(payload.len(), PAYLOAD_KEYS.len());
        for key in PAYLOAD_KEYS {
            assert!(payload.contains_key(key), "missing {key}");
        }
    }

    #[test]
    fn payload_values_have_expected_shapes() {
        let payload = build_payload(&unit());
        assert_eq!(payload["function_name"], json!("multiply"));
        assert_eq!(payload["language"], json!("c"));
        assert_eq!(payload["function_type"], json!("function"));
        assert_eq!(payload["scope"], json!("global"));
        assert_eq!(payload["arguments"], json!(["a", "b"]));
        assert_eq!(payload["modifiers"], json!(["static"]));
        assert_eq!(payload["return_type"], json!("int"));
        assert_eq!(payload["docstring"], Value::Null);
        assert_eq!(payload["start_line"], json!(3));
        assert_eq!(payload["complexity"], json!(1));
        assert_eq!(payload["calls"], json!([]));
    }
}
