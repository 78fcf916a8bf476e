//! Function and method scope discovery
//!
//! Finds the function-like nodes of a parsed file so each one can be scored
//! on its own. Nested functions are reported separately and are also part of
//! their enclosing function's feature vector.

use tree_sitter::Node;

use crate::models::{Language, ScopeSpan};

/// A function-like node and its display name.
pub(crate) struct Scope<'t> {
    pub node: Node<'t>,
    pub span: ScopeSpan,
}

/// Collect every function-like scope under `root`, in source order.
pub(crate) fn find_scopes<'t>(root: &Node<'t>, source: &str, language: Language) -> Vec<Scope<'t>> {
    let mut scopes = Vec::new();
    walk(root, source, language, &mut scopes);
    scopes
}

fn walk<'t>(node: &Node<'t>, source: &str, language: Language, out: &mut Vec<Scope<'t>>) {
    if is_scope_node(node, language) {
        let name = scope_name(node, source, language).unwrap_or_else(|| "<anonymous>".to_string());
        out.push(Scope {
            node: *node,
            span: ScopeSpan {
                name,
                kind: node.kind().to_string(),
                start_line: node.start_position().row + 1,
                end_line: node.end_position().row + 1,
            },
        });
    }
    for child in node.children(&mut node.walk()) {
        walk(&child, source, language, out);
    }
}

fn is_scope_node(node: &Node, language: Language) -> bool {
    let kind = node.kind();
    match language {
        Language::Rust => kind == "function_item",
        Language::Python => kind == "function_definition",
        Language::Java => matches!(kind, "method_declaration" | "constructor_declaration"),
        Language::CSharp => matches!(
            kind,
            "method_declaration" | "constructor_declaration" | "local_function_statement"
        ),
        Language::Go => matches!(kind, "function_declaration" | "method_declaration"),
        Language::C | Language::Cpp => kind == "function_definition",
        Language::JavaScript | Language::TypeScript | Language::Tsx => match kind {
            "function_declaration" | "generator_function_declaration" | "method_definition" => true,
            // `const handler = () => {...}` counts, inline callbacks do not
            "arrow_function" | "function_expression" | "function" => node
                .parent()
                .is_some_and(|p| p.kind() == "variable_declarator"),
            _ => false,
        },
    }
}

fn scope_name(node: &Node, source: &str, language: Language) -> Option<String> {
    let bytes = source.as_bytes();
    match language {
        Language::C | Language::Cpp => {
            // function_definition -> declarator (function_declarator) -> declarator (name)
            let mut current = node.child_by_field_name("declarator")?;
            while let Some(inner) = current.child_by_field_name("declarator") {
                current = inner;
            }
            current.utf8_text(bytes).ok().map(str::to_string)
        }
        Language::JavaScript | Language::TypeScript | Language::Tsx
            if node.child_by_field_name("name").is_none() =>
        {
            let parent = node.parent()?;
            let name = parent.child_by_field_name("name")?;
            name.utf8_text(bytes).ok().map(str::to_string)
        }
        _ => {
            let name = node.child_by_field_name("name")?;
            name.utf8_text(bytes).ok().map(str::to_string)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::syntax;

    fn names(source: &str, language: Language) -> Vec<(String, usize, usize)> {
        let tree = syntax::parse(source, language).unwrap();
        find_scopes(&tree.root_node(), source, language)
            .into_iter()
            .map(|s| (s.span.name, s.span.start_line, s.span.end_line))
            .collect()
    }

    #[test]
    fn test_rust_functions() {
        let source = "fn a() {}\n\nimpl S {\n    fn b(&self) {\n        let _ = 1;\n    }\n}\n";
        assert_eq!(
            names(source, Language::Rust),
            vec![("a".into(), 1, 1), ("b".into(), 4, 6)]
        );
    }

    #[test]
    fn test_java_methods_and_constructors() {
        let source = "class A {\n  A() {}\n  int get() { return 1; }\n}\n";
        let found: Vec<String> = names(source, Language::Java)
            .into_iter()
            .map(|(n, _, _)| n)
            .collect();
        assert_eq!(found, vec!["A", "get"]);
    }

    #[test]
    fn test_c_function_name_through_declarator() {
        let source = "static int *make(int n) {\n  return 0;\n}\n";
        let found = names(source, Language::C);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, "make");
    }

    #[test]
    fn test_js_arrow_assigned_to_variable() {
        let source = "const handler = (x) => {\n  return x;\n};\n[1].map((y) => y);\n";
        let found: Vec<String> = names(source, Language::JavaScript)
            .into_iter()
            .map(|(n, _, _)| n)
            .collect();
        assert_eq!(found, vec!["handler"]);
    }

    #[test]
    fn test_python_nested_functions() {
        let source = "def outer():\n    def inner():\n        pass\n    return inner\n";
        let found: Vec<String> = names(source, Language::Python)
            .into_iter()
            .map(|(n, _, _)| n)
            .collect();
        assert_eq!(found, vec!["outer", "inner"]);
    }
}
