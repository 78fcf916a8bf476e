//! Token stream over a tree-sitter concrete syntax tree
//!
//! Flattens a CST into classified leaf tokens. Comments and string literals
//! count as one token each and are not descended into, so their contents
//! never contribute identifiers or operators. Every token carries the block
//! nesting depth of its position relative to the walk root.

use tree_sitter::{Node, Parser, Tree};

use crate::error::UnitError;
use crate::models::Language;

/// Lexical class of a leaf token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenClass {
    Comment,
    StringLit,
    Number,
    Identifier,
    Keyword,
    /// Operators and punctuation
    Symbol,
}

#[derive(Debug, Clone)]
pub(crate) struct Token<'a> {
    pub class: TokenClass,
    pub text: &'a str,
    pub start_row: usize,
    pub end_row: usize,
    pub end_col: usize,
    pub depth: usize,
    /// Kind of the enclosing node, used to tell `<` in generics from `<` in comparisons
    pub parent_kind: &'static str,
}

/// Map a language onto its bundled grammar.
pub(crate) fn grammar(language: Language) -> tree_sitter::Language {
    match language {
        Language::Rust => tree_sitter_rust::LANGUAGE.into(),
        Language::Python => tree_sitter_python::LANGUAGE.into(),
        Language::Java => tree_sitter_java::LANGUAGE.into(),
        Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
        Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
        Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        Language::Go => tree_sitter_go::LANGUAGE.into(),
        Language::C => tree_sitter_c::LANGUAGE.into(),
        Language::Cpp => tree_sitter_cpp::LANGUAGE.into(),
        Language::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
    }
}

/// Parse `source`, failing if the tree contains syntax errors.
pub(crate) fn parse(source: &str, language: Language) -> Result<Tree, UnitError> {
    let mut parser = Parser::new();
    parser
        .set_language(&grammar(language))
        .map_err(|e| UnitError::Parse(format!("failed to load {language} grammar: {e}")))?;

    let tree = parser
        .parse(source, None)
        .ok_or_else(|| UnitError::Parse(format!("{language} parser produced no tree")))?;

    let root = tree.root_node();
    if root.has_error() {
        let line = first_error_line(&root).map(|l| l + 1).unwrap_or(1);
        return Err(UnitError::Parse(format!(
            "{language} syntax error near line {line}"
        )));
    }

    Ok(tree)
}

fn first_error_line(node: &Node) -> Option<usize> {
    if node.is_error() || node.is_missing() {
        return Some(node.start_position().row);
    }
    for child in node.children(&mut node.walk()) {
        if child.has_error() {
            if let Some(line) = first_error_line(&child) {
                return Some(line);
            }
        }
    }
    None
}

/// Collect classified tokens under `root`, depth measured from `root`.
pub(crate) fn tokens<'a>(root: &Node, source: &'a str) -> Vec<Token<'a>> {
    let mut out = Vec::new();
    collect(root, source, 0, &mut out);
    out
}

impl Token<'_> {
    /// Last row holding text of the token. Rust line comments swallow their
    /// newline and end at column 0 of the following row.
    pub fn last_row(&self) -> usize {
        if self.end_col == 0 && self.end_row > self.start_row {
            self.end_row - 1
        } else {
            self.end_row
        }
    }
}

fn collect<'a>(node: &Node, source: &'a str, depth: usize, out: &mut Vec<Token<'a>>) {
    let kind = node.kind();

    if is_comment_node(kind) {
        push(node, source, TokenClass::Comment, depth, out);
        return;
    }

    if node.is_named() && is_string_node(kind) {
        push(node, source, TokenClass::StringLit, depth, out);
        return;
    }

    if node.child_count() == 0 {
        if let Some(class) = classify_leaf(node, source) {
            push(node, source, class, depth, out);
        }
        return;
    }

    let child_depth = if is_block_node(kind) { depth + 1 } else { depth };
    for child in node.children(&mut node.walk()) {
        collect(&child, source, child_depth, out);
    }
}

fn push<'a>(node: &Node, source: &'a str, class: TokenClass, depth: usize, out: &mut Vec<Token<'a>>) {
    let text = node.utf8_text(source.as_bytes()).unwrap_or("");
    out.push(Token {
        class,
        text,
        start_row: node.start_position().row,
        end_row: node.end_position().row,
        end_col: node.end_position().column,
        depth,
        parent_kind: node.parent().map(|p| p.kind()).unwrap_or(""),
    });
}

fn classify_leaf(node: &Node, source: &str) -> Option<TokenClass> {
    let kind = node.kind();
    let text = node.utf8_text(source.as_bytes()).ok()?;
    if text.trim().is_empty() {
        // Zero-width or layout tokens (Python INDENT/NEWLINE)
        return None;
    }

    let first = text.chars().next()?;
    let word_like = text.chars().all(|c| c.is_alphanumeric() || c == '_');

    if node.is_named() {
        if kind.ends_with("identifier") || kind == "name" {
            return Some(TokenClass::Identifier);
        }
        if first.is_ascii_digit() || is_number_kind(kind) {
            return Some(TokenClass::Number);
        }
        if word_like {
            // true/false/null/self, primitive type names
            return Some(TokenClass::Keyword);
        }
        return Some(TokenClass::Symbol);
    }

    if word_like && !first.is_ascii_digit() {
        Some(TokenClass::Keyword)
    } else {
        Some(TokenClass::Symbol)
    }
}

/// Check if a node kind represents a comment.
fn is_comment_node(kind: &str) -> bool {
    kind == "comment" || kind.ends_with("_comment")
}

/// Check if a named node kind represents a string or character literal.
fn is_string_node(kind: &str) -> bool {
    kind.contains("string")
        || matches!(
            kind,
            "char_literal" | "character_literal" | "rune_literal" | "text_block"
        )
}

fn is_number_kind(kind: &str) -> bool {
    kind.contains("integer")
        || kind.contains("float")
        || kind.contains("number")
        || matches!(kind, "int_literal" | "real_literal" | "imaginary_literal")
}

/// Nodes that open one level of nesting.
fn is_block_node(kind: &str) -> bool {
    kind == "block"
        || kind.ends_with("_block")
        || kind.ends_with("_body")
        || matches!(
            kind,
            "compound_statement"
                | "declaration_list"
                | "field_declaration_list"
                | "enum_variant_list"
        )
}
