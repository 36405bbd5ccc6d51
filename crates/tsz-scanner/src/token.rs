//! `Token` — the immutable output unit of the scanner.

use crate::syntax_kind::SyntaxKind;
use tsz_common::Span;

/// A literal value carried by a token, already decoded from its source
/// representation (escapes resolved, numeric separators stripped).
#[derive(Clone, Debug, PartialEq)]
pub enum LiteralValue {
    Number(f64),
    BigInt(String),
    String(String),
}

/// A single lexical token: kind, raw lexeme, optional decoded literal, and
/// its source span. Tokens are immutable once produced — the parser never
/// mutates a token in place, it only advances past it.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: SyntaxKind,
    pub lexeme: String,
    pub literal: Option<LiteralValue>,
    pub span: Span,
    pub line: u32,
    pub column: u32,
    /// Whether a line terminator appears between this token and the previous
    /// one. The parser needs this for automatic-semicolon-insertion and for
    /// `return`/`yield`/postfix-operator restrictions.
    pub preceded_by_newline: bool,
}

impl Token {
    #[must_use]
    pub fn eof(span: Span, line: u32, column: u32) -> Self {
        Token {
            kind: SyntaxKind::EndOfFile,
            lexeme: String::new(),
            literal: None,
            span,
            line,
            column,
            preceded_by_newline: false,
        }
    }
}
