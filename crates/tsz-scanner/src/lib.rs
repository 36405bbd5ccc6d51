//! Scanner/tokenizer for the tsz TypeScript compiler.
//!
//! Converts source text into a flat `Token` stream (`{kind, lexeme,
//! literal_value?, line, column}`). The scanner does not see
//! the grammar: template-literal brace-nesting is the only stateful
//! exception (`${` reopens expression scanning, the matching `}` must
//! resume template-text scanning rather than close a block).

pub mod lexer;
pub mod syntax_kind;
pub mod token;

pub use lexer::Lexer;
pub use syntax_kind::SyntaxKind;
pub use token::{LiteralValue, Token};
