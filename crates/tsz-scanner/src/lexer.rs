//! Hand-written scanner: source text -> `Token` stream.
//!
//! Single forward pass over the source bytes. Uses `memchr` for the common
//! "scan until a delimiter byte" loops inside string and template literals.

use crate::syntax_kind::SyntaxKind;
use crate::token::{LiteralValue, Token};
use tsz_common::numeric::parse_numeric_literal_value;
use tsz_common::{Diagnostic, Span};

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: u32,
    column: u32,
    pub diagnostics: Vec<Diagnostic>,
    file: String,
    /// Template-literal nesting: tracks brace depth so `}` inside a
    /// `${...}` substitution resumes template scanning rather than being
    /// treated as a block-close punctuator. Pushed on template-head, popped
    /// on template-tail.
    brace_stack: Vec<BraceContext>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum BraceContext {
    Block,
    TemplateSubstitution,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(source: &'a str, file: impl Into<String>) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            diagnostics: Vec::new(),
            file: file.into(),
            brace_stack: Vec::new(),
        }
    }

    #[must_use]
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<Diagnostic>) {
        let mut tokens = Vec::new();
        loop {
            let tok = self.next_token();
            let is_eof = tok.kind == SyntaxKind::EndOfFile;
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        (tokens, self.diagnostics)
    }

    fn peek(&self) -> u8 {
        *self.bytes.get(self.pos).unwrap_or(&0)
    }

    fn peek_at(&self, offset: usize) -> u8 {
        *self.bytes.get(self.pos + offset).unwrap_or(&0)
    }

    fn advance(&mut self) -> u8 {
        let b = self.peek();
        self.pos += 1;
        if b == b'\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        b
    }

    fn at_end(&self) -> bool {
        self.pos >= self.bytes.len()
    }

    fn skip_trivia(&mut self) -> bool {
        let mut saw_newline = false;
        loop {
            match self.peek() {
                b' ' | b'\t' | b'\r' => {
                    self.advance();
                }
                b'\n' => {
                    saw_newline = true;
                    self.advance();
                }
                b'/' if self.peek_at(1) == b'/' => {
                    while !self.at_end() && self.peek() != b'\n' {
                        self.advance();
                    }
                }
                b'/' if self.peek_at(1) == b'*' => {
                    self.advance();
                    self.advance();
                    let mut closed = false;
                    while !self.at_end() {
                        if self.peek() == b'\n' {
                            saw_newline = true;
                        }
                        if self.peek() == b'*' && self.peek_at(1) == b'/' {
                            self.advance();
                            self.advance();
                            closed = true;
                            break;
                        }
                        self.advance();
                    }
                    if !closed {
                        self.diagnostics.push(Diagnostic::error(
                            tsz_common::diagnostics::codes::UNTERMINATED_COMMENT,
                            self.file.clone(),
                            Span::at(self.pos as u32),
                            "Unterminated multi-line comment.",
                        ));
                    }
                }
                _ => break,
            }
        }
        saw_newline
    }

    fn next_token(&mut self) -> Token {
        let preceded_by_newline = self.skip_trivia();
        let start = self.pos;
        let (line, column) = (self.line, self.column);

        if self.at_end() {
            return Token::eof(Span::new(start as u32, start as u32), line, column);
        }

        let c = self.peek();
        let kind = if c.is_ascii_digit() || (c == b'.' && self.peek_at(1).is_ascii_digit()) {
            self.scan_number()
        } else if c == b'"' || c == b'\'' {
            self.scan_string(c)
        } else if c == b'`' {
            self.scan_template_head_or_no_sub()
        } else if c == b'}' && self.brace_stack.last() == Some(&BraceContext::TemplateSubstitution)
        {
            self.brace_stack.pop();
            self.scan_template_middle_or_tail()
        } else if is_identifier_start(c) {
            self.scan_identifier()
        } else if c == b'#' {
            self.advance();
            self.scan_identifier_text();
            SyntaxKind::PrivateIdentifier
        } else {
            self.scan_punctuator()
        };

        let end = self.pos;
        let lexeme = self.source[start..end].to_string();
        let literal = match kind {
            SyntaxKind::NumericLiteral => {
                parse_numeric_literal_value(&lexeme).map(LiteralValue::Number)
            }
            SyntaxKind::StringLiteral => Some(LiteralValue::String(decode_string_escapes(
                &lexeme[1..lexeme.len().saturating_sub(1)],
            ))),
            _ => None,
        };

        Token {
            kind,
            lexeme,
            literal,
            span: Span::new(start as u32, end as u32),
            line,
            column,
            preceded_by_newline,
        }
    }

    fn scan_number(&mut self) -> SyntaxKind {
        // hex / octal / binary prefixes
        if self.peek() == b'0' && matches!(self.peek_at(1), b'x' | b'X' | b'o' | b'O' | b'b' | b'B')
        {
            self.advance();
            self.advance();
            while is_numeric_continue(self.peek()) {
                self.advance();
            }
        } else {
            while self.peek().is_ascii_digit() || self.peek() == b'_' {
                self.advance();
            }
            if self.peek() == b'.' {
                self.advance();
                while self.peek().is_ascii_digit() || self.peek() == b'_' {
                    self.advance();
                }
            }
            if matches!(self.peek(), b'e' | b'E') {
                self.advance();
                if matches!(self.peek(), b'+' | b'-') {
                    self.advance();
                }
                while self.peek().is_ascii_digit() {
                    self.advance();
                }
            }
        }
        if self.peek() == b'n' {
            self.advance();
            return SyntaxKind::BigIntLiteral;
        }
        SyntaxKind::NumericLiteral
    }

    fn scan_string(&mut self, quote: u8) -> SyntaxKind {
        self.advance();
        loop {
            if self.at_end() {
                self.diagnostics.push(Diagnostic::error(
                    tsz_common::diagnostics::codes::UNTERMINATED_STRING_LITERAL,
                    self.file.clone(),
                    Span::at(self.pos as u32),
                    "Unterminated string literal.",
                ));
                break;
            }
            let c = self.peek();
            if c == quote {
                self.advance();
                break;
            }
            if c == b'\\' {
                self.advance();
                if !self.at_end() {
                    self.advance();
                }
                continue;
            }
            if c == b'\n' {
                self.diagnostics.push(Diagnostic::error(
                    tsz_common::diagnostics::codes::UNTERMINATED_STRING_LITERAL,
                    self.file.clone(),
                    Span::at(self.pos as u32),
                    "Unterminated string literal.",
                ));
                break;
            }
            self.advance();
        }
        SyntaxKind::StringLiteral
    }

    fn scan_template_span(&mut self) -> bool {
        // Scans raw template text up to (not including) a closing backtick
        // or an unescaped `${`. Returns true if it ended on `${`.
        loop {
            if self.at_end() {
                self.diagnostics.push(Diagnostic::error(
                    tsz_common::diagnostics::codes::UNTERMINATED_STRING_LITERAL,
                    self.file.clone(),
                    Span::at(self.pos as u32),
                    "Unterminated template literal.",
                ));
                return false;
            }
            match self.peek() {
                b'`' => return false,
                b'\\' => {
                    self.advance();
                    if !self.at_end() {
                        self.advance();
                    }
                }
                b'$' if self.peek_at(1) == b'{' => {
                    self.advance();
                    self.advance();
                    return true;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn scan_template_head_or_no_sub(&mut self) -> SyntaxKind {
        self.advance(); // opening backtick
        if self.scan_template_span() {
            self.brace_stack.push(BraceContext::TemplateSubstitution);
            SyntaxKind::TemplateHead
        } else {
            self.advance(); // closing backtick
            SyntaxKind::NoSubstitutionTemplateLiteral
        }
    }

    fn scan_template_middle_or_tail(&mut self) -> SyntaxKind {
        if self.scan_template_span() {
            self.brace_stack.push(BraceContext::TemplateSubstitution);
            SyntaxKind::TemplateMiddle
        } else {
            self.advance(); // closing backtick
            SyntaxKind::TemplateTail
        }
    }

    fn scan_identifier_text(&mut self) {
        while is_identifier_continue(self.peek()) {
            self.advance();
        }
    }

    fn scan_identifier(&mut self) -> SyntaxKind {
        let start = self.pos;
        self.scan_identifier_text();
        let text = &self.source[start..self.pos];
        SyntaxKind::from_keyword(text).unwrap_or(SyntaxKind::Identifier)
    }

    fn scan_punctuator(&mut self) -> SyntaxKind {
        use SyntaxKind::*;
        let c = self.advance();
        macro_rules! two {
            ($b:expr, $kind:expr) => {
                if self.peek() == $b {
                    self.advance();
                    return $kind;
                }
            };
        }
        match c {
            b'{' => {
                self.brace_stack.push(BraceContext::Block);
                OpenBrace
            }
            b'}' => {
                self.brace_stack.pop();
                CloseBrace
            }
            b'(' => OpenParen,
            b')' => CloseParen,
            b'[' => OpenBracket,
            b']' => CloseBracket,
            b';' => Semicolon,
            b',' => Comma,
            b'@' => At,
            b'~' => Tilde,
            b'.' => {
                if self.peek() == b'.' && self.peek_at(1) == b'.' {
                    self.advance();
                    self.advance();
                    DotDotDot
                } else {
                    Dot
                }
            }
            b'?' => {
                if self.peek() == b'.' && !self.peek_at(1).is_ascii_digit() {
                    self.advance();
                    return QuestionDot;
                }
                if self.peek() == b'?' {
                    self.advance();
                    two!(b'=', QuestionQuestionEquals);
                    return QuestionQuestion;
                }
                Question
            }
            b':' => Colon,
            b'<' => {
                if self.peek() == b'<' {
                    self.advance();
                    two!(b'=', LessThanLessThanEquals);
                    return LessThanLessThan;
                }
                two!(b'=', LessThanEquals);
                LessThan
            }
            b'>' => {
                if self.peek() == b'>' {
                    self.advance();
                    if self.peek() == b'>' {
                        self.advance();
                        two!(b'=', GreaterThanGreaterThanGreaterThanEquals);
                        return GreaterThanGreaterThanGreaterThan;
                    }
                    two!(b'=', GreaterThanGreaterThanEquals);
                    return GreaterThanGreaterThan;
                }
                two!(b'=', GreaterThanEquals);
                GreaterThan
            }
            b'=' => {
                if self.peek() == b'=' {
                    self.advance();
                    two!(b'=', EqualsEqualsEquals);
                    return EqualsEquals;
                }
                two!(b'>', EqualsGreaterThan);
                Equals
            }
            b'!' => {
                if self.peek() == b'=' {
                    self.advance();
                    two!(b'=', ExclamationEqualsEquals);
                    return ExclamationEquals;
                }
                Exclamation
            }
            b'+' => {
                two!(b'+', PlusPlus);
                two!(b'=', PlusEquals);
                Plus
            }
            b'-' => {
                two!(b'-', MinusMinus);
                two!(b'=', MinusEquals);
                Minus
            }
            b'*' => {
                if self.peek() == b'*' {
                    self.advance();
                    two!(b'=', AsteriskAsteriskEquals);
                    return AsteriskAsterisk;
                }
                two!(b'=', AsteriskEquals);
                Asterisk
            }
            b'/' => {
                two!(b'=', SlashEquals);
                Slash
            }
            b'%' => {
                two!(b'=', PercentEquals);
                Percent
            }
            b'&' => {
                if self.peek() == b'&' {
                    self.advance();
                    two!(b'=', AmpersandAmpersandEquals);
                    return AmpersandAmpersand;
                }
                two!(b'=', AmpersandEquals);
                Ampersand
            }
            b'|' => {
                if self.peek() == b'|' {
                    self.advance();
                    two!(b'=', BarBarEquals);
                    return BarBar;
                }
                two!(b'=', BarEquals);
                Bar
            }
            b'^' => {
                two!(b'=', CaretEquals);
                Caret
            }
            _ => {
                self.diagnostics.push(Diagnostic::error(
                    tsz_common::diagnostics::codes::INVALID_CHARACTER,
                    self.file.clone(),
                    Span::new((self.pos - 1) as u32, self.pos as u32),
                    format!("Invalid character '{}'.", c as char),
                ));
                Unknown
            }
        }
    }
}

fn is_identifier_start(c: u8) -> bool {
    c == b'_' || c == b'$' || c.is_ascii_alphabetic() || c >= 0x80
}

fn is_identifier_continue(c: u8) -> bool {
    is_identifier_start(c) || c.is_ascii_digit()
}

fn is_numeric_continue(c: u8) -> bool {
    c.is_ascii_alphanumeric() || c == b'_'
}

/// Decodes the common JS string escapes. Unrecognized escapes pass the
/// escaped character through unchanged (matching the permissive behavior
/// the grammar allows outside strict-mode octal escapes, which this subset
/// does not need to reject).
fn decode_string_escapes(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{C}'),
            Some('v') => out.push('\u{B}'),
            Some('0') => out.push('\0'),
            Some('\n') => {}
            Some('u') => {
                if chars.peek() == Some(&'{') {
                    chars.next();
                    let mut hex = String::new();
                    while let Some(&h) = chars.peek() {
                        if h == '}' {
                            chars.next();
                            break;
                        }
                        hex.push(h);
                        chars.next();
                    }
                    if let Ok(code) = u32::from_str_radix(&hex, 16) {
                        if let Some(ch) = char::from_u32(code) {
                            out.push(ch);
                        }
                    }
                } else {
                    let hex: String = (0..4).filter_map(|_| chars.next()).collect();
                    if let Ok(code) = u32::from_str_radix(&hex, 16) {
                        if let Some(ch) = char::from_u32(code) {
                            out.push(ch);
                        }
                    }
                }
            }
            Some('x') => {
                let hex: String = (0..2).filter_map(|_| chars.next()).collect();
                if let Ok(code) = u32::from_str_radix(&hex, 16) {
                    if let Some(ch) = char::from_u32(code) {
                        out.push(ch);
                    }
                }
            }
            Some(other) => out.push(other),
            None => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<SyntaxKind> {
        let (toks, diags) = Lexer::new(src, "t.ts").tokenize();
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        toks.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_keywords_and_identifiers() {
        assert_eq!(
            kinds("let x = 1"),
            vec![
                SyntaxKind::LetKeyword,
                SyntaxKind::Identifier,
                SyntaxKind::Equals,
                SyntaxKind::NumericLiteral,
                SyntaxKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn scans_string_literal_with_escapes() {
        let (toks, _) = Lexer::new(r#""a\nb""#, "t.ts").tokenize();
        assert_eq!(toks[0].kind, SyntaxKind::StringLiteral);
        assert_eq!(
            toks[0].literal,
            Some(LiteralValue::String("a\nb".to_string()))
        );
    }

    #[test]
    fn scans_template_with_substitution() {
        assert_eq!(
            kinds("`a${b}c`"),
            vec![
                SyntaxKind::TemplateHead,
                SyntaxKind::Identifier,
                SyntaxKind::TemplateTail,
                SyntaxKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn distinguishes_optional_chain_from_ternary_number() {
        assert_eq!(
            kinds("a?.b"),
            vec![
                SyntaxKind::Identifier,
                SyntaxKind::QuestionDot,
                SyntaxKind::Identifier,
                SyntaxKind::EndOfFile,
            ]
        );
        assert_eq!(
            kinds("a ? .5 : 1"),
            vec![
                SyntaxKind::Identifier,
                SyntaxKind::Question,
                SyntaxKind::NumericLiteral,
                SyntaxKind::Colon,
                SyntaxKind::NumericLiteral,
                SyntaxKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn preceded_by_newline_is_tracked() {
        let (toks, _) = Lexer::new("a\nb", "t.ts").tokenize();
        assert!(!toks[0].preceded_by_newline);
        assert!(toks[1].preceded_by_newline);
    }

    #[test]
    fn reports_unterminated_string() {
        let (_, diags) = Lexer::new("\"abc", "t.ts").tokenize();
        assert!(!diags.is_empty());
    }
}
