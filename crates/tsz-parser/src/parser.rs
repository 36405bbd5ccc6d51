//! Recursive-descent / precedence-climbing parser.
//!
//! Produces the arena-indexed AST directly from a token stream. Classic
//! C-style `for` and `do/while` loops keep their own `Node` shapes rather
//! than being desugared to `While` here, since later passes (in particular
//! the suspension analyzer's loop-resume bookkeeping) need the original
//! clause structure; `for-of`/`for-in` are likewise kept as their own node
//! rather than folded into `For`, since the binder and the suspension
//! analyzer need to see for-await-of enumerators distinctly.

use std::rc::Rc;

use tsz_common::diagnostics::codes;
use tsz_common::{Atom, Diagnostic, Interner, Span};
use tsz_scanner::{Lexer, SyntaxKind, Token};

use crate::node::*;

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    pub arena: NodeArena,
    pub interner: Rc<Interner>,
    pub diagnostics: Vec<Diagnostic>,
    file: String,
}

type PResult<T> = Result<T, ()>;

impl Parser {
    #[must_use]
    pub fn new(source: &str, file: impl Into<String>) -> Self {
        let file = file.into();
        let (tokens, lex_diags) = Lexer::new(source, file.clone()).tokenize();
        Parser {
            tokens,
            pos: 0,
            arena: NodeArena::new(),
            interner: Rc::new(Interner::new()),
            diagnostics: lex_diags,
            file,
        }
    }

    #[must_use]
    pub fn with_interner(source: &str, file: impl Into<String>, interner: Rc<Interner>) -> Self {
        let mut p = Parser::new(source, file);
        p.interner = interner;
        p
    }

    // ---- token-stream helpers ----

    fn cur(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn kind(&self) -> SyntaxKind {
        self.cur().kind
    }

    fn at(&self, k: SyntaxKind) -> bool {
        self.kind() == k
    }

    fn at_end(&self) -> bool {
        self.kind() == SyntaxKind::EndOfFile
    }

    fn bump(&mut self) -> Token {
        let tok = self.cur().clone();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, k: SyntaxKind) -> bool {
        if self.at(k) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, k: SyntaxKind, what: &str) -> PResult<Token> {
        if self.at(k) {
            Ok(self.bump())
        } else {
            let span = self.cur().span;
            self.diagnostics.push(Diagnostic::error(
                codes::EXPECTED_TOKEN,
                self.file.clone(),
                span,
                format!("Expected {what}, found '{}'.", self.cur().lexeme),
            ));
            Err(())
        }
    }

    fn consume_semicolon(&mut self) {
        // Automatic-semicolon-insertion, approximated: a semicolon is
        // consumed if present; otherwise we accept end-of-statement at a
        // newline, a `}`, or EOF.
        if self.eat(SyntaxKind::Semicolon) {
            return;
        }
        if self.at(SyntaxKind::CloseBrace) || self.at_end() || self.cur().preceded_by_newline {
            return;
        }
        let span = self.cur().span;
        self.diagnostics.push(Diagnostic::error(
            codes::EXPECTED_TOKEN,
            self.file.clone(),
            span,
            "Expected ';'.",
        ));
    }

    fn intern(&self, s: &str) -> Atom {
        self.interner.intern(s)
    }

    fn alloc(&mut self, node: Node, span: Span) -> NodeIndex {
        self.arena.alloc(node, span)
    }

    fn span_from(&self, start: u32) -> Span {
        Span::new(start, self.tokens[self.pos.saturating_sub(1)].span.end)
    }

    // ---- entry point ----

    #[must_use]
    pub fn parse_program(mut self) -> (NodeIndex, NodeArena, Rc<Interner>, Vec<Diagnostic>) {
        let mut stmts = Vec::new();
        while !self.at_end() {
            match self.parse_statement() {
                Ok(s) => stmts.push(s),
                Err(()) => self.synchronize(),
            }
        }
        let program = self.alloc(Node::Program(stmts), Span::new(0, self.cur().span.end));
        (program, self.arena, self.interner, self.diagnostics)
    }

    /// Skip tokens until a likely statement boundary, so one parse error
    /// does not cascade into unrelated follow-on errors.
    fn synchronize(&mut self) {
        while !self.at_end() {
            if self.eat(SyntaxKind::Semicolon) {
                return;
            }
            if self.at(SyntaxKind::CloseBrace) {
                return;
            }
            self.bump();
        }
    }

    // ---- statements ----

    fn parse_statement(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        // decorators preceding a class or class member
        let mut decorators = Vec::new();
        while self.at(SyntaxKind::At) {
            decorators.push(self.parse_decorator()?);
        }
        let is_abstract_class =
            self.at_modifier_word("abstract") && self.peek_ahead_is(1, SyntaxKind::ClassKeyword);
        if is_abstract_class {
            self.bump();
        }
        let node = match self.kind() {
            SyntaxKind::OpenBrace => return self.parse_block_stmt(),
            SyntaxKind::ConstKeyword if self.peek_ahead_is(1, SyntaxKind::EnumKeyword) => {
                self.bump();
                self.parse_enum(true)?
            }
            SyntaxKind::VarKeyword | SyntaxKind::LetKeyword | SyntaxKind::ConstKeyword => {
                let n = self.parse_var_decl_stmt()?;
                self.consume_semicolon();
                n
            }
            SyntaxKind::IfKeyword => self.parse_if()?,
            SyntaxKind::WhileKeyword => self.parse_while()?,
            SyntaxKind::DoKeyword => self.parse_do_while()?,
            SyntaxKind::ForKeyword => self.parse_for()?,
            SyntaxKind::ReturnKeyword => {
                self.bump();
                let value = if self.at(SyntaxKind::Semicolon)
                    || self.at(SyntaxKind::CloseBrace)
                    || self.cur().preceded_by_newline
                    || self.at_end()
                {
                    None
                } else {
                    Some(self.parse_expression()?)
                };
                let n = self.alloc(Node::Return(value), self.span_from(start));
                self.consume_semicolon();
                n
            }
            SyntaxKind::BreakKeyword => {
                self.bump();
                let label = self.parse_optional_label();
                let n = self.alloc(Node::Break(label), self.span_from(start));
                self.consume_semicolon();
                n
            }
            SyntaxKind::ContinueKeyword => {
                self.bump();
                let label = self.parse_optional_label();
                let n = self.alloc(Node::Continue(label), self.span_from(start));
                self.consume_semicolon();
                n
            }
            SyntaxKind::ThrowKeyword => {
                self.bump();
                let value = self.parse_expression()?;
                let n = self.alloc(Node::Throw(value), self.span_from(start));
                self.consume_semicolon();
                n
            }
            SyntaxKind::TryKeyword => self.parse_try()?,
            SyntaxKind::SwitchKeyword => self.parse_switch()?,
            SyntaxKind::FunctionKeyword => {
                let sig = self.parse_function_sig(false)?;
                self.alloc(Node::Function(sig), self.span_from(start))
            }
            SyntaxKind::AsyncKeyword if self.peek_is_function() => {
                self.bump();
                let sig = self.parse_function_sig(true)?;
                self.alloc(Node::Function(sig), self.span_from(start))
            }
            SyntaxKind::ClassKeyword => {
                let n = self.parse_class(decorators.clone(), is_abstract_class)?;
                decorators.clear();
                n
            }
            SyntaxKind::InterfaceKeyword => self.parse_interface()?,
            SyntaxKind::EnumKeyword => self.parse_enum(false)?,
            SyntaxKind::TypeKeyword if self.peek_ahead_is(1, SyntaxKind::Identifier) => {
                self.parse_type_alias()?
            }
            SyntaxKind::NamespaceKeyword | SyntaxKind::ModuleKeyword => self.parse_namespace()?,
            SyntaxKind::ImportKeyword => self.parse_import()?,
            SyntaxKind::ExportKeyword => self.parse_export()?,
            SyntaxKind::Semicolon => {
                self.bump();
                self.alloc(Node::Empty, self.span_from(start))
            }
            SyntaxKind::Identifier if self.peek_ahead_is(1, SyntaxKind::Colon) => {
                let label = self.intern(&self.bump().lexeme);
                self.bump(); // colon
                let body = self.parse_statement()?;
                self.alloc(
                    Node::LabeledStatement { label, body },
                    self.span_from(start),
                )
            }
            _ => {
                let expr = self.parse_expression()?;
                let n = self.alloc(Node::ExprStmt(expr), self.span_from(start));
                self.consume_semicolon();
                n
            }
        };
        Ok(node)
    }

    fn parse_optional_label(&mut self) -> Option<Atom> {
        if self.at(SyntaxKind::Identifier) && !self.cur().preceded_by_newline {
            Some(self.intern(&self.bump().lexeme))
        } else {
            None
        }
    }

    fn peek_is_function(&self) -> bool {
        self.peek_ahead_is(1, SyntaxKind::FunctionKeyword)
    }

    fn peek_ahead_is(&self, n: usize, k: SyntaxKind) -> bool {
        self.tokens
            .get(self.pos + n)
            .map(|t| t.kind == k)
            .unwrap_or(false)
    }

    fn parse_decorator(&mut self) -> PResult<NodeIndex> {
        self.expect(SyntaxKind::At, "'@'")?;
        self.parse_lhs_expr()
    }

    fn parse_block_stmt(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.expect(SyntaxKind::OpenBrace, "'{'")?;
        let mut stmts = Vec::new();
        while !self.at(SyntaxKind::CloseBrace) && !self.at_end() {
            match self.parse_statement() {
                Ok(s) => stmts.push(s),
                Err(()) => self.synchronize(),
            }
        }
        self.expect(SyntaxKind::CloseBrace, "'}'")?;
        Ok(self.alloc(Node::Block(stmts), self.span_from(start)))
    }

    fn var_kind_from(kind: SyntaxKind) -> VarKind {
        match kind {
            SyntaxKind::VarKeyword => VarKind::Var,
            SyntaxKind::ConstKeyword => VarKind::Const,
            _ => VarKind::Let,
        }
    }

    fn parse_var_decl_stmt(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let kind = Self::var_kind_from(self.kind());
        self.bump();
        let mut decls = Vec::new();
        loop {
            let pattern = self.parse_binding_target()?;
            let type_ann = if self.eat(SyntaxKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let init = if self.eat(SyntaxKind::Equals) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            decls.push((pattern, type_ann, init));
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        Ok(self.alloc(
            Node::VarDecl {
                kind,
                declarations: decls,
            },
            self.span_from(start),
        ))
    }

    /// Binding target: identifier, array pattern, or object pattern.
    fn parse_binding_target(&mut self) -> PResult<NodeIndex> {
        match self.kind() {
            SyntaxKind::OpenBracket => self.parse_array_pattern(),
            SyntaxKind::OpenBrace => self.parse_object_pattern(),
            _ => {
                let start = self.cur().span.start;
                let tok = self.expect_binding_identifier()?;
                let name = self.intern(&tok.lexeme);
                Ok(self.alloc(Node::Identifier(name), self.span_from(start)))
            }
        }
    }

    fn expect_binding_identifier(&mut self) -> PResult<Token> {
        if self.at(SyntaxKind::Identifier) || self.kind().is_contextual_keyword() {
            Ok(self.bump())
        } else {
            self.expect(SyntaxKind::Identifier, "identifier")
        }
    }

    fn parse_array_pattern(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.expect(SyntaxKind::OpenBracket, "'['")?;
        let mut elements = Vec::new();
        let mut rest = None;
        while !self.at(SyntaxKind::CloseBracket) && !self.at_end() {
            if self.eat(SyntaxKind::Comma) {
                elements.push(None);
                continue;
            }
            if self.eat(SyntaxKind::DotDotDot) {
                rest = Some(self.parse_binding_target()?);
                break;
            }
            let pattern = self.parse_binding_target()?;
            let default = if self.eat(SyntaxKind::Equals) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            elements.push(Some(PatternElement { pattern, default }));
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::CloseBracket, "']'")?;
        Ok(self.alloc(
            Node::ArrayPattern { elements, rest },
            self.span_from(start),
        ))
    }

    fn parse_object_pattern(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.expect(SyntaxKind::OpenBrace, "'{'")?;
        let mut properties = Vec::new();
        let mut rest = None;
        while !self.at(SyntaxKind::CloseBrace) && !self.at_end() {
            if self.eat(SyntaxKind::DotDotDot) {
                rest = Some(self.parse_binding_target()?);
                break;
            }
            let (key, key_span) = self.parse_property_key()?;
            let _ = key_span;
            if self.eat(SyntaxKind::Colon) {
                let pattern = self.parse_binding_target()?;
                let default = if self.eat(SyntaxKind::Equals) {
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                properties.push(ObjectPatternProperty {
                    key,
                    value: pattern,
                    default,
                    shorthand: false,
                });
            } else {
                let name = match &key {
                    PropertyKey::Ident(a) => *a,
                    _ => self.intern("_"),
                };
                let start2 = self.tokens[self.pos.saturating_sub(1)].span.start;
                let ident = self.alloc(Node::Identifier(name), Span::at(start2));
                let default = if self.eat(SyntaxKind::Equals) {
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                properties.push(ObjectPatternProperty {
                    key,
                    value: ident,
                    default,
                    shorthand: true,
                });
            }
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::CloseBrace, "'}'")?;
        Ok(self.alloc(
            Node::ObjectPattern { properties, rest },
            self.span_from(start),
        ))
    }

    fn parse_property_key(&mut self) -> PResult<(PropertyKey, Span)> {
        let span = self.cur().span;
        let key = match self.kind() {
            SyntaxKind::OpenBracket => {
                self.bump();
                let expr = self.parse_assignment()?;
                self.expect(SyntaxKind::CloseBracket, "']'")?;
                PropertyKey::Computed(expr)
            }
            SyntaxKind::StringLiteral => {
                let tok = self.bump();
                let text = string_literal_text(&tok);
                PropertyKey::StringLit(self.intern(&text))
            }
            SyntaxKind::NumericLiteral => {
                let tok = self.bump();
                PropertyKey::NumberLit(tok.lexeme.parse().unwrap_or(0.0))
            }
            _ => {
                let tok = self.bump();
                PropertyKey::Ident(self.intern(&tok.lexeme))
            }
        };
        Ok((key, span))
    }

    fn parse_if(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        self.expect(SyntaxKind::OpenParen, "'('")?;
        let cond = self.parse_expression()?;
        self.expect(SyntaxKind::CloseParen, "')'")?;
        let then_branch = self.parse_statement()?;
        let else_branch = if self.eat(SyntaxKind::ElseKeyword) {
            Some(self.parse_statement()?)
        } else {
            None
        };
        Ok(self.alloc(
            Node::If {
                cond,
                then_branch,
                else_branch,
            },
            self.span_from(start),
        ))
    }

    fn parse_while(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        self.expect(SyntaxKind::OpenParen, "'('")?;
        let cond = self.parse_expression()?;
        self.expect(SyntaxKind::CloseParen, "')'")?;
        let body = self.parse_statement()?;
        Ok(self.alloc(Node::While { cond, body }, self.span_from(start)))
    }

    fn parse_do_while(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        let body = self.parse_statement()?;
        self.expect(SyntaxKind::WhileKeyword, "'while'")?;
        self.expect(SyntaxKind::OpenParen, "'('")?;
        let cond = self.parse_expression()?;
        self.expect(SyntaxKind::CloseParen, "')'")?;
        self.consume_semicolon();
        Ok(self.alloc(Node::DoWhile { body, cond }, self.span_from(start)))
    }

    fn parse_for(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        let is_await = self.eat(SyntaxKind::AwaitKeyword);
        self.expect(SyntaxKind::OpenParen, "'('")?;

        let decl_kind = match self.kind() {
            SyntaxKind::VarKeyword | SyntaxKind::LetKeyword | SyntaxKind::ConstKeyword => {
                Some(Self::var_kind_from(self.kind()))
            }
            _ => None,
        };
        if decl_kind.is_some() {
            self.bump();
        }

        if self.at(SyntaxKind::Semicolon) {
            // classic for with no init (rare with a leading decl_kind, but
            // handle the no-declaration form too)
            self.bump();
            return self.finish_classic_for(start, None);
        }

        let pattern_or_init_start = self.cur().span.start;
        let pattern = if decl_kind.is_some() {
            self.parse_binding_target()?
        } else {
            self.parse_lhs_expr()?
        };

        if self.eat(SyntaxKind::OfKeyword) {
            let iterable = self.parse_assignment()?;
            self.expect(SyntaxKind::CloseParen, "')'")?;
            let body = self.parse_statement()?;
            return Ok(self.alloc(
                Node::ForOf {
                    is_await,
                    decl_kind,
                    pattern,
                    iterable,
                    body,
                },
                self.span_from(start),
            ));
        }
        if self.eat(SyntaxKind::InKeyword) {
            let object = self.parse_expression()?;
            self.expect(SyntaxKind::CloseParen, "')'")?;
            let body = self.parse_statement()?;
            return Ok(self.alloc(
                Node::ForIn {
                    decl_kind,
                    pattern,
                    object,
                    body,
                },
                self.span_from(start),
            ));
        }

        // classic for: rebuild the consumed prefix as a var-decl/expr init.
        let init = if let Some(kind) = decl_kind {
            let type_ann = if self.eat(SyntaxKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let first_init = if self.eat(SyntaxKind::Equals) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            let mut decls = vec![(pattern, type_ann, first_init)];
            while self.eat(SyntaxKind::Comma) {
                let p = self.parse_binding_target()?;
                let t = if self.eat(SyntaxKind::Colon) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                let i = if self.eat(SyntaxKind::Equals) {
                    Some(self.parse_assignment()?)
                } else {
                    None
                };
                decls.push((p, t, i));
            }
            Some(self.alloc(
                Node::VarDecl {
                    kind,
                    declarations: decls,
                },
                self.span_from(pattern_or_init_start),
            ))
        } else {
            Some(self.finish_expression_from_lhs(pattern)?)
        };
        self.expect(SyntaxKind::Semicolon, "';'")?;
        self.finish_classic_for(start, init)
    }

    fn finish_classic_for(&mut self, start: u32, init: Option<NodeIndex>) -> PResult<NodeIndex> {
        let test = if self.at(SyntaxKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(SyntaxKind::Semicolon, "';'")?;
        let update = if self.at(SyntaxKind::CloseParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect(SyntaxKind::CloseParen, "')'")?;
        let body = self.parse_statement()?;
        Ok(self.alloc(
            Node::For {
                init,
                test,
                update,
                body,
            },
            self.span_from(start),
        ))
    }

    /// Continues parsing a (possibly already-consumed-as-lhs) expression
    /// statement, e.g. `for (x = 0; ...)`: `x` was parsed speculatively as
    /// a binding target to check for `of`/`in`, then folded back into a
    /// full expression when neither matched.
    fn finish_expression_from_lhs(&mut self, lhs: NodeIndex) -> PResult<NodeIndex> {
        if let Some(op) = self.assign_op_for_current() {
            self.bump();
            let value = self.parse_assignment()?;
            let span = self.arena.span(lhs);
            return Ok(if op == AssignOp::Plain {
                self.alloc(Node::Assign { target: lhs, value }, span)
            } else {
                self.alloc(
                    Node::CompoundSet {
                        op,
                        target: lhs,
                        value,
                    },
                    span,
                )
            });
        }
        Ok(lhs)
    }

    fn parse_try(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        let try_block = self.parse_block_stmt()?;
        let mut catch_param = None;
        let mut catch_type_ann = None;
        let mut catch_block = None;
        if self.eat(SyntaxKind::CatchKeyword) {
            if self.eat(SyntaxKind::OpenParen) {
                catch_param = Some(self.parse_binding_target()?);
                if self.eat(SyntaxKind::Colon) {
                    catch_type_ann = Some(self.parse_type()?);
                }
                self.expect(SyntaxKind::CloseParen, "')'")?;
            }
            catch_block = Some(self.parse_block_stmt()?);
        }
        let finally_block = if self.eat(SyntaxKind::FinallyKeyword) {
            Some(self.parse_block_stmt()?)
        } else {
            None
        };
        Ok(self.alloc(
            Node::TryCatch {
                try_block,
                catch_param,
                catch_type_ann,
                catch_block,
                finally_block,
            },
            self.span_from(start),
        ))
    }

    fn parse_switch(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        self.expect(SyntaxKind::OpenParen, "'('")?;
        let discriminant = self.parse_expression()?;
        self.expect(SyntaxKind::CloseParen, "')'")?;
        self.expect(SyntaxKind::OpenBrace, "'{'")?;
        let mut cases = Vec::new();
        while !self.at(SyntaxKind::CloseBrace) && !self.at_end() {
            let test = if self.eat(SyntaxKind::CaseKeyword) {
                let e = self.parse_expression()?;
                self.expect(SyntaxKind::Colon, "':'")?;
                Some(e)
            } else {
                self.expect(SyntaxKind::DefaultKeyword, "'default'")?;
                self.expect(SyntaxKind::Colon, "':'")?;
                None
            };
            let mut body = Vec::new();
            while !self.at(SyntaxKind::CaseKeyword)
                && !self.at(SyntaxKind::DefaultKeyword)
                && !self.at(SyntaxKind::CloseBrace)
                && !self.at_end()
            {
                body.push(self.parse_statement()?);
            }
            cases.push(SwitchCase { test, body });
        }
        self.expect(SyntaxKind::CloseBrace, "'}'")?;
        Ok(self.alloc(
            Node::Switch {
                discriminant,
                cases,
            },
            self.span_from(start),
        ))
    }

    // ---- functions / classes / types ----

    fn parse_function_sig(&mut self, is_async: bool) -> PResult<FunctionSig> {
        self.expect(SyntaxKind::FunctionKeyword, "'function'")?;
        let is_generator = self.eat(SyntaxKind::Asterisk);
        let name = if self.at(SyntaxKind::Identifier) {
            Some(self.intern(&self.bump().lexeme))
        } else {
            None
        };
        let type_params = self.parse_optional_type_params()?;
        let params = self.parse_params()?;
        let return_type = if self.eat(SyntaxKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = Some(self.parse_block_stmt()?);
        Ok(FunctionSig {
            name,
            type_params,
            params,
            return_type,
            body,
            modifiers: FunctionModifiers::new(is_async, is_generator),
            is_arrow: false,
        })
    }

    fn parse_params(&mut self) -> PResult<Vec<Param>> {
        self.expect(SyntaxKind::OpenParen, "'('")?;
        let mut params = Vec::new();
        while !self.at(SyntaxKind::CloseParen) && !self.at_end() {
            let rest = self.eat(SyntaxKind::DotDotDot);
            let pattern = self.parse_binding_target()?;
            let optional = self.eat(SyntaxKind::Question);
            let type_ann = if self.eat(SyntaxKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let default = if self.eat(SyntaxKind::Equals) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            params.push(Param {
                pattern,
                type_ann,
                default,
                optional,
                rest,
            });
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::CloseParen, "')'")?;
        Ok(params)
    }

    fn parse_optional_type_params(&mut self) -> PResult<Vec<TypeParamDecl>> {
        if !self.eat(SyntaxKind::LessThan) {
            return Ok(Vec::new());
        }
        let mut params = Vec::new();
        while !self.at(SyntaxKind::GreaterThan) && !self.at_end() {
            // variance annotations (`in`/`out`) are accepted but not tracked
            let _ = self.eat(SyntaxKind::InKeyword) || self.eat_word("out");
            let tok = self.expect(SyntaxKind::Identifier, "type parameter name")?;
            let name = self.intern(&tok.lexeme);
            let constraint = if self.eat(SyntaxKind::ExtendsKeyword) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let default = if self.eat(SyntaxKind::Equals) {
                Some(self.parse_type()?)
            } else {
                None
            };
            params.push(TypeParamDecl {
                name,
                constraint,
                default,
            });
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::GreaterThan, "'>'")?;
        Ok(params)
    }

    fn parse_class(&mut self, decorators: NodeList, is_abstract: bool) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        let name = if self.at(SyntaxKind::Identifier) {
            Some(self.intern(&self.bump().lexeme))
        } else {
            None
        };
        let type_params = self.parse_optional_type_params()?;
        let mut super_class = None;
        let mut super_type_args = Vec::new();
        if self.eat(SyntaxKind::ExtendsKeyword) {
            super_class = Some(self.parse_lhs_expr()?);
            if self.eat(SyntaxKind::LessThan) {
                super_type_args = self.parse_type_arg_list()?;
            }
        }
        let mut implements = Vec::new();
        if self.eat_word("implements") {
            loop {
                implements.push(self.parse_type()?);
                if !self.eat(SyntaxKind::Comma) {
                    break;
                }
            }
        }
        self.expect(SyntaxKind::OpenBrace, "'{'")?;
        let mut members = Vec::new();
        while !self.at(SyntaxKind::CloseBrace) && !self.at_end() {
            if self.eat(SyntaxKind::Semicolon) {
                continue;
            }
            members.push(self.parse_class_member()?);
        }
        self.expect(SyntaxKind::CloseBrace, "'}'")?;
        Ok(self.alloc(
            Node::Class {
                name,
                type_params,
                super_class,
                super_type_args,
                implements,
                members,
                is_abstract,
                decorators,
            },
            self.span_from(start),
        ))
    }

    fn parse_class_member(&mut self) -> PResult<ClassMember> {
        let start = self.cur().span.start;
        let mut decorators = Vec::new();
        while self.at(SyntaxKind::At) {
            decorators.push(self.parse_decorator()?);
        }
        let mut is_static = false;
        let mut is_readonly = false;
        let mut is_abstract = false;
        let mut access = AccessModifier::Public;
        loop {
            match (self.kind(), self.peek_member_continues()) {
                (SyntaxKind::StaticKeyword, true) => {
                    is_static = true;
                    self.bump();
                }
                (SyntaxKind::ReadonlyKeyword, true) => {
                    is_readonly = true;
                    self.bump();
                }
                _ if self.at_modifier_word("abstract") && self.peek_member_continues() => {
                    is_abstract = true;
                    self.bump();
                }
                _ if self.at_modifier_word("public") && self.peek_member_continues() => {
                    self.bump();
                }
                _ if self.at_modifier_word("private") && self.peek_member_continues() => {
                    access = AccessModifier::Private;
                    self.bump();
                }
                _ if self.at_modifier_word("protected") && self.peek_member_continues() => {
                    access = AccessModifier::Protected;
                    self.bump();
                }
                _ => break,
            }
        }

        let mut kind = ClassMemberKind::Field;
        let mut is_async = false;
        let mut is_generator = false;
        if self.at(SyntaxKind::GetKeyword) && self.peek_member_continues() {
            kind = ClassMemberKind::Getter;
            self.bump();
        } else if self.at(SyntaxKind::SetKeyword) && self.peek_member_continues() {
            kind = ClassMemberKind::Setter;
            self.bump();
        } else if self.at(SyntaxKind::AsyncKeyword) && self.peek_member_continues() {
            is_async = true;
            self.bump();
            if self.eat(SyntaxKind::Asterisk) {
                is_generator = true;
            }
        } else if self.eat(SyntaxKind::Asterisk) {
            is_generator = true;
        }

        let (key, computed_name, name) = self.parse_class_member_key()?;
        let is_optional = self.eat(SyntaxKind::Question);
        let _ = is_readonly && is_optional; // both may apply to a field

        if self.at(SyntaxKind::OpenParen) || self.at(SyntaxKind::LessThan) {
            if kind == ClassMemberKind::Field {
                kind = if name == Some(self.intern("constructor")) {
                    ClassMemberKind::Constructor
                } else {
                    ClassMemberKind::Method
                };
            }
            let type_params = self.parse_optional_type_params()?;
            let params = self.parse_params()?;
            let return_type = if self.eat(SyntaxKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let body = if self.at(SyntaxKind::OpenBrace) {
                Some(self.parse_block_stmt()?)
            } else {
                self.consume_semicolon();
                None
            };
            let sig = FunctionSig {
                name,
                type_params,
                params,
                return_type,
                body,
                modifiers: FunctionModifiers::new(is_async, is_generator),
                is_arrow: false,
            };
            return Ok(ClassMember {
                kind,
                name,
                computed_name,
                is_static,
                is_readonly,
                is_abstract,
                is_optional,
                access,
                decorators,
                type_ann: None,
                initializer: None,
                sig: Some(sig),
                span: self.span_from(start),
            });
        }

        let type_ann = if self.eat(SyntaxKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let initializer = if self.eat(SyntaxKind::Equals) {
            Some(self.parse_assignment()?)
        } else {
            None
        };
        self.consume_semicolon();
        let _ = key;
        Ok(ClassMember {
            kind,
            name,
            computed_name,
            is_static,
            is_readonly,
            is_abstract,
            is_optional,
            access,
            decorators,
            type_ann,
            initializer,
            sig: None,
            span: self.span_from(start),
        })
    }

    fn parse_class_member_key(&mut self) -> PResult<(PropertyKey, Option<NodeIndex>, Option<Atom>)> {
        match self.kind() {
            SyntaxKind::OpenBracket => {
                self.bump();
                let expr = self.parse_assignment()?;
                self.expect(SyntaxKind::CloseBracket, "']'")?;
                Ok((PropertyKey::Computed(expr), Some(expr), None))
            }
            SyntaxKind::PrivateIdentifier | SyntaxKind::Identifier => {
                let tok = self.bump();
                let name = self.intern(&tok.lexeme);
                Ok((PropertyKey::Ident(name), None, Some(name)))
            }
            SyntaxKind::StringLiteral => {
                let tok = self.bump();
                let name = self.intern(&string_literal_text(&tok));
                Ok((PropertyKey::StringLit(name), None, Some(name)))
            }
            _ => {
                let tok = self.bump();
                let name = self.intern(&tok.lexeme);
                Ok((PropertyKey::Ident(name), None, Some(name)))
            }
        }
    }

    fn at_modifier_word(&self, word: &str) -> bool {
        self.at(SyntaxKind::Identifier) && self.cur().lexeme == word
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.at_modifier_word(word) {
            self.bump();
            true
        } else {
            false
        }
    }

    /// A modifier keyword only counts as a modifier if another member-start
    /// token follows; otherwise it's the member name itself (e.g. a field
    /// literally named `static`).
    fn peek_member_continues(&self) -> bool {
        !matches!(
            self.tokens.get(self.pos + 1).map(|t| t.kind),
            Some(
                SyntaxKind::OpenParen
                    | SyntaxKind::Equals
                    | SyntaxKind::Colon
                    | SyntaxKind::Semicolon
                    | SyntaxKind::Question
            )
        )
    }

    fn parse_interface(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        let tok = self.expect(SyntaxKind::Identifier, "interface name")?;
        let name = self.intern(&tok.lexeme);
        let type_params = self.parse_optional_type_params()?;
        let mut extends = Vec::new();
        if self.eat(SyntaxKind::ExtendsKeyword) {
            loop {
                extends.push(self.parse_type()?);
                if !self.eat(SyntaxKind::Comma) {
                    break;
                }
            }
        }
        let members = self.parse_type_member_list()?;
        Ok(self.alloc(
            Node::Interface {
                name,
                type_params,
                extends,
                members,
            },
            self.span_from(start),
        ))
    }

    fn parse_enum(&mut self, is_const: bool) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        let tok = self.expect(SyntaxKind::Identifier, "enum name")?;
        let name = self.intern(&tok.lexeme);
        self.expect(SyntaxKind::OpenBrace, "'{'")?;
        let mut members = Vec::new();
        while !self.at(SyntaxKind::CloseBrace) && !self.at_end() {
            let (key, _) = self.parse_property_key()?;
            let member_name = match key {
                PropertyKey::Ident(a) | PropertyKey::StringLit(a) => a,
                _ => self.intern("?"),
            };
            let value = if self.eat(SyntaxKind::Equals) {
                Some(self.parse_assignment()?)
            } else {
                None
            };
            members.push((member_name, value));
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::CloseBrace, "'}'")?;
        Ok(self.alloc(
            Node::Enum {
                name,
                is_const,
                members,
            },
            self.span_from(start),
        ))
    }

    fn parse_type_alias(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        let tok = self.expect(SyntaxKind::Identifier, "type alias name")?;
        let name = self.intern(&tok.lexeme);
        let type_params = self.parse_optional_type_params()?;
        self.expect(SyntaxKind::Equals, "'='")?;
        let value = self.parse_type()?;
        self.consume_semicolon();
        Ok(self.alloc(
            Node::TypeAlias {
                name,
                type_params,
                value,
            },
            self.span_from(start),
        ))
    }

    fn parse_namespace(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        let tok = self.expect(SyntaxKind::Identifier, "namespace name")?;
        let name = self.intern(&tok.lexeme);
        self.expect(SyntaxKind::OpenBrace, "'{'")?;
        let mut body = Vec::new();
        while !self.at(SyntaxKind::CloseBrace) && !self.at_end() {
            body.push(self.parse_statement()?);
        }
        self.expect(SyntaxKind::CloseBrace, "'}'")?;
        Ok(self.alloc(Node::Namespace { name, body }, self.span_from(start)))
    }

    fn parse_import(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        let type_only =
            self.at(SyntaxKind::TypeKeyword) && !self.peek_ahead_is(1, SyntaxKind::FromKeyword);
        if type_only {
            self.bump();
        }
        let mut default = None;
        let mut namespace = None;
        let mut named = Vec::new();
        if self.at(SyntaxKind::Identifier) {
            default = Some(self.intern(&self.bump().lexeme));
            if self.eat(SyntaxKind::Comma) {
                // fallthrough to namespace/named
            }
        }
        if self.eat(SyntaxKind::Asterisk) {
            self.expect(SyntaxKind::AsKeyword, "'as'")?;
            let tok = self.expect(SyntaxKind::Identifier, "namespace binding")?;
            namespace = Some(self.intern(&tok.lexeme));
        } else if self.eat(SyntaxKind::OpenBrace) {
            while !self.at(SyntaxKind::CloseBrace) && !self.at_end() {
                let tok = self.bump();
                let imported = self.intern(&tok.lexeme);
                let local = if self.eat(SyntaxKind::AsKeyword) {
                    let t = self.expect(SyntaxKind::Identifier, "local binding")?;
                    self.intern(&t.lexeme)
                } else {
                    imported
                };
                named.push((imported, local));
                if !self.eat(SyntaxKind::Comma) {
                    break;
                }
            }
            self.expect(SyntaxKind::CloseBrace, "'}'")?;
        }
        let module = if default.is_some() || namespace.is_some() || !named.is_empty() {
            self.expect(SyntaxKind::FromKeyword, "'from'")?;
            let tok = self.expect(SyntaxKind::StringLiteral, "module specifier")?;
            self.intern(&string_literal_text(&tok))
        } else {
            let tok = self.expect(SyntaxKind::StringLiteral, "module specifier")?;
            self.intern(&string_literal_text(&tok))
        };
        self.consume_semicolon();
        Ok(self.alloc(
            Node::Import {
                default,
                namespace,
                named,
                module,
                type_only,
            },
            self.span_from(start),
        ))
    }

    fn parse_export(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        let is_default = self.eat(SyntaxKind::DefaultKeyword);
        if self.eat(SyntaxKind::OpenBrace) {
            let mut named = Vec::new();
            while !self.at(SyntaxKind::CloseBrace) && !self.at_end() {
                let tok = self.bump();
                let local = self.intern(&tok.lexeme);
                let exported = if self.eat(SyntaxKind::AsKeyword) {
                    let t = self.expect(SyntaxKind::Identifier, "exported binding")?;
                    self.intern(&t.lexeme)
                } else {
                    local
                };
                named.push((local, exported));
                if !self.eat(SyntaxKind::Comma) {
                    break;
                }
            }
            self.expect(SyntaxKind::CloseBrace, "'}'")?;
            let from_module = if self.eat(SyntaxKind::FromKeyword) {
                let tok = self.expect(SyntaxKind::StringLiteral, "module specifier")?;
                Some(self.intern(&string_literal_text(&tok)))
            } else {
                None
            };
            self.consume_semicolon();
            return Ok(self.alloc(
                Node::Export {
                    decl: None,
                    named,
                    from_module,
                    is_default,
                },
                self.span_from(start),
            ));
        }
        let decl = Some(self.parse_statement()?);
        Ok(self.alloc(
            Node::Export {
                decl,
                named: Vec::new(),
                from_module: None,
                is_default,
            },
            self.span_from(start),
        ))
    }

    // ---- types ----

    pub fn parse_type(&mut self) -> PResult<NodeIndex> {
        self.parse_conditional_type()
    }

    fn parse_conditional_type(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let check = self.parse_union_type()?;
        if self.eat(SyntaxKind::ExtendsKeyword) {
            let extends = self.parse_union_type()?;
            self.expect(SyntaxKind::Question, "'?'")?;
            let true_type = self.parse_type()?;
            self.expect(SyntaxKind::Colon, "':'")?;
            let false_type = self.parse_type()?;
            return Ok(self.alloc(
                Node::Type(TypeNode::Conditional {
                    check,
                    extends,
                    true_type,
                    false_type,
                }),
                self.span_from(start),
            ));
        }
        Ok(check)
    }

    fn parse_union_type(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.eat(SyntaxKind::Bar);
        let mut members = vec![self.parse_intersection_type()?];
        while self.eat(SyntaxKind::Bar) {
            members.push(self.parse_intersection_type()?);
        }
        if members.len() == 1 {
            Ok(members.pop().unwrap())
        } else {
            Ok(self.alloc(Node::Type(TypeNode::Union(members)), self.span_from(start)))
        }
    }

    fn parse_intersection_type(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.eat(SyntaxKind::Ampersand);
        let mut members = vec![self.parse_type_operator()?];
        while self.eat(SyntaxKind::Ampersand) {
            members.push(self.parse_type_operator()?);
        }
        if members.len() == 1 {
            Ok(members.pop().unwrap())
        } else {
            Ok(self.alloc(
                Node::Type(TypeNode::Intersection(members)),
                self.span_from(start),
            ))
        }
    }

    fn parse_type_operator(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        if self.eat(SyntaxKind::KeyofKeyword) {
            let inner = self.parse_type_operator()?;
            return Ok(self.alloc(
                Node::Type(TypeNode::Keyof(inner)),
                self.span_from(start),
            ));
        }
        if self.at_modifier_word("infer") {
            self.bump();
            let tok = self.expect(SyntaxKind::Identifier, "type parameter name")?;
            let name = self.intern(&tok.lexeme);
            return Ok(self.alloc(Node::Type(TypeNode::Infer(name)), self.span_from(start)));
        }
        if self.eat(SyntaxKind::TypeofKeyword) {
            let mut path = vec![self.intern(&self.expect(SyntaxKind::Identifier, "identifier")?.lexeme)];
            while self.eat(SyntaxKind::Dot) {
                path.push(self.intern(&self.bump().lexeme));
            }
            return Ok(self.alloc(Node::Type(TypeNode::Typeof(path)), self.span_from(start)));
        }
        self.parse_postfix_type()
    }

    fn parse_postfix_type(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let mut t = self.parse_primary_type()?;
        loop {
            if self.at(SyntaxKind::OpenBracket) && !self.cur().preceded_by_newline {
                self.bump();
                if self.eat(SyntaxKind::CloseBracket) {
                    t = self.alloc(Node::Type(TypeNode::Array(t)), self.span_from(start));
                } else {
                    let index = self.parse_type()?;
                    self.expect(SyntaxKind::CloseBracket, "']'")?;
                    t = self.alloc(
                        Node::Type(TypeNode::IndexedAccess { obj: t, index }),
                        self.span_from(start),
                    );
                }
            } else {
                break;
            }
        }
        Ok(t)
    }

    fn parse_primary_type(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        match self.kind() {
            SyntaxKind::OpenParen => {
                // Could be a parenthesized type or a function type; try
                // function-type shape first via lookahead on `=>` after `)`.
                if self.looks_like_function_type() {
                    return self.parse_function_type();
                }
                self.bump();
                let inner = self.parse_type()?;
                self.expect(SyntaxKind::CloseParen, "')'")?;
                Ok(self.alloc(
                    Node::Type(TypeNode::Parenthesized(inner)),
                    self.span_from(start),
                ))
            }
            SyntaxKind::OpenBracket => self.parse_tuple_type(),
            SyntaxKind::OpenBrace => self.parse_object_or_mapped_type(),
            SyntaxKind::StringLiteral => {
                let tok = self.bump();
                let s = string_literal_text(&tok);
                Ok(self.alloc(
                    Node::Type(TypeNode::Literal(TypeLiteralValue::String(self.intern(&s)))),
                    self.span_from(start),
                ))
            }
            SyntaxKind::NumericLiteral => {
                let tok = self.bump();
                let n: f64 = tok.lexeme.replace('_', "").parse().unwrap_or(0.0);
                Ok(self.alloc(
                    Node::Type(TypeNode::Literal(TypeLiteralValue::Number(n))),
                    self.span_from(start),
                ))
            }
            SyntaxKind::TrueKeyword => {
                self.bump();
                Ok(self.alloc(
                    Node::Type(TypeNode::Literal(TypeLiteralValue::Boolean(true))),
                    self.span_from(start),
                ))
            }
            SyntaxKind::FalseKeyword => {
                self.bump();
                Ok(self.alloc(
                    Node::Type(TypeNode::Literal(TypeLiteralValue::Boolean(false))),
                    self.span_from(start),
                ))
            }
            SyntaxKind::NullKeyword => {
                self.bump();
                Ok(self.alloc(
                    Node::Type(TypeNode::Literal(TypeLiteralValue::Null)),
                    self.span_from(start),
                ))
            }
            SyntaxKind::DotDotDot => {
                self.bump();
                let inner = self.parse_type()?;
                Ok(self.alloc(Node::Type(TypeNode::Rest(inner)), self.span_from(start)))
            }
            SyntaxKind::NewKeyword => {
                self.bump();
                self.parse_function_type()
            }
            _ => {
                let tok = self.bump();
                let name = self.intern(&tok.lexeme);
                if tok.kind == SyntaxKind::Identifier && self.at(SyntaxKind::IsKeyword) {
                    self.bump();
                    let asserted = self.parse_union_type()?;
                    return Ok(self.alloc(
                        Node::Type(TypeNode::Predicate {
                            param: name,
                            asserted,
                        }),
                        self.span_from(start),
                    ));
                }
                if self.eat(SyntaxKind::Dot) {
                    let mut path = vec![name];
                    loop {
                        path.push(self.intern(&self.bump().lexeme));
                        if !self.eat(SyntaxKind::Dot) {
                            break;
                        }
                    }
                    let type_args = if self.eat(SyntaxKind::LessThan) {
                        self.parse_type_arg_list()?
                    } else {
                        Vec::new()
                    };
                    return Ok(self.alloc(
                        Node::Type(TypeNode::QualifiedReference { path, type_args }),
                        self.span_from(start),
                    ));
                }
                let type_args = if self.at(SyntaxKind::LessThan) {
                    self.bump();
                    self.parse_type_arg_list()?
                } else {
                    Vec::new()
                };
                Ok(self.alloc(
                    Node::Type(TypeNode::Reference { name, type_args }),
                    self.span_from(start),
                ))
            }
        }
    }

    fn looks_like_function_type(&self) -> bool {
        let mut depth = 0i32;
        let mut i = self.pos;
        loop {
            let k = self.tokens.get(i).map(|t| t.kind).unwrap_or(SyntaxKind::EndOfFile);
            match k {
                SyntaxKind::OpenParen => depth += 1,
                SyntaxKind::CloseParen => {
                    depth -= 1;
                    if depth == 0 {
                        let next = self.tokens.get(i + 1).map(|t| t.kind);
                        return next == Some(SyntaxKind::EqualsGreaterThan);
                    }
                }
                SyntaxKind::EndOfFile => return false,
                _ => {}
            }
            i += 1;
            if i - self.pos > 2000 {
                return false;
            }
        }
    }

    fn parse_function_type(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let type_params = self.parse_optional_type_params()?;
        let params = self.parse_params()?;
        self.expect(SyntaxKind::EqualsGreaterThan, "'=>'")?;
        let return_type = self.parse_type()?;
        Ok(self.alloc(
            Node::Type(TypeNode::Function {
                type_params,
                params,
                return_type,
            }),
            self.span_from(start),
        ))
    }

    fn parse_type_arg_list(&mut self) -> PResult<NodeList> {
        let mut args = Vec::new();
        while !self.at(SyntaxKind::GreaterThan) && !self.at_end() {
            args.push(self.parse_type()?);
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::GreaterThan, "'>'")?;
        Ok(args)
    }

    fn parse_tuple_type(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.expect(SyntaxKind::OpenBracket, "'['")?;
        let mut elements = Vec::new();
        while !self.at(SyntaxKind::CloseBracket) && !self.at_end() {
            let rest = self.eat(SyntaxKind::DotDotDot);
            // labeled tuple element: `name: T` or `name?: T`
            let label = if self.at(SyntaxKind::Identifier)
                && matches!(
                    self.tokens.get(self.pos + 1).map(|t| t.kind),
                    Some(SyntaxKind::Colon) | Some(SyntaxKind::Question)
                ) {
                Some(self.intern(&self.bump().lexeme))
            } else {
                None
            };
            let optional = self.eat(SyntaxKind::Question);
            if label.is_some() {
                self.expect(SyntaxKind::Colon, "':'")?;
            }
            let type_node = self.parse_type()?;
            elements.push(TupleTypeElement {
                label,
                type_node,
                optional,
                rest,
            });
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::CloseBracket, "']'")?;
        Ok(self.alloc(
            Node::Type(TypeNode::Tuple { elements }),
            self.span_from(start),
        ))
    }

    fn parse_object_or_mapped_type(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.expect(SyntaxKind::OpenBrace, "'{'")?;
        // Mapped type: `{ [P in K]: V }` or with +/- readonly/?
        if self.is_mapped_type_start() {
            let mut add_readonly = None;
            if self.at(SyntaxKind::Plus) || self.at(SyntaxKind::Minus) {
                let minus = self.at(SyntaxKind::Minus);
                self.bump();
                self.expect(SyntaxKind::ReadonlyKeyword, "'readonly'")?;
                add_readonly = Some(!minus);
            } else if self.eat(SyntaxKind::ReadonlyKeyword) {
                add_readonly = Some(true);
            }
            self.expect(SyntaxKind::OpenBracket, "'['")?;
            let tok = self.expect(SyntaxKind::Identifier, "mapped type parameter")?;
            let param = self.intern(&tok.lexeme);
            self.expect(SyntaxKind::InKeyword, "'in'")?;
            let constraint = self.parse_type()?;
            let as_clause = if self.eat(SyntaxKind::AsKeyword) {
                Some(self.parse_type()?)
            } else {
                None
            };
            self.expect(SyntaxKind::CloseBracket, "']'")?;
            let mut add_optional = None;
            if self.at(SyntaxKind::Plus) || self.at(SyntaxKind::Minus) {
                let minus = self.at(SyntaxKind::Minus);
                self.bump();
                self.expect(SyntaxKind::Question, "'?'")?;
                add_optional = Some(!minus);
            } else if self.eat(SyntaxKind::Question) {
                add_optional = Some(true);
            }
            self.expect(SyntaxKind::Colon, "':'")?;
            let value = self.parse_type()?;
            self.eat(SyntaxKind::Semicolon);
            self.expect(SyntaxKind::CloseBrace, "'}'")?;
            return Ok(self.alloc(
                Node::Type(TypeNode::Mapped {
                    param,
                    constraint,
                    value,
                    as_clause,
                    add_optional,
                    add_readonly,
                }),
                self.span_from(start),
            ));
        }

        let mut members = Vec::new();
        while !self.at(SyntaxKind::CloseBrace) && !self.at_end() {
            members.push(self.parse_type_member()?);
            self.eat(SyntaxKind::Semicolon);
            self.eat(SyntaxKind::Comma);
        }
        self.expect(SyntaxKind::CloseBrace, "'}'")?;
        Ok(self.alloc(
            Node::Type(TypeNode::ObjectLiteral { members }),
            self.span_from(start),
        ))
    }

    fn is_mapped_type_start(&self) -> bool {
        let mut i = self.pos;
        let peek = |off: usize| {
            self.tokens
                .get(i + off)
                .map(|t| t.kind)
                .unwrap_or(SyntaxKind::EndOfFile)
        };
        if matches!(peek(0), SyntaxKind::Plus | SyntaxKind::Minus) {
            i += 1;
        }
        if peek(0) == SyntaxKind::ReadonlyKeyword {
            i += 1;
        }
        if peek(0) != SyntaxKind::OpenBracket {
            return false;
        }
        if peek(1) != SyntaxKind::Identifier {
            return false;
        }
        peek(2) == SyntaxKind::InKeyword
    }

    fn parse_type_member_list(&mut self) -> PResult<Vec<TypeMember>> {
        self.expect(SyntaxKind::OpenBrace, "'{'")?;
        let mut members = Vec::new();
        while !self.at(SyntaxKind::CloseBrace) && !self.at_end() {
            members.push(self.parse_type_member()?);
            self.eat(SyntaxKind::Semicolon);
            self.eat(SyntaxKind::Comma);
        }
        self.expect(SyntaxKind::CloseBrace, "'}'")?;
        Ok(members)
    }

    fn parse_type_member(&mut self) -> PResult<TypeMember> {
        let readonly = self.eat(SyntaxKind::ReadonlyKeyword);
        // index signature: [key: string]: T
        if self.at(SyntaxKind::OpenBracket)
            && matches!(
                self.tokens.get(self.pos + 2).map(|t| t.kind),
                Some(SyntaxKind::Colon)
            )
        {
            self.bump();
            let _key_name = self.bump();
            self.expect(SyntaxKind::Colon, "':'")?;
            let index_key_type = self.parse_type()?;
            self.expect(SyntaxKind::CloseBracket, "']'")?;
            self.expect(SyntaxKind::Colon, "':'")?;
            let value = self.parse_type()?;
            return Ok(TypeMember {
                key: PropertyKey::Ident(self.intern("__index")),
                type_node: Some(value),
                optional: false,
                readonly,
                sig: None,
                index_key_type: Some(index_key_type),
            });
        }
        let (key, _) = self.parse_property_key()?;
        let optional = self.eat(SyntaxKind::Question);
        if self.at(SyntaxKind::OpenParen) || self.at(SyntaxKind::LessThan) {
            let type_params = self.parse_optional_type_params()?;
            let params = self.parse_params()?;
            let return_type = if self.eat(SyntaxKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            return Ok(TypeMember {
                key,
                type_node: return_type,
                optional,
                readonly,
                sig: Some(FunctionSig {
                    name: None,
                    type_params,
                    params,
                    return_type,
                    body: None,
                    modifiers: FunctionModifiers::Plain,
                    is_arrow: false,
                }),
                index_key_type: None,
            });
        }
        self.expect(SyntaxKind::Colon, "':'")?;
        let type_node = Some(self.parse_type()?);
        Ok(TypeMember {
            key,
            type_node,
            optional,
            readonly,
            sig: None,
            index_key_type: None,
        })
    }

    // ---- expressions ----

    fn parse_expression(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let first = self.parse_assignment()?;
        if !self.at(SyntaxKind::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(SyntaxKind::Comma) {
            items.push(self.parse_assignment()?);
        }
        Ok(self.alloc(Node::Sequence(items), self.span_from(start)))
    }

    fn assign_op_for_current(&self) -> Option<AssignOp> {
        use SyntaxKind::*;
        Some(match self.kind() {
            Equals => AssignOp::Plain,
            PlusEquals => AssignOp::Add,
            MinusEquals => AssignOp::Sub,
            AsteriskEquals => AssignOp::Mul,
            SlashEquals => AssignOp::Div,
            PercentEquals => AssignOp::Mod,
            AsteriskAsteriskEquals => AssignOp::Pow,
            LessThanLessThanEquals => AssignOp::Shl,
            GreaterThanGreaterThanEquals => AssignOp::Shr,
            GreaterThanGreaterThanGreaterThanEquals => AssignOp::UShr,
            AmpersandEquals => AssignOp::BitAnd,
            BarEquals => AssignOp::BitOr,
            CaretEquals => AssignOp::BitXor,
            AmpersandAmpersandEquals => AssignOp::AndAnd,
            BarBarEquals => AssignOp::OrOr,
            QuestionQuestionEquals => AssignOp::NullishCoalesce,
            _ => return None,
        })
    }

    pub fn parse_assignment(&mut self) -> PResult<NodeIndex> {
        if let Some(arrow) = self.try_parse_arrow()? {
            return Ok(arrow);
        }
        if self.at(SyntaxKind::YieldKeyword) {
            return self.parse_yield();
        }
        let start = self.cur().span.start;
        let lhs = self.parse_ternary()?;
        if let Some(op) = self.assign_op_for_current() {
            self.bump();
            let value = self.parse_assignment()?;
            return Ok(if op == AssignOp::Plain {
                self.alloc(Node::Assign { target: lhs, value }, self.span_from(start))
            } else {
                self.alloc(
                    Node::CompoundSet {
                        op,
                        target: lhs,
                        value,
                    },
                    self.span_from(start),
                )
            });
        }
        Ok(lhs)
    }

    fn parse_yield(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        let delegate = self.eat(SyntaxKind::Asterisk);
        let argument = if self.at(SyntaxKind::Semicolon)
            || self.at(SyntaxKind::CloseParen)
            || self.at(SyntaxKind::CloseBracket)
            || self.at(SyntaxKind::CloseBrace)
            || self.at(SyntaxKind::Comma)
            || self.at(SyntaxKind::Colon)
            || self.at_end()
            || self.cur().preceded_by_newline
        {
            None
        } else {
            Some(self.parse_assignment()?)
        };
        Ok(self.alloc(
            Node::Yield { delegate, argument },
            self.span_from(start),
        ))
    }

    /// Lookahead-based arrow-function detection: `ident =>` or `(...) =>`,
    /// optionally preceded by `async`.
    fn try_parse_arrow(&mut self) -> PResult<Option<NodeIndex>> {
        let start = self.cur().span.start;
        let save = self.pos;
        let is_async = self.at(SyntaxKind::AsyncKeyword)
            && !self.tokens[self.pos + 1].preceded_by_newline
            && matches!(
                self.tokens.get(self.pos + 1).map(|t| t.kind),
                Some(SyntaxKind::OpenParen) | Some(SyntaxKind::Identifier)
            );
        if is_async {
            self.bump();
        }
        let simple_ident = self.at(SyntaxKind::Identifier)
            && self.tokens.get(self.pos + 1).map(|t| t.kind) == Some(SyntaxKind::EqualsGreaterThan);
        let paren_arrow = self.at(SyntaxKind::OpenParen) && self.looks_like_arrow_params();
        if !simple_ident && !paren_arrow {
            self.pos = save;
            return Ok(None);
        }
        let type_params = self.parse_optional_type_params().unwrap_or_default();
        let params = if simple_ident {
            let tok = self.bump();
            vec![Param {
                pattern: {
                    let name = self.intern(&tok.lexeme);
                    self.alloc(Node::Identifier(name), tok.span)
                },
                type_ann: None,
                default: None,
                optional: false,
                rest: false,
            }]
        } else {
            match self.parse_params() {
                Ok(p) => p,
                Err(()) => {
                    self.pos = save;
                    return Ok(None);
                }
            }
        };
        let return_type = if self.eat(SyntaxKind::Colon) {
            Some(self.parse_type()?)
        } else {
            None
        };
        if !self.eat(SyntaxKind::EqualsGreaterThan) {
            self.pos = save;
            return Ok(None);
        }
        let body = if self.at(SyntaxKind::OpenBrace) {
            self.parse_block_stmt()?
        } else {
            self.parse_assignment()?
        };
        Ok(Some(self.alloc(
            Node::ArrowFunction(FunctionSig {
                name: None,
                type_params,
                params,
                return_type,
                body: Some(body),
                modifiers: FunctionModifiers::new(is_async, false),
                is_arrow: true,
            }),
            self.span_from(start),
        )))
    }

    fn looks_like_arrow_params(&self) -> bool {
        let mut depth = 0i32;
        let mut i = self.pos;
        loop {
            let k = self.tokens.get(i).map(|t| t.kind).unwrap_or(SyntaxKind::EndOfFile);
            match k {
                SyntaxKind::OpenParen => depth += 1,
                SyntaxKind::CloseParen => {
                    depth -= 1;
                    if depth == 0 {
                        let next = self.tokens.get(i + 1).map(|t| t.kind);
                        return next == Some(SyntaxKind::EqualsGreaterThan)
                            || next == Some(SyntaxKind::Colon);
                    }
                }
                SyntaxKind::EndOfFile => return false,
                _ => {}
            }
            i += 1;
            if i - self.pos > 2000 {
                return false;
            }
        }
    }

    fn parse_ternary(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let cond = self.parse_nullish()?;
        if self.eat(SyntaxKind::Question) {
            let then_expr = self.parse_assignment()?;
            self.expect(SyntaxKind::Colon, "':'")?;
            let else_expr = self.parse_assignment()?;
            return Ok(self.alloc(
                Node::Ternary {
                    cond,
                    then_expr,
                    else_expr,
                },
                self.span_from(start),
            ));
        }
        Ok(cond)
    }

    fn parse_nullish(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let mut left = self.parse_logical_or()?;
        while self.eat(SyntaxKind::QuestionQuestion) {
            let right = self.parse_logical_or()?;
            left = self.alloc(
                Node::NullishCoalescing { left, right },
                self.span_from(start),
            );
        }
        Ok(left)
    }

    fn parse_logical_or(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let mut left = self.parse_logical_and()?;
        while self.eat(SyntaxKind::BarBar) {
            let right = self.parse_logical_and()?;
            left = self.alloc(
                Node::Logical {
                    op: LogicalOp::Or,
                    left,
                    right,
                },
                self.span_from(start),
            );
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let mut left = self.parse_bit_or()?;
        while self.eat(SyntaxKind::AmpersandAmpersand) {
            let right = self.parse_bit_or()?;
            left = self.alloc(
                Node::Logical {
                    op: LogicalOp::And,
                    left,
                    right,
                },
                self.span_from(start),
            );
        }
        Ok(left)
    }

    fn parse_bit_or(&mut self) -> PResult<NodeIndex> {
        self.binary_level(&[(SyntaxKind::Bar, BinaryOp::BitOr)], Self::parse_bit_xor)
    }

    fn parse_bit_xor(&mut self) -> PResult<NodeIndex> {
        self.binary_level(&[(SyntaxKind::Caret, BinaryOp::BitXor)], Self::parse_bit_and)
    }

    fn parse_bit_and(&mut self) -> PResult<NodeIndex> {
        self.binary_level(
            &[(SyntaxKind::Ampersand, BinaryOp::BitAnd)],
            Self::parse_equality,
        )
    }

    fn parse_equality(&mut self) -> PResult<NodeIndex> {
        self.binary_level(
            &[
                (SyntaxKind::EqualsEqualsEquals, BinaryOp::EqEqEq),
                (SyntaxKind::ExclamationEqualsEquals, BinaryOp::NotEqEq),
                (SyntaxKind::EqualsEquals, BinaryOp::EqEq),
                (SyntaxKind::ExclamationEquals, BinaryOp::NotEq),
            ],
            Self::parse_relational,
        )
    }

    fn parse_relational(&mut self) -> PResult<NodeIndex> {
        self.binary_level(
            &[
                (SyntaxKind::LessThanEquals, BinaryOp::Le),
                (SyntaxKind::GreaterThanEquals, BinaryOp::Ge),
                (SyntaxKind::LessThan, BinaryOp::Lt),
                (SyntaxKind::GreaterThan, BinaryOp::Gt),
                (SyntaxKind::InstanceofKeyword, BinaryOp::Instanceof),
                (SyntaxKind::InKeyword, BinaryOp::In),
            ],
            Self::parse_shift,
        )
    }

    fn parse_shift(&mut self) -> PResult<NodeIndex> {
        self.binary_level(
            &[
                (SyntaxKind::LessThanLessThan, BinaryOp::Shl),
                (
                    SyntaxKind::GreaterThanGreaterThanGreaterThan,
                    BinaryOp::UShr,
                ),
                (SyntaxKind::GreaterThanGreaterThan, BinaryOp::Shr),
            ],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> PResult<NodeIndex> {
        self.binary_level(
            &[(SyntaxKind::Plus, BinaryOp::Add), (SyntaxKind::Minus, BinaryOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> PResult<NodeIndex> {
        self.binary_level(
            &[
                (SyntaxKind::Asterisk, BinaryOp::Mul),
                (SyntaxKind::Slash, BinaryOp::Div),
                (SyntaxKind::Percent, BinaryOp::Mod),
            ],
            Self::parse_exponent,
        )
    }

    fn parse_exponent(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let left = self.parse_unary()?;
        if self.eat(SyntaxKind::AsteriskAsterisk) {
            let right = self.parse_exponent()?; // right-associative
            return Ok(self.alloc(
                Node::Binary {
                    op: BinaryOp::Pow,
                    left,
                    right,
                },
                self.span_from(start),
            ));
        }
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[(SyntaxKind, BinaryOp)],
        mut next: impl FnMut(&mut Self) -> PResult<NodeIndex>,
    ) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let mut left = next(self)?;
        loop {
            let found = ops.iter().find(|(k, _)| self.at(*k)).copied();
            match found {
                Some((_, op)) => {
                    self.bump();
                    let right = next(self)?;
                    left = self.alloc(Node::Binary { op, left, right }, self.span_from(start));
                }
                None => break,
            }
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let op = match self.kind() {
            SyntaxKind::Plus => Some(UnaryOp::Plus),
            SyntaxKind::Minus => Some(UnaryOp::Minus),
            SyntaxKind::Exclamation => Some(UnaryOp::Not),
            SyntaxKind::Tilde => Some(UnaryOp::BitNot),
            SyntaxKind::TypeofKeyword => Some(UnaryOp::Typeof),
            SyntaxKind::VoidKeyword => Some(UnaryOp::Void),
            SyntaxKind::DeleteKeyword => Some(UnaryOp::Delete),
            _ => None,
        };
        if let Some(op) = op {
            self.bump();
            let operand = self.parse_unary()?;
            return Ok(self.alloc(Node::Unary { op, operand }, self.span_from(start)));
        }
        if self.at(SyntaxKind::PlusPlus) || self.at(SyntaxKind::MinusMinus) {
            let decrement = self.at(SyntaxKind::MinusMinus);
            self.bump();
            let operand = self.parse_unary()?;
            return Ok(self.alloc(
                Node::PrefixIncrement { decrement, operand },
                self.span_from(start),
            ));
        }
        if self.at(SyntaxKind::AwaitKeyword) {
            self.bump();
            let operand = self.parse_unary()?;
            return Ok(self.alloc(Node::Await(operand), self.span_from(start)));
        }
        if self.at(SyntaxKind::LessThan) {
            // legacy type assertion `<T>expr` (ambiguous with JSX, unused here)
            self.bump();
            let type_node = self.parse_type()?;
            self.expect(SyntaxKind::GreaterThan, "'>'")?;
            let expr = self.parse_unary()?;
            return Ok(self.alloc(
                Node::TypeAssertion { type_node, expr },
                self.span_from(start),
            ));
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let mut expr = self.parse_lhs_expr()?;
        if (self.at(SyntaxKind::PlusPlus) || self.at(SyntaxKind::MinusMinus))
            && !self.cur().preceded_by_newline
        {
            let decrement = self.at(SyntaxKind::MinusMinus);
            self.bump();
            expr = self.alloc(
                Node::PostfixIncrement {
                    decrement,
                    operand: expr,
                },
                self.span_from(start),
            );
        }
        if self.eat(SyntaxKind::AsKeyword) {
            let type_node = self.parse_type()?;
            expr = self.alloc(
                Node::TypeAssertion {
                    type_node,
                    expr,
                },
                self.span_from(start),
            );
        }
        Ok(expr)
    }

    fn parse_lhs_expr(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let mut expr = if self.at(SyntaxKind::NewKeyword) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        loop {
            expr = match self.kind() {
                SyntaxKind::Dot => {
                    self.bump();
                    let name_tok = self.bump();
                    let name = self.intern(&name_tok.lexeme);
                    self.alloc(
                        Node::Get {
                            object: expr,
                            name,
                            optional: false,
                        },
                        self.span_from(start),
                    )
                }
                SyntaxKind::QuestionDot => {
                    self.bump();
                    if self.at(SyntaxKind::OpenParen) {
                        let (type_args, args) = self.parse_call_args()?;
                        self.alloc(
                            Node::Call {
                                callee: expr,
                                type_args,
                                args,
                                optional: true,
                            },
                            self.span_from(start),
                        )
                    } else if self.at(SyntaxKind::OpenBracket) {
                        self.bump();
                        let index = self.parse_expression()?;
                        self.expect(SyntaxKind::CloseBracket, "']'")?;
                        self.alloc(
                            Node::GetIndex {
                                object: expr,
                                index,
                                optional: true,
                            },
                            self.span_from(start),
                        )
                    } else {
                        let name_tok = self.bump();
                        let name = self.intern(&name_tok.lexeme);
                        self.alloc(
                            Node::Get {
                                object: expr,
                                name,
                                optional: true,
                            },
                            self.span_from(start),
                        )
                    }
                }
                SyntaxKind::OpenBracket => {
                    self.bump();
                    let index = self.parse_expression()?;
                    self.expect(SyntaxKind::CloseBracket, "']'")?;
                    self.alloc(
                        Node::GetIndex {
                            object: expr,
                            index,
                            optional: false,
                        },
                        self.span_from(start),
                    )
                }
                SyntaxKind::OpenParen => {
                    let (type_args, args) = self.parse_call_args()?;
                    self.alloc(
                        Node::Call {
                            callee: expr,
                            type_args,
                            args,
                            optional: false,
                        },
                        self.span_from(start),
                    )
                }
                SyntaxKind::Exclamation if !self.cur().preceded_by_newline => {
                    self.bump();
                    self.alloc(Node::NonNullAssertion(expr), self.span_from(start))
                }
                SyntaxKind::NoSubstitutionTemplateLiteral | SyntaxKind::TemplateHead => {
                    let quasi = self.parse_template_literal()?;
                    self.alloc(
                        Node::TaggedTemplate { tag: expr, quasi },
                        self.span_from(start),
                    )
                }
                // `foo<T>(x)` vs. `foo < t`: try the type-argument reading and
                // fall back to treating `<` as less-than on any mismatch.
                SyntaxKind::LessThan => {
                    let save = self.pos;
                    let diag_len = self.diagnostics.len();
                    self.bump();
                    let type_args = self
                        .parse_type_arg_list()
                        .ok()
                        .filter(|_| self.at(SyntaxKind::OpenParen));
                    match type_args {
                        Some(type_args) => {
                            let (_, args) = self.parse_call_args()?;
                            self.alloc(
                                Node::Call {
                                    callee: expr,
                                    type_args,
                                    args,
                                    optional: false,
                                },
                                self.span_from(start),
                            )
                        }
                        None => {
                            self.pos = save;
                            self.diagnostics.truncate(diag_len);
                            break;
                        }
                    }
                }
                _ => break,
            };
        }
        Ok(expr)
    }

    /// Parses a call's argument list. Any explicit type-argument list before
    /// the parens is the caller's responsibility (see the `LessThan` arm in
    /// `parse_lhs_expr`); this only ever sees the opening `(`.
    fn parse_call_args(&mut self) -> PResult<(NodeList, Vec<Argument>)> {
        let type_args = Vec::new();
        self.expect(SyntaxKind::OpenParen, "'('")?;
        let mut args = Vec::new();
        while !self.at(SyntaxKind::CloseParen) && !self.at_end() {
            let spread = self.eat(SyntaxKind::DotDotDot);
            let value = self.parse_assignment()?;
            args.push(Argument { value, spread });
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::CloseParen, "')'")?;
        Ok((type_args, args))
    }

    fn parse_new(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.bump();
        let callee = self.parse_lhs_expr_no_call()?;
        let type_args = if self.at(SyntaxKind::LessThan) {
            self.bump();
            self.parse_type_arg_list().unwrap_or_default()
        } else {
            Vec::new()
        };
        let args = if self.at(SyntaxKind::OpenParen) {
            self.parse_call_args()?.1
        } else {
            Vec::new()
        };
        Ok(self.alloc(
            Node::New {
                callee,
                type_args,
                args,
            },
            self.span_from(start),
        ))
    }

    fn parse_lhs_expr_no_call(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        let mut expr = if self.at(SyntaxKind::NewKeyword) {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };
        while self.eat(SyntaxKind::Dot) {
            let name_tok = self.bump();
            let name = self.intern(&name_tok.lexeme);
            expr = self.alloc(
                Node::Get {
                    object: expr,
                    name,
                    optional: false,
                },
                self.span_from(start),
            );
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        match self.kind() {
            SyntaxKind::NumericLiteral => {
                let tok = self.bump();
                let v = match &tok.literal {
                    Some(crate::LiteralValueAlias::Number(n)) => *n,
                    _ => 0.0,
                };
                Ok(self.alloc(Node::NumberLit(v), self.span_from(start)))
            }
            SyntaxKind::BigIntLiteral => {
                let tok = self.bump();
                let text = tok.lexeme.trim_end_matches('n').to_string();
                Ok(self.alloc(Node::BigIntLit(text), self.span_from(start)))
            }
            SyntaxKind::StringLiteral => {
                let tok = self.bump();
                let text = string_literal_text(&tok);
                Ok(self.alloc(Node::StringLit(self.intern(&text)), self.span_from(start)))
            }
            SyntaxKind::NoSubstitutionTemplateLiteral | SyntaxKind::TemplateHead => {
                self.parse_template_literal()
            }
            SyntaxKind::TrueKeyword => {
                self.bump();
                Ok(self.alloc(Node::BoolLit(true), self.span_from(start)))
            }
            SyntaxKind::FalseKeyword => {
                self.bump();
                Ok(self.alloc(Node::BoolLit(false), self.span_from(start)))
            }
            SyntaxKind::NullKeyword => {
                self.bump();
                Ok(self.alloc(Node::NullLit, self.span_from(start)))
            }
            SyntaxKind::UndefinedKeyword => {
                self.bump();
                Ok(self.alloc(Node::UndefinedLit, self.span_from(start)))
            }
            SyntaxKind::ThisKeyword => {
                self.bump();
                Ok(self.alloc(Node::This, self.span_from(start)))
            }
            SyntaxKind::SuperKeyword => {
                self.bump();
                Ok(self.alloc(Node::Super, self.span_from(start)))
            }
            SyntaxKind::OpenParen => {
                self.bump();
                let inner = self.parse_expression()?;
                self.expect(SyntaxKind::CloseParen, "')'")?;
                Ok(self.alloc(Node::Grouping(inner), self.span_from(start)))
            }
            SyntaxKind::OpenBracket => self.parse_array_literal(),
            SyntaxKind::OpenBrace => self.parse_object_literal(),
            SyntaxKind::FunctionKeyword => {
                let sig = self.parse_function_sig(false)?;
                Ok(self.alloc(Node::Function(sig), self.span_from(start)))
            }
            SyntaxKind::AsyncKeyword if self.peek_is_function() => {
                self.bump();
                let sig = self.parse_function_sig(true)?;
                Ok(self.alloc(Node::Function(sig), self.span_from(start)))
            }
            SyntaxKind::ClassKeyword => self.parse_class(Vec::new(), false),
            SyntaxKind::DotDotDot => {
                self.bump();
                let inner = self.parse_assignment()?;
                Ok(self.alloc(Node::Spread(inner), self.span_from(start)))
            }
            _ => {
                let tok = self.bump();
                let name = self.intern(&tok.lexeme);
                Ok(self.alloc(Node::Identifier(name), self.span_from(start)))
            }
        }
    }

    fn parse_template_literal(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        if self.at(SyntaxKind::NoSubstitutionTemplateLiteral) {
            let tok = self.bump();
            let text = template_chunk_text(&tok.lexeme, true, true);
            return Ok(self.alloc(
                Node::TemplateLiteral {
                    quasis: vec![self.intern(&text)],
                    expressions: Vec::new(),
                },
                self.span_from(start),
            ));
        }
        let head_tok = self.expect(SyntaxKind::TemplateHead, "template literal")?;
        let mut quasis = vec![self.intern(&template_chunk_text(&head_tok.lexeme, true, false))];
        let mut expressions = Vec::new();
        loop {
            expressions.push(self.parse_expression()?);
            match self.kind() {
                SyntaxKind::TemplateMiddle => {
                    let tok = self.bump();
                    quasis.push(self.intern(&template_chunk_text(&tok.lexeme, false, false)));
                }
                SyntaxKind::TemplateTail => {
                    let tok = self.bump();
                    quasis.push(self.intern(&template_chunk_text(&tok.lexeme, false, true)));
                    break;
                }
                _ => {
                    self.diagnostics.push(Diagnostic::error(
                        codes::UNEXPECTED_TOKEN,
                        self.file.clone(),
                        self.cur().span,
                        "Expected template continuation.",
                    ));
                    break;
                }
            }
        }
        Ok(self.alloc(
            Node::TemplateLiteral {
                quasis,
                expressions,
            },
            self.span_from(start),
        ))
    }

    fn parse_array_literal(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.expect(SyntaxKind::OpenBracket, "'['")?;
        let mut elements = Vec::new();
        while !self.at(SyntaxKind::CloseBracket) && !self.at_end() {
            if self.at(SyntaxKind::Comma) {
                self.bump();
                elements.push(ArrayElement::Hole);
                continue;
            }
            if self.eat(SyntaxKind::DotDotDot) {
                let e = self.parse_assignment()?;
                elements.push(ArrayElement::Spread(e));
            } else {
                let e = self.parse_assignment()?;
                elements.push(ArrayElement::Item(e));
            }
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::CloseBracket, "']'")?;
        Ok(self.alloc(Node::ArrayLiteral(elements), self.span_from(start)))
    }

    fn parse_object_literal(&mut self) -> PResult<NodeIndex> {
        let start = self.cur().span.start;
        self.expect(SyntaxKind::OpenBrace, "'{'")?;
        let mut properties = Vec::new();
        while !self.at(SyntaxKind::CloseBrace) && !self.at_end() {
            if self.eat(SyntaxKind::DotDotDot) {
                let value = self.parse_assignment()?;
                properties.push(ObjectProperty {
                    key: PropertyKey::Ident(self.intern("")),
                    value,
                    shorthand: false,
                    computed: false,
                    spread: true,
                });
                if !self.eat(SyntaxKind::Comma) {
                    break;
                }
                continue;
            }
            let is_async = self.at(SyntaxKind::AsyncKeyword) && self.peek_member_continues();
            if is_async {
                self.bump();
            }
            let is_generator = self.eat(SyntaxKind::Asterisk);
            let is_getter = self.at(SyntaxKind::GetKeyword) && self.peek_member_continues();
            let is_setter = self.at(SyntaxKind::SetKeyword) && self.peek_member_continues();
            if is_getter || is_setter {
                self.bump();
            }
            let computed = self.at(SyntaxKind::OpenBracket);
            let (key, _) = self.parse_property_key()?;
            if self.at(SyntaxKind::OpenParen) || is_getter || is_setter {
                let params = self.parse_params()?;
                let return_type = if self.eat(SyntaxKind::Colon) {
                    Some(self.parse_type()?)
                } else {
                    None
                };
                let body = Some(self.parse_block_stmt()?);
                let sig = FunctionSig {
                    name: None,
                    type_params: Vec::new(),
                    params,
                    return_type,
                    body,
                    modifiers: FunctionModifiers::new(is_async, is_generator),
                    is_arrow: false,
                };
                let fn_span = self.span_from(start);
                let value = self.alloc(Node::Function(sig), fn_span);
                properties.push(ObjectProperty {
                    key,
                    value,
                    shorthand: false,
                    computed,
                    spread: false,
                });
            } else if self.eat(SyntaxKind::Colon) {
                let value = self.parse_assignment()?;
                properties.push(ObjectProperty {
                    key,
                    value,
                    shorthand: false,
                    computed,
                    spread: false,
                });
            } else {
                let name = match &key {
                    PropertyKey::Ident(a) => *a,
                    _ => self.intern("_"),
                };
                let value = self.alloc(Node::Identifier(name), self.tokens[self.pos.saturating_sub(1)].span);
                let value = if self.eat(SyntaxKind::Equals) {
                    let default = self.parse_assignment()?;
                    self.alloc(
                        Node::Assign {
                            target: value,
                            value: default,
                        },
                        self.span_from(start),
                    )
                } else {
                    value
                };
                properties.push(ObjectProperty {
                    key,
                    value,
                    shorthand: true,
                    computed: false,
                    spread: false,
                });
            }
            if !self.eat(SyntaxKind::Comma) {
                break;
            }
        }
        self.expect(SyntaxKind::CloseBrace, "'}'")?;
        Ok(self.alloc(Node::ObjectLiteral(properties), self.span_from(start)))
    }
}

fn string_literal_text(tok: &Token) -> String {
    match &tok.literal {
        Some(tsz_scanner::LiteralValue::String(s)) => s.clone(),
        _ => tok.lexeme.trim_matches(|c| c == '"' || c == '\'').to_string(),
    }
}

/// Strips the delimiters from a template chunk's raw lexeme. Every chunk's
/// leading delimiter (backtick or `}`) is one byte; the trailing delimiter
/// is one byte for a backtick close or two bytes for a `${` reopen.
fn template_chunk_text(lexeme: &str, _has_head_tick: bool, has_tail_tick: bool) -> String {
    let s = &lexeme[1..];
    let s = if has_tail_tick {
        &s[..s.len().saturating_sub(1)]
    } else {
        &s[..s.len().saturating_sub(2)]
    };
    s.to_string()
}

// Alias so parse_primary's numeric-literal match reads naturally without a
// second `use` import cycle.
pub(crate) use tsz_scanner::LiteralValue as LiteralValueAlias;
