// src/parser/brine_parser.rs
use crate::error::compile_error::CompileError;
use crate::location::source_span::SourceSpan;
use crate::parser::ast::{Expr, Function, Stmt};
use crate::parser::precedence::{binary_op, binary_precedence};
use crate::tokens::token::Token;
use crate::tokens::token_kind::TokenKind;

/// Recursive-descent parser over a lexed token stream. Errors are
/// accumulated; on a failed statement the parser resynchronizes by skipping
/// one token and trying again.
pub struct BrineParser {
    tokens: Vec<Token>,
    current: usize,
    errors: Vec<CompileError>,
}

impl BrineParser {
    #[must_use]
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0, errors: Vec::new() }
    }

    /// Parses a whole translation unit: a sequence of function definitions.
    pub fn parse(mut self) -> (Vec<Function>, Vec<CompileError>) {
        let mut functions = Vec::new();
        while !self.is_at_end() {
            if let Some(function) = self.parse_function() {
                functions.push(function);
            } else {
                self.advance();
            }
        }
        (functions, self.errors)
    }

    fn parse_function(&mut self) -> Option<Function> {
        let int_token = self.expect(&TokenKind::KeywordInt, "expected a function definition")?;

        let (name, _) = self.expect_identifier("expected a function name")?;
        self.expect(&TokenKind::OpenParen, "expected '(' after the function name")?;
        self.expect(&TokenKind::CloseParen, "expected ')'; parameters are not supported")?;

        let body = self.parse_block()?;
        let span = match &body {
            Stmt::Block { span, .. } => int_token.span.merged(span),
            _ => int_token.span.clone(),
        };
        let statements = match body {
            Stmt::Block { statements, .. } => statements,
            _ => unreachable!("parse_block returns Stmt::Block"),
        };

        Some(Function { name, body: statements, span })
    }

    fn parse_statement(&mut self) -> Option<Stmt> {
        match self.peek_kind() {
            TokenKind::OpenBrace => self.parse_block(),
            TokenKind::KeywordIf => self.parse_if(),
            TokenKind::KeywordWhile => self.parse_while(),
            TokenKind::KeywordReturn => self.parse_return(),
            TokenKind::KeywordInt => self.parse_var_decl(),
            _ => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::Semicolon, "expected ';' after the expression")?;
                Some(Stmt::Expression { expr })
            }
        }
    }

    fn parse_block(&mut self) -> Option<Stmt> {
        let open = self.expect(&TokenKind::OpenBrace, "expected a '{' block")?;

        let mut statements = Vec::new();
        loop {
            match self.peek_kind() {
                TokenKind::CloseBrace => {
                    let close = self.advance().expect("peeked");
                    let span = open.span.merged(&close.span);
                    return Some(Stmt::Block { statements, span });
                }
                TokenKind::Eof => {
                    self.syntax_error("this '{' has no closing '}'", open.span.clone());
                    return None;
                }
                _ => {
                    if let Some(stmt) = self.parse_statement() {
                        statements.push(stmt);
                    } else {
                        self.advance();
                    }
                }
            }
        }
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        let if_token = self.advance().expect("checked by caller");

        self.expect(&TokenKind::OpenParen, "expected a '(' condition after 'if'")?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::CloseParen, "no closing ')' after the condition")?;

        let then_branch = Box::new(self.parse_statement()?);
        let mut span = if_token.span.merged(then_branch.span_ref());

        let else_branch = if self.match_token(&TokenKind::KeywordElse) {
            let stmt = Box::new(self.parse_statement()?);
            span = span.merged(stmt.span_ref());
            Some(stmt)
        } else {
            None
        };

        Some(Stmt::If { condition, then_branch, else_branch, span })
    }

    fn parse_while(&mut self) -> Option<Stmt> {
        let while_token = self.advance().expect("checked by caller");

        self.expect(&TokenKind::OpenParen, "expected a '(' condition after 'while'")?;
        let condition = self.parse_expr()?;
        self.expect(&TokenKind::CloseParen, "no closing ')' after the condition")?;

        let body = Box::new(self.parse_statement()?);
        let span = while_token.span.merged(body.span_ref());

        Some(Stmt::While { condition, body, span })
    }

    fn parse_return(&mut self) -> Option<Stmt> {
        let return_token = self.advance().expect("checked by caller");

        if self.match_token(&TokenKind::Semicolon) {
            return Some(Stmt::Return { value: None, span: return_token.span });
        }

        let value = self.parse_expr()?;
        self.expect(&TokenKind::Semicolon, "expected ';' after the return value")?;
        let span = return_token.span.merged(value.span());
        Some(Stmt::Return { value: Some(value), span })
    }

    fn parse_var_decl(&mut self) -> Option<Stmt> {
        let int_token = self.advance().expect("checked by caller");

        let (name, _) = self.expect_identifier("expected a variable name after 'int'")?;
        self.expect(&TokenKind::Equal, "a declaration requires an '=' initializer")?;
        let init = self.parse_expr()?;
        self.expect(&TokenKind::Semicolon, "expected ';' after the initializer")?;

        let span = int_token.span.merged(init.span());
        Some(Stmt::VarDecl { name, init, span })
    }

    fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_assignment()
    }

    fn parse_assignment(&mut self) -> Option<Expr> {
        // An assignment target is a lone identifier followed by '=';
        // anything else falls through to the binary grammar.
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            if self.peek_nth_kind(1) == Some(&TokenKind::Equal) {
                let name_token = self.advance().expect("peeked");
                self.advance(); // '='
                let value = self.parse_assignment()?;
                let span = name_token.span.merged(value.span());
                return Some(Expr::Assign {
                    name,
                    name_span: name_token.span,
                    value: Box::new(value),
                    span,
                });
            }
        }
        self.parse_binary(0)
    }

    fn parse_binary(&mut self, min_precedence: u8) -> Option<Expr> {
        let mut left = self.parse_primary()?;

        while binary_precedence(self.peek_kind()) > min_precedence {
            let op_token = self.advance().expect("operator peeked");
            let op = binary_op(&op_token.kind).expect("precedence admitted only operators");
            let right = self.parse_binary(binary_precedence(&op_token.kind))?;
            let span = left.span().merged(right.span());
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right), span };
        }

        Some(left)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        match self.peek_kind().clone() {
            TokenKind::Integer(value) => {
                let token = self.advance().expect("peeked");
                Some(Expr::Integer { value, span: token.span })
            }
            TokenKind::Identifier(name) => {
                let token = self.advance().expect("peeked");
                Some(Expr::Variable { name, span: token.span })
            }
            TokenKind::OpenParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::CloseParen, "no closing ')'")?;
                Some(expr)
            }
            _ => {
                let span = self.peek_span();
                self.syntax_error("expected an expression", span);
                None
            }
        }
    }

    // Token-stream helpers.

    fn peek(&self) -> &Token {
        self.tokens.get(self.current).unwrap_or_else(|| {
            self.tokens.last().expect("the lexer always emits at least the Eof token")
        })
    }

    fn peek_kind(&self) -> &TokenKind {
        &self.peek().kind
    }

    fn peek_nth_kind(&self, n: usize) -> Option<&TokenKind> {
        self.tokens.get(self.current + n).map(|t| &t.kind)
    }

    fn peek_span(&self) -> SourceSpan {
        self.peek().span.clone()
    }

    fn is_at_end(&self) -> bool {
        matches!(self.peek_kind(), TokenKind::Eof)
    }

    fn advance(&mut self) -> Option<Token> {
        if self.is_at_end() {
            return None;
        }
        let token = self.tokens[self.current].clone();
        self.current += 1;
        Some(token)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == kind {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, message: &str) -> Option<Token> {
        if self.peek_kind() == kind {
            self.advance()
        } else {
            let found = self.peek_kind().clone();
            let span = self.peek_span();
            self.syntax_error(&format!("{message} (found {found})"), span);
            None
        }
    }

    fn expect_identifier(&mut self, message: &str) -> Option<(String, SourceSpan)> {
        if let TokenKind::Identifier(name) = self.peek_kind().clone() {
            let token = self.advance().expect("peeked");
            Some((name, token.span))
        } else {
            let found = self.peek_kind().clone();
            let span = self.peek_span();
            self.syntax_error(&format!("{message} (found {found})"), span);
            None
        }
    }

    fn syntax_error(&mut self, message: &str, span: SourceSpan) {
        self.errors.push(CompileError::Syntax { message: message.to_string(), span });
    }
}

impl Stmt {
    fn span_ref(&self) -> &SourceSpan {
        match self {
            Stmt::Block { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::VarDecl { span, .. } => span,
            Stmt::Expression { expr } => expr.span(),
        }
    }
}
