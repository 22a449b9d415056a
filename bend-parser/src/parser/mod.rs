//! Recursive-descent parser for Bend with one precedence-climbing core shared
//! by types and terms.
//!
//! The grammar has genuine ambiguities (generic calls against comparisons,
//! the three `def` forms, equality types against implicit arguments). Each is
//! resolved by a bounded speculative parse: take a [`Checkpoint`], try the
//! preferred reading, and rewind cursor, arena and diagnostics if it fails.
//! Failed attempts are remembered by token position so a region is never
//! retried for the same production.

mod cases;
mod decl;
mod expr;
mod pattern;
mod prec;

use std::collections::HashSet;

use diagnostics::{Diagnostic, Span};
use tracing::{debug, trace};

use crate::ast::{Ast, AstMark, Expression, Literal, Program, Term, TermId, Usage};
use crate::config::ParserConfig;
use crate::error::ParseError;
use crate::lexer::{self, Lexed, Lexer};
use crate::token::{Token, TokenKind};

use prec::Restrictions;

pub(crate) type PResult<T> = Result<T, ParseError>;

/// One nesting level spans several parser frames; grow before this much
/// stack is left.
const STACK_RED_ZONE: usize = 128 * 1024;
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

/// Parse a complete source file, failing if anything was reported.
///
/// ```
/// use bend_parser::parse_program;
///
/// let program = parse_program("def inc(x: Nat) -> Nat : x + 1n").unwrap();
/// assert_eq!(program.items.len(), 1);
/// ```
pub fn parse_program(source: &str) -> Result<Program, Vec<Diagnostic>> {
    let output = Parser::new(source).parse();
    if output.diagnostics.is_empty() {
        Ok(output.program)
    } else {
        Err(output.diagnostics)
    }
}

/// Parse a source file, returning the best-effort tree alongside every
/// diagnostic. A tree returned with diagnostics contains `Error` nodes.
///
/// ```
/// use bend_parser::parse_program_with_errors;
///
/// let (program, errors) = parse_program_with_errors("def a : ) def b : 1n");
/// assert_eq!(errors.len(), 1);
/// assert_eq!(program.items.len(), 2);
/// ```
pub fn parse_program_with_errors(source: &str) -> (Program, Vec<Diagnostic>) {
    let output = Parser::new(source).parse();
    (output.program, output.diagnostics)
}

/// Parse a single expression in statement position, e.g. a REPL line.
///
/// ```
/// use bend_parser::parse_expression;
///
/// let expr = parse_expression("1n + 2n * 3n").unwrap();
/// assert_eq!(expr.sexp(), "(+ 1n (* 2n 3n))");
/// ```
pub fn parse_expression(source: &str) -> Result<Expression, Vec<Diagnostic>> {
    Parser::new(source).parse_expression()
}

/// A program together with everything reported while building it.
#[derive(Clone, Debug)]
pub struct ParseOutput {
    pub program: Program,
    pub diagnostics: Vec<Diagnostic>,
}

/// Productions that are tried speculatively and memoised on failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Attempt {
    Generic,
    Equality,
    TypedLet,
}

#[derive(Clone, Copy, Debug)]
struct Checkpoint {
    pos: usize,
    split: bool,
    prev_span: Span,
    diagnostics: usize,
    ast: AstMark,
}

/// One parse session over one source buffer.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// The first `>` of the current `>>` token already closed a generic list.
    split: bool,
    prev_span: Span,
    ast: Ast,
    diagnostics: Vec<Diagnostic>,
    config: ParserConfig,
    depth: usize,
    restrict: Restrictions,
    failed: HashSet<(usize, Attempt)>,
}

impl Parser {
    pub fn new(source: &str) -> Self {
        Self::with_config(source, ParserConfig::default())
    }

    pub fn with_config(source: &str, config: ParserConfig) -> Self {
        let Lexed {
            tokens,
            diagnostics,
        } = Lexer::tokenize(source);
        debug!(
            tokens = tokens.len(),
            lexical_errors = diagnostics.len(),
            "tokenized source"
        );
        Self {
            tokens,
            pos: 0,
            split: false,
            prev_span: Span::default(),
            ast: Ast::default(),
            diagnostics,
            config,
            depth: 0,
            restrict: Restrictions::default(),
            failed: HashSet::new(),
        }
    }

    pub fn parse(mut self) -> ParseOutput {
        let items = self.parse_items();
        debug!(
            items = items.len(),
            nodes = self.ast.terms.len(),
            diagnostics = self.diagnostics.len(),
            "parsed program"
        );
        ParseOutput {
            program: Program {
                ast: self.ast,
                items,
            },
            diagnostics: self.diagnostics,
        }
    }

    pub fn parse_expression(mut self) -> Result<Expression, Vec<Diagnostic>> {
        let result = self.parse_stmt().and_then(|root| {
            if self.at(TokenKind::Eof) {
                Ok(root)
            } else {
                Err(self.unexpected("end of input"))
            }
        });
        debug!(
            nodes = self.ast.terms.len(),
            ok = result.is_ok(),
            "parsed expression"
        );
        match result {
            Ok(root) if self.diagnostics.is_empty() => Ok(Expression {
                ast: self.ast,
                root,
            }),
            Ok(_) => Err(self.diagnostics),
            Err(err) => {
                self.diagnostics.push(err.into());
                Err(self.diagnostics)
            }
        }
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind(&self) -> TokenKind {
        match self.peek().kind {
            TokenKind::Shr if self.split => TokenKind::Gt,
            kind => kind,
        }
    }

    /// Kind of the token `n` positions ahead (0 = current).
    fn nth_kind(&self, n: usize) -> TokenKind {
        if n == 0 {
            return self.peek_kind();
        }
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        self.tokens[idx].kind
    }

    fn nth_lexeme(&self, n: usize) -> &str {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        &self.tokens[idx].lexeme
    }

    fn peek_span(&self) -> Span {
        let span = self.peek().span;
        if self.split {
            Span::new(span.start + 1, span.end, span.line, span.col + 1)
        } else {
            span
        }
    }

    /// No whitespace between the current token and the previous one.
    fn is_tight(&self) -> bool {
        self.split || self.peek().is_tight()
    }

    fn nth_tight(&self, n: usize) -> bool {
        let idx = (self.pos + n).min(self.tokens.len() - 1);
        self.tokens[idx].is_tight()
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    fn advance(&mut self) -> Span {
        let span = self.peek_span();
        if self.split {
            self.split = false;
            self.pos += 1;
        } else if self.peek().kind != TokenKind::Eof {
            self.pos += 1;
        }
        self.prev_span = span;
        span
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> PResult<Span> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(self.unexpected(&format!("`{}`", kind.name())))
        }
    }

    fn expect_ident(&mut self) -> PResult<(String, Span)> {
        if self.at(TokenKind::Ident) {
            let name = self.peek().lexeme.clone();
            Ok((name, self.advance()))
        } else {
            Err(self.unexpected("identifier"))
        }
    }

    /// Closes a `<...>` list. A `>>` token is split so that its second half
    /// can close an enclosing list.
    fn expect_close_angle(&mut self) -> PResult<Span> {
        match self.peek_kind() {
            TokenKind::Gt => Ok(self.advance()),
            TokenKind::Shr => {
                let s = self.peek().span;
                let half = Span::new(s.start, s.start + 1, s.line, s.col);
                self.split = true;
                self.prev_span = half;
                Ok(half)
            }
            _ => Err(self.unexpected("`>`")),
        }
    }

    fn describe(&self) -> String {
        let tok = self.peek();
        match self.peek_kind() {
            TokenKind::Eof => "end of file".to_string(),
            TokenKind::Invalid => format!("invalid token `{}`", tok.lexeme),
            TokenKind::Gt if self.split => "`>`".to_string(),
            _ => format!("`{}`", tok.lexeme),
        }
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        ParseError::expected(expected, self.describe(), self.peek_span())
    }

    // ========================================================================
    // Arena, slots and speculation
    // ========================================================================

    fn alloc(&mut self, term: Term, span: Span) -> TermId {
        self.ast.alloc_term(term, span, self.restrict.usage)
    }

    /// Allocates a node spanning from `start` to the last consumed token.
    fn close(&mut self, start: Span, term: Term) -> TermId {
        let span = start.to(self.prev_span);
        self.alloc(term, span)
    }

    /// `item, item, ...` up to but not including `close`. A trailing comma
    /// is accepted.
    fn comma_separated<T>(
        &mut self,
        close: TokenKind,
        mut item: impl FnMut(&mut Self) -> PResult<T>,
    ) -> PResult<Vec<T>> {
        let mut items = Vec::new();
        while !self.at(close) {
            items.push(item(self)?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        Ok(items)
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            split: self.split,
            prev_span: self.prev_span,
            diagnostics: self.diagnostics.len(),
            ast: self.ast.mark(),
        }
    }

    fn rewind(&mut self, cp: Checkpoint) {
        self.pos = cp.pos;
        self.split = cp.split;
        self.prev_span = cp.prev_span;
        self.diagnostics.truncate(cp.diagnostics);
        self.ast.rewind(cp.ast);
    }

    /// Runs `attempt`, restoring the session if it fails. Fatal errors still
    /// propagate; the inner `Result` carries ordinary syntax failures.
    fn speculate<T>(
        &mut self,
        attempt: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<Result<T, ParseError>> {
        let cp = self.checkpoint();
        match attempt(self) {
            Ok(value) => Ok(Ok(value)),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                self.rewind(cp);
                Ok(Err(err))
            }
        }
    }

    /// Like [`Parser::speculate`], but skips positions where the same
    /// production already failed and records new failures.
    fn speculate_once<T>(
        &mut self,
        what: Attempt,
        attempt: impl FnOnce(&mut Self) -> PResult<Option<T>>,
    ) -> PResult<Option<T>> {
        let key = (self.pos, what);
        if self.failed.contains(&key) {
            trace!(pos = self.pos, ?what, "skipping memoised failure");
            return Ok(None);
        }
        let cp = self.checkpoint();
        match self.speculate(attempt)? {
            Ok(Some(value)) => Ok(Some(value)),
            Ok(None) => {
                self.rewind(cp);
                self.failed.insert(key);
                Ok(None)
            }
            Err(err) => {
                trace!(pos = key.0, ?what, %err, "speculative parse failed");
                self.failed.insert(key);
                Ok(None)
            }
        }
    }

    fn with_restrictions<T>(
        &mut self,
        restrict: Restrictions,
        f: impl FnOnce(&mut Self) -> PResult<T>,
    ) -> PResult<T> {
        let saved = std::mem::replace(&mut self.restrict, restrict);
        let result = f(self);
        self.restrict = saved;
        result
    }

    /// Same restrictions, different slot kind.
    fn in_slot<T>(&mut self, usage: Usage, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        let restrict = Restrictions {
            usage,
            ..self.restrict
        };
        self.with_restrictions(restrict, f)
    }

    /// Parses bracketed contents with every restriction lifted.
    fn delimited<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        self.with_restrictions(self.restrict.delimited(), f)
    }

    /// Guards recursion: each nested expression or pattern costs one level.
    /// The stack is extended on the heap when it runs low, so the depth
    /// limit holds on any thread regardless of its stack size.
    fn nested<T>(&mut self, f: impl FnOnce(&mut Self) -> PResult<T>) -> PResult<T> {
        if self.depth >= self.config.max_depth {
            return Err(ParseError::TooDeep {
                limit: self.config.max_depth,
                span: self.peek_span(),
            });
        }
        self.depth += 1;
        let result = stacker::maybe_grow(STACK_RED_ZONE, STACK_SEGMENT, || f(self));
        self.depth -= 1;
        result
    }

    // ========================================================================
    // Error recovery
    // ========================================================================

    fn report(&mut self, err: ParseError) {
        trace!(%err, "reporting");
        self.diagnostics.push(err.into());
    }

    /// Skips to the next token that can begin a top-level item and returns
    /// the region from `from` to the last skipped token.
    fn skip_to_item_start(&mut self, from: Span) -> Span {
        let mut span = Span::new(from.start, from.start, from.line, from.col);
        while !self.peek_kind().is_item_start() {
            span = span.to(self.advance());
        }
        trace!(skipped = span.len(), at = self.peek_kind().name(), "resynchronized");
        span
    }

    /// Statement-slot body that survives errors: on failure the error is
    /// reported, the rest of the item is skipped and an `Error` node covers
    /// the damage.
    fn parse_body(&mut self) -> PResult<TermId> {
        let start = self.peek_span();
        let mark = self.ast.mark();
        match self.parse_stmt() {
            Ok(body) => Ok(body),
            Err(err) => self.recover(err, start, mark),
        }
    }

    fn recover(&mut self, err: ParseError, start: Span, mark: AstMark) -> PResult<TermId> {
        if !self.config.recover {
            return Err(err);
        }
        self.report(err);
        self.ast.rewind(mark);
        let span = self.skip_to_item_start(start);
        Ok(self.alloc(Term::Error, span))
    }
}

/// Value of a literal token, or `None` if the lexer let a bad one through.
fn literal_value(tok: &Token) -> Option<Literal> {
    let text = tok.lexeme.as_str();
    let quoted = |q: char| text.strip_prefix(q).and_then(|t| t.strip_suffix(q));
    match tok.kind {
        TokenKind::Nat => lexer::nat_value(text).map(Literal::Nat),
        TokenKind::Int => lexer::int_value(text).map(Literal::Int),
        TokenKind::Float => lexer::float_value(text).map(Literal::Float),
        TokenKind::Char => {
            let value = lexer::unescape(quoted('\'')?)?;
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Some(Literal::Char(c)),
                _ => None,
            }
        }
        TokenKind::Str => lexer::unescape(quoted('"')?).map(Literal::Str),
        TokenKind::True => Some(Literal::Bool(true)),
        TokenKind::False => Some(Literal::Bool(false)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_rewinds_cursor_and_arena() {
        let mut p = Parser::new("a b c");
        let cp = p.checkpoint();
        p.advance();
        p.alloc(Term::Unit, Span::default());
        p.rewind(cp);
        assert_eq!(p.pos, 0);
        assert!(p.ast.terms.is_empty());
    }

    #[test]
    fn shift_token_splits_into_two_closers() {
        let mut p = Parser::new(">> x");
        let first = p.expect_close_angle().unwrap();
        assert_eq!((first.start, first.end), (0, 1));
        assert!(p.at(TokenKind::Gt));
        let second = p.expect_close_angle().unwrap();
        assert_eq!((second.start, second.end), (1, 2));
        assert!(p.at(TokenKind::Ident));
    }

    #[test]
    fn nesting_limit_is_reported() {
        let config = ParserConfig {
            max_depth: 2,
            recover: true,
        };
        let mut p = Parser::with_config("x", config);
        let err = p
            .nested(|p| p.nested(|p| p.nested(|_| Ok(()))))
            .unwrap_err();
        assert!(matches!(err, ParseError::TooDeep { limit: 2, .. }));
        assert_eq!(p.depth, 0);
    }

    #[test]
    fn memoised_attempt_is_not_retried() {
        let mut p = Parser::new("x");
        let mut calls = 0;
        for _ in 0..2 {
            let r: Option<()> = p
                .speculate_once(Attempt::Generic, |p| {
                    calls += 1;
                    Err(p.unexpected("nothing"))
                })
                .unwrap();
            assert!(r.is_none());
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn char_literal_values() {
        let lexed = Lexer::tokenize(r"'a' '\n' 'A'");
        let values: Vec<_> = lexed.tokens[..3].iter().map(literal_value).collect();
        assert_eq!(
            values,
            vec![
                Some(Literal::Char('a')),
                Some(Literal::Char('\n')),
                Some(Literal::Char('A'))
            ]
        );
    }
}
