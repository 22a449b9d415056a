//! The unified expression/type grammar.
//!
//! Every slot enters [`Parser::parse_expr_bp`] at its own level: types at
//! `PRODUCT`, expressions at `CHECK`, statements at `STMT`. Prefix forms and
//! atoms come first, then tight postfix forms, then the climbing loop where
//! juxtaposition acts as a binary operator at `APP`.

use diagnostics::Span;
use tracing::trace;

use super::prec::{
    self, Assoc, Infix, Restrictions, ADD, APP, ARROW, CHECK, COMPARISON, POSTFIX, PREFIX,
    PRODUCT, STMT,
};
use super::{literal_value, Attempt, PResult, Parser};
use crate::ast::{
    BinOp, Binder, LamParam, MatchCase, NumType, Primitive, Term, TermId, UnOp, Usage,
    WithBinding,
};
use crate::error::ParseError;
use crate::token::TokenKind;

impl Parser {
    // ========================================================================
    // Slots
    // ========================================================================

    pub(super) fn parse_type(&mut self) -> PResult<TermId> {
        self.in_slot(Usage::Type, |p| p.parse_expr_bp(PRODUCT))
    }

    pub(super) fn parse_expr(&mut self) -> PResult<TermId> {
        self.in_slot(Usage::Term, |p| p.parse_expr_bp(CHECK))
    }

    /// Bracketed operand: keeps the slot kind of the surroundings.
    fn parse_inner(&mut self) -> PResult<TermId> {
        self.parse_expr_bp(CHECK)
    }

    /// Type after `x:` in a binder list, where `.` closes the list.
    pub(super) fn binder_type(&mut self) -> PResult<TermId> {
        let restrict = Restrictions {
            no_dot: true,
            usage: Usage::Type,
            ..self.restrict
        };
        self.with_restrictions(restrict, |p| p.parse_expr_bp(PRODUCT))
    }

    pub(super) fn parse_binder_with(
        &mut self,
        ty: impl FnOnce(&mut Self) -> PResult<TermId>,
    ) -> PResult<Binder> {
        let (name, span) = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let ty = ty(self)?;
        Ok(Binder { name, span, ty })
    }

    /// Statement slot: bodies of definitions, cases, lambdas and blocks.
    /// Adds let-bindings and the assignment level on top of expressions.
    pub(super) fn parse_stmt(&mut self) -> PResult<TermId> {
        self.in_slot(Usage::Term, |p| {
            p.nested(|p| match (p.peek_kind(), p.nth_kind(1)) {
                (TokenKind::Ident, TokenKind::Assign) => {
                    let (name, span) = p.expect_ident()?;
                    p.finish_let(name, span, None)
                }
                (TokenKind::Ident, TokenKind::Colon) => match p.typed_let_head()? {
                    Some((name, span, ty)) => p.finish_let(name, span, Some(ty)),
                    None => p.parse_expr_bp(STMT),
                },
                _ => p.parse_expr_bp(STMT),
            })
        })
    }

    /// `x : T` followed by `=`, or nothing.
    fn typed_let_head(&mut self) -> PResult<Option<(String, Span, TermId)>> {
        self.speculate_once(Attempt::TypedLet, |p| {
            let (name, span) = p.expect_ident()?;
            p.expect(TokenKind::Colon)?;
            let ty = p.parse_type()?;
            Ok(p.at(TokenKind::Assign).then_some((name, span, ty)))
        })
    }

    /// `= value` after a let head. Followed by a continuation (after an
    /// optional `;`) this is a `Let`; otherwise it is an assignment node.
    fn finish_let(&mut self, name: String, start: Span, ty: Option<TermId>) -> PResult<TermId> {
        self.expect(TokenKind::Assign)?;
        let value = self.parse_expr()?;
        self.eat(TokenKind::Semicolon);
        if self.starts_operand() {
            let body = self.parse_stmt()?;
            trace!(name = %name, "let binding");
            return Ok(self.close(start, Term::Let {
                name,
                ty,
                value,
                body,
            }));
        }
        let mut target = self.alloc(Term::Var(name), start);
        if let Some(ty) = ty {
            let span = start.to(self.ast.span(ty));
            target = self.alloc(Term::Check { term: target, ty }, span);
        }
        let span = start.to(self.ast.span(value));
        Ok(self.alloc(
            Term::Op2 {
                op: BinOp::Assign,
                lhs: target,
                rhs: value,
            },
            span,
        ))
    }

    // ========================================================================
    // Precedence climbing
    // ========================================================================

    pub(super) fn parse_expr_bp(&mut self, min: u8) -> PResult<TermId> {
        self.nested(|p| {
            let start = p.peek_span();
            let lhs = p.parse_prefix()?;
            p.climb(lhs, min, start)
        })
    }

    fn climb(&mut self, mut lhs: TermId, min: u8, start: Span) -> PResult<TermId> {
        loop {
            if self.at_case_head() || self.at_field_head() {
                break;
            }
            if min <= APP {
                if let Some(app) = self.juxtapose(lhs, start)? {
                    lhs = app;
                    continue;
                }
            }
            let Some((infix, level, assoc)) = prec::infix(self.peek_kind()) else {
                break;
            };
            if level < min || (infix == Infix::Sigma && self.restrict.no_dot) {
                break;
            }
            self.advance();
            let next = match assoc {
                Assoc::Left => level + 1,
                Assoc::Right => level,
            };
            let rhs = match infix {
                Infix::Check => self.in_slot(Usage::Type, |p| p.parse_expr_bp(next))?,
                _ => self.parse_expr_bp(next)?,
            };
            let term = match infix {
                Infix::Op(op) => Term::Op2 { op, lhs, rhs },
                Infix::Arrow => Term::Arrow {
                    domain: lhs,
                    codomain: rhs,
                },
                Infix::Check => Term::Check { term: lhs, ty: rhs },
                Infix::Sigma => Term::Sigma { fst: lhs, snd: rhs },
            };
            lhs = self.close(start, term);
        }
        Ok(lhs)
    }

    /// Space-separated application, loose calls and loose brace suffixes.
    fn juxtapose(&mut self, func: TermId, start: Span) -> PResult<Option<TermId>> {
        if self.restrict.no_juxtapose {
            return Ok(None);
        }
        match self.peek_kind() {
            TokenKind::LParen if !self.is_tight() && self.is_name(func) => {
                self.advance();
                let args = self.call_args()?;
                let call = Term::Call {
                    head: func,
                    args,
                    tight: false,
                };
                return Ok(Some(self.close(start, call)));
            }
            TokenKind::LBrace => {
                if self.restrict.no_loose_brace || !self.brace_allowed() {
                    return Ok(None);
                }
                let tight = self.is_tight();
                return self.parse_brace_suffix(func, start, tight).map(Some);
            }
            _ => {}
        }
        if !self.starts_argument() {
            return Ok(None);
        }
        let arg = self.parse_expr_bp(POSTFIX)?;
        Ok(Some(self.close(start, Term::App { func, arg })))
    }

    /// A bare identifier head; a parenthesised one does not count.
    fn is_name(&self, id: TermId) -> bool {
        let len = match self.ast.term(id) {
            Term::Var(name) => name.len(),
            Term::Qualified(path) => path.iter().map(|s| s.len() + 1).sum::<usize>() - 1,
            _ => return false,
        };
        self.ast.span(id).len() == len
    }

    /// Whether the current token can begin a juxtaposed argument.
    fn starts_argument(&self) -> bool {
        if self.at_case_head() || self.at_field_head() {
            return false;
        }
        match self.peek_kind() {
            TokenKind::Ident
            | TokenKind::Nat
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Char
            | TokenKind::Str
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Set
            | TokenKind::Empty
            | TokenKind::Unit
            | TokenKind::Bool
            | TokenKind::NatType
            | TokenKind::U64
            | TokenKind::I64
            | TokenKind::F64
            | TokenKind::CharType
            | TokenKind::SelfType
            | TokenKind::U64ToChar
            | TokenKind::CharToU64
            | TokenKind::HvmInc
            | TokenKind::HvmDec
            | TokenKind::Finally
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::At
            | TokenKind::Question
            | TokenKind::Lambda
            | TokenKind::Mu
            | TokenKind::All
            | TokenKind::Any
            | TokenKind::Enum
            | TokenKind::Ref
            | TokenKind::View => true,
            // `f &a` and `f &L{x, y}`, but `A & B` is a product.
            TokenKind::Amp => {
                !self.is_tight() && self.nth_kind(1) == TokenKind::Ident && self.nth_tight(1)
            }
            _ => false,
        }
    }

    /// Whether the current token can begin any operand at all.
    pub(super) fn starts_operand(&self) -> bool {
        if self.starts_argument() {
            return true;
        }
        if self.at_case_head() || self.at_field_head() {
            return false;
        }
        match self.peek_kind() {
            TokenKind::Minus
            | TokenKind::Not
            | TokenKind::Tilde
            | TokenKind::If
            | TokenKind::Fork
            | TokenKind::Match
            | TokenKind::Use
            | TokenKind::Rewrite
            | TokenKind::Log
            | TokenKind::Trust
            | TokenKind::Absurd
            | TokenKind::Return
            | TokenKind::Sub => true,
            TokenKind::LBrace => self.at_refl(),
            _ => false,
        }
    }

    fn at_refl(&self) -> bool {
        self.at(TokenKind::LBrace)
            && self.nth_kind(1) == TokenKind::EqEq
            && self.nth_kind(2) == TokenKind::RBrace
    }

    fn brace_allowed(&self) -> bool {
        self.at(TokenKind::LBrace)
            && !self.restrict.no_brace
            && (self.is_tight() || !self.restrict.no_loose_brace)
            && !self.at_case_head()
    }

    // ========================================================================
    // Prefix forms
    // ========================================================================

    fn parse_prefix(&mut self) -> PResult<TermId> {
        let start = self.peek_span();
        match self.peek_kind() {
            TokenKind::Not | TokenKind::Minus => {
                let op = if self.at(TokenKind::Not) {
                    UnOp::Not
                } else {
                    UnOp::Neg
                };
                self.advance();
                let arg = self.parse_expr_bp(PREFIX)?;
                Ok(self.close(start, Term::Op1 { op, arg }))
            }
            TokenKind::Tilde => self.parse_tilde(start),
            TokenKind::Lambda => self.parse_lambda(start),
            TokenKind::Mu => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                self.expect(TokenKind::Dot)?;
                let body = self.parse_stmt()?;
                Ok(self.close(start, Term::Fix { name, body }))
            }
            TokenKind::All => {
                self.advance();
                let mut binders = vec![self.parse_binder_with(Self::binder_type)?];
                while self.eat(TokenKind::Comma) {
                    binders.push(self.parse_binder_with(Self::binder_type)?);
                }
                self.expect(TokenKind::Dot)?;
                let body = self.in_slot(Usage::Type, |p| p.parse_expr_bp(ARROW))?;
                Ok(self.close(start, Term::All { binders, body }))
            }
            TokenKind::Any => {
                self.advance();
                let binder = self.parse_binder_with(Self::binder_type)?;
                self.expect(TokenKind::Dot)?;
                let body = self.in_slot(Usage::Type, |p| p.parse_expr_bp(ARROW))?;
                Ok(self.close(start, Term::Any { binder, body }))
            }
            TokenKind::If => {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect(TokenKind::Colon)?;
                let then = self.parse_stmt()?;
                self.expect(TokenKind::Else)?;
                self.expect(TokenKind::Colon)?;
                let otherwise = self.parse_stmt()?;
                Ok(self.close(start, Term::If {
                    cond,
                    then,
                    otherwise,
                }))
            }
            TokenKind::Fork => {
                self.advance();
                let cond = self.parse_expr()?;
                self.expect(TokenKind::Colon)?;
                let then = self.parse_stmt()?;
                let mut elifs = Vec::new();
                while self.eat(TokenKind::Elif) {
                    self.expect(TokenKind::Colon)?;
                    elifs.push(self.parse_stmt()?);
                }
                self.expect(TokenKind::Else)?;
                self.expect(TokenKind::Colon)?;
                let otherwise = self.parse_stmt()?;
                Ok(self.close(start, Term::Fork {
                    cond,
                    then,
                    elifs,
                    otherwise,
                }))
            }
            TokenKind::Match => self.parse_match(start),
            TokenKind::Use => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                self.expect(TokenKind::Assign)?;
                let value = self.parse_expr()?;
                self.expect(TokenKind::Semicolon)?;
                let body = self.parse_stmt()?;
                Ok(self.close(start, Term::Use { name, value, body }))
            }
            TokenKind::Rewrite | TokenKind::Log => {
                let rewrite = self.at(TokenKind::Rewrite);
                self.advance();
                let first = self.parse_expr_bp(POSTFIX)?;
                self.eat(TokenKind::Semicolon);
                let body = self.parse_stmt()?;
                let term = if rewrite {
                    Term::Rewrite { proof: first, body }
                } else {
                    Term::Log {
                        message: first,
                        body,
                    }
                };
                Ok(self.close(start, term))
            }
            TokenKind::Trust | TokenKind::Absurd | TokenKind::Return => {
                let kind = self.peek_kind();
                self.advance();
                let arg = self.parse_expr_bp(CHECK)?;
                let term = match kind {
                    TokenKind::Trust => Term::Trust(arg),
                    TokenKind::Absurd => Term::Absurd(arg),
                    _ => Term::Return(arg),
                };
                Ok(self.close(start, term))
            }
            TokenKind::Sub => {
                self.advance();
                let arg = self.parse_expr_bp(PREFIX)?;
                Ok(self.close(start, Term::Sub(arg)))
            }
            _ => {
                let atom = self.parse_atom()?;
                self.parse_postfix(atom, start)
            }
        }
    }

    /// `~e` induction marker, or `~e{...}` when a case block follows.
    fn parse_tilde(&mut self, start: Span) -> PResult<TermId> {
        self.advance();
        let block_allowed = !self.restrict.no_brace;
        let restrict = Restrictions {
            no_brace: true,
            ..self.restrict
        };
        let scrutinee = self.with_restrictions(restrict, |p| p.parse_expr_bp(PREFIX))?;
        if block_allowed && self.at(TokenKind::LBrace) && !self.at_case_head() {
            let block = self.parse_case_block()?;
            return Ok(self.close(start, Term::TildeMatch { scrutinee, block }));
        }
        Ok(self.close(start, Term::Tilde(scrutinee)))
    }

    fn parse_lambda(&mut self, start: Span) -> PResult<TermId> {
        self.advance();
        if self.at(TokenKind::LBrace) {
            let block = self.parse_case_block()?;
            return Ok(self.close(start, Term::LamMatch(block)));
        }
        let mut params = vec![self.parse_lam_param()?];
        while !self.at(TokenKind::Dot) {
            params.push(self.parse_lam_param()?);
        }
        self.advance();
        let body = self.parse_stmt()?;
        Ok(self.close(start, Term::Lam { params, body }))
    }

    fn parse_lam_param(&mut self) -> PResult<LamParam> {
        match self.peek_kind() {
            TokenKind::Ident => {
                let (name, span) = self.expect_ident()?;
                if self.eat(TokenKind::Colon) {
                    let ty = self.binder_type()?;
                    return Ok(LamParam::Typed(Binder { name, span, ty }));
                }
                Ok(LamParam::Name { name, span })
            }
            TokenKind::LParen
                if self.nth_kind(1) == TokenKind::Ident && self.nth_kind(2) == TokenKind::Colon =>
            {
                self.advance();
                let binder = self.delimited(|p| p.parse_binder_with(Self::parse_type))?;
                self.expect(TokenKind::RParen)?;
                Ok(LamParam::Typed(binder))
            }
            TokenKind::LParen => {
                self.advance();
                let patterns =
                    self.delimited(|p| p.comma_separated(TokenKind::RParen, Self::parse_pattern))?;
                if patterns.is_empty() {
                    return Err(self.unexpected("pattern"));
                }
                self.expect(TokenKind::RParen)?;
                Ok(LamParam::Patterns(patterns))
            }
            _ => Err(self.unexpected("lambda parameter or `.`")),
        }
    }

    /// `match s1 s2 : with x y = e case p1 p2 : body ...`
    fn parse_match(&mut self, start: Span) -> PResult<TermId> {
        self.advance();
        let single = Restrictions {
            no_juxtapose: true,
            usage: Usage::Term,
            ..self.restrict
        };
        let scrutinees = self.with_restrictions(single, |p| {
            let mut scrutinees = vec![p.parse_expr_bp(CHECK)?];
            while !p.at(TokenKind::Colon) {
                scrutinees.push(p.parse_expr_bp(CHECK)?);
            }
            Ok(scrutinees)
        })?;
        self.expect(TokenKind::Colon)?;

        let mut withs = Vec::new();
        while self.eat(TokenKind::With) {
            loop {
                let (name, span) = self.expect_ident()?;
                let value = if self.eat(TokenKind::Assign) {
                    Some(self.with_restrictions(single, |p| p.parse_expr_bp(CHECK))?)
                } else {
                    None
                };
                withs.push(WithBinding { name, span, value });
                if !self.at(TokenKind::Ident) {
                    break;
                }
            }
        }

        let mut cases = Vec::new();
        while self.at(TokenKind::Case) {
            let case_start = self.advance();
            let mut patterns = vec![self.parse_pattern()?];
            while !self.at(TokenKind::Colon) {
                patterns.push(self.parse_pattern()?);
            }
            self.advance();
            let body = self.parse_stmt()?;
            self.eat(TokenKind::Semicolon);
            cases.push(MatchCase {
                patterns,
                body,
                span: case_start.to(self.prev_span),
            });
        }
        if cases.is_empty() {
            return Err(self.unexpected("`case`"));
        }
        Ok(self.close(start, Term::Match {
            scrutinees,
            withs,
            cases,
        }))
    }

    // ========================================================================
    // Atoms
    // ========================================================================

    fn parse_atom(&mut self) -> PResult<TermId> {
        let start = self.peek_span();
        let kind = self.peek_kind();
        let term = match kind {
            TokenKind::Ident => {
                let text = self.peek().lexeme.clone();
                if text.contains('/') {
                    Term::Qualified(text.split('/').map(str::to_string).collect())
                } else {
                    Term::Var(text)
                }
            }
            TokenKind::Nat
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Char
            | TokenKind::Str
            | TokenKind::True
            | TokenKind::False => match literal_value(self.peek()) {
                Some(lit) => Term::Lit(lit),
                None => {
                    return Err(ParseError::invalid(
                        format!("malformed {}", kind.name()),
                        start,
                    ))
                }
            },
            TokenKind::Set => Term::Set,
            TokenKind::Empty => Term::EmptyType,
            TokenKind::Unit => Term::UnitType,
            TokenKind::Bool => Term::BoolType,
            TokenKind::NatType => Term::NatType,
            TokenKind::U64 => Term::Num(NumType::U64),
            TokenKind::I64 => Term::Num(NumType::I64),
            TokenKind::F64 => Term::Num(NumType::F64),
            TokenKind::CharType => Term::Num(NumType::Char),
            TokenKind::SelfType => Term::SelfType,
            TokenKind::U64ToChar => Term::Pri(Primitive::U64ToChar),
            TokenKind::CharToU64 => Term::Pri(Primitive::CharToU64),
            TokenKind::HvmInc => Term::Pri(Primitive::HvmInc),
            TokenKind::HvmDec => Term::Pri(Primitive::HvmDec),
            TokenKind::Finally => Term::Refl,
            TokenKind::Star => Term::Era,
            _ => return self.parse_compound_atom(start),
        };
        self.advance();
        Ok(self.alloc(term, start))
    }

    fn parse_compound_atom(&mut self, start: Span) -> PResult<TermId> {
        match self.peek_kind() {
            TokenKind::At => {
                self.advance();
                let (tag, _) = self.expect_ident()?;
                if self.brace_allowed() {
                    self.advance();
                    let args = self
                        .delimited(|p| p.comma_separated(TokenKind::RBrace, Self::parse_inner))?;
                    self.expect(TokenKind::RBrace)?;
                    return Ok(self.close(start, Term::Ctor { tag, args }));
                }
                Ok(self.close(start, Term::Tag(tag)))
            }
            TokenKind::Amp => self.parse_amp(start),
            TokenKind::Question => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                let block_allowed = !self.restrict.no_brace;
                let restrict = Restrictions {
                    no_brace: true,
                    usage: Usage::Type,
                    ..self.restrict
                };
                let ty = self.with_restrictions(restrict, |p| p.parse_expr_bp(PRODUCT))?;
                let mut ctx = Vec::new();
                if block_allowed && self.at(TokenKind::LBrace) && !self.at_case_head() {
                    self.advance();
                    ctx = self.delimited(|p| {
                        p.in_slot(Usage::Term, |p| {
                            p.comma_separated(TokenKind::RBrace, Self::parse_inner)
                        })
                    })?;
                    self.expect(TokenKind::RBrace)?;
                }
                Ok(self.close(start, Term::Meta { name, ty, ctx }))
            }
            TokenKind::LParen => {
                self.advance();
                if self.eat(TokenKind::RParen) {
                    return Ok(self.close(start, Term::Unit));
                }
                let first = self.delimited(Self::parse_inner)?;
                if self.eat(TokenKind::Comma) {
                    let mut items = vec![first];
                    let rest =
                        self.delimited(|p| p.comma_separated(TokenKind::RParen, Self::parse_inner))?;
                    items.extend(rest);
                    self.expect(TokenKind::RParen)?;
                    return Ok(self.close(start, Term::Tuple(items)));
                }
                let close = self.expect(TokenKind::RParen)?;
                self.ast.widen(first, start.to(close));
                Ok(first)
            }
            TokenKind::LBracket => {
                self.advance();
                if self.eat(TokenKind::RBracket) {
                    return Ok(self.close(start, Term::EmptyList));
                }
                let items =
                    self.delimited(|p| p.comma_separated(TokenKind::RBracket, Self::parse_inner))?;
                self.expect(TokenKind::RBracket)?;
                Ok(self.close(start, Term::List(items)))
            }
            TokenKind::LBrace if self.at_refl() => {
                self.advance();
                self.advance();
                self.advance();
                Ok(self.close(start, Term::Refl))
            }
            TokenKind::Enum => {
                self.advance();
                self.expect(TokenKind::LBrace)?;
                let symbols = self.comma_separated(TokenKind::RBrace, |p| {
                    p.expect(TokenKind::Amp)?;
                    Ok(p.expect_ident()?.0)
                })?;
                self.expect(TokenKind::RBrace)?;
                Ok(self.close(start, Term::Enum(symbols)))
            }
            TokenKind::Ref => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                Ok(self.close(start, Term::Ref(name)))
            }
            TokenKind::View => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let (name, _) = self.expect_ident()?;
                self.expect(TokenKind::RParen)?;
                Ok(self.close(start, Term::View(name)))
            }
            _ => Err(self.unexpected("expression")),
        }
    }

    /// `&name` enum symbol or `&label{a, b}` superposition.
    fn parse_amp(&mut self, start: Span) -> PResult<TermId> {
        self.advance();
        let braced = self.nth_kind(1) == TokenKind::LBrace && !self.restrict.no_brace;
        if self.at(TokenKind::Ident) && self.is_tight() && !braced {
            let (name, _) = self.expect_ident()?;
            return Ok(self.close(start, Term::Sym(name)));
        }
        let restrict = Restrictions {
            no_brace: true,
            ..self.restrict
        };
        let label = self.with_restrictions(restrict, |p| p.parse_expr_bp(POSTFIX))?;
        self.expect(TokenKind::LBrace)?;
        let (left, right) = self.delimited(|p| {
            let left = p.parse_inner()?;
            p.expect(TokenKind::Comma)?;
            let right = p.parse_inner()?;
            Ok((left, right))
        })?;
        self.expect(TokenKind::RBrace)?;
        Ok(self.close(start, Term::Sup { label, left, right }))
    }

    // ========================================================================
    // Tight postfix forms
    // ========================================================================

    fn parse_postfix(&mut self, mut head: TermId, start: Span) -> PResult<TermId> {
        while self.is_tight() && !self.at_case_head() {
            match self.peek_kind() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.call_args()?;
                    let call = Term::Call {
                        head,
                        args,
                        tight: true,
                    };
                    head = self.close(start, call);
                }
                TokenKind::Lt if self.is_name(head) => match self.try_generic(head, start)? {
                    Some(term) => head = term,
                    None => break,
                },
                TokenKind::LBracket if self.nth_kind(1) == TokenKind::RBracket => {
                    self.advance();
                    self.advance();
                    head = self.close(start, Term::ListType(head));
                }
                TokenKind::LBrace if self.brace_allowed() => {
                    head = self.parse_brace_suffix(head, start, true)?;
                }
                _ => break,
            }
        }
        Ok(head)
    }

    fn call_args(&mut self) -> PResult<Vec<TermId>> {
        let args = self.delimited(|p| p.comma_separated(TokenKind::RParen, Self::parse_inner))?;
        self.expect(TokenKind::RParen)?;
        Ok(args)
    }

    /// `f<A, B>(x)` or `F<A, B>`; `None` means `<` is a comparison.
    fn try_generic(&mut self, head: TermId, start: Span) -> PResult<Option<TermId>> {
        self.speculate_once(Attempt::Generic, |p| {
            p.advance();
            let type_args = p.delimited(|p| {
                p.in_slot(Usage::Type, |p| {
                    let mut args = vec![p.parse_expr_bp(ADD)?];
                    while p.eat(TokenKind::Comma) {
                        args.push(p.parse_expr_bp(ADD)?);
                    }
                    Ok(args)
                })
            })?;
            p.expect_close_angle()?;
            if p.at(TokenKind::LParen) && p.is_tight() {
                p.advance();
                let args = p.call_args()?;
                trace!(args = type_args.len(), "generic call");
                let call = Term::GenericCall {
                    head,
                    type_args,
                    args,
                };
                return Ok(Some(p.close(start, call)));
            }
            if !p.starts_operand() {
                trace!(args = type_args.len(), "type application");
                return Ok(Some(p.close(start, Term::TyApp {
                    head,
                    args: type_args,
                })));
            }
            trace!("operand follows `>`, reading `<` as a comparison");
            Ok(None)
        })
    }

    /// `{` after a head: `{==}` argument, equality type or implicit arguments.
    fn parse_brace_suffix(&mut self, head: TermId, start: Span, tight: bool) -> PResult<TermId> {
        if self.at_refl() {
            let refl_start = self.peek_span();
            self.advance();
            self.advance();
            self.advance();
            let arg = self.close(refl_start, Term::Refl);
            return Ok(self.close(start, Term::App { func: head, arg }));
        }
        if let Some(eql) = self.try_equality(head, start)? {
            return Ok(eql);
        }
        self.advance();
        let args = self.delimited(|p| {
            p.in_slot(Usage::Term, |p| p.comma_separated(TokenKind::RBrace, Self::parse_inner))
        })?;
        self.expect(TokenKind::RBrace)?;
        Ok(self.close(start, Term::Implicit { head, args, tight }))
    }

    /// `T{a == b}` / `T{a != b}` when that is the whole brace content.
    fn try_equality(&mut self, ty: TermId, start: Span) -> PResult<Option<TermId>> {
        self.speculate_once(Attempt::Equality, |p| {
            p.advance();
            let sides = p.delimited(|p| {
                p.in_slot(Usage::Term, |p| {
                    let lhs = p.parse_expr_bp(COMPARISON)?;
                    let negated = match p.peek_kind() {
                        TokenKind::EqEq => false,
                        TokenKind::NotEq => true,
                        _ => return Ok(None),
                    };
                    p.advance();
                    let rhs = p.parse_expr_bp(COMPARISON)?;
                    Ok(Some((lhs, negated, rhs)))
                })
            })?;
            let Some((lhs, negated, rhs)) = sides else {
                return Ok(None);
            };
            if !p.eat(TokenKind::RBrace) {
                return Ok(None);
            }
            trace!(negated, "equality type");
            Ok(Some(p.close(start, Term::Eql {
                ty,
                lhs,
                rhs,
                negated,
            })))
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Term, Usage};
    use crate::parser::parse_expression;

    fn sexp(src: &str) -> String {
        match parse_expression(src) {
            Ok(expr) => expr.sexp(),
            Err(diags) => panic!("failed to parse {src:?}: {diags:?}"),
        }
    }

    #[test]
    fn binary_precedence() {
        assert_eq!(sexp("1n + 2n * 3n"), "(+ 1n (* 2n 3n))");
        assert_eq!(sexp("a - b - c"), "(- (- a b) c)");
        assert_eq!(sexp("a or b and c"), "(or a (and b c))");
        assert_eq!(sexp("a << 1n + b"), "(<< a (+ 1n b))");
        assert_eq!(sexp("a == b < c"), "(== a (< b c))");
    }

    #[test]
    fn right_associative_operators() {
        assert_eq!(sexp("2n ** 3n ** 2n"), "(** 2n (** 3n 2n))");
        assert_eq!(sexp("A -> B -> C"), "(-> A (-> B C))");
        assert_eq!(sexp("a <> b <> c"), "(<> a (<> b c))");
        assert_eq!(sexp("A & B & C"), "(& A (& B C))");
    }

    #[test]
    fn prefix_operators() {
        assert_eq!(sexp("not a and b"), "(and (not a) b)");
        assert_eq!(sexp("-x * y"), "(* (neg x) y)");
        assert_eq!(sexp("not f x"), "(not (app f x))");
    }

    #[test]
    fn juxtaposition_binds_tighter_than_infix() {
        assert_eq!(sexp("f x y"), "(app (app f x) y)");
        assert_eq!(sexp("f x + g y"), "(+ (app f x) (app g y))");
        assert_eq!(sexp("f (x)"), "(call f x)");
        assert_eq!(sexp("(g) (x)"), "(app g x)");
        assert_eq!(sexp("f [x]"), "(app f (list x))");
        assert_eq!(sexp("f[x]"), "(app f (list x))");
    }

    #[test]
    fn tight_and_loose_calls_record_spacing() {
        let tight = parse_expression("f(x, y)").unwrap();
        let loose = parse_expression("f (x, y)").unwrap();
        assert_eq!(tight.sexp(), "(call f x y)");
        assert_eq!(loose.sexp(), "(call f x y)");
        assert!(matches!(tight.term(), Term::Call { tight: true, .. }));
        assert!(matches!(loose.term(), Term::Call { tight: false, .. }));
    }

    #[test]
    fn generic_call_needs_tight_angles() {
        assert_eq!(sexp("f<A, B>(x)"), "(call f <A B> x)");
        assert_eq!(sexp("f <A>(x)"), "(> (< f A) x)");
        assert_eq!(sexp("f<A> (x)"), "(> (< f A) x)");
        assert_eq!(sexp("(f)<A>(x)"), "(> (< f A) x)");
        assert_eq!(sexp("a < b > c"), "(> (< a b) c)");
    }

    #[test]
    fn nested_type_application_splits_shift() {
        assert_eq!(sexp("List<Nat>"), "(tyapp List Nat)");
        assert_eq!(sexp("Pair<List<A>>"), "(tyapp Pair (tyapp List A))");
        assert_eq!(sexp("f<List<A>>(xs)"), "(call f <(tyapp List A)> xs)");
        assert_eq!(sexp("a >> b"), "(>> a b)");
    }

    #[test]
    fn brace_suffixes() {
        assert_eq!(sexp("Nat{a == b}"), "(eql Nat a b)");
        assert_eq!(sexp("Nat{a != b}"), "(neq Nat a b)");
        assert_eq!(sexp("f{A}"), "(implicit f A)");
        assert_eq!(sexp("f{a == b, c}"), "(implicit f (== a b) c)");
        assert_eq!(sexp("f{==}"), "(app f {==})");
        assert_eq!(sexp("Nat[]"), "(list-type Nat)");
    }

    #[test]
    fn binders() {
        assert_eq!(sexp("λx y. x"), "(lam (x y) x)");
        assert_eq!(sexp("λ(x: Nat). x"), "(lam ((x Nat)) x)");
        assert_eq!(sexp("lambda x: Nat. x"), "(lam ((x Nat)) x)");
        assert_eq!(sexp("λ(a, b). a"), "(lam ((pat a b)) a)");
        assert_eq!(sexp("μ f. f"), "(mu f f)");
        assert_eq!(
            sexp("all x: Nat, y: Nat. Nat{x == y}"),
            "(all (x Nat) (y Nat) (eql Nat x y))"
        );
        assert_eq!(sexp("any x: Nat. Bool"), "(any (x Nat) Bool)");
    }

    #[test]
    fn sigma_binds_tighter_than_arrow() {
        assert_eq!(sexp("A . B -> C"), "(-> (sigma A B) C)");
        assert_eq!(sexp("all x: A . B . C"), "(all (x A) (sigma B C))");
    }

    #[test]
    fn let_and_assignment() {
        assert_eq!(sexp("x = 1n; x + x"), "(let x 1n (+ x x))");
        assert_eq!(sexp("x : Nat = 1n; x"), "(let (x Nat) 1n x)");
        assert_eq!(sexp("x = 1n"), "(= x 1n)");
        assert_eq!(sexp("x : Nat = 1n"), "(= (:: x Nat) 1n)");
        assert_eq!(sexp("x = f a return x"), "(let x (app f a) (return x))");
        assert_eq!(sexp("use x = 1n; x"), "(use x 1n x)");
    }

    #[test]
    fn control_flow() {
        assert_eq!(sexp("if c: a else: b"), "(if c a b)");
        assert_eq!(
            sexp("fork c: a elif: b else: d"),
            "(fork c a (elif b) (else d))"
        );
        assert_eq!(
            sexp("match x y: with z w = 1n case 0n a: z case 1n + p b: p"),
            "(match (x y) (with z (w 1n)) (case 0n a => z) (case (+ 1n p) b => p))"
        );
    }

    #[test]
    fn tilde_forms() {
        assert_eq!(sexp("~x"), "(~ x)");
        assert_eq!(
            sexp("~n{0n: a 1n+: b}"),
            "(~ n (nat-match (0n a) (1n+ b)))"
        );
        assert_eq!(
            sexp("~f x {False: a; True: b}"),
            "(~ (app f x) (bool-match (False a) (True b)))"
        );
    }

    #[test]
    fn symbols_and_superpositions() {
        assert_eq!(sexp("&foo"), "&foo");
        assert_eq!(sexp("&L{a, b}"), "(sup L a b)");
        assert_eq!(sexp("f &a"), "(app f &a)");
        assert_eq!(sexp("A & B"), "(& A B)");
        assert_eq!(sexp("enum{&a, &b}"), "(enum &a &b)");
    }

    #[test]
    fn constructors_and_metavariables() {
        assert_eq!(sexp("@Cons{h, t}"), "(@Cons h t)");
        assert_eq!(sexp("@Nil"), "@Nil");
        assert_eq!(sexp("?M : Nat {x, y}"), "(meta M Nat x y)");
        assert_eq!(sexp("?M : Nat"), "(meta M Nat)");
    }

    #[test]
    fn keyword_atoms() {
        assert_eq!(sexp("ref x"), "(ref x)");
        assert_eq!(sexp("view(x)"), "(view x)");
        assert_eq!(sexp("sub x"), "(sub x)");
        assert_eq!(sexp("trust x"), "(trust x)");
        assert_eq!(sexp("absurd x"), "(absurd x)");
        assert_eq!(sexp("return x + 1n"), "(return (+ x 1n))");
        assert_eq!(sexp("rewrite e x"), "(rewrite e x)");
        assert_eq!(sexp("log \"hi\" x"), "(log \"hi\" x)");
        assert_eq!(sexp("finally"), "{==}");
        assert_eq!(sexp("U64_TO_CHAR x"), "(app U64_TO_CHAR x)");
        assert_eq!(sexp("List/map f"), "(app List/map f)");
    }

    #[test]
    fn tuples_units_and_lists() {
        assert_eq!(sexp("(a, b, c)"), "(tuple a b c)");
        assert_eq!(sexp("()"), "()");
        assert_eq!(sexp("[]"), "[]");
        assert_eq!(sexp("[1n, 2n]"), "(list 1n 2n)");
    }

    #[test]
    fn parentheses_widen_instead_of_wrapping() {
        let expr = parse_expression("(a + b)").unwrap();
        let span = expr.ast.span(expr.root);
        assert_eq!((span.start, span.end), (0, 7));
        assert_eq!(expr.sexp(), "(+ a b)");
    }

    #[test]
    fn check_rhs_is_a_type() {
        let expr = parse_expression("x :: Nat -> Nat").unwrap();
        let Term::Check { term, ty } = expr.term() else {
            panic!("expected check, got {:?}", expr.term());
        };
        assert_eq!(expr.ast.usage(*term), Usage::Term);
        assert_eq!(expr.ast.usage(*ty), Usage::Type);
        assert_eq!(expr.sexp(), "(:: x (-> Nat Nat))");
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        for src in ["f(x", "1n +", "λ. x", "match x:", "if c: a", "&L{a}", ")"] {
            assert!(parse_expression(src).is_err(), "{src:?} should not parse");
        }
    }
}
