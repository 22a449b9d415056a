//! Case blocks of `λ{...}` and `~e{...}`.
//!
//! The first case head picks the block's shape. Bool, nat and list blocks
//! are positional: their two cases must appear in a fixed order. Enum
//! blocks take any number of `@Tag:`/`&sym:` cases and an optional default.

use tracing::trace;

use super::prec::{Restrictions, POSTFIX};
use super::{PResult, Parser};
use crate::ast::{Case, CaseBlock, CaseTag, MatchKind, Usage};
use crate::error::ParseError;
use crate::lexer;
use crate::token::TokenKind;

const EXPECTED_HEADS: &str =
    "a case head (`():`, `False:`, `0n:`, `[]:`, `(,):`, `@Tag:`, `&sym:`, `&L{,}:` or `{==}:`)";

/// Leading tokens of a case, up to and including its `:`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Head {
    Unit,
    Pair,
    False,
    True,
    Zero,
    Succ,
    Nil,
    Cons,
    Refl,
    Ctor,
    Sym,
    Sup,
}

impl Head {
    fn describe(self) -> &'static str {
        match self {
            Head::Unit => "`():`",
            Head::Pair => "`(,):`",
            Head::False => "`False:`",
            Head::True => "`True:`",
            Head::Zero => "`0n:`",
            Head::Succ => "`1n+:`",
            Head::Nil => "`[]:`",
            Head::Cons => "`<>:`",
            Head::Refl => "`{==}:`",
            Head::Ctor => "`@Tag:`",
            Head::Sym => "`&sym:`",
            Head::Sup => "`&L{,}:`",
        }
    }
}

impl Parser {
    /// Recognises a case head at the cursor regardless of context.
    pub(super) fn case_head(&self) -> Option<Head> {
        use TokenKind as T;
        let k = |n| self.nth_kind(n);
        let head = match k(0) {
            T::LParen if k(1) == T::RParen && k(2) == T::Colon => Head::Unit,
            T::LParen if k(1) == T::Comma && k(2) == T::RParen && k(3) == T::Colon => Head::Pair,
            T::False if k(1) == T::Colon => Head::False,
            T::True if k(1) == T::Colon => Head::True,
            T::Nat if k(1) == T::Colon && lexer::nat_value(self.nth_lexeme(0)) == Some(0) => {
                Head::Zero
            }
            T::Nat
                if k(1) == T::Plus
                    && self.nth_tight(1)
                    && k(2) == T::Colon
                    && lexer::nat_value(self.nth_lexeme(0)) == Some(1) =>
            {
                Head::Succ
            }
            T::LBracket if k(1) == T::RBracket && k(2) == T::Colon => Head::Nil,
            T::Cons if k(1) == T::Colon => Head::Cons,
            T::LBrace if k(1) == T::EqEq && k(2) == T::RBrace && k(3) == T::Colon => Head::Refl,
            T::At if k(1) == T::Ident && k(2) == T::Colon => Head::Ctor,
            T::Amp if k(1) == T::Ident && k(2) == T::Colon => Head::Sym,
            T::Amp
                if k(2) == T::LBrace
                    && k(3) == T::Comma
                    && k(4) == T::RBrace
                    && k(5) == T::Colon =>
            {
                Head::Sup
            }
            _ => return None,
        };
        Some(head)
    }

    /// Inside a case block, expressions stop in front of the next head.
    pub(super) fn at_case_head(&self) -> bool {
        self.restrict.case_heads && self.case_head().is_some()
    }

    pub(super) fn parse_case_block(&mut self) -> PResult<CaseBlock> {
        self.expect(TokenKind::LBrace)?;
        let restrict = Restrictions {
            case_heads: true,
            usage: Usage::Term,
            ..Restrictions::default()
        };
        let block = self.with_restrictions(restrict, Self::parse_cases)?;
        self.expect(TokenKind::RBrace)?;
        trace!(
            kind = block.kind.name(),
            cases = block.cases.len(),
            "case block"
        );
        Ok(block)
    }

    fn parse_cases(&mut self) -> PResult<CaseBlock> {
        if self.at(TokenKind::RBrace) {
            return Ok(CaseBlock {
                kind: MatchKind::Empty,
                cases: Vec::new(),
                default: None,
            });
        }
        let first = match self.case_head() {
            Some(head) => head,
            None if self.at(TokenKind::Amp) && self.at_compound_sup_head()? => Head::Sup,
            // A block holding nothing but a default is an enum match.
            None if self.starts_operand() || self.at(TokenKind::Amp) => {
                return self.parse_enum_cases()
            }
            None => return Err(self.unexpected(EXPECTED_HEADS)),
        };
        let (kind, cases) = match first {
            Head::Unit => (MatchKind::Unit, vec![self.parse_case(first)?]),
            Head::Pair => (MatchKind::Pair, vec![self.parse_case(first)?]),
            Head::Refl => (MatchKind::Eql, vec![self.parse_case(first)?]),
            Head::Sup => (MatchKind::Sup, vec![self.parse_case(first)?]),
            Head::False | Head::True => {
                let cases = self.positional(MatchKind::Bool, [Head::False, Head::True])?;
                (MatchKind::Bool, cases)
            }
            Head::Zero | Head::Succ => {
                let cases = self.positional(MatchKind::Nat, [Head::Zero, Head::Succ])?;
                (MatchKind::Nat, cases)
            }
            Head::Nil | Head::Cons => {
                let cases = self.positional(MatchKind::List, [Head::Nil, Head::Cons])?;
                (MatchKind::List, cases)
            }
            Head::Ctor | Head::Sym => return self.parse_enum_cases(),
        };
        Ok(CaseBlock {
            kind,
            cases,
            default: None,
        })
    }

    /// `&label{,}:` with a label longer than one token. The cursor is left
    /// where it was.
    fn at_compound_sup_head(&mut self) -> PResult<bool> {
        let cp = self.checkpoint();
        let found = self
            .speculate(|p| {
                p.parse_case_tag(Head::Sup)?;
                p.expect(TokenKind::Colon)
            })?
            .is_ok();
        self.rewind(cp);
        Ok(found)
    }

    fn positional(&mut self, kind: MatchKind, order: [Head; 2]) -> PResult<Vec<Case>> {
        let mut cases = Vec::with_capacity(order.len());
        for head in order {
            if self.case_head() != Some(head) {
                return Err(ParseError::expected(
                    format!(
                        "{} case ({} match cases are positional)",
                        head.describe(),
                        kind.name()
                    ),
                    self.describe(),
                    self.peek_span(),
                ));
            }
            cases.push(self.parse_case(head)?);
        }
        Ok(cases)
    }

    fn parse_enum_cases(&mut self) -> PResult<CaseBlock> {
        let mut cases = Vec::new();
        while let Some(head @ (Head::Ctor | Head::Sym)) = self.case_head() {
            cases.push(self.parse_case(head)?);
        }
        let default = if self.at(TokenKind::RBrace) {
            None
        } else {
            let body = self.parse_stmt()?;
            self.eat(TokenKind::Semicolon);
            Some(body)
        };
        Ok(CaseBlock {
            kind: MatchKind::Enum,
            cases,
            default,
        })
    }

    fn parse_case(&mut self, head: Head) -> PResult<Case> {
        let start = self.peek_span();
        let tag = self.parse_case_tag(head)?;
        self.expect(TokenKind::Colon)?;
        let body = self.parse_stmt()?;
        self.eat(TokenKind::Semicolon);
        Ok(Case {
            tag,
            span: start.to(self.prev_span),
            body,
        })
    }

    /// Consumes the head's tokens, leaving the cursor on its `:`.
    fn parse_case_tag(&mut self, head: Head) -> PResult<CaseTag> {
        let (tag, width) = match head {
            Head::Unit => (CaseTag::Unit, 2),
            Head::Pair => (CaseTag::Pair, 3),
            Head::False => (CaseTag::False, 1),
            Head::True => (CaseTag::True, 1),
            Head::Zero => (CaseTag::Zero, 1),
            Head::Succ => (CaseTag::Succ, 2),
            Head::Nil => (CaseTag::Nil, 2),
            Head::Cons => (CaseTag::Cons, 1),
            Head::Refl => (CaseTag::Refl, 3),
            Head::Ctor | Head::Sym => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                let tag = if head == Head::Ctor {
                    CaseTag::Ctor(name)
                } else {
                    CaseTag::Sym(name)
                };
                return Ok(tag);
            }
            Head::Sup => {
                self.expect(TokenKind::Amp)?;
                let restrict = Restrictions {
                    no_brace: true,
                    case_heads: false,
                    ..self.restrict
                };
                let label = self.with_restrictions(restrict, |p| p.parse_expr_bp(POSTFIX))?;
                self.expect(TokenKind::LBrace)?;
                self.expect(TokenKind::Comma)?;
                self.expect(TokenKind::RBrace)?;
                return Ok(CaseTag::Sup(label));
            }
        };
        for _ in 0..width {
            self.advance();
        }
        Ok(tag)
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{CaseTag, MatchKind, Term};
    use crate::parser::parse_expression;
    use diagnostics::DiagnosticKind;

    fn block_sexp(src: &str) -> String {
        match parse_expression(src) {
            Ok(expr) => expr.sexp(),
            Err(diags) => panic!("failed to parse {src:?}: {diags:?}"),
        }
    }

    #[test]
    fn every_block_shape() {
        let cases = [
            ("λ{}", "(lam (empty-match))"),
            ("λ{(): u}", "(lam (unit-match (() u)))"),
            ("λ{False: f; True: t}", "(lam (bool-match (False f) (True t)))"),
            ("λ{0n: z; 1n+: s}", "(lam (nat-match (0n z) (1n+ s)))"),
            ("λ{[]: n; <>: c}", "(lam (list-match ([] n) (<> c)))"),
            ("λ{(,): p}", "(lam (pair-match ((,) p)))"),
            ("λ{&L{,}: s}", "(lam (sup-match (&L{,} s)))"),
            ("λ{{==}: r}", "(lam (eql-match ({==} r)))"),
            ("λ{@A: a; &b: b; d}", "(lam (enum-match (@A a) (&b b) (_ d)))"),
        ];
        for (src, expected) in cases {
            assert_eq!(block_sexp(src), expected, "{src}");
        }
    }

    #[test]
    fn semicolons_between_cases_are_optional() {
        assert_eq!(
            block_sexp("λ{0n: z 1n+: f x}"),
            block_sexp("λ{0n: z; 1n+: f x}")
        );
        assert_eq!(
            block_sexp("λ{@Nil: a @Cons: b}"),
            "(lam (enum-match (@Nil a) (@Cons b)))"
        );
    }

    #[test]
    fn nat_match_keeps_case_order() {
        let expr = parse_expression("λ{0n: zero; 1n+: succ}").unwrap();
        let Term::LamMatch(block) = expr.term() else {
            panic!("expected lambda match, got {:?}", expr.term());
        };
        assert_eq!(block.kind, MatchKind::Nat);
        assert_eq!(block.cases.len(), 2);
        assert_eq!(block.cases[0].tag, CaseTag::Zero);
        assert_eq!(block.cases[1].tag, CaseTag::Succ);
    }

    #[test]
    fn reordered_positional_cases_are_syntax_errors() {
        for src in ["λ{True: t; False: f}", "λ{1n+: s; 0n: z}", "λ{<>: c; []: n}"] {
            let diags = parse_expression(src).unwrap_err();
            assert_eq!(diags[0].kind, DiagnosticKind::Syntax, "{src}");
            assert!(diags[0].message.contains("positional"), "{src}");
        }
        let diags = parse_expression("λ{True: t; False: f}").unwrap_err();
        assert_eq!(
            diags[0].message,
            "expected `False:` case (bool match cases are positional), found `True`"
        );
    }

    #[test]
    fn missing_second_case_is_rejected() {
        assert!(parse_expression("λ{False: f}").is_err());
        assert!(parse_expression("λ{(): a; (): b}").is_err());
    }

    #[test]
    fn default_alone_is_an_enum_match() {
        assert_eq!(block_sexp("λ{d}"), "(lam (enum-match (_ d)))");
        assert_eq!(block_sexp("λ{f x;}"), "(lam (enum-match (_ (app f x))))");
        assert_eq!(block_sexp("~n{x}"), "(~ n (enum-match (_ x)))");
        assert_eq!(block_sexp("λ{&a}"), "(lam (enum-match (_ &a)))");
    }

    #[test]
    fn unknown_head_names_the_expected_shapes() {
        let diags = parse_expression("λ{+ x}").unwrap_err();
        assert!(diags[0].message.contains("`False:`"));
        assert!(diags[0].message.contains("`@Tag:`"));
    }

    #[test]
    fn bodies_do_not_swallow_following_heads() {
        assert_eq!(
            block_sexp("λ{False: f x True: g &a}"),
            "(lam (bool-match (False (app f x)) (True (app g &a))))"
        );
        assert_eq!(
            block_sexp("λ{&a: x &b: y}"),
            "(lam (enum-match (&a x) (&b y)))"
        );
        assert_eq!(
            block_sexp("λ{[]: a + b <>: c}"),
            "(lam (list-match ([] (+ a b)) (<> c)))"
        );
    }

    #[test]
    fn sup_case_with_compound_label() {
        assert_eq!(
            block_sexp("λ{&(f x){,}: s}"),
            "(lam (sup-match (&(app f x){,} s)))"
        );
    }

    #[test]
    fn nested_blocks() {
        assert_eq!(
            block_sexp("λ{0n: λ{False: a; True: b}; 1n+: c}"),
            "(lam (nat-match (0n (lam (bool-match (False a) (True b)))) (1n+ c)))"
        );
    }
}
