//! Top-level items: `def`, `type`, `assert`, `try` and bare expressions,
//! with item-level error recovery.

use tracing::trace;

use super::prec::{Restrictions, ADD, PRODUCT};
use super::{PResult, Parser};
use crate::ast::{CtorCase, Def, DefForm, Item, TypeDef, TypeParam, Usage};
use crate::error::ParseError;
use crate::token::TokenKind;

const DEF_FORMS: &str = "`def name : type = value`, `def name : body`";

impl Parser {
    pub(super) fn parse_items(&mut self) -> Vec<Item> {
        let mut items = Vec::new();
        while !self.at(TokenKind::Eof) {
            let start = self.peek_span();
            let before = self.pos;
            let mark = self.ast.mark();
            match self.parse_item() {
                Ok(item) => items.push(item),
                Err(err) => {
                    self.report(err);
                    if !self.config.recover {
                        break;
                    }
                    self.ast.rewind(mark);
                    self.split = false;
                    if self.pos == before {
                        self.advance();
                    }
                    let span = self.skip_to_item_start(start);
                    items.push(Item::Error(span));
                }
            }
            while self.eat(TokenKind::Semicolon) {}
        }
        items
    }

    fn parse_item(&mut self) -> PResult<Item> {
        match self.peek_kind() {
            TokenKind::Def => self.parse_def().map(Item::Def),
            TokenKind::Type => self.parse_type_def().map(Item::Type),
            TokenKind::Assert => {
                let kw = self.advance();
                let term = self.parse_expr()?;
                self.expect(TokenKind::Colon)?;
                let ty = self.parse_type()?;
                Ok(Item::Assert {
                    term,
                    ty,
                    span: kw.to(self.prev_span),
                })
            }
            TokenKind::Try => {
                let kw = self.advance();
                let (name, _) = self.expect_ident()?;
                self.expect(TokenKind::Colon)?;
                let restrict = Restrictions {
                    no_loose_brace: true,
                    ..self.restrict
                };
                let ty = self.with_restrictions(restrict, Self::parse_type)?;
                self.expect(TokenKind::LBrace)?;
                let body = self.delimited(Self::parse_stmt)?;
                self.expect(TokenKind::RBrace)?;
                Ok(Item::Try {
                    name,
                    ty,
                    body,
                    span: kw.to(self.prev_span),
                })
            }
            _ => self.parse_stmt().map(Item::Expr),
        }
    }

    // ========================================================================
    // def
    // ========================================================================

    fn parse_def(&mut self) -> PResult<Def> {
        let kw = self.expect(TokenKind::Def)?;
        let (name, _) = self.expect_ident()?;
        let type_params = self.parse_type_params()?;
        let form = if self.eat(TokenKind::LParen) {
            let params = self.delimited(|p| {
                p.comma_separated(TokenKind::RParen, |p| p.parse_binder_with(Self::parse_type))
            })?;
            self.expect(TokenKind::RParen)?;
            let ret = if self.eat(TokenKind::Arrow) {
                Some(self.parse_type()?)
            } else {
                None
            };
            self.expect(TokenKind::Colon)?;
            trace!(name = %name, params = params.len(), "definition form: full");
            let body = self.parse_body()?;
            DefForm::Full { params, ret, body }
        } else {
            self.expect(TokenKind::Colon)?;
            self.parse_def_tail(&name)?
        };
        Ok(Def {
            name,
            type_params,
            form,
            span: kw.to(self.prev_span),
        })
    }

    /// After `def name :`, a type followed by `=` is the equation form;
    /// anything else is re-read as the body of a nullary definition.
    fn parse_def_tail(&mut self, name: &str) -> PResult<DefForm> {
        let start = self.peek_span();
        let mark = self.ast.mark();
        let typed = self.speculate(|p| {
            let ty = p.parse_type()?;
            if p.at(TokenKind::Assign) {
                Ok(ty)
            } else {
                Err(p.unexpected("`=`"))
            }
        })?;
        match typed {
            Ok(ty) => {
                self.advance();
                trace!(name, "definition form: equation");
                let value = self.parse_body()?;
                Ok(DefForm::Equation { ty, value })
            }
            Err(_) => {
                trace!(name, "definition form: nullary");
                let body = match self.parse_stmt() {
                    Ok(body) => body,
                    Err(err) => {
                        let span = err.span();
                        let err = if err.is_fatal() {
                            err
                        } else {
                            ParseError::Ambiguous {
                                construct: "definition",
                                attempts: DEF_FORMS,
                                last: Box::new(err),
                                span,
                            }
                        };
                        self.recover(err, start, mark)?
                    }
                };
                Ok(DefForm::Nullary { body })
            }
        }
    }

    /// `<T, U: Set>` after a `def` or `type` name.
    fn parse_type_params(&mut self) -> PResult<Vec<TypeParam>> {
        if !self.eat(TokenKind::Lt) {
            return Ok(Vec::new());
        }
        let params = self.delimited(|p| {
            let mut params = vec![p.parse_type_param()?];
            while p.eat(TokenKind::Comma) {
                params.push(p.parse_type_param()?);
            }
            Ok(params)
        })?;
        self.expect_close_angle()?;
        Ok(params)
    }

    fn parse_type_param(&mut self) -> PResult<TypeParam> {
        let (name, span) = self.expect_ident()?;
        let bound = if self.eat(TokenKind::Colon) {
            Some(self.in_slot(Usage::Type, |p| p.parse_expr_bp(ADD))?)
        } else {
            None
        };
        Ok(TypeParam { name, span, bound })
    }

    // ========================================================================
    // type
    // ========================================================================

    fn parse_type_def(&mut self) -> PResult<TypeDef> {
        let kw = self.expect(TokenKind::Type)?;
        let (name, _) = self.expect_ident()?;
        let type_params = self.parse_type_params()?;
        let params = if self.eat(TokenKind::LParen) {
            let params = self.delimited(|p| {
                p.comma_separated(TokenKind::RParen, |p| p.parse_binder_with(Self::parse_type))
            })?;
            self.expect(TokenKind::RParen)?;
            params
        } else {
            Vec::new()
        };
        self.expect(TokenKind::Colon)?;
        let mut cases = Vec::new();
        while self.at(TokenKind::Case) {
            cases.push(self.parse_ctor_case()?);
        }
        if cases.is_empty() {
            return Err(self.unexpected("`case`"));
        }
        trace!(name = %name, cases = cases.len(), "type definition");
        Ok(TypeDef {
            name,
            type_params,
            params,
            cases,
            span: kw.to(self.prev_span),
        })
    }

    /// `case @Tag: field: T ...`
    fn parse_ctor_case(&mut self) -> PResult<CtorCase> {
        let start = self.expect(TokenKind::Case)?;
        self.expect(TokenKind::At)?;
        let (tag, _) = self.expect_ident()?;
        self.expect(TokenKind::Colon)?;
        let restrict = Restrictions {
            field_heads: true,
            usage: Usage::Type,
            ..Restrictions::default()
        };
        let fields = self.with_restrictions(restrict, |p| {
            let mut fields = Vec::new();
            while p.at(TokenKind::Ident) && p.nth_kind(1) == TokenKind::Colon {
                fields.push(p.parse_binder_with(|p| p.parse_expr_bp(PRODUCT))?);
            }
            Ok(fields)
        })?;
        Ok(CtorCase {
            tag,
            fields,
            span: start.to(self.prev_span),
        })
    }

    /// In a constructor case, types stop in front of the next `name:`.
    pub(super) fn at_field_head(&self) -> bool {
        self.restrict.field_heads
            && self.at(TokenKind::Ident)
            && self.nth_kind(1) == TokenKind::Colon
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{DefForm, Item};
    use crate::parser::{parse_program, parse_program_with_errors};
    use diagnostics::DiagnosticKind;

    fn items(src: &str) -> Vec<String> {
        let program = match parse_program(src) {
            Ok(program) => program,
            Err(diags) => panic!("failed to parse {src:?}: {diags:?}"),
        };
        program
            .items
            .iter()
            .map(|item| program.item_sexp(item))
            .collect()
    }

    #[test]
    fn full_definition() {
        assert_eq!(
            items("def inc(x: Nat) -> Nat : x + 1n"),
            ["(def inc (params (x Nat)) (ret Nat) (+ x 1n))"]
        );
        assert_eq!(
            items("def add(a: Nat, b: Nat) : a + b"),
            ["(def add (params (a Nat) (b Nat)) (+ a b))"]
        );
    }

    #[test]
    fn equation_form_wins_when_an_equals_follows() {
        let program = parse_program("def id : Nat -> Nat = λx. x").unwrap();
        let Item::Def(def) = &program.items[0] else {
            panic!("expected def, got {:?}", program.items[0]);
        };
        assert!(matches!(def.form, DefForm::Equation { .. }));
        assert_eq!(
            program.item_sexp(&program.items[0]),
            "(def id (type (-> Nat Nat)) (lam (x) x))"
        );
        // `x` reads as a type, so `= 1n` ends the value and `x + x` is
        // the next item.
        assert_eq!(
            items("def two : x = 1n; x + x"),
            ["(def two (type x) 1n)", "(+ x x)"]
        );
    }

    #[test]
    fn nullary_form_without_equals() {
        assert_eq!(items("def zero : 0n"), ["(def zero 0n)"]);
        assert_eq!(
            items("def main : f(1n) + 2n"),
            ["(def main (+ (call f 1n) 2n))"]
        );
    }

    #[test]
    fn type_parameters() {
        assert_eq!(
            items("def id<T>(x: T) -> T : x"),
            ["(def id (tparams T) (params (x T)) (ret T) x)"]
        );
        assert_eq!(
            items("def k<A, B: Set> : A"),
            ["(def k (tparams A (B Set)) A)"]
        );
    }

    #[test]
    fn option_type() {
        assert_eq!(
            items("type Option<T> : case @None: case @Some: value: T"),
            ["(type Option (tparams T) (case @None) (case @Some (value T)))"]
        );
    }

    #[test]
    fn fields_do_not_juxtapose_with_next_field() {
        assert_eq!(
            items("type Pair<A, B> : case @MkPair: fst: A snd: List<B>"),
            ["(type Pair (tparams A B) (case @MkPair (fst A) (snd (tyapp List B))))"]
        );
        assert_eq!(
            items("type Vec<T>(n: Nat) : case @Nil: case @Cons: head: T tail: Vec<T>(n)"),
            ["(type Vec (tparams T) (params (n Nat)) (case @Nil) (case @Cons (head T) (tail (call Vec <T> n))))"]
        );
    }

    #[test]
    fn assert_and_try() {
        assert_eq!(
            items("assert 1n + 1n : Nat"),
            ["(assert (+ 1n 1n) Nat)"]
        );
        assert_eq!(
            items("try p : Nat{a == b} { {==} }"),
            ["(try p (eql Nat a b) {==})"]
        );
        assert_eq!(
            items("try q : P x { trust x }"),
            ["(try q (app P x) (trust x))"]
        );
    }

    #[test]
    fn bare_expressions_and_separators() {
        assert_eq!(items("1n + 1n; f x"), ["(+ 1n 1n)", "(app f x)"]);
        assert!(items("").is_empty());
    }

    #[test]
    fn recovery_reports_every_broken_item() {
        let src = "def a : ) def b(x: Nat) : x + ) def c : 1n";
        let (program, diags) = parse_program_with_errors(src);
        assert_eq!(diags.len(), 2, "{diags:?}");
        assert_eq!(diags[0].kind, DiagnosticKind::Ambiguity);
        assert_eq!(diags[1].kind, DiagnosticKind::Syntax);
        assert_eq!(program.items.len(), 3);
        assert_eq!(program.item_sexp(&program.items[0]), "(def a <error>)");
        assert_eq!(
            program.item_sexp(&program.items[1]),
            "(def b (params (x Nat)) <error>)"
        );
        assert_eq!(program.item_sexp(&program.items[2]), "(def c 1n)");
    }

    #[test]
    fn ambiguity_names_both_forms() {
        let (_, diags) = parse_program_with_errors("def a : )");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("`def name : type = value`"));
        assert!(diags[0].message.contains("`def name : body`"));
        assert!(diags[0].message.contains("found `)`"));
    }

    #[test]
    fn broken_type_definition_becomes_an_error_item() {
        let (program, diags) = parse_program_with_errors("type T : x def ok : 1n");
        assert_eq!(diags.len(), 1);
        assert!(matches!(program.items[0], Item::Error(_)));
        assert_eq!(program.item_sexp(&program.items[1]), "(def ok 1n)");
    }
}
