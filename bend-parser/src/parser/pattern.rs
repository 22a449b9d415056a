use super::{literal_value, PResult, Parser};
use crate::ast::{Pattern, PatternId};
use crate::error::ParseError;
use crate::lexer;
use crate::token::TokenKind;

impl Parser {
    /// Pattern in a `match` case head or a lambda parameter list.
    pub(super) fn parse_pattern(&mut self) -> PResult<PatternId> {
        self.nested(|p| {
            let start = p.peek_span();
            let head = p.parse_pattern_atom()?;
            if p.eat(TokenKind::Cons) {
                let tail = p.parse_pattern()?;
                let span = start.to(p.prev_span);
                return Ok(p.ast.alloc_pattern(Pattern::Cons { head, tail }, span));
            }
            Ok(head)
        })
    }

    fn parse_pattern_atom(&mut self) -> PResult<PatternId> {
        let start = self.peek_span();
        let pattern = match self.peek_kind() {
            TokenKind::Ident => {
                let (name, _) = self.expect_ident()?;
                Pattern::Var(name)
            }
            TokenKind::Nat if self.nth_kind(1) == TokenKind::Plus => {
                let n = lexer::nat_value(&self.peek().lexeme)
                    .ok_or_else(|| ParseError::invalid("malformed natural literal", start))?;
                self.advance();
                self.advance();
                let rest = self.nested(Self::parse_pattern_atom)?;
                Pattern::Succ { n, rest }
            }
            TokenKind::Nat
            | TokenKind::Int
            | TokenKind::Float
            | TokenKind::Char
            | TokenKind::Str
            | TokenKind::True
            | TokenKind::False => {
                let lit = literal_value(self.peek()).ok_or_else(|| {
                    ParseError::invalid(format!("malformed {}", self.peek_kind().name()), start)
                })?;
                self.advance();
                Pattern::Lit(lit)
            }
            TokenKind::At => {
                self.advance();
                let (tag, _) = self.expect_ident()?;
                if self.eat(TokenKind::LBrace) {
                    let args = self
                        .delimited(|p| p.comma_separated(TokenKind::RBrace, Self::parse_pattern))?;
                    self.expect(TokenKind::RBrace)?;
                    Pattern::Ctor { tag, args }
                } else {
                    Pattern::Tag(tag)
                }
            }
            TokenKind::Amp => {
                self.advance();
                let (name, _) = self.expect_ident()?;
                Pattern::Sym(name)
            }
            TokenKind::LParen => {
                self.advance();
                let mut items = Vec::new();
                let mut trailing_comma = false;
                while !self.at(TokenKind::RParen) {
                    items.push(self.delimited(Self::parse_pattern)?);
                    trailing_comma = self.eat(TokenKind::Comma);
                    if !trailing_comma {
                        break;
                    }
                }
                if items.is_empty() {
                    return Err(self.unexpected("pattern"));
                }
                self.expect(TokenKind::RParen)?;
                match items.as_slice() {
                    [single] if !trailing_comma => Pattern::Paren(*single),
                    _ => Pattern::Tuple(items),
                }
            }
            TokenKind::LBracket => {
                self.advance();
                if self.eat(TokenKind::RBracket) {
                    Pattern::EmptyList
                } else {
                    let items = self.delimited(|p| {
                        p.comma_separated(TokenKind::RBracket, Self::parse_pattern)
                    })?;
                    self.expect(TokenKind::RBracket)?;
                    Pattern::List(items)
                }
            }
            _ => return Err(self.unexpected("pattern")),
        };
        let span = start.to(self.prev_span);
        Ok(self.ast.alloc_pattern(pattern, span))
    }
}
