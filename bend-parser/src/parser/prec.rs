//! Binding powers shared by the type and term grammars, plus the per-slot
//! restrictions that switch individual productions off.

use crate::ast::{BinOp, Usage};
use crate::token::TokenKind;

// Levels, loosest first.
pub(crate) const STMT: u8 = 1;
pub(crate) const CHECK: u8 = 2;
pub(crate) const PRODUCT: u8 = 3;
pub(crate) const ARROW: u8 = 4;
pub(crate) const CONS: u8 = 5;
pub(crate) const OR: u8 = 6;
pub(crate) const XOR: u8 = 7;
pub(crate) const AND: u8 = 8;
pub(crate) const EQUALITY: u8 = 9;
pub(crate) const COMPARISON: u8 = 10;
pub(crate) const SHIFT: u8 = 11;
pub(crate) const ADD: u8 = 12;
pub(crate) const MUL: u8 = 13;
pub(crate) const POW: u8 = 14;
pub(crate) const SIGMA: u8 = 15;
pub(crate) const PREFIX: u8 = 16;
pub(crate) const APP: u8 = 17;
pub(crate) const POSTFIX: u8 = 18;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Assoc {
    Left,
    Right,
}

/// What an infix token builds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Infix {
    Op(BinOp),
    Arrow,
    Check,
    Sigma,
}

pub(crate) fn infix(kind: TokenKind) -> Option<(Infix, u8, Assoc)> {
    use Assoc::{Left, Right};
    use TokenKind as T;
    let op = |op, level, assoc| Some((Infix::Op(op), level, assoc));
    match kind {
        T::Assign => op(BinOp::Assign, STMT, Right),
        T::ColonEq => op(BinOp::Define, STMT, Right),
        T::ColonColon => Some((Infix::Check, CHECK, Right)),
        T::Amp => op(BinOp::Product, PRODUCT, Right),
        T::Arrow => Some((Infix::Arrow, ARROW, Right)),
        T::Cons => op(BinOp::Cons, CONS, Right),
        T::Or => op(BinOp::Or, OR, Left),
        T::Xor => op(BinOp::Xor, XOR, Left),
        T::And => op(BinOp::And, AND, Left),
        T::EqEq => op(BinOp::Eq, EQUALITY, Left),
        T::NotEq => op(BinOp::Neq, EQUALITY, Left),
        T::EqEqEq => op(BinOp::StrictEq, EQUALITY, Left),
        T::NotEqEq => op(BinOp::StrictNeq, EQUALITY, Left),
        T::Lt => op(BinOp::Lt, COMPARISON, Left),
        T::Gt => op(BinOp::Gt, COMPARISON, Left),
        T::Le => op(BinOp::Le, COMPARISON, Left),
        T::Ge => op(BinOp::Ge, COMPARISON, Left),
        T::Shl => op(BinOp::Shl, SHIFT, Left),
        T::Shr => op(BinOp::Shr, SHIFT, Left),
        T::Plus => op(BinOp::Add, ADD, Left),
        T::Minus => op(BinOp::Sub, ADD, Left),
        T::Star => op(BinOp::Mul, MUL, Left),
        T::Slash => op(BinOp::Div, MUL, Left),
        T::Percent => op(BinOp::Mod, MUL, Left),
        T::StarStar => op(BinOp::Pow, POW, Right),
        T::Dot => Some((Infix::Sigma, SIGMA, Right)),
        _ => None,
    }
}

/// Productions switched off in the current slot.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct Restrictions {
    /// Binder types: `.` ends the type instead of forming `A . B`.
    pub no_dot: bool,
    /// Heads of `~e{...}` and `&L{a,b}`: no `{` suffix at all.
    pub no_brace: bool,
    /// `try` types: a spaced `{` opens the proof block.
    pub no_loose_brace: bool,
    /// `match` scrutinees and `with` values: one operand each.
    pub no_juxtapose: bool,
    /// Case blocks: stop before the next `head:`.
    pub case_heads: bool,
    /// Constructor fields: stop before the next `name:`.
    pub field_heads: bool,
    pub usage: Usage,
}

impl Restrictions {
    /// Bracketed contents can never run into a token outside the brackets,
    /// so only the slot kind carries over.
    pub(crate) fn delimited(self) -> Self {
        Self {
            usage: self.usage,
            ..Self::default()
        }
    }
}
