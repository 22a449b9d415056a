//! Arena-allocated syntax tree for Bend.
//!
//! Types and terms share one representation: a [`Term`] built in a type slot
//! is structurally identical to the same term built in an expression slot.
//! The slot is only recorded in a side table, see [`Ast::usage`]. Nodes name
//! their children by [`Id`]; every child has exactly one parent and names are
//! never resolved to binder links.

use std::fmt::{self, Write as _};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::ops::Index;

use diagnostics::Span;
use serde::{Serialize, Serializer};

/// Index of a node inside an [`Arena`].
pub struct Id<T> {
    index: usize,
    marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    fn new(index: usize) -> Self {
        Self {
            index,
            marker: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        self.index
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
    }
}

impl<T> Eq for Id<T> {}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.index as u64)
    }
}

/// Append-only node storage with a parallel span table.
#[derive(Clone, Debug, Serialize)]
pub struct Arena<T> {
    nodes: Vec<T>,
    spans: Vec<Span>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            spans: Vec::new(),
        }
    }
}

impl<T> Arena<T> {
    pub(crate) fn alloc(&mut self, node: T, span: Span) -> Id<T> {
        let id = Id::new(self.nodes.len());
        self.nodes.push(node);
        self.spans.push(span);
        id
    }

    pub fn get(&self, id: Id<T>) -> Option<&T> {
        self.nodes.get(id.index)
    }

    pub fn span(&self, id: Id<T>) -> Span {
        self.spans.get(id.index).copied().unwrap_or_default()
    }

    pub(crate) fn set_span(&mut self, id: Id<T>, span: Span) {
        if let Some(slot) = self.spans.get_mut(id.index) {
            *slot = span;
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = Id<T>> + '_ {
        (0..self.nodes.len()).map(Id::new)
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
        self.spans.truncate(len);
    }
}

impl<T> Index<Id<T>> for Arena<T> {
    type Output = T;

    fn index(&self, id: Id<T>) -> &T {
        &self.nodes[id.index]
    }
}

pub type TermId = Id<Term>;
pub type PatternId = Id<Pattern>;

/// Syntactic slot a term was parsed in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Usage {
    #[default]
    Term,
    Type,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Literal {
    Bool(bool),
    Nat(u64),
    Int(i64),
    Float(f64),
    Char(char),
    Str(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Bool(true) => f.write_str("True"),
            Literal::Bool(false) => f.write_str("False"),
            Literal::Nat(n) => write!(f, "{n}n"),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Char(c) => write!(f, "{c:?}"),
            Literal::Str(s) => write!(f, "{s:?}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum NumType {
    U64,
    I64,
    F64,
    Char,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum Primitive {
    U64ToChar,
    CharToU64,
    HvmInc,
    HvmDec,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::U64ToChar => "U64_TO_CHAR",
            Primitive::CharToU64 => "CHAR_TO_U64",
            Primitive::HvmInc => "HVM_INC",
            Primitive::HvmDec => "HVM_DEC",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum BinOp {
    Assign,
    Define,
    Product,
    Cons,
    Or,
    Xor,
    And,
    Eq,
    Neq,
    StrictEq,
    StrictNeq,
    Lt,
    Gt,
    Le,
    Ge,
    Shl,
    Shr,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Assign => "=",
            BinOp::Define => ":=",
            BinOp::Product => "&",
            BinOp::Cons => "<>",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
            BinOp::And => "and",
            BinOp::Eq => "==",
            BinOp::Neq => "!=",
            BinOp::StrictEq => "===",
            BinOp::StrictNeq => "!==",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum UnOp {
    Not,
    Neg,
}

/// `x: A` in an `all` binder list, a parameter list or a field list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Binder {
    pub name: String,
    pub span: Span,
    pub ty: TermId,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum LamParam {
    Name { name: String, span: Span },
    Typed(Binder),
    Patterns(Vec<PatternId>),
}

/// `with x` or `with x = e` clause of a `match`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct WithBinding {
    pub name: String,
    pub span: Span,
    pub value: Option<TermId>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchCase {
    pub patterns: Vec<PatternId>,
    pub body: TermId,
    pub span: Span,
}

/// Which built-in shape a case block eliminates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum MatchKind {
    /// `{}`: no cases at all.
    Empty,
    Unit,
    Bool,
    Nat,
    List,
    Pair,
    Enum,
    Sup,
    Eql,
}

impl MatchKind {
    pub fn name(self) -> &'static str {
        match self {
            MatchKind::Empty => "empty",
            MatchKind::Unit => "unit",
            MatchKind::Bool => "bool",
            MatchKind::Nat => "nat",
            MatchKind::List => "list",
            MatchKind::Pair => "pair",
            MatchKind::Enum => "enum",
            MatchKind::Sup => "sup",
            MatchKind::Eql => "eql",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum CaseTag {
    Unit,
    False,
    True,
    Zero,
    Succ,
    Nil,
    Cons,
    Pair,
    Ctor(String),
    Sym(String),
    /// `&L{,}`, carrying the label term.
    Sup(TermId),
    Refl,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Case {
    pub tag: CaseTag,
    pub span: Span,
    pub body: TermId,
}

/// Cases of a `λ{...}` or `~e{...}` eliminator, in source order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CaseBlock {
    pub kind: MatchKind,
    pub cases: Vec<Case>,
    /// Trailing untagged case; only enum blocks have one.
    pub default: Option<TermId>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Term {
    Var(String),
    /// `mod/name`, split on `/`.
    Qualified(Vec<String>),
    Ref(String),
    Sub(TermId),
    Lit(Literal),
    Unit,
    EmptyList,
    /// `*`
    Era,
    Tag(String),
    Ctor {
        tag: String,
        args: Vec<TermId>,
    },
    Sym(String),
    Enum(Vec<String>),

    Set,
    EmptyType,
    UnitType,
    BoolType,
    NatType,
    Num(NumType),
    SelfType,
    All {
        binders: Vec<Binder>,
        body: TermId,
    },
    Any {
        binder: Binder,
        body: TermId,
    },
    /// Binder-less pair type `A . B`.
    Sigma {
        fst: TermId,
        snd: TermId,
    },
    Arrow {
        domain: TermId,
        codomain: TermId,
    },
    Eql {
        ty: TermId,
        lhs: TermId,
        rhs: TermId,
        negated: bool,
    },
    ListType(TermId),
    Meta {
        name: String,
        ty: TermId,
        ctx: Vec<TermId>,
    },
    TyApp {
        head: TermId,
        args: Vec<TermId>,
    },

    Lam {
        params: Vec<LamParam>,
        body: TermId,
    },
    LamMatch(CaseBlock),
    Fix {
        name: String,
        body: TermId,
    },
    Let {
        name: String,
        ty: Option<TermId>,
        value: TermId,
        body: TermId,
    },
    Use {
        name: String,
        value: TermId,
        body: TermId,
    },

    Call {
        head: TermId,
        args: Vec<TermId>,
        /// No whitespace between the head and `(`.
        tight: bool,
    },
    GenericCall {
        head: TermId,
        type_args: Vec<TermId>,
        args: Vec<TermId>,
    },
    Implicit {
        head: TermId,
        args: Vec<TermId>,
        tight: bool,
    },
    App {
        func: TermId,
        arg: TermId,
    },

    Op2 {
        op: BinOp,
        lhs: TermId,
        rhs: TermId,
    },
    Op1 {
        op: UnOp,
        arg: TermId,
    },
    /// Induction marker `~e`.
    Tilde(TermId),

    If {
        cond: TermId,
        then: TermId,
        otherwise: TermId,
    },
    Fork {
        cond: TermId,
        then: TermId,
        elifs: Vec<TermId>,
        otherwise: TermId,
    },
    Match {
        scrutinees: Vec<TermId>,
        withs: Vec<WithBinding>,
        cases: Vec<MatchCase>,
    },
    TildeMatch {
        scrutinee: TermId,
        block: CaseBlock,
    },
    Rewrite {
        proof: TermId,
        body: TermId,
    },
    /// `{==}` or `finally`.
    Refl,
    Trust(TermId),
    Absurd(TermId),
    Sup {
        label: TermId,
        left: TermId,
        right: TermId,
    },
    Log {
        message: TermId,
        body: TermId,
    },
    View(String),
    Pri(Primitive),
    /// `e :: T`
    Check {
        term: TermId,
        ty: TermId,
    },
    Tuple(Vec<TermId>),
    List(Vec<TermId>),
    Return(TermId),
    /// Placeholder for text the parser skipped after an error.
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Pattern {
    Var(String),
    Lit(Literal),
    Tag(String),
    Ctor { tag: String, args: Vec<PatternId> },
    Sym(String),
    /// `Nn + rest`
    Succ { n: u64, rest: PatternId },
    Tuple(Vec<PatternId>),
    List(Vec<PatternId>),
    EmptyList,
    Cons { head: PatternId, tail: PatternId },
    Paren(PatternId),
}

/// A child reference returned by [`Ast::children`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Child {
    Term(TermId),
    Pattern(PatternId),
}

/// Snapshot of arena lengths, used to discard speculative nodes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct AstMark {
    terms: usize,
    patterns: usize,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct Ast {
    pub terms: Arena<Term>,
    pub patterns: Arena<Pattern>,
    usages: Vec<Usage>,
}

impl Ast {
    pub(crate) fn alloc_term(&mut self, term: Term, span: Span, usage: Usage) -> TermId {
        self.usages.push(usage);
        self.terms.alloc(term, span)
    }

    pub(crate) fn alloc_pattern(&mut self, pattern: Pattern, span: Span) -> PatternId {
        self.patterns.alloc(pattern, span)
    }

    /// Widens a finished node's span, e.g. over surrounding parentheses.
    pub(crate) fn widen(&mut self, id: TermId, span: Span) {
        let wider = self.terms.span(id).to(span);
        self.terms.set_span(id, wider);
    }

    pub(crate) fn mark(&self) -> AstMark {
        AstMark {
            terms: self.terms.len(),
            patterns: self.patterns.len(),
        }
    }

    pub(crate) fn rewind(&mut self, mark: AstMark) {
        self.terms.truncate(mark.terms);
        self.usages.truncate(mark.terms);
        self.patterns.truncate(mark.patterns);
    }

    pub fn term(&self, id: TermId) -> &Term {
        &self.terms[id]
    }

    pub fn span(&self, id: TermId) -> Span {
        self.terms.span(id)
    }

    pub fn pattern(&self, id: PatternId) -> &Pattern {
        &self.patterns[id]
    }

    pub fn pattern_span(&self, id: PatternId) -> Span {
        self.patterns.span(id)
    }

    /// Whether the node was requested by a type slot or a term slot.
    pub fn usage(&self, id: TermId) -> Usage {
        self.usages.get(id.index()).copied().unwrap_or_default()
    }

    /// Direct children of a term, in source order.
    pub fn children(&self, id: TermId) -> Vec<Child> {
        let mut out = Vec::new();
        let mut term = |t: TermId| out.push(Child::Term(t));
        match self.term(id) {
            Term::Var(_)
            | Term::Qualified(_)
            | Term::Ref(_)
            | Term::Lit(_)
            | Term::Unit
            | Term::EmptyList
            | Term::Era
            | Term::Tag(_)
            | Term::Sym(_)
            | Term::Enum(_)
            | Term::Set
            | Term::EmptyType
            | Term::UnitType
            | Term::BoolType
            | Term::NatType
            | Term::Num(_)
            | Term::SelfType
            | Term::Refl
            | Term::View(_)
            | Term::Pri(_)
            | Term::Error => {}
            Term::Sub(t)
            | Term::ListType(t)
            | Term::Tilde(t)
            | Term::Trust(t)
            | Term::Absurd(t)
            | Term::Return(t) => term(*t),
            Term::Op1 { arg, .. } => term(*arg),
            Term::Ctor { args, .. } | Term::Tuple(args) | Term::List(args) => {
                args.iter().copied().for_each(term)
            }
            Term::All { binders, body } => {
                binders.iter().for_each(|b| term(b.ty));
                term(*body);
            }
            Term::Any { binder, body } => {
                term(binder.ty);
                term(*body);
            }
            Term::Sigma { fst: a, snd: b }
            | Term::Arrow {
                domain: a,
                codomain: b,
            }
            | Term::App { func: a, arg: b }
            | Term::Op2 { lhs: a, rhs: b, .. }
            | Term::Rewrite { proof: a, body: b }
            | Term::Log {
                message: a,
                body: b,
            }
            | Term::Check { term: a, ty: b }
            | Term::Use {
                value: a, body: b, ..
            } => {
                term(*a);
                term(*b);
            }
            Term::Eql { ty, lhs, rhs, .. } => {
                term(*ty);
                term(*lhs);
                term(*rhs);
            }
            Term::Meta { ty, ctx, .. } => {
                term(*ty);
                ctx.iter().copied().for_each(term);
            }
            Term::TyApp { head, args }
            | Term::Call { head, args, .. }
            | Term::Implicit { head, args, .. } => {
                term(*head);
                args.iter().copied().for_each(term);
            }
            Term::GenericCall {
                head,
                type_args,
                args,
            } => {
                term(*head);
                type_args.iter().copied().for_each(&mut term);
                args.iter().copied().for_each(term);
            }
            Term::Fix { body, .. } => term(*body),
            Term::Let {
                ty, value, body, ..
            } => {
                if let Some(ty) = ty {
                    term(*ty);
                }
                term(*value);
                term(*body);
            }
            Term::If {
                cond,
                then,
                otherwise,
            } => {
                term(*cond);
                term(*then);
                term(*otherwise);
            }
            Term::Fork {
                cond,
                then,
                elifs,
                otherwise,
            } => {
                term(*cond);
                term(*then);
                elifs.iter().copied().for_each(&mut term);
                term(*otherwise);
            }
            Term::Sup { label, left, right } => {
                term(*label);
                term(*left);
                term(*right);
            }
            Term::LamMatch(block) => block_children(block, &mut out),
            Term::TildeMatch { scrutinee, block } => {
                out.push(Child::Term(*scrutinee));
                block_children(block, &mut out);
            }
            Term::Lam { params, body } => {
                for param in params {
                    match param {
                        LamParam::Name { .. } => {}
                        LamParam::Typed(binder) => out.push(Child::Term(binder.ty)),
                        LamParam::Patterns(pats) => {
                            out.extend(pats.iter().copied().map(Child::Pattern))
                        }
                    }
                }
                out.push(Child::Term(*body));
            }
            Term::Match {
                scrutinees,
                withs,
                cases,
            } => {
                out.extend(scrutinees.iter().copied().map(Child::Term));
                out.extend(withs.iter().filter_map(|w| w.value).map(Child::Term));
                for case in cases {
                    out.extend(case.patterns.iter().copied().map(Child::Pattern));
                    out.push(Child::Term(case.body));
                }
            }
        }
        out
    }

    pub fn pattern_children(&self, id: PatternId) -> Vec<PatternId> {
        match self.pattern(id) {
            Pattern::Var(_)
            | Pattern::Lit(_)
            | Pattern::Tag(_)
            | Pattern::Sym(_)
            | Pattern::EmptyList => Vec::new(),
            Pattern::Ctor { args, .. } | Pattern::Tuple(args) | Pattern::List(args) => {
                args.clone()
            }
            Pattern::Succ { rest, .. } => vec![*rest],
            Pattern::Cons { head, tail } => vec![*head, *tail],
            Pattern::Paren(inner) => vec![*inner],
        }
    }

    /// Compact structural dump, e.g. `(+ x (* y 2n))`.
    ///
    /// Spans and the tight/loose flag of calls are not part of the dump, so
    /// two parses of the same construct compare equal regardless of layout.
    pub fn sexp(&self, id: TermId) -> String {
        let mut out = String::new();
        self.write_term(&mut out, id);
        out
    }

    pub fn pattern_sexp(&self, id: PatternId) -> String {
        let mut out = String::new();
        self.write_pattern(&mut out, id);
        out
    }

    fn write_list(&self, out: &mut String, head: &str, items: &[TermId]) {
        out.push('(');
        out.push_str(head);
        for &item in items {
            out.push(' ');
            self.write_term(out, item);
        }
        out.push(')');
    }

    fn write_binder(&self, out: &mut String, binder: &Binder) {
        let _ = write!(out, "({} ", binder.name);
        self.write_term(out, binder.ty);
        out.push(')');
    }

    fn write_term(&self, out: &mut String, id: TermId) {
        match self.term(id) {
            Term::Var(name) => out.push_str(name),
            Term::Qualified(path) => out.push_str(&path.join("/")),
            Term::Ref(name) => {
                let _ = write!(out, "(ref {name})");
            }
            Term::Sub(t) => self.write_list(out, "sub", &[*t]),
            Term::Lit(lit) => {
                let _ = write!(out, "{lit}");
            }
            Term::Unit => out.push_str("()"),
            Term::EmptyList => out.push_str("[]"),
            Term::Era => out.push('*'),
            Term::Tag(tag) => {
                let _ = write!(out, "@{tag}");
            }
            Term::Ctor { tag, args } => self.write_list(out, &format!("@{tag}"), args),
            Term::Sym(name) => {
                let _ = write!(out, "&{name}");
            }
            Term::Enum(symbols) => {
                out.push_str("(enum");
                for sym in symbols {
                    let _ = write!(out, " &{sym}");
                }
                out.push(')');
            }
            Term::Set => out.push_str("Set"),
            Term::EmptyType => out.push_str("Empty"),
            Term::UnitType => out.push_str("Unit"),
            Term::BoolType => out.push_str("Bool"),
            Term::NatType => out.push_str("Nat"),
            Term::Num(num) => {
                let _ = write!(out, "{num:?}");
            }
            Term::SelfType => out.push_str("Self"),
            Term::All { binders, body } => {
                out.push_str("(all");
                for binder in binders {
                    out.push(' ');
                    self.write_binder(out, binder);
                }
                out.push(' ');
                self.write_term(out, *body);
                out.push(')');
            }
            Term::Any { binder, body } => {
                out.push_str("(any ");
                self.write_binder(out, binder);
                out.push(' ');
                self.write_term(out, *body);
                out.push(')');
            }
            Term::Sigma { fst, snd } => self.write_list(out, "sigma", &[*fst, *snd]),
            Term::Arrow { domain, codomain } => self.write_list(out, "->", &[*domain, *codomain]),
            Term::Eql {
                ty,
                lhs,
                rhs,
                negated,
            } => {
                let head = if *negated { "neq" } else { "eql" };
                self.write_list(out, head, &[*ty, *lhs, *rhs])
            }
            Term::ListType(t) => self.write_list(out, "list-type", &[*t]),
            Term::Meta { name, ty, ctx } => {
                let _ = write!(out, "(meta {name} ");
                self.write_term(out, *ty);
                for &c in ctx {
                    out.push(' ');
                    self.write_term(out, c);
                }
                out.push(')');
            }
            Term::TyApp { head, args } => {
                out.push_str("(tyapp ");
                self.write_term(out, *head);
                for &a in args {
                    out.push(' ');
                    self.write_term(out, a);
                }
                out.push(')');
            }
            Term::Lam { params, body } => {
                out.push_str("(lam (");
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    match param {
                        LamParam::Name { name, .. } => out.push_str(name),
                        LamParam::Typed(binder) => self.write_binder(out, binder),
                        LamParam::Patterns(pats) => {
                            out.push_str("(pat");
                            for &p in pats {
                                out.push(' ');
                                self.write_pattern(out, p);
                            }
                            out.push(')');
                        }
                    }
                }
                out.push_str(") ");
                self.write_term(out, *body);
                out.push(')');
            }
            Term::LamMatch(block) => {
                out.push_str("(lam ");
                self.write_block(out, block);
                out.push(')');
            }
            Term::Fix { name, body } => {
                let _ = write!(out, "(mu {name} ");
                self.write_term(out, *body);
                out.push(')');
            }
            Term::Let {
                name,
                ty,
                value,
                body,
            } => {
                out.push_str("(let ");
                match ty {
                    Some(ty) => {
                        let _ = write!(out, "({name} ");
                        self.write_term(out, *ty);
                        out.push(')');
                    }
                    None => out.push_str(name),
                }
                out.push(' ');
                self.write_term(out, *value);
                out.push(' ');
                self.write_term(out, *body);
                out.push(')');
            }
            Term::Use { name, value, body } => {
                let _ = write!(out, "(use {name} ");
                self.write_term(out, *value);
                out.push(' ');
                self.write_term(out, *body);
                out.push(')');
            }
            Term::Call { head, args, .. } => {
                out.push_str("(call ");
                self.write_term(out, *head);
                for &a in args {
                    out.push(' ');
                    self.write_term(out, a);
                }
                out.push(')');
            }
            Term::GenericCall {
                head,
                type_args,
                args,
            } => {
                out.push_str("(call ");
                self.write_term(out, *head);
                out.push_str(" <");
                for (i, &a) in type_args.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.write_term(out, a);
                }
                out.push('>');
                for &a in args {
                    out.push(' ');
                    self.write_term(out, a);
                }
                out.push(')');
            }
            Term::Implicit { head, args, .. } => {
                out.push_str("(implicit ");
                self.write_term(out, *head);
                for &a in args {
                    out.push(' ');
                    self.write_term(out, a);
                }
                out.push(')');
            }
            Term::App { func, arg } => self.write_list(out, "app", &[*func, *arg]),
            Term::Op2 { op, lhs, rhs } => self.write_list(out, op.symbol(), &[*lhs, *rhs]),
            Term::Op1 { op, arg } => {
                let head = match op {
                    UnOp::Not => "not",
                    UnOp::Neg => "neg",
                };
                self.write_list(out, head, &[*arg])
            }
            Term::Tilde(t) => self.write_list(out, "~", &[*t]),
            Term::If {
                cond,
                then,
                otherwise,
            } => self.write_list(out, "if", &[*cond, *then, *otherwise]),
            Term::Fork {
                cond,
                then,
                elifs,
                otherwise,
            } => {
                out.push_str("(fork ");
                self.write_term(out, *cond);
                out.push(' ');
                self.write_term(out, *then);
                for &e in elifs {
                    out.push(' ');
                    self.write_list(out, "elif", &[e]);
                }
                out.push(' ');
                self.write_list(out, "else", &[*otherwise]);
                out.push(')');
            }
            Term::Match {
                scrutinees,
                withs,
                cases,
            } => {
                out.push_str("(match (");
                for (i, &s) in scrutinees.iter().enumerate() {
                    if i > 0 {
                        out.push(' ');
                    }
                    self.write_term(out, s);
                }
                out.push(')');
                if !withs.is_empty() {
                    out.push_str(" (with");
                    for w in withs {
                        match w.value {
                            Some(v) => {
                                let _ = write!(out, " ({} ", w.name);
                                self.write_term(out, v);
                                out.push(')');
                            }
                            None => {
                                let _ = write!(out, " {}", w.name);
                            }
                        }
                    }
                    out.push(')');
                }
                for case in cases {
                    out.push_str(" (case");
                    for &p in &case.patterns {
                        out.push(' ');
                        self.write_pattern(out, p);
                    }
                    out.push_str(" => ");
                    self.write_term(out, case.body);
                    out.push(')');
                }
                out.push(')');
            }
            Term::TildeMatch { scrutinee, block } => {
                out.push_str("(~ ");
                self.write_term(out, *scrutinee);
                out.push(' ');
                self.write_block(out, block);
                out.push(')');
            }
            Term::Rewrite { proof, body } => self.write_list(out, "rewrite", &[*proof, *body]),
            Term::Refl => out.push_str("{==}"),
            Term::Trust(t) => self.write_list(out, "trust", &[*t]),
            Term::Absurd(t) => self.write_list(out, "absurd", &[*t]),
            Term::Sup { label, left, right } => {
                self.write_list(out, "sup", &[*label, *left, *right])
            }
            Term::Log { message, body } => self.write_list(out, "log", &[*message, *body]),
            Term::View(name) => {
                let _ = write!(out, "(view {name})");
            }
            Term::Pri(p) => out.push_str(p.name()),
            Term::Check { term, ty } => self.write_list(out, "::", &[*term, *ty]),
            Term::Tuple(items) => self.write_list(out, "tuple", items),
            Term::List(items) => self.write_list(out, "list", items),
            Term::Return(t) => self.write_list(out, "return", &[*t]),
            Term::Error => out.push_str("<error>"),
        }
    }

    fn write_block(&self, out: &mut String, block: &CaseBlock) {
        let _ = write!(out, "({}-match", block.kind.name());
        for case in &block.cases {
            out.push_str(" (");
            match &case.tag {
                CaseTag::Unit => out.push_str("()"),
                CaseTag::False => out.push_str("False"),
                CaseTag::True => out.push_str("True"),
                CaseTag::Zero => out.push_str("0n"),
                CaseTag::Succ => out.push_str("1n+"),
                CaseTag::Nil => out.push_str("[]"),
                CaseTag::Cons => out.push_str("<>"),
                CaseTag::Pair => out.push_str("(,)"),
                CaseTag::Ctor(tag) => {
                    let _ = write!(out, "@{tag}");
                }
                CaseTag::Sym(name) => {
                    let _ = write!(out, "&{name}");
                }
                CaseTag::Sup(label) => {
                    out.push('&');
                    self.write_term(out, *label);
                    out.push_str("{,}");
                }
                CaseTag::Refl => out.push_str("{==}"),
            }
            out.push(' ');
            self.write_term(out, case.body);
            out.push(')');
        }
        if let Some(default) = block.default {
            out.push_str(" (_ ");
            self.write_term(out, default);
            out.push(')');
        }
        out.push(')');
    }

    fn write_pattern(&self, out: &mut String, id: PatternId) {
        let list = |ast: &Self, out: &mut String, head: &str, items: &[PatternId]| {
            out.push('(');
            out.push_str(head);
            for &item in items {
                out.push(' ');
                ast.write_pattern(out, item);
            }
            out.push(')');
        };
        match self.pattern(id) {
            Pattern::Var(name) => out.push_str(name),
            Pattern::Lit(lit) => {
                let _ = write!(out, "{lit}");
            }
            Pattern::Tag(tag) => {
                let _ = write!(out, "@{tag}");
            }
            Pattern::Ctor { tag, args } => list(self, out, &format!("@{tag}"), args),
            Pattern::Sym(name) => {
                let _ = write!(out, "&{name}");
            }
            Pattern::Succ { n, rest } => {
                let _ = write!(out, "(+ {n}n ");
                self.write_pattern(out, *rest);
                out.push(')');
            }
            Pattern::Tuple(items) => list(self, out, "tuple", items),
            Pattern::List(items) => list(self, out, "list", items),
            Pattern::EmptyList => out.push_str("[]"),
            Pattern::Cons { head, tail } => list(self, out, "<>", &[*head, *tail]),
            Pattern::Paren(inner) => list(self, out, "paren", &[*inner]),
        }
    }
}

fn block_children(block: &CaseBlock, out: &mut Vec<Child>) {
    for case in &block.cases {
        if let CaseTag::Sup(label) = case.tag {
            out.push(Child::Term(label));
        }
        out.push(Child::Term(case.body));
    }
    if let Some(default) = block.default {
        out.push(Child::Term(default));
    }
}

// ============================================================================
// Declarations
// ============================================================================

/// `T` or `T: Set` in a `<...>` list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TypeParam {
    pub name: String,
    pub span: Span,
    pub bound: Option<TermId>,
}

/// The three surface forms of `def`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum DefForm {
    /// `def f(x: A) -> B : body`
    Full {
        params: Vec<Binder>,
        ret: Option<TermId>,
        body: TermId,
    },
    /// `def f : T = value`
    Equation { ty: TermId, value: TermId },
    /// `def f : body`
    Nullary { body: TermId },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Def {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub form: DefForm,
    pub span: Span,
}

/// `case @Tag: field: T ...`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CtorCase {
    pub tag: String,
    pub fields: Vec<Binder>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TypeDef {
    pub name: String,
    pub type_params: Vec<TypeParam>,
    pub params: Vec<Binder>,
    pub cases: Vec<CtorCase>,
    pub span: Span,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Item {
    Def(Def),
    Type(TypeDef),
    Assert { term: TermId, ty: TermId, span: Span },
    Try {
        name: String,
        ty: TermId,
        body: TermId,
        span: Span,
    },
    Expr(TermId),
    /// A top-level region that could not be parsed at all.
    Error(Span),
}

/// A parsed source file.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Program {
    pub ast: Ast,
    pub items: Vec<Item>,
}

impl Program {
    pub fn item_span(&self, item: &Item) -> Span {
        match item {
            Item::Def(def) => def.span,
            Item::Type(ty) => ty.span,
            Item::Assert { span, .. } | Item::Try { span, .. } | Item::Error(span) => *span,
            Item::Expr(id) => self.ast.span(*id),
        }
    }

    /// Root terms directly owned by an item, in source order.
    pub fn item_roots(&self, item: &Item) -> Vec<TermId> {
        let bounds = |tps: &[TypeParam]| tps.iter().filter_map(|tp| tp.bound).collect::<Vec<_>>();
        match item {
            Item::Def(def) => {
                let mut roots = bounds(&def.type_params);
                match &def.form {
                    DefForm::Full { params, ret, body } => {
                        roots.extend(params.iter().map(|p| p.ty));
                        roots.extend(ret.iter().copied());
                        roots.push(*body);
                    }
                    DefForm::Equation { ty, value } => roots.extend([*ty, *value]),
                    DefForm::Nullary { body } => roots.push(*body),
                }
                roots
            }
            Item::Type(ty) => {
                let mut roots = bounds(&ty.type_params);
                roots.extend(ty.params.iter().map(|p| p.ty));
                for case in &ty.cases {
                    roots.extend(case.fields.iter().map(|f| f.ty));
                }
                roots
            }
            Item::Assert { term, ty, .. } => vec![*term, *ty],
            Item::Try { ty, body, .. } => vec![*ty, *body],
            Item::Expr(id) => vec![*id],
            Item::Error(_) => Vec::new(),
        }
    }

    /// Structural dump of a top-level item, in the style of [`Ast::sexp`].
    pub fn item_sexp(&self, item: &Item) -> String {
        let ast = &self.ast;
        let mut out = String::new();
        let binders = |out: &mut String, head: &str, list: &[Binder]| {
            if list.is_empty() {
                return;
            }
            let _ = write!(out, " ({head}");
            for b in list {
                out.push(' ');
                ast.write_binder(out, b);
            }
            out.push(')');
        };
        let type_params = |out: &mut String, list: &[TypeParam]| {
            if list.is_empty() {
                return;
            }
            out.push_str(" (tparams");
            for tp in list {
                match tp.bound {
                    Some(bound) => {
                        let _ = write!(out, " ({} {})", tp.name, ast.sexp(bound));
                    }
                    None => {
                        let _ = write!(out, " {}", tp.name);
                    }
                }
            }
            out.push(')');
        };
        match item {
            Item::Def(def) => {
                let _ = write!(out, "(def {}", def.name);
                type_params(&mut out, &def.type_params);
                match &def.form {
                    DefForm::Full { params, ret, body } => {
                        out.push_str(" (params");
                        for p in params {
                            out.push(' ');
                            ast.write_binder(&mut out, p);
                        }
                        out.push(')');
                        if let Some(ret) = ret {
                            let _ = write!(out, " (ret {})", ast.sexp(*ret));
                        }
                        let _ = write!(out, " {}", ast.sexp(*body));
                    }
                    DefForm::Equation { ty, value } => {
                        let _ = write!(out, " (type {}) {}", ast.sexp(*ty), ast.sexp(*value));
                    }
                    DefForm::Nullary { body } => {
                        let _ = write!(out, " {}", ast.sexp(*body));
                    }
                }
                out.push(')');
            }
            Item::Type(ty) => {
                let _ = write!(out, "(type {}", ty.name);
                type_params(&mut out, &ty.type_params);
                binders(&mut out, "params", &ty.params);
                for case in &ty.cases {
                    let _ = write!(out, " (case @{}", case.tag);
                    for field in &case.fields {
                        out.push(' ');
                        ast.write_binder(&mut out, field);
                    }
                    out.push(')');
                }
                out.push(')');
            }
            Item::Assert { term, ty, .. } => {
                let _ = write!(out, "(assert {} {})", ast.sexp(*term), ast.sexp(*ty));
            }
            Item::Try { name, ty, body, .. } => {
                let _ = write!(out, "(try {name} {} {})", ast.sexp(*ty), ast.sexp(*body));
            }
            Item::Expr(id) => out.push_str(&ast.sexp(*id)),
            Item::Error(_) => out.push_str("<error>"),
        }
        out
    }
}

/// A standalone expression with its own arena.
#[derive(Clone, Debug, Serialize)]
pub struct Expression {
    pub ast: Ast,
    pub root: TermId,
}

impl Expression {
    pub fn sexp(&self) -> String {
        self.ast.sexp(self.root)
    }

    pub fn term(&self) -> &Term {
        self.ast.term(self.root)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sp(start: usize, end: usize) -> Span {
        Span::new(start, end, 1, start + 1)
    }

    #[test]
    fn arena_ids_are_dense() {
        let mut ast = Ast::default();
        let a = ast.alloc_term(Term::Var("a".into()), sp(0, 1), Usage::Term);
        let b = ast.alloc_term(Term::NatType, sp(2, 5), Usage::Type);
        assert_eq!((a.index(), b.index()), (0, 1));
        assert_eq!(ast.usage(b), Usage::Type);
        assert_eq!(ast.terms.ids().count(), 2);
    }

    #[test]
    fn rewind_discards_speculative_nodes() {
        let mut ast = Ast::default();
        ast.alloc_term(Term::Unit, sp(0, 2), Usage::Term);
        let mark = ast.mark();
        ast.alloc_term(Term::Era, sp(3, 4), Usage::Type);
        ast.alloc_pattern(Pattern::EmptyList, sp(5, 7));
        ast.rewind(mark);
        assert_eq!(ast.terms.len(), 1);
        assert!(ast.patterns.is_empty());
        let next = ast.alloc_term(Term::Set, sp(3, 6), Usage::Term);
        assert_eq!(ast.usage(next), Usage::Term);
    }

    #[test]
    fn widen_covers_both_spans() {
        let mut ast = Ast::default();
        let x = ast.alloc_term(Term::Var("x".into()), sp(1, 2), Usage::Term);
        ast.widen(x, sp(0, 3));
        assert_eq!(ast.span(x), sp(0, 3));
    }

    #[test]
    fn sexp_and_children() {
        let mut ast = Ast::default();
        let x = ast.alloc_term(Term::Var("x".into()), sp(0, 1), Usage::Term);
        let one = ast.alloc_term(Term::Lit(Literal::Nat(1)), sp(4, 6), Usage::Term);
        let add = ast.alloc_term(
            Term::Op2 {
                op: BinOp::Add,
                lhs: x,
                rhs: one,
            },
            sp(0, 6),
            Usage::Term,
        );
        assert_eq!(ast.sexp(add), "(+ x 1n)");
        assert_eq!(ast.children(add), vec![Child::Term(x), Child::Term(one)]);
        assert!(ast.children(x).is_empty());
    }

    #[test]
    fn block_sexp_lists_cases_in_order() {
        let mut ast = Ast::default();
        let z = ast.alloc_term(Term::Var("z".into()), sp(6, 7), Usage::Term);
        let s = ast.alloc_term(Term::Var("s".into()), sp(15, 16), Usage::Term);
        let block = CaseBlock {
            kind: MatchKind::Nat,
            cases: vec![
                Case {
                    tag: CaseTag::Zero,
                    span: sp(2, 7),
                    body: z,
                },
                Case {
                    tag: CaseTag::Succ,
                    span: sp(9, 16),
                    body: s,
                },
            ],
            default: None,
        };
        let lam = ast.alloc_term(Term::LamMatch(block), sp(0, 17), Usage::Term);
        assert_eq!(ast.sexp(lam), "(lam (nat-match (0n z) (1n+ s)))");
    }

    #[test]
    fn ast_serializes() {
        let mut ast = Ast::default();
        ast.alloc_term(Term::Lit(Literal::Str("hi".into())), sp(0, 4), Usage::Term);
        let json = serde_json::to_value(&ast).unwrap();
        assert_eq!(json["terms"]["nodes"][0]["Lit"]["Str"], "hi");
    }
}
