//! Token types for the Bend lexer.

use diagnostics::Span;

/// A single token produced by the lexer.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    /// Raw source text of the token, quotes and suffixes included.
    pub lexeme: String,
    /// Whitespace or a comment separates this token from the previous one.
    /// Always true for the first token of a buffer.
    pub preceded_by_space: bool,
}

impl Token {
    /// Whether this token touches the previous one (`f(` rather than `f (`).
    pub fn is_tight(&self) -> bool {
        !self.preceded_by_space
    }
}

/// All token variants recognized by the lexer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Nat,
    Int,
    Float,
    Char,
    Str,

    // Identifier, possibly qualified (`mod/name`)
    Ident,

    // Declaration keywords
    Def,
    Type,
    Case,
    Assert,
    Try,

    // Type keywords
    All,
    Any,
    Enum,
    SelfType,
    Set,
    Empty,
    Unit,
    Bool,
    NatType,
    U64,
    I64,
    F64,
    CharType,

    // Term keywords
    Lambda,
    Mu,
    If,
    Else,
    Elif,
    Fork,
    Match,
    With,
    Not,
    And,
    Or,
    Xor,
    Use,
    Rewrite,
    Finally,
    Trust,
    Absurd,
    Log,
    View,
    Return,
    Ref,
    Sub,
    True,
    False,

    // Primitive functions
    U64ToChar,
    CharToU64,
    HvmInc,
    HvmDec,

    // Operators
    EqEqEq,
    NotEqEq,
    EqEq,
    NotEq,
    Le,
    Ge,
    Shl,
    Shr,
    StarStar,
    ColonColon,
    Cons,
    Arrow,
    ColonEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Lt,
    Gt,
    Assign,
    Colon,
    Semicolon,
    Comma,
    Dot,
    Amp,
    At,
    Question,
    Tilde,

    // Delimiters
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,

    /// Malformed input; the lexer has already reported why.
    Invalid,

    // End of file
    Eof,
}

impl TokenKind {
    /// Keyword lookup for an identifier-shaped lexeme.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        Some(match word {
            "def" => TokenKind::Def,
            "type" => TokenKind::Type,
            "case" => TokenKind::Case,
            "assert" => TokenKind::Assert,
            "try" => TokenKind::Try,
            "all" | "∀" => TokenKind::All,
            "any" | "Σ" => TokenKind::Any,
            "enum" => TokenKind::Enum,
            "Self" => TokenKind::SelfType,
            "Set" => TokenKind::Set,
            "Empty" => TokenKind::Empty,
            "Unit" => TokenKind::Unit,
            "Bool" => TokenKind::Bool,
            "Nat" => TokenKind::NatType,
            "U64" => TokenKind::U64,
            "I64" => TokenKind::I64,
            "F64" => TokenKind::F64,
            "Char" => TokenKind::CharType,
            "lambda" | "λ" => TokenKind::Lambda,
            "mu" | "μ" => TokenKind::Mu,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "elif" => TokenKind::Elif,
            "fork" => TokenKind::Fork,
            "match" => TokenKind::Match,
            "with" => TokenKind::With,
            "not" => TokenKind::Not,
            "and" => TokenKind::And,
            "or" => TokenKind::Or,
            "xor" => TokenKind::Xor,
            "use" => TokenKind::Use,
            "rewrite" => TokenKind::Rewrite,
            "finally" => TokenKind::Finally,
            "trust" => TokenKind::Trust,
            "absurd" => TokenKind::Absurd,
            "log" => TokenKind::Log,
            "view" => TokenKind::View,
            "return" => TokenKind::Return,
            "ref" => TokenKind::Ref,
            "sub" => TokenKind::Sub,
            "True" => TokenKind::True,
            "False" => TokenKind::False,
            "U64_TO_CHAR" => TokenKind::U64ToChar,
            "CHAR_TO_U64" => TokenKind::CharToU64,
            "HVM_INC" => TokenKind::HvmInc,
            "HVM_DEC" => TokenKind::HvmDec,
            _ => return None,
        })
    }

    /// Keywords that begin a top-level item; error recovery resynchronizes here.
    pub fn is_item_start(self) -> bool {
        matches!(
            self,
            TokenKind::Def | TokenKind::Type | TokenKind::Assert | TokenKind::Try | TokenKind::Eof
        )
    }

    /// Whether a token of this kind can be the last token of an operand.
    /// The lexer uses this to decide if `-1` is a signed literal or a minus.
    pub fn ends_operand(self) -> bool {
        matches!(
            self,
            TokenKind::Nat
                | TokenKind::Int
                | TokenKind::Float
                | TokenKind::Char
                | TokenKind::Str
                | TokenKind::Ident
                | TokenKind::SelfType
                | TokenKind::Set
                | TokenKind::Empty
                | TokenKind::Unit
                | TokenKind::Bool
                | TokenKind::NatType
                | TokenKind::U64
                | TokenKind::I64
                | TokenKind::F64
                | TokenKind::CharType
                | TokenKind::Finally
                | TokenKind::True
                | TokenKind::False
                | TokenKind::U64ToChar
                | TokenKind::CharToU64
                | TokenKind::HvmInc
                | TokenKind::HvmDec
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::RBrace
        )
    }

    /// Human-readable name used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Nat => "natural literal",
            TokenKind::Int => "integer literal",
            TokenKind::Float => "float literal",
            TokenKind::Char => "character literal",
            TokenKind::Str => "string literal",
            TokenKind::Ident => "identifier",
            TokenKind::Def => "def",
            TokenKind::Type => "type",
            TokenKind::Case => "case",
            TokenKind::Assert => "assert",
            TokenKind::Try => "try",
            TokenKind::All => "all",
            TokenKind::Any => "any",
            TokenKind::Enum => "enum",
            TokenKind::SelfType => "Self",
            TokenKind::Set => "Set",
            TokenKind::Empty => "Empty",
            TokenKind::Unit => "Unit",
            TokenKind::Bool => "Bool",
            TokenKind::NatType => "Nat",
            TokenKind::U64 => "U64",
            TokenKind::I64 => "I64",
            TokenKind::F64 => "F64",
            TokenKind::CharType => "Char",
            TokenKind::Lambda => "λ",
            TokenKind::Mu => "μ",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Elif => "elif",
            TokenKind::Fork => "fork",
            TokenKind::Match => "match",
            TokenKind::With => "with",
            TokenKind::Not => "not",
            TokenKind::And => "and",
            TokenKind::Or => "or",
            TokenKind::Xor => "xor",
            TokenKind::Use => "use",
            TokenKind::Rewrite => "rewrite",
            TokenKind::Finally => "finally",
            TokenKind::Trust => "trust",
            TokenKind::Absurd => "absurd",
            TokenKind::Log => "log",
            TokenKind::View => "view",
            TokenKind::Return => "return",
            TokenKind::Ref => "ref",
            TokenKind::Sub => "sub",
            TokenKind::True => "True",
            TokenKind::False => "False",
            TokenKind::U64ToChar => "U64_TO_CHAR",
            TokenKind::CharToU64 => "CHAR_TO_U64",
            TokenKind::HvmInc => "HVM_INC",
            TokenKind::HvmDec => "HVM_DEC",
            TokenKind::EqEqEq => "===",
            TokenKind::NotEqEq => "!==",
            TokenKind::EqEq => "==",
            TokenKind::NotEq => "!=",
            TokenKind::Le => "<=",
            TokenKind::Ge => ">=",
            TokenKind::Shl => "<<",
            TokenKind::Shr => ">>",
            TokenKind::StarStar => "**",
            TokenKind::ColonColon => "::",
            TokenKind::Cons => "<>",
            TokenKind::Arrow => "->",
            TokenKind::ColonEq => ":=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::Lt => "<",
            TokenKind::Gt => ">",
            TokenKind::Assign => "=",
            TokenKind::Colon => ":",
            TokenKind::Semicolon => ";",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Amp => "&",
            TokenKind::At => "@",
            TokenKind::Question => "?",
            TokenKind::Tilde => "~",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::LBracket => "[",
            TokenKind::RBracket => "]",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Invalid => "invalid token",
            TokenKind::Eof => "end of file",
        }
    }
}
