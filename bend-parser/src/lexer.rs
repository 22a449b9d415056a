//! Single-pass O(n) lexer for Bend source code.
//!
//! The lexer never fails: malformed input becomes a `TokenKind::Invalid`
//! token plus a lexical diagnostic, and scanning resumes right after the
//! offending text. Trivia (whitespace, `#` line comments, `{- -}` block
//! comments) is dropped, but its presence is remembered on the next token
//! as `preceded_by_space` because the grammar distinguishes `f(x)` from
//! `f (x)`.
use diagnostics::{Diagnostic, Span};

use crate::token::{Token, TokenKind};

/// Operator spellings, longest first, so the first prefix match is the
/// maximal munch.
const OPERATORS: &[(&str, TokenKind)] = &[
    ("===", TokenKind::EqEqEq),
    ("!==", TokenKind::NotEqEq),
    ("==", TokenKind::EqEq),
    ("!=", TokenKind::NotEq),
    ("<=", TokenKind::Le),
    (">=", TokenKind::Ge),
    ("<<", TokenKind::Shl),
    (">>", TokenKind::Shr),
    ("**", TokenKind::StarStar),
    ("::", TokenKind::ColonColon),
    ("<>", TokenKind::Cons),
    ("->", TokenKind::Arrow),
    (":=", TokenKind::ColonEq),
    ("+", TokenKind::Plus),
    ("-", TokenKind::Minus),
    ("*", TokenKind::Star),
    ("/", TokenKind::Slash),
    ("%", TokenKind::Percent),
    ("<", TokenKind::Lt),
    (">", TokenKind::Gt),
    ("=", TokenKind::Assign),
    (":", TokenKind::Colon),
    (";", TokenKind::Semicolon),
    (",", TokenKind::Comma),
    (".", TokenKind::Dot),
    ("&", TokenKind::Amp),
    ("@", TokenKind::At),
    ("?", TokenKind::Question),
    ("~", TokenKind::Tilde),
    ("(", TokenKind::LParen),
    (")", TokenKind::RParen),
    ("[", TokenKind::LBracket),
    ("]", TokenKind::RBracket),
    ("{", TokenKind::LBrace),
    ("}", TokenKind::RBrace),
];

/// Output of a lexing pass: the token stream (always ending in `Eof`) and
/// every lexical diagnostic raised along the way.
#[derive(Clone, Debug)]
pub struct Lexed {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    col: usize,
    prev: Option<TokenKind>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> Lexer<'a> {
    pub fn tokenize(source: &'a str) -> Lexed {
        let mut lexer = Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            prev: None,
            diagnostics: Vec::new(),
        };
        let mut tokens: Vec<Token> = Vec::new();
        loop {
            let spaced = lexer.skip_trivia() || tokens.is_empty();
            let mut tok = lexer.next_token();
            tok.preceded_by_space = spaced;
            let is_eof = tok.kind == TokenKind::Eof;
            lexer.prev = Some(tok.kind);
            tokens.push(tok);
            if is_eof {
                break;
            }
        }
        Lexed {
            tokens,
            diagnostics: lexer.diagnostics,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.bytes.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> u8 {
        let ch = self.bytes[self.pos];
        self.pos += 1;
        if ch == b'\n' {
            self.line += 1;
            self.col = 1;
        } else if ch & 0xC0 != 0x80 {
            // UTF-8 continuation bytes do not start a new column.
            self.col += 1;
        }
        ch
    }

    /// Advances over one full UTF-8 scalar value.
    fn advance_char(&mut self) -> Option<char> {
        let c = self.source.get(self.pos..)?.chars().next()?;
        for _ in 0..c.len_utf8() {
            self.advance();
        }
        Some(c)
    }

    fn mark(&self) -> Mark {
        Mark {
            start: self.pos,
            line: self.line,
            col: self.col,
        }
    }

    fn span_from(&self, mark: Mark) -> Span {
        Span::new(mark.start, self.pos, mark.line, mark.col)
    }

    fn token(&self, kind: TokenKind, mark: Mark) -> Token {
        Token {
            kind,
            span: self.span_from(mark),
            lexeme: self.source.get(mark.start..self.pos).unwrap_or("").to_string(),
            preceded_by_space: false,
        }
    }

    fn invalid(&mut self, message: impl Into<String>, mark: Mark) -> Token {
        let span = self.span_from(mark);
        let tok = self.token(TokenKind::Invalid, mark);
        self.diagnostics
            .push(Diagnostic::lexical(message, span).with_found(tok.lexeme.clone()));
        tok
    }

    /// Skips whitespace and comments; reports whether anything was skipped.
    fn skip_trivia(&mut self) -> bool {
        let start = self.pos;
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\r' | b'\n') => {
                    self.advance();
                }
                Some(b'#') => {
                    while let Some(ch) = self.peek() {
                        if ch == b'\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                Some(b'{') if self.peek2() == Some(b'-') => self.skip_block_comment(),
                _ => break,
            }
        }
        self.pos != start
    }

    /// Block comments do not nest: the first `-}` closes the comment.
    fn skip_block_comment(&mut self) {
        let mark = self.mark();
        self.advance();
        self.advance();
        loop {
            match self.peek() {
                None => {
                    let span = self.span_from(mark);
                    self.diagnostics
                        .push(Diagnostic::lexical("unterminated block comment", span));
                    return;
                }
                Some(b'-') if self.peek2() == Some(b'}') => {
                    self.advance();
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn sign_allowed(&self) -> bool {
        !self.prev.is_some_and(TokenKind::ends_operand)
    }

    fn next_token(&mut self) -> Token {
        let mark = self.mark();

        let Some(ch) = self.peek() else {
            return self.token(TokenKind::Eof, mark);
        };

        if ch.is_ascii_digit() {
            return self.lex_number(mark);
        }

        // `-1` is a literal only where a binary minus could not appear.
        if matches!(ch, b'+' | b'-')
            && self.peek2().is_some_and(|c| c.is_ascii_digit())
            && self.sign_allowed()
        {
            self.advance();
            return self.lex_number(mark);
        }

        if ch.is_ascii_alphabetic() || ch == b'_' {
            return self.lex_ident(mark);
        }

        match ch {
            b'"' => return self.lex_string(mark),
            b'\'' => return self.lex_char(mark),
            _ if !ch.is_ascii() => return self.lex_unicode(mark),
            _ => {}
        }

        let rest = &self.bytes[self.pos..];
        for &(spelling, kind) in OPERATORS {
            if rest.starts_with(spelling.as_bytes()) {
                for _ in 0..spelling.len() {
                    self.advance();
                }
                return self.token(kind, mark);
            }
        }

        self.advance();
        self.invalid(format!("unexpected character `{}`", ch as char), mark)
    }

    fn eat_digits(&mut self, radix: u32) -> usize {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if (ch as char).is_digit(radix) {
                self.advance();
            } else {
                break;
            }
        }
        self.pos - start
    }

    fn lex_number(&mut self, mark: Mark) -> Token {
        let signed = self.pos != mark.start;

        if self.peek() == Some(b'0') && matches!(self.peek2(), Some(b'x' | b'b')) {
            let (radix, prefix) = if self.peek2() == Some(b'x') {
                (16, "0x")
            } else {
                (2, "0b")
            };
            self.advance();
            self.advance();
            if self.eat_digits(radix) == 0 {
                return self.invalid(format!("expected digits after `{prefix}`"), mark);
            }
            return self.checked(TokenKind::Int, mark);
        }

        self.eat_digits(10);

        if self.peek() == Some(b'n') && !self.peek2().is_some_and(is_ident_continue) {
            self.advance();
            if signed {
                return self.invalid("natural literals cannot carry a sign", mark);
            }
            return self.checked(TokenKind::Nat, mark);
        }

        if self.peek() == Some(b'.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.eat_digits(10);
            return self.checked(TokenKind::Float, mark);
        }

        self.checked(TokenKind::Int, mark)
    }

    /// Emits a numeric token after confirming its value is representable.
    fn checked(&mut self, kind: TokenKind, mark: Mark) -> Token {
        let text = self.source.get(mark.start..self.pos).unwrap_or("");
        let fits = match kind {
            TokenKind::Nat => nat_value(text).is_some(),
            TokenKind::Int => int_value(text).is_some(),
            TokenKind::Float => float_value(text).is_some(),
            _ => true,
        };
        if fits {
            self.token(kind, mark)
        } else {
            self.invalid(format!("{} out of range", kind.name()), mark)
        }
    }

    fn lex_ident(&mut self, mark: Mark) -> Token {
        self.eat_ident_segment();
        let mut qualified = false;
        // `mod/name` is one identifier; `a / b` is a division.
        while self.peek() == Some(b'/') && self.peek2().is_some_and(is_ident_start) {
            self.advance();
            self.eat_ident_segment();
            qualified = true;
        }
        let text = self.source.get(mark.start..self.pos).unwrap_or("");
        let kind = if qualified {
            TokenKind::Ident
        } else {
            TokenKind::keyword(text).unwrap_or(TokenKind::Ident)
        };
        self.token(kind, mark)
    }

    fn eat_ident_segment(&mut self) {
        while let Some(ch) = self.peek() {
            if is_ident_continue(ch) {
                self.advance();
            } else {
                break;
            }
        }
    }

    /// Unicode spellings of `λ`, `μ`, `∀` and `Σ`; anything else is stray.
    fn lex_unicode(&mut self, mark: Mark) -> Token {
        let Some(c) = self.advance_char() else {
            // Not on a char boundary: skip the byte so lexing makes progress.
            self.advance();
            return self.invalid("invalid UTF-8 in source", mark);
        };
        let mut buf = [0u8; 4];
        match TokenKind::keyword(c.encode_utf8(&mut buf)) {
            Some(kind) => self.token(kind, mark),
            None => self.invalid(format!("unexpected character `{c}`"), mark),
        }
    }

    fn lex_string(&mut self, mark: Mark) -> Token {
        self.advance(); // consume opening "
        let mut valid = true;
        loop {
            match self.peek() {
                None => return self.invalid("unterminated string literal", mark),
                Some(b'"') => {
                    self.advance();
                    break;
                }
                Some(b'\\') => valid &= self.lex_escape(),
                Some(_) => {
                    self.advance();
                }
            }
        }
        // A bad escape was already reported on its own span.
        let kind = if valid { TokenKind::Str } else { TokenKind::Invalid };
        self.token(kind, mark)
    }

    fn lex_char(&mut self, mark: Mark) -> Token {
        self.advance(); // consume opening '
        let valid = match self.peek() {
            None | Some(b'\n') => return self.invalid("unterminated character literal", mark),
            Some(b'\'') => {
                self.advance();
                return self.invalid("empty character literal", mark);
            }
            Some(b'\\') => self.lex_escape(),
            Some(_) => self.advance_char().is_some(),
        };
        if self.peek() != Some(b'\'') {
            return self.invalid("unterminated character literal", mark);
        }
        self.advance();
        let kind = if valid { TokenKind::Char } else { TokenKind::Invalid };
        self.token(kind, mark)
    }

    /// Consumes one escape sequence starting at `\`, reporting it when
    /// malformed. Returns whether it was valid.
    fn lex_escape(&mut self) -> bool {
        let mark = self.mark();
        self.advance(); // consume backslash
        match self.peek() {
            Some(b'n' | b't' | b'r' | b'0' | b'\\' | b'\'' | b'"') => {
                self.advance();
                true
            }
            Some(b'u') => {
                self.advance();
                let digits_start = self.pos;
                while self.pos - digits_start < 4 && self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                    self.advance();
                }
                let digits = self.source.get(digits_start..self.pos).unwrap_or("");
                let scalar = u32::from_str_radix(digits, 16).ok().and_then(char::from_u32);
                if digits.len() == 4 && scalar.is_some() {
                    true
                } else {
                    let span = self.span_from(mark);
                    self.diagnostics.push(Diagnostic::lexical(
                        "expected four hex digits naming a character after `\\u`",
                        span,
                    ));
                    false
                }
            }
            Some(other) => {
                if other.is_ascii() && other != b'\n' {
                    self.advance();
                }
                let span = self.span_from(mark);
                self.diagnostics.push(
                    Diagnostic::lexical(format!("invalid escape sequence `\\{}`", other as char), span)
                        .with_found(span.text(self.source)),
                );
                false
            }
            // The caller reports the unterminated literal.
            None => false,
        }
    }
}

#[derive(Clone, Copy)]
struct Mark {
    start: usize,
    line: usize,
    col: usize,
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'_'
}

fn is_ident_continue(ch: u8) -> bool {
    ch.is_ascii_alphanumeric() || ch == b'_'
}

/// Value of a natural literal such as `0n` or `42n`.
pub fn nat_value(lexeme: &str) -> Option<u64> {
    lexeme.strip_suffix('n')?.parse().ok()
}

/// Value of an integer literal: decimal, `0x` hex or `0b` binary, with an
/// optional sign.
pub fn int_value(lexeme: &str) -> Option<i64> {
    let (negative, body) = match lexeme.as_bytes().first() {
        Some(b'-') => (true, &lexeme[1..]),
        Some(b'+') => (false, &lexeme[1..]),
        _ => (false, lexeme),
    };
    let magnitude = if let Some(hex) = body.strip_prefix("0x") {
        i128::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = body.strip_prefix("0b") {
        i128::from_str_radix(bin, 2).ok()?
    } else {
        body.parse::<i128>().ok()?
    };
    i64::try_from(if negative { -magnitude } else { magnitude }).ok()
}

pub fn float_value(lexeme: &str) -> Option<f64> {
    lexeme.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Interpret the escape sequences of a string or character literal body
/// (the text between the quotes). Returns `None` on a malformed escape.
///
/// ```
/// use bend_parser::unescape;
///
/// assert_eq!(unescape(r"a\tbA").as_deref(), Some("a\tbA"));
/// assert_eq!(unescape(r"bad\q"), None);
/// ```
pub fn unescape(raw: &str) -> Option<String> {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        let escaped = match chars.next()? {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '\'' => '\'',
            '"' => '"',
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                if hex.len() != 4 {
                    return None;
                }
                char::from_u32(u32::from_str_radix(&hex, 16).ok()?)?
            }
            _ => return None,
        };
        result.push(escaped);
    }
    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::tokenize(src)
            .tokens
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn simple_tokens() {
        assert_eq!(
            kinds("+ - * / %"),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn multi_char_ops_longest_first() {
        assert_eq!(
            kinds("=== !== == != <= >= << >> ** :: <> -> :="),
            vec![
                TokenKind::EqEqEq,
                TokenKind::NotEqEq,
                TokenKind::EqEq,
                TokenKind::NotEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Shl,
                TokenKind::Shr,
                TokenKind::StarStar,
                TokenKind::ColonColon,
                TokenKind::Cons,
                TokenKind::Arrow,
                TokenKind::ColonEq,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("a====b"),
            vec![TokenKind::Ident, TokenKind::EqEqEq, TokenKind::Assign, TokenKind::Ident, TokenKind::Eof]
        );
    }

    #[test]
    fn keywords() {
        assert_eq!(
            kinds("def type case assert try"),
            vec![
                TokenKind::Def,
                TokenKind::Type,
                TokenKind::Case,
                TokenKind::Assert,
                TokenKind::Try,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unicode_keywords() {
        assert_eq!(
            kinds("λ lambda μ mu ∀ all Σ any"),
            vec![
                TokenKind::Lambda,
                TokenKind::Lambda,
                TokenKind::Mu,
                TokenKind::Mu,
                TokenKind::All,
                TokenKind::All,
                TokenKind::Any,
                TokenKind::Any,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn ident_not_keyword() {
        let tokens = Lexer::tokenize("define").tokens;
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[0].lexeme, "define");
    }

    #[test]
    fn qualified_identifier() {
        let tokens = Lexer::tokenize("Nat/add x / y").tokens;
        assert_eq!(tokens[0].kind, TokenKind::Ident);
        assert_eq!(tokens[0].lexeme, "Nat/add");
        assert_eq!(tokens[2].kind, TokenKind::Slash);
    }

    #[test]
    fn numeric_literal_shapes() {
        assert_eq!(
            kinds("0n 42n 42 0x1F 0b101 3.25"),
            vec![
                TokenKind::Nat,
                TokenKind::Nat,
                TokenKind::Int,
                TokenKind::Int,
                TokenKind::Int,
                TokenKind::Float,
                TokenKind::Eof,
            ]
        );
        assert_eq!(int_value("0x1F"), Some(31));
        assert_eq!(int_value("-0b101"), Some(-5));
        assert_eq!(nat_value("42n"), Some(42));
    }

    #[test]
    fn sign_binds_only_in_operand_position() {
        // After an operand, `-` is subtraction.
        assert_eq!(
            kinds("x -1"),
            vec![TokenKind::Ident, TokenKind::Minus, TokenKind::Int, TokenKind::Eof]
        );
        // After an opening delimiter or comma, it is part of the literal.
        let tokens = Lexer::tokenize("f(-1, +2.5)").tokens;
        assert_eq!(tokens[2].kind, TokenKind::Int);
        assert_eq!(tokens[2].lexeme, "-1");
        assert_eq!(tokens[4].kind, TokenKind::Float);
        assert_eq!(tokens[4].lexeme, "+2.5");
    }

    #[test]
    fn succ_case_head_lexes_as_nat_then_plus() {
        let tokens = Lexer::tokenize("1n+:").tokens;
        assert_eq!(tokens[0].kind, TokenKind::Nat);
        assert_eq!(tokens[1].kind, TokenKind::Plus);
        assert!(tokens[1].is_tight());
        assert_eq!(tokens[2].kind, TokenKind::Colon);
    }

    #[test]
    fn adjacency_flags() {
        let tokens = Lexer::tokenize("f(x) f (x)").tokens;
        assert!(tokens[0].preceded_by_space); // first token
        assert!(tokens[1].is_tight());
        assert!(tokens[4].preceded_by_space);
        assert!(tokens[5].preceded_by_space);
        assert!(tokens[6].is_tight());
    }

    #[test]
    fn comment_counts_as_space() {
        let tokens = Lexer::tokenize("f{- c -}(x)").tokens;
        assert_eq!(tokens[1].kind, TokenKind::LParen);
        assert!(tokens[1].preceded_by_space);
    }

    #[test]
    fn string_and_char_literals() {
        let tokens = Lexer::tokenize(r#""hello\nworld" 'a' 'A'"#).tokens;
        assert_eq!(tokens[0].kind, TokenKind::Str);
        assert_eq!(tokens[0].lexeme, r#""hello\nworld""#);
        assert_eq!(tokens[1].kind, TokenKind::Char);
        assert_eq!(tokens[2].kind, TokenKind::Char);
    }

    #[test]
    fn unterminated_string() {
        let lexed = Lexer::tokenize(r#""unterminated"#);
        assert_eq!(lexed.tokens[0].kind, TokenKind::Invalid);
        assert_eq!(lexed.diagnostics.len(), 1);
        assert!(lexed.diagnostics[0].message.contains("unterminated string"));
    }

    #[test]
    fn invalid_escape_reported_and_lexing_continues() {
        let lexed = Lexer::tokenize(r#""bad\q" x"#);
        assert_eq!(lexed.tokens[0].kind, TokenKind::Invalid);
        assert_eq!(lexed.tokens[1].kind, TokenKind::Ident);
        assert_eq!(lexed.diagnostics.len(), 1);
        assert!(lexed.diagnostics[0].message.contains("invalid escape"));
    }

    #[test]
    fn unexpected_character_continues() {
        let lexed = Lexer::tokenize("a $ b");
        assert_eq!(
            lexed.tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Ident, TokenKind::Invalid, TokenKind::Ident, TokenKind::Eof]
        );
        assert_eq!(lexed.diagnostics[0].span.col, 3);
    }

    #[test]
    fn line_comment() {
        assert_eq!(
            kinds("1 # comment\n2"),
            vec![TokenKind::Int, TokenKind::Int, TokenKind::Eof]
        );
    }

    #[test]
    fn block_comment_does_not_nest() {
        // The first `-}` closes the comment; the trailing `-}` is real tokens.
        assert_eq!(
            kinds("1 {- a {- b -} 2 -}"),
            vec![TokenKind::Int, TokenKind::Int, TokenKind::Minus, TokenKind::RBrace, TokenKind::Eof]
        );
    }

    #[test]
    fn unterminated_block_comment() {
        let lexed = Lexer::tokenize("1 {- never closed");
        assert_eq!(lexed.tokens.len(), 2);
        assert!(lexed.diagnostics[0].message.contains("block comment"));
    }

    #[test]
    fn delimiters() {
        assert_eq!(
            kinds("()[]{},:;"),
            vec![
                TokenKind::LParen,
                TokenKind::RParen,
                TokenKind::LBracket,
                TokenKind::RBracket,
                TokenKind::LBrace,
                TokenKind::RBrace,
                TokenKind::Comma,
                TokenKind::Colon,
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn spans_track_lines_and_unicode_columns() {
        let tokens = Lexer::tokenize("λx.\n  x").tokens;
        assert_eq!((tokens[1].span.line, tokens[1].span.col), (1, 2));
        assert_eq!(tokens[1].span.start, 2); // `λ` is two bytes
        assert_eq!((tokens[3].span.line, tokens[3].span.col), (2, 3));
    }

    #[test]
    fn out_of_range_literal() {
        let lexed = Lexer::tokenize("99999999999999999999");
        assert_eq!(lexed.tokens[0].kind, TokenKind::Invalid);
        assert!(lexed.diagnostics[0].message.contains("out of range"));
    }

    #[test]
    fn unescape_basic() {
        assert_eq!(unescape(r"hello\nworld").as_deref(), Some("hello\nworld"));
        assert_eq!(unescape(r"tab\there").as_deref(), Some("tab\there"));
        assert_eq!(unescape(r"back\\slash").as_deref(), Some("back\\slash"));
        assert_eq!(unescape(r#"say\"hi\""#).as_deref(), Some("say\"hi\""));
        assert_eq!(unescape(r"\0\'").as_deref(), Some("\0'"));
        assert_eq!(unescape("no escapes").as_deref(), Some("no escapes"));
        assert_eq!(unescape(r"\u12").as_deref(), None);
    }
}
