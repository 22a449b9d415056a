//! Source spans and raw diagnostic records shared by the Bend frontends.
//!
//! This crate deliberately stops at data: a [`Diagnostic`] knows what went
//! wrong and where, but turning it into a colored report with source
//! excerpts is left to whichever driver owns the terminal.

use std::fmt;

use serde::Serialize;

/// A region of source text.
///
/// `start`/`end` are byte offsets (half-open); `line`/`col` are the 1-based
/// position of `start`, precomputed by the lexer so consumers never have to
/// rescan the buffer.
///
/// ```
/// use diagnostics::Span;
///
/// let a = Span::new(0, 3, 1, 1);
/// let b = Span::new(6, 9, 1, 7);
/// let ab = a.to(b);
/// assert_eq!((ab.start, ab.end), (0, 9));
/// assert_eq!(ab.text("foo + bar"), "foo + bar");
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub const fn new(start: usize, end: usize, line: usize, col: usize) -> Self {
        Self {
            start,
            end,
            line,
            col,
        }
    }

    /// Smallest span covering both `self` and `other`.
    pub fn to(self, other: Span) -> Span {
        let (first, _) = if self.start <= other.start {
            (self, other)
        } else {
            (other, self)
        };
        Span {
            start: first.start,
            end: self.end.max(other.end),
            line: first.line,
            col: first.col,
        }
    }

    /// Whether `other` lies entirely inside `self`.
    pub fn contains(self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn len(self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(self) -> bool {
        self.start == self.end
    }

    /// The slice of `source` this span covers. Out-of-range spans yield `""`.
    pub fn text(self, source: &str) -> &str {
        source.get(self.start..self.end).unwrap_or("")
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Broad category of a diagnostic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    /// Malformed token: bad escape, unterminated literal, stray character.
    Lexical,
    /// Token stream does not match the grammar.
    Syntax,
    /// Every candidate reading of an ambiguous construct failed.
    Ambiguity,
    /// Input nesting exceeded the configured recursion limit.
    TooDeep,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::Lexical => "lexical",
            DiagnosticKind::Syntax => "syntax",
            DiagnosticKind::Ambiguity => "ambiguity",
            DiagnosticKind::TooDeep => "nesting",
        };
        f.write_str(name)
    }
}

/// One problem found in the source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Span,
    /// What the parser was looking for, when that is a single clear thing.
    pub expected: Option<String>,
    /// The offending token text, when there is one.
    pub found: Option<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            message: message.into(),
            span,
            expected: None,
            found: None,
        }
    }

    pub fn lexical(message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticKind::Lexical, message, span)
    }

    pub fn syntax(message: impl Into<String>, span: Span) -> Self {
        Self::new(DiagnosticKind::Syntax, message, span)
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_found(mut self, found: impl Into<String>) -> Self {
        self.found = Some(found.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} error: {}", self.span, self.kind, self.message)
    }
}

impl std::error::Error for Diagnostic {}
