//! Parse errors raised inside the parser and turned into diagnostics at
//! recovery points.

use diagnostics::{Diagnostic, DiagnosticKind, Span};
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected {expected}, found {found}")]
    Expected {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("{message}")]
    Invalid { message: String, span: Span },

    /// Every reading of an ambiguous construct failed.
    #[error("{construct} matches none of its forms ({attempts}): {last}")]
    Ambiguous {
        construct: &'static str,
        attempts: &'static str,
        last: Box<ParseError>,
        span: Span,
    },

    #[error("too deeply nested: more than {limit} levels")]
    TooDeep { limit: usize, span: Span },
}

impl ParseError {
    pub fn expected(expected: impl Into<String>, found: impl Into<String>, span: Span) -> Self {
        ParseError::Expected {
            expected: expected.into(),
            found: found.into(),
            span,
        }
    }

    pub fn invalid(message: impl Into<String>, span: Span) -> Self {
        ParseError::Invalid {
            message: message.into(),
            span,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            ParseError::Expected { span, .. }
            | ParseError::Invalid { span, .. }
            | ParseError::Ambiguous { span, .. }
            | ParseError::TooDeep { span, .. } => *span,
        }
    }

    /// Resource errors must never be swallowed by a backtracking attempt.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ParseError::TooDeep { .. })
    }

    pub fn kind(&self) -> DiagnosticKind {
        match self {
            ParseError::Expected { .. } | ParseError::Invalid { .. } => DiagnosticKind::Syntax,
            ParseError::Ambiguous { .. } => DiagnosticKind::Ambiguity,
            ParseError::TooDeep { .. } => DiagnosticKind::TooDeep,
        }
    }
}

impl From<ParseError> for Diagnostic {
    fn from(err: ParseError) -> Self {
        let diagnostic = Diagnostic::new(err.kind(), err.to_string(), err.span());
        match err {
            ParseError::Expected {
                expected, found, ..
            } => diagnostic.with_expected(expected).with_found(found),
            // The forms are listed in the message; keep only the culprit.
            ParseError::Ambiguous { last, .. } => match *last {
                ParseError::Expected { found, .. } => diagnostic.with_found(found),
                _ => diagnostic,
            },
            _ => diagnostic,
        }
    }
}
