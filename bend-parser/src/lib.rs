//! Front end for the Bend language: tokens, an arena-allocated syntax tree,
//! and a recursive-descent parser that reports every error it can recover
//! from.

pub mod ast;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;

pub use ast::{Ast, Expression, Item, Pattern, PatternId, Program, Term, TermId};
pub use config::ParserConfig;
pub use diagnostics::{Diagnostic, DiagnosticKind, Span};
pub use error::ParseError;
pub use lexer::{unescape, Lexed, Lexer};
/// Re-export the hand-written parser as the primary API.
pub use parser::{parse_expression, parse_program, parse_program_with_errors, ParseOutput, Parser};
