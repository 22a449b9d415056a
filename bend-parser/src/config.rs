use serde::Deserialize;

/// Tunables for a parse session.
///
/// Drivers typically embed this in their own configuration file; every
/// field has a default so partial tables deserialize.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Maximum nesting of expressions and patterns before the parser reports
    /// a "too deeply nested" error instead of recursing further.
    pub max_depth: usize,
    /// Skip to the next top-level item after an error and keep going.
    /// When false the parser stops at the first syntax error.
    pub recover: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_depth: 256,
            recover: true,
        }
    }
}
