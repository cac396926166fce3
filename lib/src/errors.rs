use thiserror::Error;

/// Errors returned while compiling a pattern.
///
/// Compilation is atomic: when any of these errors is returned no partially
/// built program is observable by the caller.
#[derive(Error, Debug, Eq, PartialEq)]
pub enum Error {
    /// A quantifier (`*`, `+`, `?`) appeared with no atom to bind to, or was
    /// applied to an anchor or to an already quantified atom.
    #[error("quantifier with no preceding atom at byte {0}")]
    DanglingQuantifier(usize),

    /// A `(` without a matching `)`, or a stray `)`.
    #[error("unbalanced parenthesis at byte {0}")]
    UnbalancedParenthesis(usize),

    /// A `[` without a terminating `]`.
    #[error("unterminated character class starting at byte {0}")]
    UnterminatedClass(usize),

    /// A `\` at the very end of the pattern.
    #[error("invalid escape at byte {0}")]
    InvalidEscape(usize),

    /// The compiled program doesn't fit in the capacity of the target
    /// program (see [`crate::Regex::parse_into`]).
    #[error("compiled program exceeds the capacity of the target")]
    TooLarge,

    /// The pattern declares more capturing groups than supported.
    #[error("too many capture groups (max: {})", u16::MAX)]
    TooManyGroups,
}
