//! Error types for formula construction, parsing and type-checking.

use crate::types::Type;

/// Errors arising while building, parsing or type-checking formulas.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormulaError {
    /// A name does not follow identifier syntax or is a reserved word.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The text could not be parsed.
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },

    /// A name is used but bound neither by a quantifier nor by the
    /// type environment.
    #[error("unbound identifier: {0}")]
    UnboundIdentifier(String),

    /// A subformula has the wrong type.
    #[error("type mismatch in {context}: expected {expected}, got {actual}")]
    TypeMismatch {
        expected: Type,
        actual: Type,
        context: String,
    },

    /// Extending a type environment would rebind an existing name.
    #[error("name clash: {0} is already bound")]
    NameClash(String),

    /// The same name is declared twice by one quantifier.
    #[error("duplicate bound identifier: {0}")]
    DuplicateBinder(String),
}
