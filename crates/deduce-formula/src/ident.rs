//! Typed free identifiers and identifier syntax.

use crate::error::FormulaError;
use crate::types::Type;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::LazyLock;

static IDENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_']*$").expect("identifier regex"));

/// Words the parser reserves for itself.
const RESERVED: &[&str] = &[
    "true", "false", "not", "or", "forall", "exists", "TRUE", "FALSE", "BOOL", "Z", "POW",
];

/// Whether `name` can be used as an identifier.
pub fn is_valid_name(name: &str) -> bool {
    IDENT_RE.is_match(name) && !RESERVED.contains(&name)
}

/// A name together with its type, as bound in a type environment.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FreeIdentifier {
    name: String,
    ty: Type,
}

impl FreeIdentifier {
    /// Create a typed identifier, rejecting names outside identifier syntax.
    pub fn new(name: impl Into<String>, ty: Type) -> Result<Self, FormulaError> {
        let name = name.into();
        if !is_valid_name(&name) {
            return Err(FormulaError::InvalidIdentifier(name));
        }
        Ok(Self { name, ty })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }
}

impl fmt::Display for FreeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.ty)
    }
}
