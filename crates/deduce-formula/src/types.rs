//! Types of the formula language.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The type of an expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Type {
    /// ℤ
    Integer,

    /// BOOL
    Boolean,

    /// A carrier set introduced by name.
    Given(String),

    /// ℙ(T)
    PowerSet(Box<Type>),

    /// T × U
    Product(Box<Type>, Box<Type>),
}

impl Type {
    pub fn given(name: impl Into<String>) -> Self {
        Self::Given(name.into())
    }

    pub fn power_set(inner: Type) -> Self {
        Self::PowerSet(Box::new(inner))
    }

    pub fn product(left: Type, right: Type) -> Self {
        Self::Product(Box::new(left), Box::new(right))
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "ℤ"),
            Self::Boolean => write!(f, "BOOL"),
            Self::Given(name) => write!(f, "{name}"),
            Self::PowerSet(inner) => write!(f, "ℙ({inner})"),
            Self::Product(left, right) => {
                if matches!(**left, Self::Product(..)) {
                    write!(f, "({left})×{right}")
                } else {
                    write!(f, "{left}×{right}")
                }
            }
        }
    }
}
