//! Expressions: the terms predicates talk about.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Integer arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
}

impl ArithOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "−",
            Self::Mul => "∗",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Add | Self::Sub => 1,
            Self::Mul => 2,
        }
    }
}

/// An expression. Identifiers are untyped here; their types come from the
/// type environment or from an enclosing quantifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    Ident(String),
    Integer(i64),
    Bool(bool),
    Neg(Box<Expression>),
    Arith(ArithOp, Box<Expression>, Box<Expression>),
}

impl Expression {
    pub fn ident(name: impl Into<String>) -> Self {
        Self::Ident(name.into())
    }

    pub fn int(value: i64) -> Self {
        Self::Integer(value)
    }

    pub fn arith(op: ArithOp, left: Expression, right: Expression) -> Self {
        Self::Arith(op, Box::new(left), Box::new(right))
    }

    /// Names occurring in this expression, excluding those in `bound`.
    pub(crate) fn collect_names(&self, bound: &[String], out: &mut BTreeSet<String>) {
        match self {
            Self::Ident(name) => {
                if !bound.contains(name) {
                    out.insert(name.clone());
                }
            }
            Self::Integer(_) | Self::Bool(_) => {}
            Self::Neg(inner) => inner.collect_names(bound, out),
            Self::Arith(_, left, right) => {
                left.collect_names(bound, out);
                right.collect_names(bound, out);
            }
        }
    }

    /// Replace free occurrences of `name` by `replacement`.
    pub fn substitute(&self, name: &str, replacement: &Expression) -> Expression {
        match self {
            Self::Ident(n) if n == name => replacement.clone(),
            Self::Ident(_) | Self::Integer(_) | Self::Bool(_) => self.clone(),
            Self::Neg(inner) => Self::Neg(Box::new(inner.substitute(name, replacement))),
            Self::Arith(op, left, right) => Self::arith(
                *op,
                left.substitute(name, replacement),
                right.substitute(name, replacement),
            ),
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Arith(op, ..) => op.precedence(),
            Self::Neg(_) => 3,
            _ => 4,
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ident(name) => write!(f, "{name}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Bool(true) => write!(f, "TRUE"),
            Self::Bool(false) => write!(f, "FALSE"),
            Self::Neg(inner) => {
                if inner.precedence() < 3 || matches!(**inner, Self::Integer(_)) {
                    write!(f, "−({inner})")
                } else {
                    write!(f, "−{inner}")
                }
            }
            Self::Arith(op, left, right) => {
                let prec = op.precedence();
                if left.precedence() < prec {
                    write!(f, "({left})")?;
                } else {
                    write!(f, "{left}")?;
                }
                write!(f, "{}", op.symbol())?;
                if right.precedence() <= prec {
                    write!(f, "({right})")
                } else {
                    write!(f, "{right}")
                }
            }
        }
    }
}
