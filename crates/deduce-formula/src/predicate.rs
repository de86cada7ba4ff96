//! Predicates: the formulas sequents are made of.

use crate::expr::Expression;
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Binary logical connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connective {
    And,
    Or,
    Imp,
    Iff,
}

impl Connective {
    fn symbol(self) -> &'static str {
        match self {
            Self::And => "∧",
            Self::Or => "∨",
            Self::Imp => "⇒",
            Self::Iff => "⇔",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Iff => 1,
            Self::Imp => 2,
            Self::Or => 3,
            Self::And => 4,
        }
    }
}

/// Relations between two expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Relation {
    fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "≠",
            Self::Lt => "<",
            Self::Le => "≤",
            Self::Gt => ">",
            Self::Ge => "≥",
        }
    }

    /// Whether both operands must be integers.
    pub fn is_arithmetic(self) -> bool {
        !matches!(self, Self::Eq | Self::NotEq)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantifier {
    Forall,
    Exists,
}

/// One variable bound by a quantifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BoundDecl {
    pub name: String,
    pub ty: Type,
}

impl BoundDecl {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A predicate. Equality, ordering and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    True,
    False,
    Not(Box<Predicate>),
    Binary(Connective, Box<Predicate>, Box<Predicate>),
    Relation(Relation, Expression, Expression),
    Quantified(Quantifier, Vec<BoundDecl>, Box<Predicate>),
}

impl Predicate {
    pub fn not(inner: Predicate) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn and(left: Predicate, right: Predicate) -> Self {
        Self::Binary(Connective::And, Box::new(left), Box::new(right))
    }

    pub fn or(left: Predicate, right: Predicate) -> Self {
        Self::Binary(Connective::Or, Box::new(left), Box::new(right))
    }

    pub fn imp(left: Predicate, right: Predicate) -> Self {
        Self::Binary(Connective::Imp, Box::new(left), Box::new(right))
    }

    pub fn iff(left: Predicate, right: Predicate) -> Self {
        Self::Binary(Connective::Iff, Box::new(left), Box::new(right))
    }

    pub fn eq(left: Expression, right: Expression) -> Self {
        Self::Relation(Relation::Eq, left, right)
    }

    pub fn relation(rel: Relation, left: Expression, right: Expression) -> Self {
        Self::Relation(rel, left, right)
    }

    pub fn forall(decls: Vec<BoundDecl>, body: Predicate) -> Self {
        Self::Quantified(Quantifier::Forall, decls, Box::new(body))
    }

    pub fn exists(decls: Vec<BoundDecl>, body: Predicate) -> Self {
        Self::Quantified(Quantifier::Exists, decls, Box::new(body))
    }

    /// The two sides of `left ⇒ right`, if this is an implication.
    pub fn as_implication(&self) -> Option<(&Predicate, &Predicate)> {
        match self {
            Self::Binary(Connective::Imp, left, right) => Some((left, right)),
            _ => None,
        }
    }

    /// The two sides of `left ∧ right`, if this is a conjunction.
    pub fn as_conjunction(&self) -> Option<(&Predicate, &Predicate)> {
        match self {
            Self::Binary(Connective::And, left, right) => Some((left, right)),
            _ => None,
        }
    }

    /// Names occurring free in this predicate (untyped).
    pub fn free_names(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut bound = Vec::new();
        self.collect_names(&mut bound, &mut out);
        out
    }

    fn collect_names(&self, bound: &mut Vec<String>, out: &mut BTreeSet<String>) {
        match self {
            Self::True | Self::False => {}
            Self::Not(inner) => inner.collect_names(bound, out),
            Self::Binary(_, left, right) => {
                left.collect_names(bound, out);
                right.collect_names(bound, out);
            }
            Self::Relation(_, left, right) => {
                left.collect_names(bound, out);
                right.collect_names(bound, out);
            }
            Self::Quantified(_, decls, body) => {
                let depth = bound.len();
                bound.extend(decls.iter().map(|d| d.name.clone()));
                body.collect_names(bound, out);
                bound.truncate(depth);
            }
        }
    }

    /// Replace free occurrences of `name` by `replacement`.
    ///
    /// Returns `None` when a quantifier would capture one of the
    /// replacement's free names.
    pub fn substitute(&self, name: &str, replacement: &Expression) -> Option<Predicate> {
        let mut replacement_names = BTreeSet::new();
        replacement.collect_names(&[], &mut replacement_names);
        self.substitute_inner(name, replacement, &replacement_names)
    }

    fn substitute_inner(
        &self,
        name: &str,
        replacement: &Expression,
        replacement_names: &BTreeSet<String>,
    ) -> Option<Predicate> {
        Some(match self {
            Self::True | Self::False => self.clone(),
            Self::Not(inner) => {
                Self::not(inner.substitute_inner(name, replacement, replacement_names)?)
            }
            Self::Binary(c, left, right) => Self::Binary(
                *c,
                Box::new(left.substitute_inner(name, replacement, replacement_names)?),
                Box::new(right.substitute_inner(name, replacement, replacement_names)?),
            ),
            Self::Relation(rel, left, right) => Self::Relation(
                *rel,
                left.substitute(name, replacement),
                right.substitute(name, replacement),
            ),
            Self::Quantified(q, decls, body) => {
                if decls.iter().any(|d| d.name == name) {
                    return Some(self.clone());
                }
                if !body.free_names().contains(name) {
                    return Some(self.clone());
                }
                if decls.iter().any(|d| replacement_names.contains(&d.name)) {
                    return None;
                }
                Self::Quantified(
                    *q,
                    decls.clone(),
                    Box::new(body.substitute_inner(name, replacement, replacement_names)?),
                )
            }
        })
    }

    fn precedence(&self) -> u8 {
        match self {
            Self::Quantified(..) => 0,
            Self::Binary(c, ..) => c.precedence(),
            Self::Not(_) => 5,
            _ => 6,
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "⊤"),
            Self::False => write!(f, "⊥"),
            Self::Not(inner) => {
                if inner.precedence() < 5 {
                    write!(f, "¬({inner})")
                } else {
                    write!(f, "¬{inner}")
                }
            }
            Self::Binary(c, left, right) => {
                let prec = c.precedence();
                // ∧ and ∨ associate to the left, ⇒ to the right, ⇔ not at all.
                let (left_parens, right_parens) = match c {
                    Connective::And | Connective::Or => {
                        (left.precedence() < prec, right.precedence() <= prec)
                    }
                    Connective::Imp => (left.precedence() <= prec, right.precedence() < prec),
                    Connective::Iff => (left.precedence() <= prec, right.precedence() <= prec),
                };
                if left_parens {
                    write!(f, "({left})")?;
                } else {
                    write!(f, "{left}")?;
                }
                write!(f, " {} ", c.symbol())?;
                if right_parens {
                    write!(f, "({right})")
                } else {
                    write!(f, "{right}")
                }
            }
            Self::Relation(rel, left, right) => write!(f, "{left}{}{right}", rel.symbol()),
            Self::Quantified(q, decls, body) => {
                let symbol = match q {
                    Quantifier::Forall => "∀",
                    Quantifier::Exists => "∃",
                };
                write!(f, "{symbol}")?;
                for (i, decl) in decls.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}:{}", decl.name, decl.ty)?;
                }
                write!(f, "·{body}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expression {
        Expression::ident("x")
    }

    #[test]
    fn display_uses_minimal_parentheses() {
        let p = Predicate::imp(Predicate::True, Predicate::and(Predicate::True, Predicate::False));
        assert_eq!(p.to_string(), "⊤ ⇒ ⊤ ∧ ⊥");

        let q = Predicate::and(Predicate::imp(Predicate::True, Predicate::True), Predicate::False);
        assert_eq!(q.to_string(), "(⊤ ⇒ ⊤) ∧ ⊥");

        let r = Predicate::imp(Predicate::imp(Predicate::True, Predicate::True), Predicate::True);
        assert_eq!(r.to_string(), "(⊤ ⇒ ⊤) ⇒ ⊤");

        assert_eq!(Predicate::eq(x(), Expression::int(1)).to_string(), "x=1");
    }

    #[test]
    fn free_names_skip_bound_variables() {
        let p = Predicate::and(
            Predicate::forall(
                vec![BoundDecl::new("x", Type::Integer)],
                Predicate::relation(Relation::Lt, x(), Expression::ident("y")),
            ),
            Predicate::eq(x(), Expression::int(0)),
        );
        let names: Vec<_> = p.free_names().into_iter().collect();
        assert_eq!(names, vec!["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn substitute_refuses_capture() {
        let body = Predicate::relation(Relation::Lt, x(), Expression::ident("y"));
        let p = Predicate::forall(vec![BoundDecl::new("x", Type::Integer)], body);

        // y ↦ x would be captured by ∀x.
        assert_eq!(p.substitute("y", &x()), None);

        // y ↦ 3 is fine.
        let s = p.substitute("y", &Expression::int(3)).unwrap();
        assert_eq!(s.to_string(), "∀x:ℤ·x<3");

        // x is bound, so substituting it changes nothing.
        assert_eq!(p.substitute("x", &Expression::int(3)), Some(p.clone()));
    }
}
