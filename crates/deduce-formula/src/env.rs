//! Type environments and closed type-checking.
//!
//! A type environment binds free names to types. It is immutable by
//! convention: extension produces a new environment and leaves the old one
//! untouched.
//!
//! Type-checking here is always *closed*: every free name of a formula must
//! already be bound, so a successful check never infers new names.

use crate::error::FormulaError;
use crate::expr::Expression;
use crate::ident::FreeIdentifier;
use crate::predicate::{BoundDecl, Predicate};
use crate::types::Type;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Mapping from names to types.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeEnvironment {
    bindings: BTreeMap<String, Type>,
}

impl TypeEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an environment from typed identifiers.
    ///
    /// Fails if the same name is given twice.
    pub fn from_idents<'a>(
        idents: impl IntoIterator<Item = &'a FreeIdentifier>,
    ) -> Result<Self, FormulaError> {
        Self::new().extend(idents)
    }

    /// Builder-style binding, for setting up environments by hand.
    ///
    /// Fails on a malformed name or on a name that is already bound.
    pub fn with(self, name: &str, ty: Type) -> Result<Self, FormulaError> {
        let ident = FreeIdentifier::new(name, ty)?;
        self.extend([&ident])
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Whether `name` is bound, whatever its type.
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Whether `ident` is bound with exactly its type.
    pub fn contains_ident(&self, ident: &FreeIdentifier) -> bool {
        self.bindings.get(ident.name()) == Some(ident.ty())
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.bindings.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    /// All bindings as typed identifiers, in name order.
    pub fn idents(&self) -> Vec<FreeIdentifier> {
        self.bindings
            .iter()
            .filter_map(|(name, ty)| FreeIdentifier::new(name.clone(), ty.clone()).ok())
            .collect()
    }

    /// Clone this environment and bind `idents` in the copy.
    ///
    /// No renaming is ever attempted: a name already bound here, or bound
    /// twice in `idents`, is a clash.
    pub fn extend<'a>(
        &self,
        idents: impl IntoIterator<Item = &'a FreeIdentifier>,
    ) -> Result<Self, FormulaError> {
        let mut extended = self.clone();
        for ident in idents {
            if extended.bindings.contains_key(ident.name()) {
                return Err(FormulaError::NameClash(ident.name().to_string()));
            }
            extended
                .bindings
                .insert(ident.name().to_string(), ident.ty().clone());
        }
        Ok(extended)
    }

    /// The typed free identifiers of `pred`.
    ///
    /// Names not bound in this environment are left out.
    pub fn free_identifiers(&self, pred: &Predicate) -> BTreeSet<FreeIdentifier> {
        pred.free_names()
            .into_iter()
            .filter_map(|name| {
                let ty = self.bindings.get(&name)?.clone();
                FreeIdentifier::new(name, ty).ok()
            })
            .collect()
    }

    /// Closed type-check of a predicate.
    pub fn check_closed(&self, pred: &Predicate) -> Result<(), FormulaError> {
        let mut scope = Vec::new();
        self.check_predicate(pred, &mut scope)
    }

    /// Whether `pred` type-checks closed.
    pub fn is_well_typed(&self, pred: &Predicate) -> bool {
        self.check_closed(pred).is_ok()
    }

    fn check_predicate(
        &self,
        pred: &Predicate,
        scope: &mut Vec<BoundDecl>,
    ) -> Result<(), FormulaError> {
        match pred {
            Predicate::True | Predicate::False => Ok(()),
            Predicate::Not(inner) => self.check_predicate(inner, scope),
            Predicate::Binary(_, left, right) => {
                self.check_predicate(left, scope)?;
                self.check_predicate(right, scope)
            }
            Predicate::Relation(rel, left, right) => {
                let lt = self.infer_expression(left, scope)?;
                let rt = self.infer_expression(right, scope)?;
                if rel.is_arithmetic() {
                    expect(&Type::Integer, &lt, "relation")?;
                    expect(&Type::Integer, &rt, "relation")
                } else {
                    expect(&lt, &rt, "equality")
                }
            }
            Predicate::Quantified(_, decls, body) => {
                let mut seen = BTreeSet::new();
                for decl in decls {
                    if !crate::ident::is_valid_name(&decl.name) {
                        return Err(FormulaError::InvalidIdentifier(decl.name.clone()));
                    }
                    if !seen.insert(decl.name.as_str()) {
                        return Err(FormulaError::DuplicateBinder(decl.name.clone()));
                    }
                }
                let depth = scope.len();
                scope.extend(decls.iter().cloned());
                let result = self.check_predicate(body, scope);
                scope.truncate(depth);
                result
            }
        }
    }

    fn infer_expression(
        &self,
        expr: &Expression,
        scope: &[BoundDecl],
    ) -> Result<Type, FormulaError> {
        match expr {
            Expression::Ident(name) => {
                // Innermost binder wins.
                if let Some(decl) = scope.iter().rev().find(|d| &d.name == name) {
                    return Ok(decl.ty.clone());
                }
                self.bindings
                    .get(name)
                    .cloned()
                    .ok_or_else(|| FormulaError::UnboundIdentifier(name.clone()))
            }
            Expression::Integer(_) => Ok(Type::Integer),
            Expression::Bool(_) => Ok(Type::Boolean),
            Expression::Neg(inner) => {
                let ty = self.infer_expression(inner, scope)?;
                expect(&Type::Integer, &ty, "negation")?;
                Ok(Type::Integer)
            }
            Expression::Arith(_, left, right) => {
                let lt = self.infer_expression(left, scope)?;
                expect(&Type::Integer, &lt, "arithmetic")?;
                let rt = self.infer_expression(right, scope)?;
                expect(&Type::Integer, &rt, "arithmetic")?;
                Ok(Type::Integer)
            }
        }
    }
}

fn expect(expected: &Type, actual: &Type, context: &str) -> Result<(), FormulaError> {
    if expected == actual {
        Ok(())
    } else {
        Err(FormulaError::TypeMismatch {
            expected: expected.clone(),
            actual: actual.clone(),
            context: context.to_string(),
        })
    }
}
