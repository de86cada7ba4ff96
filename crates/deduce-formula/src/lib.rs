//! # Deduce Formula
//!
//! The formula layer consumed by the deduce kernel: just enough of a typed
//! first-order language to state sequents and check them.
//!
//! The kernel only relies on a narrow contract from this crate:
//!
//! ```text
//! Predicate / Expression   ← structural equality, ordering, hashing
//!     │
//! TypeEnvironment          ← name → type, clone-and-extend
//!     │
//! check_closed             ← closed type-check (no new names inferred)
//!     │
//! free_identifiers         ← typed free identifiers of a formula
//! ```
//!
//! Everything else here (the parser, the printer, substitution) exists so
//! that sequents can be written down and read back in tests and tools.

pub mod env;
pub mod error;
pub mod expr;
pub mod ident;
pub mod parser;
pub mod predicate;
pub mod types;

pub use env::TypeEnvironment;
pub use error::FormulaError;
pub use expr::{ArithOp, Expression};
pub use ident::{FreeIdentifier, is_valid_name};
pub use parser::{parse_expression, parse_predicate, parse_type};
pub use predicate::{BoundDecl, Connective, Predicate, Quantifier, Relation};
pub use types::Type;
