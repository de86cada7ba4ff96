//! Basic reasoners.
//!
//! | id          | input        | closes or splits                           |
//! |-------------|--------------|--------------------------------------------|
//! | `hyp`       | none         | goal is a hypothesis                       |
//! | `true_goal` | none         | goal is `⊤`                                |
//! | `false_hyp` | none         | `⊥` is a hypothesis                        |
//! | `review`    | comment      | anything, at reviewed confidence           |
//! | `imp_i`     | none         | `P ⇒ Q` into `P ⊢ Q`                       |
//! | `conj_i`    | none         | `P ∧ Q` into `⊢ P` and `⊢ Q`               |
//! | `all_i`     | none         | `∀x·P` into `⊢ P` with `x` fresh           |
//! | `lemma`     | predicate    | cut on the given predicate                 |
//! | `conj_e`    | predicate    | rewrites hypothesis `P ∧ Q` into `P`, `Q`  |
//! | `exists_e`  | predicate    | hypothesis `∃x·P` into `P` with `x` fresh  |

mod closing;
mod logic;

pub use closing::{FalseHyp, Hyp, Review, TrueGoal};
pub use logic::{AllI, ConjE, ConjI, ExistsE, ImpI, Lemma};

use crate::reasoner::Reasoner;
use std::sync::Arc;

/// One instance of every basic reasoner.
pub fn basic() -> Vec<Arc<dyn Reasoner>> {
    vec![
        Arc::new(Hyp),
        Arc::new(TrueGoal),
        Arc::new(FalseHyp),
        Arc::new(Review),
        Arc::new(ImpI),
        Arc::new(ConjI),
        Arc::new(AllI),
        Arc::new(Lemma),
        Arc::new(ConjE),
        Arc::new(ExistsE),
    ]
}
