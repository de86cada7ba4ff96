//! Confidence levels of proof rules, nodes and trees.
//!
//! Confidence is a totally ordered integer scale:
//!
//! ```text
//! UNATTEMPTED  <  PENDING  <  REVIEWED_MAX  ≤  DISCHARGED_MAX
//!    -99            0            500             1000
//! ```
//!
//! Anything strictly above `PENDING` is closed. Closed levels up to
//! `REVIEWED_MAX` were accepted by a human; above it, discharged by a
//! reasoner.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Confidence(i32);

impl Confidence {
    /// An open node without a comment. Applied nodes take the minimum over
    /// their children, so a partial proof with such a leaf is unattempted.
    pub const UNATTEMPTED: Self = Self(-99);

    /// An open node with a comment, or a partial proof whose lowest open
    /// leaves all carry comments.
    pub const PENDING: Self = Self(0);

    /// Highest confidence for a manually reviewed proof.
    pub const REVIEWED_MAX: Self = Self(500);

    /// Highest confidence overall.
    pub const DISCHARGED_MAX: Self = Self(1000);

    pub const fn new(level: i32) -> Self {
        Self(level)
    }

    pub const fn level(self) -> i32 {
        self.0
    }

    pub fn is_closed(self) -> bool {
        self > Self::PENDING
    }

    pub fn is_reviewed(self) -> bool {
        self.is_closed() && self <= Self::REVIEWED_MAX
    }

    pub fn is_discharged(self) -> bool {
        self > Self::REVIEWED_MAX
    }

    /// Whether a proof rule may carry this confidence.
    pub fn is_valid_for_rule(self) -> bool {
        self > Self::PENDING && self <= Self::DISCHARGED_MAX
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::UNATTEMPTED => write!(f, "unattempted"),
            Self::PENDING => write!(f, "pending"),
            c if c.is_reviewed() => write!(f, "reviewed({})", c.0),
            c if c.is_discharged() => write!(f, "discharged({})", c.0),
            c => write!(f, "{}", c.0),
        }
    }
}
