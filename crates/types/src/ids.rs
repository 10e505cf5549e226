//! Core identifier types for the cash-flow simulation.
//!
//! Trials and transactions are identified by small integer newtypes so they
//! can be used as map keys, sorted deterministically and printed compactly.

use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Constants
// =============================================================================

/// Money scale factor: 10,000 means 4 decimal places.
/// - `10000` = 1.00
/// - `1` = 0.0001 (smallest representable amount)
pub const MONEY_SCALE: i64 = 10_000;

// =============================================================================
// Core ID Types
// =============================================================================

/// Identifier of one trial within a batch (its index, `0..trials`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    From,
    Into,
)]
#[serde(transparent)]
pub struct TrialId(pub u64);

impl TrialId {
    /// Position of this trial inside the batch.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TrialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Trial#{}", self.0)
    }
}

/// Identifier of a transaction: its position inside the owning ledger.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Default,
    From,
    Into,
)]
#[serde(transparent)]
pub struct TransactionId(pub u32);

impl TransactionId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txn#{}", self.0)
    }
}

// =============================================================================
// Time Types
// =============================================================================

/// Simulation step (discrete time index, `0..horizon`).
pub type Step = u64;
