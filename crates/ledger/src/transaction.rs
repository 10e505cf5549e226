//! The `Transaction` trait all ledger entries implement.
//!
//! # Contract
//!
//! A transaction is a pure function of (current state, step, context) to a
//! [`StateDelta`]. It holds only immutable parameters: anything that must
//! change during a trial (random draws, "already fired" flags) lives in the
//! [`TransactionContext`], which is owned by exactly one trial. This keeps a
//! single ledger safely shareable across concurrently running trials.
//!
//! # Extending
//!
//! The ledger stores `Box<dyn Transaction>`, so callers can add their own
//! variants next to the shipped ones:
//!
//! ```ignore
//! #[derive(Debug)]
//! struct Tithe;
//!
//! impl Transaction for Tithe {
//!     fn kind(&self) -> &'static str { "tithe" }
//!
//!     fn apply(&self, state: &StateVector, _step: Step, _ctx: &mut TransactionContext<'_>)
//!         -> Result<StateDelta, TransactionError>
//!     {
//!         let income = state.get("income")?;
//!         Ok(StateDelta::credit("checking".into(), income.checked_scale(-0.1).unwrap_or_default()))
//!     }
//! }
//! ```

use std::fmt;

use types::{Step, StateVector};

use crate::context::TransactionContext;
use crate::delta::StateDelta;
use crate::error::TransactionError;

/// A unit of behavior applied once per step, in ledger order.
pub trait Transaction: Send + Sync + fmt::Debug {
    /// Short variant label used for generated names (e.g. `recurring-credit`).
    fn kind(&self) -> &'static str;

    /// Check parameters against the simulation horizon.
    ///
    /// Called once at ledger construction; a failure aborts the batch before
    /// any trial runs. Returns a human-readable reason.
    #[allow(unused_variables)]
    fn validate(&self, horizon: Step) -> Result<(), String> {
        Ok(())
    }

    /// Compute this transaction's effect at `step`.
    ///
    /// `state` already reflects every transaction earlier in the ledger for
    /// the same step.
    fn apply(
        &self,
        state: &StateVector,
        step: Step,
        ctx: &mut TransactionContext<'_>,
    ) -> Result<StateDelta, TransactionError>;
}
