//! Ledger crate: transactions and the ordered ledger that holds them.
//!
//! - [`Transaction`]: the trait every ledger entry implements
//! - [`TransactionContext`]: per-trial mutable data handed to each application
//! - [`StateDelta`]: the additive effect a transaction returns
//! - Shipped variants: recurring flows, conditional transfers, one-off events
//! - [`TransactionSpec`]: serde form of the shipped variants for config files
//! - [`Ledger`]: validated, ordered collection shared read-only across trials
//!
//! # Example
//!
//! ```ignore
//! use ledger::{Ledger, RecurringFlow};
//!
//! let ledger = Ledger::new(12)?
//!     .with(RecurringFlow::credit("checking", 3200.0, 1)?)?
//!     .with(RecurringFlow::debit("checking", 1500.0, 1)?)?;
//! assert_eq!(ledger.len(), 2);
//! ```

mod amount;
mod condition;
mod context;
mod delta;
mod error;
mod field;
mod ledger;
mod schedule;
mod spec;
mod transaction;
pub mod variants;

pub use amount::{Amount, AmountDistribution};
pub use condition::{Comparison, Condition};
pub use context::{Entities, FiredFlags, TransactionContext};
pub use delta::{FieldChange, StateDelta};
pub use error::{ConfigError, TransactionError};
pub use field::FieldRef;
pub use ledger::{Ledger, LedgerEntry};
pub use schedule::{Schedule, ScheduleKind};
pub use spec::{TransactionKindSpec, TransactionSpec};
pub use transaction::Transaction;
pub use variants::{
    ConditionalTransfer, FlowDirection, OneOffEvent, OneOffTrigger, RecurringFlow, TransferAmount,
};
