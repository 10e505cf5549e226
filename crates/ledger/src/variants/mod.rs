//! Shipped transaction variants.

mod one_off;
mod recurring;
mod transfer;

pub use one_off::{OneOffEvent, OneOffTrigger};
pub use recurring::{FlowDirection, RecurringFlow};
pub use transfer::{ConditionalTransfer, TransferAmount};
