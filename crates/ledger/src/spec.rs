//! Declarative transaction specifications.
//!
//! A `TransactionSpec` is the configuration-file form of a shipped variant.
//! Specs are plain data (serde), and [`TransactionSpec::build`] turns one into
//! a boxed [`Transaction`] for the ledger.
//!
//! ```toml
//! [[ledger]]
//! kind = "recurring_credit"
//! name = "salary"
//! field = "checking"
//! amount = { fixed = 3200.0 }
//! schedule = { periodic = { every = 1 } }
//!
//! [[ledger]]
//! kind = "conditional_transfer"
//! from = "checking"
//! to = "savings"
//! when = { field = "checking", op = "gt", threshold = 5000.0 }
//! amount = { excess_over = 5000.0 }
//! ```

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::condition::Condition;
use crate::error::ConfigError;
use crate::schedule::Schedule;
use crate::transaction::Transaction;
use crate::variants::{
    ConditionalTransfer, FlowDirection, OneOffEvent, OneOffTrigger, RecurringFlow, TransferAmount,
};

fn default_direction() -> FlowDirection {
    FlowDirection::Credit
}

/// Variant and parameters of one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransactionKindSpec {
    RecurringCredit {
        field: String,
        amount: Amount,
        schedule: Schedule,
    },
    RecurringDebit {
        field: String,
        amount: Amount,
        schedule: Schedule,
    },
    ConditionalTransfer {
        from: String,
        to: String,
        when: Condition,
        amount: TransferAmount,
        #[serde(default)]
        allow_overdraw: bool,
    },
    OneOff {
        field: String,
        amount: Amount,
        #[serde(default = "default_direction")]
        direction: FlowDirection,
        trigger: OneOffTrigger,
    },
}

/// One ledger entry as written in configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionSpec {
    /// Optional display name; generated from the variant and position when
    /// absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: TransactionKindSpec,
}

impl TransactionSpec {
    pub fn new(kind: TransactionKindSpec) -> Self {
        Self { name: None, kind }
    }

    pub fn named(name: impl Into<String>, kind: TransactionKindSpec) -> Self {
        Self {
            name: Some(name.into()),
            kind,
        }
    }

    /// Recurring credit of a fixed amount every `period` steps.
    pub fn recurring_credit(field: &str, amount: f64, period: u64) -> Result<Self, ConfigError> {
        Ok(Self::new(TransactionKindSpec::RecurringCredit {
            field: field.to_string(),
            amount: Amount::fixed(amount)?,
            schedule: Schedule::every(period),
        }))
    }

    /// Recurring debit of a fixed amount every `period` steps.
    pub fn recurring_debit(field: &str, amount: f64, period: u64) -> Result<Self, ConfigError> {
        Ok(Self::new(TransactionKindSpec::RecurringDebit {
            field: field.to_string(),
            amount: Amount::fixed(amount)?,
            schedule: Schedule::every(period),
        }))
    }

    /// Instantiate the variant.
    pub fn build(&self) -> Box<dyn Transaction> {
        match &self.kind {
            TransactionKindSpec::RecurringCredit {
                field,
                amount,
                schedule,
            } => Box::new(RecurringFlow::new(
                field,
                amount.clone(),
                schedule.clone(),
                FlowDirection::Credit,
            )),
            TransactionKindSpec::RecurringDebit {
                field,
                amount,
                schedule,
            } => Box::new(RecurringFlow::new(
                field,
                amount.clone(),
                schedule.clone(),
                FlowDirection::Debit,
            )),
            TransactionKindSpec::ConditionalTransfer {
                from,
                to,
                when,
                amount,
                allow_overdraw,
            } => {
                let transfer = ConditionalTransfer::new(from, to, when.clone(), *amount);
                if *allow_overdraw {
                    Box::new(transfer.allow_overdraw())
                } else {
                    Box::new(transfer)
                }
            }
            TransactionKindSpec::OneOff {
                field,
                amount,
                direction,
                trigger,
            } => Box::new(OneOffEvent::new(
                field,
                amount.clone(),
                *direction,
                trigger.clone(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::ScheduleKind;
    use types::Cash;

    #[derive(Deserialize)]
    struct File {
        ledger: Vec<TransactionSpec>,
    }

    #[test]
    fn test_parse_toml_ledger() {
        let raw = r#"
            [[ledger]]
            kind = "recurring_credit"
            name = "salary"
            field = "checking"
            amount = { fixed = 3200.0 }
            schedule = { periodic = { every = 2, start = 1 } }

            [[ledger]]
            kind = "conditional_transfer"
            from = "checking"
            to = "savings"
            when = { field = "checking", op = "gt", threshold = 5000.0 }
            amount = { excess_over = 5000.0 }

            [[ledger]]
            kind = "one_off"
            field = "checking"
            amount = { random = { uniform = { low = 100.0, high = 900.0 } } }
            direction = "debit"
            trigger = { at_step = 6 }
        "#;
        let file: File = toml::from_str(raw).unwrap();
        assert_eq!(file.ledger.len(), 3);
        assert_eq!(file.ledger[0].name.as_deref(), Some("salary"));

        match &file.ledger[0].kind {
            TransactionKindSpec::RecurringCredit { schedule, .. } => {
                assert_eq!(schedule.kind(), ScheduleKind::DiscretePeriodic);
            }
            other => panic!("unexpected variant {other:?}"),
        }
        match &file.ledger[1].kind {
            TransactionKindSpec::ConditionalTransfer { amount, .. } => {
                assert_eq!(*amount, TransferAmount::ExcessOver(Cash::from_float(5000.0)));
            }
            other => panic!("unexpected variant {other:?}"),
        }
        assert_eq!(file.ledger[2].build().kind(), "one-off");
    }

    #[test]
    fn test_build_kinds() {
        assert_eq!(
            TransactionSpec::recurring_credit("a", 1.0, 1).unwrap().build().kind(),
            "recurring-credit"
        );
        assert_eq!(
            TransactionSpec::recurring_debit("a", 1.0, 1).unwrap().build().kind(),
            "recurring-debit"
        );
        assert!(TransactionSpec::recurring_credit("a", f64::INFINITY, 1).is_err());
    }

    #[test]
    fn test_json_round_trip_keeps_kind_tag() {
        let spec = TransactionSpec::named("rent", TransactionKindSpec::RecurringDebit {
            field: "checking".into(),
            amount: Amount::fixed(1500.0).unwrap(),
            schedule: Schedule::every(1),
        });
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["kind"], "recurring_debit");
        assert_eq!(json["name"], "rent");
    }
}
