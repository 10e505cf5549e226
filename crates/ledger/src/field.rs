//! Field references: which value a transaction reads.
//!
//! A bare name (`savings`) addresses the trial's own state vector. A dotted
//! name (`linked.balance`) addresses a field of a read-only external entity.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use types::{Cash, StateVector};

use crate::context::TransactionContext;
use crate::error::TransactionError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldRef {
    Local(Arc<str>),
    Entity { entity: Arc<str>, field: Arc<str> },
}

impl FieldRef {
    pub fn local(field: &str) -> Self {
        FieldRef::Local(Arc::from(field))
    }

    pub fn entity(entity: &str, field: &str) -> Self {
        FieldRef::Entity {
            entity: Arc::from(entity),
            field: Arc::from(field),
        }
    }

    /// Read the referenced value.
    pub fn read(
        &self,
        state: &StateVector,
        ctx: &TransactionContext<'_>,
    ) -> Result<Cash, TransactionError> {
        match self {
            FieldRef::Local(field) => Ok(state.get(field)?),
            FieldRef::Entity { entity, field } => Ok(ctx.entity(entity)?.get(field)?),
        }
    }
}

impl TryFrom<String> for FieldRef {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.split_once('.') {
            None if !raw.is_empty() => Ok(FieldRef::local(&raw)),
            Some((entity, field))
                if !entity.is_empty() && !field.is_empty() && !field.contains('.') =>
            {
                Ok(FieldRef::entity(entity, field))
            }
            _ => Err(format!("`{raw}` is not a valid field reference")),
        }
    }
}

impl From<FieldRef> for String {
    fn from(field: FieldRef) -> String {
        field.to_string()
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Local(field) => write!(f, "{field}"),
            FieldRef::Entity { entity, field } => write!(f, "{entity}.{field}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_field_refs() {
        assert_eq!(
            FieldRef::try_from("savings".to_string()).unwrap(),
            FieldRef::local("savings")
        );
        assert_eq!(
            FieldRef::try_from("linked.balance".to_string()).unwrap(),
            FieldRef::entity("linked", "balance")
        );
        assert!(FieldRef::try_from(String::new()).is_err());
        assert!(FieldRef::try_from("a.".to_string()).is_err());
        assert!(FieldRef::try_from("a.b.c".to_string()).is_err());
    }

    #[test]
    fn test_display_round_trips() {
        let field = FieldRef::entity("linked", "balance");
        assert_eq!(field.to_string(), "linked.balance");
    }
}
