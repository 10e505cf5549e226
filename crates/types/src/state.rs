//! State vectors and their immutable snapshots.
//!
//! A `StateVector` is the live, mutable record a trial works on. A `Snapshot`
//! is a frozen copy taken at the end of each step; it shares nothing mutable
//! with the vector it came from.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{Result, StateError};
use crate::money::Cash;
use crate::schema::StateSchema;

/// Live financial state of one trial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateVector {
    schema: Arc<StateSchema>,
    values: Vec<Cash>,
}

impl StateVector {
    /// All-zero vector for the schema.
    pub fn new(schema: Arc<StateSchema>) -> Self {
        let values = vec![Cash::ZERO; schema.width()];
        Self { schema, values }
    }

    /// Vector seeded from named initial values; fields not mentioned start
    /// at zero. Initial values are checked against field bounds.
    pub fn from_initial(schema: Arc<StateSchema>, initial: &BTreeMap<String, Cash>) -> Result<Self> {
        let mut state = Self::new(schema);
        for (field, value) in initial {
            state.set(field, *value)?;
        }
        Ok(state)
    }

    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.schema
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.values.len()
    }

    /// Current value of a field.
    pub fn get(&self, field: &str) -> Result<Cash> {
        let i = self.schema.index_of(field)?;
        Ok(self.values[i])
    }

    /// Overwrite a field, enforcing its bounds.
    pub fn set(&mut self, field: &str, value: Cash) -> Result<()> {
        let i = self.schema.index_of(field)?;
        self.values[i] = self.schema.bounds(i).enforce(field, value)?;
        Ok(())
    }

    /// Add `delta` to a field with checked arithmetic, then enforce bounds.
    ///
    /// Returns the value actually stored (which differs from the raw sum
    /// when a clamp bound applied).
    pub fn add(&mut self, field: &str, delta: Cash) -> Result<Cash> {
        let i = self.schema.index_of(field)?;
        let current = self.values[i];
        let sum = current
            .checked_add(delta)
            .ok_or_else(|| StateError::overflow(field, current, delta))?;
        let stored = self.schema.bounds(i).enforce(field, sum)?;
        self.values[i] = stored;
        Ok(stored)
    }

    /// Raw values in schema order.
    pub fn values(&self) -> &[Cash] {
        &self.values
    }

    /// Immutable copy of the current values.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            schema: Arc::clone(&self.schema),
            values: Arc::from(self.values.as_slice()),
        }
    }
}

/// Frozen state at the end of one step.
///
/// Cloning is cheap (two reference-count bumps); the values can never change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    schema: Arc<StateSchema>,
    values: Arc<[Cash]>,
}

impl Snapshot {
    /// Build a standalone snapshot from (name, value) pairs, e.g. for a
    /// read-only external entity.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, Cash)>,
        S: Into<String>,
    {
        let (names, values): (Vec<String>, Vec<Cash>) =
            pairs.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        let schema = Arc::new(StateSchema::new(names)?);
        Ok(Self {
            schema,
            values: Arc::from(values),
        })
    }

    pub fn get(&self, field: &str) -> Result<Cash> {
        let i = self.schema.index_of(field)?;
        Ok(self.values[i])
    }

    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.schema
    }

    pub fn values(&self) -> &[Cash] {
        &self.values
    }

    /// (field name, value) pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Cash)> + '_ {
        self.schema
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    pub fn to_named_map(&self) -> BTreeMap<String, Cash> {
        self.iter().map(|(n, v)| (n.to_string(), v)).collect()
    }
}

impl Serialize for Snapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{BoundPolicy, FieldBounds};

    fn schema() -> Arc<StateSchema> {
        Arc::new(StateSchema::new(["checking", "savings"]).unwrap())
    }

    #[test]
    fn test_get_set() {
        let mut state = StateVector::new(schema());
        state.set("savings", Cash::from_float(12.0)).unwrap();
        assert_eq!(state.get("savings").unwrap(), Cash::from_float(12.0));
        assert_eq!(state.get("checking").unwrap(), Cash::ZERO);
        assert!(matches!(
            state.get("brokerage"),
            Err(StateError::SchemaMismatch { .. })
        ));
        assert!(state.set("brokerage", Cash::ZERO).is_err());
    }

    #[test]
    fn test_snapshot_does_not_alias() {
        let mut state = StateVector::new(schema());
        state.set("checking", Cash::from_float(1.0)).unwrap();
        let before = state.snapshot();
        state.add("checking", Cash::from_float(5.0)).unwrap();

        assert_eq!(before.get("checking").unwrap(), Cash::from_float(1.0));
        assert_eq!(state.get("checking").unwrap(), Cash::from_float(6.0));
    }

    #[test]
    fn test_add_overflow_is_violation() {
        let mut state = StateVector::new(schema());
        state.set("checking", Cash::MAX).unwrap();
        assert!(matches!(
            state.add("checking", Cash(1)),
            Err(StateError::ConstraintViolation { .. })
        ));
        // Value left untouched after a failed add.
        assert_eq!(state.get("checking").unwrap(), Cash::MAX);
    }

    #[test]
    fn test_add_respects_clamp_bounds() {
        let schema = StateSchema::new(["checking"])
            .unwrap()
            .with_bounds(
                "checking",
                FieldBounds::floor(Cash::ZERO).with_policy(BoundPolicy::Clamp),
            )
            .unwrap();
        let mut state = StateVector::new(Arc::new(schema));
        let stored = state.add("checking", Cash::from_float(-20.0)).unwrap();
        assert_eq!(stored, Cash::ZERO);
    }

    #[test]
    fn test_from_initial_unknown_field() {
        let mut initial = BTreeMap::new();
        initial.insert("brokerage".to_string(), Cash::from_float(1.0));
        assert!(StateVector::from_initial(schema(), &initial).is_err());
    }

    #[test]
    fn test_snapshot_serializes_named_fields() {
        let mut state = StateVector::new(schema());
        state.set("checking", Cash::from_float(100.0)).unwrap();
        let json = serde_json::to_string(&state.snapshot()).unwrap();
        assert_eq!(json, r#"{"checking":100.0,"savings":0.0}"#);
    }

    #[test]
    fn test_snapshot_from_pairs() {
        let entity = Snapshot::from_pairs([("balance", Cash::from_float(7.0))]).unwrap();
        assert_eq!(entity.get("balance").unwrap(), Cash::from_float(7.0));
        assert_eq!(entity.iter().count(), 1);
    }
}
