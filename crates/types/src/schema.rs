//! State schema: the named, fixed-width layout shared by every state vector
//! in a batch.
//!
//! A schema is built once and shared behind `Arc`; vectors and snapshots
//! only hold the pointer plus their own values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StateError};
use crate::money::Cash;

/// What happens when a field would leave its configured bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundPolicy {
    /// Clamp the value into `[min, max]` and carry on.
    Clamp,
    /// Fail the trial with a constraint violation.
    #[default]
    Reject,
}

/// Optional hard floor/ceiling for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldBounds {
    #[serde(default)]
    pub min: Option<Cash>,
    #[serde(default)]
    pub max: Option<Cash>,
    #[serde(default)]
    pub policy: BoundPolicy,
}

impl FieldBounds {
    /// No bounds at all; only arithmetic overflow is checked.
    pub const UNBOUNDED: FieldBounds = FieldBounds {
        min: None,
        max: None,
        policy: BoundPolicy::Reject,
    };

    /// A hard floor that rejects values below `min`.
    pub fn floor(min: Cash) -> Self {
        Self {
            min: Some(min),
            ..Self::UNBOUNDED
        }
    }

    /// Set the policy.
    pub fn with_policy(mut self, policy: BoundPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set the ceiling.
    pub fn with_max(mut self, max: Cash) -> Self {
        self.max = Some(max);
        self
    }

    fn validate(&self, field: &str) -> Result<()> {
        if let (Some(min), Some(max)) = (self.min, self.max)
            && min > max
        {
            return Err(StateError::InvalidSchema(format!(
                "field `{field}` has min {min} above max {max}"
            )));
        }
        Ok(())
    }

    /// Bring `value` within bounds according to the policy.
    pub(crate) fn enforce(&self, field: &str, value: Cash) -> Result<Cash> {
        if let Some(min) = self.min
            && value < min
        {
            return match self.policy {
                BoundPolicy::Clamp => Ok(min),
                BoundPolicy::Reject => Err(StateError::out_of_bounds(field, value, "min", min)),
            };
        }
        if let Some(max) = self.max
            && value > max
        {
            return match self.policy {
                BoundPolicy::Clamp => Ok(max),
                BoundPolicy::Reject => Err(StateError::out_of_bounds(field, value, "max", max)),
            };
        }
        Ok(value)
    }
}

/// Ordered set of uniquely named fields with per-field bounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateSchema {
    names: Vec<String>,
    bounds: Vec<FieldBounds>,
    index: HashMap<String, usize>,
}

impl StateSchema {
    /// Create a schema from field names, in order.
    ///
    /// Rejects empty schemas, empty names and duplicates.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = fields.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(StateError::InvalidSchema(
                "schema must define at least one field".into(),
            ));
        }

        let mut index = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(StateError::InvalidSchema("field names must be non-empty".into()));
            }
            if name.contains('.') {
                return Err(StateError::InvalidSchema(format!(
                    "field `{name}` must not contain `.` (reserved for entity references)"
                )));
            }
            if index.insert(name.clone(), i).is_some() {
                return Err(StateError::InvalidSchema(format!("duplicate field `{name}`")));
            }
        }

        let bounds = vec![FieldBounds::UNBOUNDED; names.len()];
        Ok(Self {
            names,
            bounds,
            index,
        })
    }

    /// Attach bounds to a named field.
    pub fn with_bounds(mut self, field: &str, bounds: FieldBounds) -> Result<Self> {
        let i = self.index_of(field)?;
        bounds.validate(field)?;
        self.bounds[i] = bounds;
        Ok(self)
    }

    /// Number of fields (the vector width).
    #[inline]
    pub fn width(&self) -> usize {
        self.names.len()
    }

    /// Field names in layout order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Position of a field, or `SchemaMismatch`.
    pub fn index_of(&self, field: &str) -> Result<usize> {
        self.index
            .get(field)
            .copied()
            .ok_or_else(|| StateError::unknown_field(field))
    }

    /// Whether the schema defines `field`.
    pub fn contains(&self, field: &str) -> bool {
        self.index.contains_key(field)
    }

    pub fn name(&self, index: usize) -> &str {
        &self.names[index]
    }

    pub fn bounds(&self, index: usize) -> &FieldBounds {
        &self.bounds[index]
    }
}
