//! Field values and their metadata.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::IoError;

/// Integer metadata attached to a field: date parts, ensemble member, lead
/// time, or any other discrete key.
///
/// Keys iterate in sorted order, so two equal metadata maps always serialise
/// identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldMeta(BTreeMap<String, i64>);

impl FieldMeta {
    /// Empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces `key`, builder style.
    pub fn with(mut self, key: &str, value: i64) -> Self {
        self.set(key, value);
        self
    }

    /// Adds or replaces `key`.
    pub fn set(&mut self, key: &str, value: i64) {
        self.0.insert(key.to_string(), value);
    }

    /// Value of `key`, if present.
    pub fn get(&self, key: &str) -> Option<i64> {
        self.0.get(key).copied()
    }

    /// Value of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingKey`] if the key is absent.
    pub fn require(&self, key: &str) -> Result<i64, IoError> {
        self.get(key).ok_or_else(|| IoError::MissingKey {
            key: key.to_string(),
        })
    }

    /// Iterates over `(key, value)` pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// One gridded field: a value per grid point plus its metadata.
///
/// Missing values are NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    values: Vec<f64>,
    meta: FieldMeta,
}

impl Field {
    /// Creates a field from values and metadata.
    pub fn new(values: Vec<f64>, meta: FieldMeta) -> Self {
        Self { values, meta }
    }

    /// Grid-point values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Field metadata.
    pub fn meta(&self) -> &FieldMeta {
        &self.meta
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if the field has no grid points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes `self` and returns values and metadata.
    pub fn into_parts(self) -> (Vec<f64>, FieldMeta) {
        (self.values, self.meta)
    }
}
