//! Field stream traits and the in-memory store.

use std::collections::BTreeSet;

use crate::error::IoError;
use crate::field::{Field, FieldMeta};

/// A single pass over a field stream.
pub type FieldIter<'a> = Box<dyn Iterator<Item = Result<Field, IoError>> + 'a>;

/// A finite, ordered sequence of fields that can be re-read from the start.
///
/// Every call to [`FieldSource::fields`] opens a fresh pass.
pub trait FieldSource {
    /// Opens a new pass over the stream, in stored order.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource cannot be opened.
    fn fields(&self) -> Result<FieldIter<'_>, IoError>;

    /// Distinct values of metadata `key` across the stream, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::MissingKey`] if any field lacks `key`, or any error
    /// raised while reading.
    fn distinct_values(&self, key: &str) -> Result<Vec<i64>, IoError> {
        let mut values = BTreeSet::new();
        for field in self.fields()? {
            values.insert(field?.meta().require(key)?);
        }
        Ok(values.into_iter().collect())
    }
}

/// Destination that appends fields one at a time.
pub trait FieldSink {
    /// Appends one field. NaN marks a missing value.
    ///
    /// # Errors
    ///
    /// Returns an error if the field cannot be written.
    fn write(&mut self, values: &[f64], meta: &FieldMeta) -> Result<(), IoError>;
}

/// Fields held in memory, usable as both source and sink.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    fields: Vec<Field>,
}

impl MemoryStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field.
    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    /// Stored fields, in insertion order.
    pub fn as_slice(&self) -> &[Field] {
        &self.fields
    }

    /// Number of stored fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Consumes the store and returns its fields.
    pub fn into_fields(self) -> Vec<Field> {
        self.fields
    }
}

impl From<Vec<Field>> for MemoryStore {
    fn from(fields: Vec<Field>) -> Self {
        Self { fields }
    }
}

impl FieldSource for MemoryStore {
    fn fields(&self) -> Result<FieldIter<'_>, IoError> {
        Ok(Box::new(self.fields.iter().cloned().map(Ok)))
    }
}

impl FieldSink for MemoryStore {
    fn write(&mut self, values: &[f64], meta: &FieldMeta) -> Result<(), IoError> {
        self.fields.push(Field::new(values.to_vec(), meta.clone()));
        Ok(())
    }
}
