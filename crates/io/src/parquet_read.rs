//! Reading fields back from Parquet field files.

use std::fs::File;
use std::path::{Path, PathBuf};

use arrow::array::{Array, AsArray, RecordBatch};
use arrow::datatypes::Float64Type;
use parquet::arrow::arrow_reader::{ParquetRecordBatchReader, ParquetRecordBatchReaderBuilder};

use crate::error::IoError;
use crate::field::{Field, FieldMeta};
use crate::parquet_write::{META_COLUMN, MISSING_COLUMN, VALUES_COLUMN};
use crate::store::{FieldIter, FieldSource};

/// A field file on disk, read lazily one record batch at a time.
///
/// Null values and values equal to the stored missing-value sentinel are
/// both decoded as NaN.
#[derive(Debug, Clone)]
pub struct ParquetFieldSource {
    path: PathBuf,
}

impl ParquetFieldSource {
    /// Opens the field file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::FileNotFound`] if the file does not exist.
    pub fn open(path: &Path) -> Result<Self, IoError> {
        if !path.exists() {
            return Err(IoError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every field into memory.
    ///
    /// # Errors
    ///
    /// Returns the first read or decode error.
    pub fn read_all(&self) -> Result<Vec<Field>, IoError> {
        self.fields()?.collect()
    }
}

impl FieldSource for ParquetFieldSource {
    fn fields(&self) -> Result<FieldIter<'_>, IoError> {
        let file = File::open(&self.path)?;
        let batches = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
        Ok(Box::new(FieldReader {
            batches,
            current: None,
            row: 0,
        }))
    }
}

/// Iterator that walks record batches and yields one field per row.
struct FieldReader {
    batches: ParquetRecordBatchReader,
    current: Option<RecordBatch>,
    row: usize,
}

impl Iterator for FieldReader {
    type Item = Result<Field, IoError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(batch) = &self.current {
                if self.row < batch.num_rows() {
                    let field = decode_row(batch, self.row);
                    self.row += 1;
                    return Some(field);
                }
            }
            match self.batches.next()? {
                Ok(batch) => {
                    self.current = Some(batch);
                    self.row = 0;
                }
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

fn column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a dyn Array, IoError> {
    batch
        .column_by_name(name)
        .map(|c| c.as_ref())
        .ok_or_else(|| IoError::Schema {
            details: format!("no '{name}' column"),
        })
}

fn schema_error(name: &str, expected: &str) -> IoError {
    IoError::Schema {
        details: format!("column '{name}' is not {expected}"),
    }
}

/// Decodes row `row` of a field-file batch.
fn decode_row(batch: &RecordBatch, row: usize) -> Result<Field, IoError> {
    let meta_col = column(batch, META_COLUMN)?
        .as_string_opt::<i32>()
        .ok_or_else(|| schema_error(META_COLUMN, "a string column"))?;
    let missing_col = column(batch, MISSING_COLUMN)?
        .as_primitive_opt::<Float64Type>()
        .ok_or_else(|| schema_error(MISSING_COLUMN, "a float64 column"))?;
    let values_col = column(batch, VALUES_COLUMN)?
        .as_list_opt::<i32>()
        .ok_or_else(|| schema_error(VALUES_COLUMN, "a list column"))?;

    let meta: FieldMeta = serde_json::from_str(meta_col.value(row))?;
    let missing_value = missing_col.value(row);

    let items = values_col.value(row);
    let items = items
        .as_primitive_opt::<Float64Type>()
        .ok_or_else(|| schema_error(VALUES_COLUMN, "a list of float64"))?;
    let values = items
        .iter()
        .map(|v| match v {
            Some(x) if x != missing_value => x,
            _ => f64::NAN,
        })
        .collect();

    Ok(Field::new(values, meta))
}
