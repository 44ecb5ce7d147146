//! Writing fields to Parquet field files.
//!
//! A field file stores one row per field with three columns: `meta` (the
//! metadata as a JSON object), `missing_value` (the sentinel used for that
//! field) and `values` (a list of the grid-point values).

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, ListArray, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Float64Type, Schema, SchemaRef};
use parquet::arrow::ArrowWriter;
use tempfile::TempPath;
use tracing::debug;

use crate::error::IoError;
use crate::field::FieldMeta;
use crate::store::FieldSink;
use crate::writer::WriterConfig;

pub(crate) const META_COLUMN: &str = "meta";
pub(crate) const MISSING_COLUMN: &str = "missing_value";
pub(crate) const VALUES_COLUMN: &str = "values";

/// Builds the Arrow schema shared by every field file.
pub(crate) fn field_schema() -> Schema {
    Schema::new(vec![
        Field::new(META_COLUMN, DataType::Utf8, false),
        Field::new(MISSING_COLUMN, DataType::Float64, false),
        Field::new(
            VALUES_COLUMN,
            DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
            false,
        ),
    ])
}

/// Encodes one field as a single-row [`RecordBatch`].
///
/// NaN values are replaced by `missing_value`, or by null when `bitmap` is set.
pub(crate) fn field_to_record_batch(
    values: &[f64],
    meta: &FieldMeta,
    missing_value: f64,
    bitmap: bool,
    schema: &SchemaRef,
) -> Result<RecordBatch, IoError> {
    let encoded = values.iter().map(|&v| {
        if !v.is_nan() {
            Some(v)
        } else if bitmap {
            None
        } else {
            Some(missing_value)
        }
    });

    let meta_col: ArrayRef = Arc::new(StringArray::from(vec![serde_json::to_string(meta)?]));
    let missing_col: ArrayRef = Arc::new(Float64Array::from(vec![missing_value]));
    let values_col: ArrayRef = Arc::new(ListArray::from_iter_primitive::<Float64Type, _, _>(
        std::iter::once(Some(encoded)),
    ));

    Ok(RecordBatch::try_new(
        Arc::clone(schema),
        vec![meta_col, missing_col, values_col],
    )?)
}

/// Appends fields to a Parquet field file.
///
/// Fields are written to a hidden file next to the destination. The
/// destination appears only when [`ParquetFieldWriter::close`] succeeds;
/// dropping the writer unclosed deletes the staged file and leaves any
/// existing file at the destination untouched.
pub struct ParquetFieldWriter {
    writer: ArrowWriter<File>,
    staged: TempPath,
    schema: SchemaRef,
    missing_value: f64,
    bitmap: bool,
    path: PathBuf,
    n_written: usize,
}

impl ParquetFieldWriter {
    /// Starts a field file that will be placed at `path` on close.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Validation`] for an invalid configuration and
    /// [`IoError::Io`] or [`IoError::Parquet`] if the staging file cannot be
    /// created in the destination directory.
    pub fn create(path: &Path, config: &WriterConfig) -> Result<Self, IoError> {
        config.validate()?;
        let schema: SchemaRef = Arc::new(field_schema());
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let (file, staged) = tempfile::Builder::new()
            .prefix(".spidi-")
            .suffix(".partial")
            .tempfile_in(dir)?
            .into_parts();
        let writer = ArrowWriter::try_new(file, Arc::clone(&schema), Some(config.properties()?))?;
        Ok(Self {
            writer,
            staged,
            schema,
            missing_value: config.missing_value(),
            bitmap: config.bitmap(),
            path: path.to_path_buf(),
            n_written: 0,
        })
    }

    /// Number of fields written so far.
    pub fn n_written(&self) -> usize {
        self.n_written
    }

    /// Writes the file footer without moving the file into place.
    pub(crate) fn finish(self) -> Result<StagedFieldFile, IoError> {
        self.writer.close()?;
        Ok(StagedFieldFile {
            staged: self.staged,
            path: self.path,
            n_fields: self.n_written,
        })
    }

    /// Writes the file footer and moves the file to its destination.
    ///
    /// Returns the number of fields written.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Parquet`] if finalisation fails and [`IoError::Io`]
    /// if the file cannot be moved into place. The destination is unchanged
    /// in both cases.
    pub fn close(self) -> Result<usize, IoError> {
        self.finish()?.commit()
    }
}

/// A complete field file still waiting at its staging path.
///
/// Dropping it without [`StagedFieldFile::commit`] deletes the file.
pub(crate) struct StagedFieldFile {
    staged: TempPath,
    path: PathBuf,
    n_fields: usize,
}

impl StagedFieldFile {
    /// Moves the file to its destination, replacing any existing file.
    pub(crate) fn commit(self) -> Result<usize, IoError> {
        self.staged
            .persist(&self.path)
            .map_err(|e| IoError::from(e.error))?;
        debug!(path = %self.path.display(), n_fields = self.n_fields, "closed field file");
        Ok(self.n_fields)
    }
}

impl FieldSink for ParquetFieldWriter {
    fn write(&mut self, values: &[f64], meta: &FieldMeta) -> Result<(), IoError> {
        let batch =
            field_to_record_batch(values, meta, self.missing_value, self.bitmap, &self.schema)?;
        self.writer.write(&batch)?;
        self.n_written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arrow::array::{Array, AsArray};

    #[test]
    fn schema_columns() {
        let schema = field_schema();
        assert_eq!(schema.fields().len(), 3);
        assert_eq!(schema.field(0).name(), "meta");
        assert_eq!(schema.field(1).name(), "missing_value");
        assert_eq!(schema.field(2).name(), "values");
    }

    #[test]
    fn record_batch_with_bitmap() {
        let schema: SchemaRef = Arc::new(field_schema());
        let meta = FieldMeta::new().with("month", 5);
        let batch =
            field_to_record_batch(&[1.0, f64::NAN, 3.0], &meta, -99.0, true, &schema).unwrap();

        assert_eq!(batch.num_rows(), 1);
        assert_eq!(batch.column(0).as_string::<i32>().value(0), r#"{"month":5}"#);
        let list = batch.column(2).as_list::<i32>();
        let values = list.value(0);
        let values = values.as_primitive::<Float64Type>();
        assert_eq!(values.len(), 3);
        assert!(values.is_null(1));
        assert_eq!(values.value(2), 3.0);
    }

    fn staged_entries(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "partial"))
            .collect()
    }

    #[test]
    fn destination_appears_only_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        let mut writer = ParquetFieldWriter::create(&path, &WriterConfig::default()).unwrap();
        writer.write(&[1.0, 2.0], &FieldMeta::new()).unwrap();

        assert!(!path.exists());
        assert_eq!(staged_entries(dir.path()).len(), 1);

        assert_eq!(writer.close().unwrap(), 1);
        assert!(path.exists());
        assert!(staged_entries(dir.path()).is_empty());
    }

    #[test]
    fn dropped_writer_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        {
            let mut writer = ParquetFieldWriter::create(&path, &WriterConfig::default()).unwrap();
            writer.write(&[1.0], &FieldMeta::new()).unwrap();
        }
        assert!(!path.exists());
        assert!(staged_entries(dir.path()).is_empty());
    }

    #[test]
    fn dropped_writer_keeps_existing_destination() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        std::fs::write(&path, b"previous").unwrap();
        {
            let mut writer = ParquetFieldWriter::create(&path, &WriterConfig::default()).unwrap();
            writer.write(&[1.0], &FieldMeta::new()).unwrap();
        }
        assert_eq!(std::fs::read(&path).unwrap(), b"previous");
    }

    #[test]
    fn finished_file_is_discarded_unless_committed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.parquet");
        let writer = ParquetFieldWriter::create(&path, &WriterConfig::default()).unwrap();
        drop(writer.finish().unwrap());
        assert!(!path.exists());
        assert!(staged_entries(dir.path()).is_empty());
    }

    #[test]
    fn record_batch_without_bitmap_uses_sentinel() {
        let schema: SchemaRef = Arc::new(field_schema());
        let batch =
            field_to_record_batch(&[f64::NAN, 2.0], &FieldMeta::new(), -99.0, false, &schema)
                .unwrap();

        let list = batch.column(2).as_list::<i32>();
        let values = list.value(0);
        let values = values.as_primitive::<Float64Type>();
        assert_eq!(values.null_count(), 0);
        assert_eq!(values.value(0), -99.0);
    }
}
