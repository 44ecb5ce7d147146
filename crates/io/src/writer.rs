//! Parquet field-file writer configuration.

use parquet::file::properties::WriterProperties;

use crate::error::IoError;

/// Compression algorithm for Parquet output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Compression {
    /// No compression.
    None,
    /// Snappy compression (fast, moderate ratio).
    #[default]
    Snappy,
    /// Zstd compression (slower, better ratio).
    Zstd,
}

impl Compression {
    /// Converts to the corresponding `parquet::basic::Compression` variant.
    fn to_parquet(self) -> Result<parquet::basic::Compression, IoError> {
        Ok(match self {
            Self::None => parquet::basic::Compression::UNCOMPRESSED,
            Self::Snappy => parquet::basic::Compression::SNAPPY,
            Self::Zstd => {
                let level = parquet::basic::ZstdLevel::try_new(3)?;
                parquet::basic::Compression::ZSTD(level)
            }
        })
    }
}

/// How missing values are encoded when fields are written.
///
/// Missing grid points are stored as null when `bitmap` is set and as the
/// `missing_value` sentinel otherwise. The sentinel is recorded with every
/// field in both modes, so readers decode either encoding back to NaN.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    compression: Compression,
    missing_value: f64,
    bitmap: bool,
    row_group_size: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            compression: Compression::default(),
            missing_value: -99.0,
            bitmap: true,
            row_group_size: 256,
        }
    }
}

impl WriterConfig {
    /// Sets the compression algorithm.
    pub fn with_compression(mut self, comp: Compression) -> Self {
        self.compression = comp;
        self
    }

    /// Sets the sentinel stored for missing grid points.
    pub fn with_missing_value(mut self, value: f64) -> Self {
        self.missing_value = value;
        self
    }

    /// Sets whether missing grid points are stored as null instead of the sentinel.
    pub fn with_bitmap(mut self, bitmap: bool) -> Self {
        self.bitmap = bitmap;
        self
    }

    /// Sets the maximum number of fields per row group.
    pub fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = size;
        self
    }

    /// Returns the compression algorithm.
    pub fn compression(&self) -> Compression {
        self.compression
    }

    /// Returns the missing-value sentinel.
    pub fn missing_value(&self) -> f64 {
        self.missing_value
    }

    /// Returns whether missing values are stored as null.
    pub fn bitmap(&self) -> bool {
        self.bitmap
    }

    /// Returns the maximum number of fields per row group.
    pub fn row_group_size(&self) -> usize {
        self.row_group_size
    }

    /// Validates this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::Validation`] listing every failed check: the
    /// missing value must be finite and `row_group_size` non-zero.
    pub fn validate(&self) -> Result<(), IoError> {
        let mut problems = Vec::new();
        if !self.missing_value.is_finite() {
            problems.push(format!(
                "missing_value must be finite, got {}",
                self.missing_value
            ));
        }
        if self.row_group_size == 0 {
            problems.push("row_group_size must be greater than 0".to_string());
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(IoError::Validation {
                count: problems.len(),
                details: problems.join("; "),
            })
        }
    }

    /// Builds Parquet writer properties for this configuration.
    pub(crate) fn properties(&self) -> Result<WriterProperties, IoError> {
        Ok(WriterProperties::builder()
            .set_compression(self.compression.to_parquet()?)
            .set_max_row_group_size(self.row_group_size)
            .build())
    }
}
