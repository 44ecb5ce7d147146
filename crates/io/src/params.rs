//! Persistent storage of fitted SPI parameters.
//!
//! Each (time scale, tag) pair is stored as three field files in one
//! directory, holding shape, scale and zero probability respectively:
//!
//! ```text
//! GFIT_SPI3_acoef_MON_HIND.parquet
//! GFIT_SPI3_bcoef_MON_HIND.parquet
//! GFIT_SPI3_pzero_MON_HIND.parquet
//! ```
//!
//! Every file holds one field per lead time or calendar month, tagged with
//! the metadata key `index`.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::IoError;
use crate::field::{Field, FieldMeta};
use crate::parquet_read::ParquetFieldSource;
use crate::parquet_write::ParquetFieldWriter;
use crate::store::FieldSink;
use crate::writer::WriterConfig;

/// Metadata key carrying the lead time or calendar month of a parameter field.
pub const INDEX_KEY: &str = "index";

/// The three stored parameter arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Gamma shape.
    Shape,
    /// Gamma scale.
    Scale,
    /// Probability of zero precipitation.
    ZeroProb,
}

impl ParamKind {
    /// All kinds, in file order.
    pub const ALL: [ParamKind; 3] = [ParamKind::Shape, ParamKind::Scale, ParamKind::ZeroProb];

    /// Parameter name used in file names.
    pub fn file_key(self) -> &'static str {
        match self {
            ParamKind::Shape => "acoef",
            ParamKind::Scale => "bcoef",
            ParamKind::ZeroProb => "pzero",
        }
    }
}

/// Fitted parameters for one lead time or calendar month.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSet {
    index: i64,
    shape: Vec<f64>,
    scale: Vec<f64>,
    zero_prob: Vec<f64>,
}

impl ParamSet {
    /// Creates a parameter set from three arrays over the same grid.
    ///
    /// # Errors
    ///
    /// Returns [`IoError::ParamMismatch`] if the arrays differ in length.
    pub fn new(
        index: i64,
        shape: Vec<f64>,
        scale: Vec<f64>,
        zero_prob: Vec<f64>,
    ) -> Result<Self, IoError> {
        if shape.len() != scale.len() || shape.len() != zero_prob.len() {
            return Err(IoError::ParamMismatch {
                details: format!(
                    "index {index}: shape has {}, scale {}, zero_prob {} points",
                    shape.len(),
                    scale.len(),
                    zero_prob.len()
                ),
            });
        }
        Ok(Self {
            index,
            shape,
            scale,
            zero_prob,
        })
    }

    /// Lead time or calendar month these parameters belong to.
    pub fn index(&self) -> i64 {
        self.index
    }

    /// Gamma shape per grid point.
    pub fn shape(&self) -> &[f64] {
        &self.shape
    }

    /// Gamma scale per grid point.
    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    /// Zero probability per grid point.
    pub fn zero_prob(&self) -> &[f64] {
        &self.zero_prob
    }

    /// Number of grid points.
    pub fn n_points(&self) -> usize {
        self.shape.len()
    }

    fn values(&self, kind: ParamKind) -> &[f64] {
        match kind {
            ParamKind::Shape => &self.shape,
            ParamKind::Scale => &self.scale,
            ParamKind::ZeroProb => &self.zero_prob,
        }
    }
}

/// Directory-backed store of fitted parameters.
#[derive(Debug, Clone)]
pub struct ParamStore {
    dir: PathBuf,
    config: WriterConfig,
}

impl ParamStore {
    /// Store rooted at `dir` with the default writer configuration.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            config: WriterConfig::default(),
        }
    }

    /// Sets the writer configuration used by [`ParamStore::save`].
    pub fn with_writer_config(mut self, config: WriterConfig) -> Self {
        self.config = config;
        self
    }

    /// Directory holding the parameter files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file holding `kind` for the given time scale and tag.
    pub fn path(&self, time_scale: usize, kind: ParamKind, tag: &str) -> PathBuf {
        self.dir.join(format!(
            "GFIT_SPI{time_scale}_{}_{tag}.parquet",
            kind.file_key()
        ))
    }

    /// Writes `sets` as three field files, one field per set in slice order.
    ///
    /// All three files are completed before any of them replaces an existing
    /// file, so a failed write leaves earlier parameters in place.
    ///
    /// # Errors
    ///
    /// Returns any error raised while creating, writing or moving the files.
    pub fn save(&self, time_scale: usize, tag: &str, sets: &[ParamSet]) -> Result<(), IoError> {
        let mut staged = Vec::with_capacity(ParamKind::ALL.len());
        for kind in ParamKind::ALL {
            let path = self.path(time_scale, kind, tag);
            let mut writer = ParquetFieldWriter::create(&path, &self.config)?;
            for set in sets {
                let meta = FieldMeta::new().with(INDEX_KEY, set.index());
                writer.write(set.values(kind), &meta)?;
            }
            staged.push(writer.finish()?);
        }
        for file in staged {
            file.commit()?;
        }
        info!(time_scale, tag, n_sets = sets.len(), "saved fit parameters");
        Ok(())
    }

    /// Loads the parameter sets written by [`ParamStore::save`].
    ///
    /// # Errors
    ///
    /// Returns [`IoError::FileNotFound`] if any of the three files is absent,
    /// [`IoError::MissingKey`] if a field lacks `index`, and
    /// [`IoError::ParamMismatch`] if the files disagree on field count, index
    /// order or grid size.
    pub fn load(&self, time_scale: usize, tag: &str) -> Result<Vec<ParamSet>, IoError> {
        let shape = read_kind(&self.path(time_scale, ParamKind::Shape, tag))?;
        let scale = read_kind(&self.path(time_scale, ParamKind::Scale, tag))?;
        let zero_prob = read_kind(&self.path(time_scale, ParamKind::ZeroProb, tag))?;

        if shape.len() != scale.len() || shape.len() != zero_prob.len() {
            return Err(IoError::ParamMismatch {
                details: format!(
                    "field counts differ: acoef {}, bcoef {}, pzero {}",
                    shape.len(),
                    scale.len(),
                    zero_prob.len()
                ),
            });
        }

        shape
            .into_iter()
            .zip(scale)
            .zip(zero_prob)
            .enumerate()
            .map(|(i, ((a, b), p))| {
                let index = a.meta().require(INDEX_KEY)?;
                for other in [&b, &p] {
                    if other.meta().require(INDEX_KEY)? != index {
                        return Err(IoError::ParamMismatch {
                            details: format!("index order differs at field {i}"),
                        });
                    }
                }
                let (shape, _) = a.into_parts();
                let (scale, _) = b.into_parts();
                let (zero_prob, _) = p.into_parts();
                ParamSet::new(index, shape, scale, zero_prob)
            })
            .collect()
    }
}

fn read_kind(path: &Path) -> Result<Vec<Field>, IoError> {
    ParquetFieldSource::open(path)?.read_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        let store = ParamStore::new("/data/fits");
        assert_eq!(
            store.path(3, ParamKind::Shape, "MON_HIND"),
            PathBuf::from("/data/fits/GFIT_SPI3_acoef_MON_HIND.parquet")
        );
        assert_eq!(
            store.path(12, ParamKind::ZeroProb, "FC_05"),
            PathBuf::from("/data/fits/GFIT_SPI12_pzero_FC_05.parquet")
        );
    }

    #[test]
    fn param_set_rejects_unequal_lengths() {
        let err = ParamSet::new(1, vec![1.0], vec![1.0, 2.0], vec![0.0]).unwrap_err();
        assert!(matches!(err, IoError::ParamMismatch { .. }));
    }

    #[test]
    fn load_missing_files() {
        let store = ParamStore::new("/nonexistent/fits");
        let err = store.load(3, "MON_HIND").unwrap_err();
        assert!(matches!(err, IoError::FileNotFound { .. }));
    }
}
