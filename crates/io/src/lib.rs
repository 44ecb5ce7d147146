//! # spidi-io
//!
//! The field store used by the SPI pipeline. Gridded fields (one value per
//! grid point plus integer metadata) are streamed through the [`FieldSource`]
//! and [`FieldSink`] traits, kept in memory with [`MemoryStore`], or persisted
//! as Parquet field files. [`ParamStore`] keeps fitted SPI parameters as three
//! field files per time scale.
//!
//! Missing grid points are NaN in memory and are encoded on disk with the
//! sentinel and null-bitmap policy of [`WriterConfig`]. A field file only
//! appears at its destination once it has been written completely.

mod error;
mod field;
mod params;
mod parquet_read;
mod parquet_write;
mod store;
mod writer;

pub use error::IoError;
pub use field::{Field, FieldMeta};
pub use params::{ParamKind, ParamSet, ParamStore, INDEX_KEY};
pub use parquet_read::ParquetFieldSource;
pub use parquet_write::ParquetFieldWriter;
pub use store::{FieldIter, FieldSink, FieldSource, MemoryStore};
pub use writer::{Compression, WriterConfig};
