//! Climatological means and bias correction over field streams.
//!
//! [`grouped_mean`] averages the fields of a [`FieldSource`](spidi_io::FieldSource)
//! per value of one metadata key (calendar month, lead time, ...) and writes
//! one mean field per group. The [`bias`] functions turn observed and hindcast
//! climatologies into multiplicative correction factors per forecast lead.
//!
//! # Quick Start
//!
//! ```
//! use spidi_aggregate::{grouped_mean, GroupedMeanConfig};
//! use spidi_io::{Field, FieldMeta, MemoryStore};
//!
//! let source = MemoryStore::from(vec![
//!     Field::new(vec![1.0, 2.0], FieldMeta::new().with("month", 1)),
//!     Field::new(vec![3.0, 4.0], FieldMeta::new().with("month", 1)),
//! ]);
//! let mut sink = MemoryStore::new();
//!
//! grouped_mean(&source, &mut sink, &GroupedMeanConfig::new("month")).unwrap();
//! assert_eq!(sink.as_slice()[0].values(), &[2.0, 3.0]);
//! ```

pub mod bias;
mod config;
mod error;
mod grouped;

pub use bias::{add_months, apply_factors, bias_factors, correct_stream, lead_factors, MONTH_KEY};
pub use config::{BiasConfig, GroupedMeanConfig, RangeFilter, Strategy};
pub use error::AggregateError;
pub use grouped::{grouped_mean, AggregateSummary};
