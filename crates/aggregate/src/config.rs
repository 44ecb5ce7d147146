//! Configuration for grouped means and bias correction.

use spidi_io::FieldMeta;

use crate::error::AggregateError;

/// How the field stream is traversed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Strategy {
    /// One pass over the stream with one running sum per group.
    #[default]
    SinglePass,
    /// Discover the distinct keys first, then re-read the stream once per
    /// group. Only one running sum is live at a time.
    Replay,
}

/// Inclusive range condition on one metadata key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeFilter {
    key: String,
    lo: i64,
    hi: i64,
}

impl RangeFilter {
    /// Accepts records with `lo <= meta[key] <= hi`.
    pub fn new(key: &str, lo: i64, hi: i64) -> Self {
        Self {
            key: key.to_string(),
            lo,
            hi,
        }
    }

    /// Metadata key tested.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Inclusive lower bound.
    pub fn lo(&self) -> i64 {
        self.lo
    }

    /// Inclusive upper bound.
    pub fn hi(&self) -> i64 {
        self.hi
    }

    /// Whether `meta` passes this filter.
    ///
    /// # Errors
    ///
    /// Returns an error if `meta` lacks the key.
    pub fn matches(&self, meta: &FieldMeta) -> Result<bool, AggregateError> {
        let v = meta.require(&self.key)?;
        Ok((self.lo..=self.hi).contains(&v))
    }
}

/// Configuration for [`grouped_mean`](crate::grouped_mean).
///
/// # Example
///
/// ```
/// use spidi_aggregate::{GroupedMeanConfig, RangeFilter, Strategy};
///
/// let config = GroupedMeanConfig::new("month")
///     .with_filter(RangeFilter::new("year", 1993, 2016))
///     .with_strategy(Strategy::Replay);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct GroupedMeanConfig {
    key: String,
    filters: Vec<RangeFilter>,
    strategy: Strategy,
}

impl GroupedMeanConfig {
    /// Groups by metadata `key`, no filters, single pass.
    pub fn new(key: &str) -> Self {
        Self {
            key: key.to_string(),
            filters: Vec::new(),
            strategy: Strategy::default(),
        }
    }

    /// Adds an auxiliary range filter.
    pub fn with_filter(mut self, filter: RangeFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Sets the traversal strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Grouping key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Auxiliary filters; a record must pass all of them.
    pub fn filters(&self) -> &[RangeFilter] {
        &self.filters
    }

    /// Traversal strategy.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Whether `meta` passes every filter.
    pub(crate) fn accepts(&self, meta: &FieldMeta) -> Result<bool, AggregateError> {
        for filter in &self.filters {
            if !filter.matches(meta)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Validates this configuration.
    ///
    /// The key and every filter key must be non-empty, and every filter
    /// must have `lo <= hi`.
    pub fn validate(&self) -> Result<(), AggregateError> {
        if self.key.is_empty() {
            return Err(AggregateError::InvalidConfig {
                reason: "grouping key must not be empty".to_string(),
            });
        }
        for f in &self.filters {
            if f.key.is_empty() {
                return Err(AggregateError::InvalidConfig {
                    reason: "filter key must not be empty".to_string(),
                });
            }
            if f.lo > f.hi {
                return Err(AggregateError::InvalidConfig {
                    reason: format!("filter on '{}' has lo {} > hi {}", f.key, f.lo, f.hi),
                });
            }
        }
        Ok(())
    }
}

/// Configuration for multiplicative bias factors.
#[derive(Debug, Clone)]
pub struct BiasConfig {
    floor: f64,
    min_factor: f64,
    max_factor: f64,
}

impl BiasConfig {
    /// Defaults: `floor = 0.03` (mm/day), `min_factor = 0.2`, `max_factor = 5.0`.
    pub fn new() -> Self {
        Self {
            floor: 0.03,
            min_factor: 0.2,
            max_factor: 5.0,
        }
    }

    /// Sets the lower bound applied to both climatologies before division.
    pub fn with_floor(mut self, v: f64) -> Self {
        self.floor = v;
        self
    }

    /// Sets the factor clamp range.
    pub fn with_factor_bounds(mut self, min: f64, max: f64) -> Self {
        self.min_factor = min;
        self.max_factor = max;
        self
    }

    /// Lower bound applied to both climatologies.
    pub fn floor(&self) -> f64 {
        self.floor
    }

    /// Smallest allowed factor.
    pub fn min_factor(&self) -> f64 {
        self.min_factor
    }

    /// Largest allowed factor.
    pub fn max_factor(&self) -> f64 {
        self.max_factor
    }

    /// Validates this configuration.
    ///
    /// `floor` must be finite and positive; the factor bounds must be finite
    /// with `0 < min_factor <= max_factor`.
    pub fn validate(&self) -> Result<(), AggregateError> {
        if !self.floor.is_finite() || self.floor <= 0.0 {
            return Err(AggregateError::InvalidConfig {
                reason: format!("floor must be finite and > 0, got {}", self.floor),
            });
        }
        let bounds_ok = self.min_factor.is_finite()
            && self.max_factor.is_finite()
            && self.min_factor > 0.0
            && self.min_factor <= self.max_factor;
        if !bounds_ok {
            return Err(AggregateError::InvalidConfig {
                reason: format!(
                    "factor bounds must satisfy 0 < min <= max, got [{}, {}]",
                    self.min_factor, self.max_factor
                ),
            });
        }
        Ok(())
    }
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self::new()
    }
}
