//! Configuration for SPI fitting and evaluation.

use crate::error::SpiError;

/// Configuration for the zero-inflated gamma fit and the SPI transform.
///
/// Use the builder methods to customise parameters.
///
/// # Example
///
/// ```
/// use spidi_spi::SpiConfig;
///
/// let config = SpiConfig::new()
///     .with_zero_max(0.25)
///     .with_max_chunk(10_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Clone, Debug)]
pub struct SpiConfig {
    min_precip: f64,
    zero_max: f64,
    max_shape: f64,
    prob_floor: f64,
    prob_ceil: f64,
    max_chunk: usize,
}

impl SpiConfig {
    /// Creates a new configuration with defaults.
    ///
    /// Defaults: `min_precip = 0.03` (mm/day), `zero_max = 1/3`,
    /// `max_shape = 1000.0`, `prob_floor = 0.001`, `prob_ceil = 0.999`,
    /// `max_chunk = 50_000`.
    pub fn new() -> Self {
        Self {
            min_precip: 0.03,
            zero_max: 1.0 / 3.0,
            max_shape: 1000.0,
            prob_floor: 0.001,
            prob_ceil: 0.999,
            max_chunk: 50_000,
        }
    }

    // --- Builder methods ---

    /// Sets the precipitation rate below which values are floored to zero.
    pub fn with_min_precip(mut self, v: f64) -> Self {
        self.min_precip = v;
        self
    }

    /// Sets the largest zero fraction for which a grid point is still fitted.
    pub fn with_zero_max(mut self, v: f64) -> Self {
        self.zero_max = v;
        self
    }

    /// Sets the shape above which a fit is discarded as degenerate.
    pub fn with_max_shape(mut self, v: f64) -> Self {
        self.max_shape = v;
        self
    }

    /// Sets the cumulative-probability clipping bounds.
    pub fn with_prob_bounds(mut self, floor: f64, ceil: f64) -> Self {
        self.prob_floor = floor;
        self.prob_ceil = ceil;
        self
    }

    /// Sets the maximum number of grid points processed per chunk.
    pub fn with_max_chunk(mut self, n: usize) -> Self {
        self.max_chunk = n;
        self
    }

    // --- Accessors ---

    /// Returns the minimum precipitation rate.
    pub fn min_precip(&self) -> f64 {
        self.min_precip
    }

    /// Returns the maximum accepted zero fraction.
    pub fn zero_max(&self) -> f64 {
        self.zero_max
    }

    /// Returns the degenerate-shape cutoff.
    pub fn max_shape(&self) -> f64 {
        self.max_shape
    }

    /// Returns the lower probability clip.
    pub fn prob_floor(&self) -> f64 {
        self.prob_floor
    }

    /// Returns the upper probability clip.
    pub fn prob_ceil(&self) -> f64 {
        self.prob_ceil
    }

    /// Returns the maximum chunk size in grid points.
    pub fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    /// Validates this configuration.
    ///
    /// Checks that `min_precip` is finite and non-negative, `zero_max` lies in
    /// `[0, 1]`, `max_shape` is positive (infinity disables the cutoff), the
    /// probability bounds satisfy `0 < prob_floor < prob_ceil < 1`, and
    /// `max_chunk` is at least 1.
    pub fn validate(&self) -> Result<(), SpiError> {
        if !self.min_precip.is_finite() || self.min_precip < 0.0 {
            return Err(SpiError::InvalidConfig {
                reason: format!(
                    "min_precip must be finite and >= 0, got {}",
                    self.min_precip
                ),
            });
        }

        if !(0.0..=1.0).contains(&self.zero_max) {
            return Err(SpiError::InvalidConfig {
                reason: format!("zero_max must be in [0, 1], got {}", self.zero_max),
            });
        }

        if self.max_shape.is_nan() || self.max_shape <= 0.0 {
            return Err(SpiError::InvalidConfig {
                reason: format!("max_shape must be > 0, got {}", self.max_shape),
            });
        }

        let bounds_ok = self.prob_floor > 0.0
            && self.prob_floor < self.prob_ceil
            && self.prob_ceil < 1.0;
        if !bounds_ok {
            return Err(SpiError::InvalidConfig {
                reason: format!(
                    "probability bounds must satisfy 0 < floor < ceil < 1, got [{}, {}]",
                    self.prob_floor, self.prob_ceil
                ),
            });
        }

        if self.max_chunk < 1 {
            return Err(SpiError::InvalidConfig {
                reason: format!("max_chunk must be >= 1, got {}", self.max_chunk),
            });
        }

        Ok(())
    }
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = SpiConfig::new();
        assert!((cfg.min_precip() - 0.03).abs() < f64::EPSILON);
        assert!((cfg.zero_max() - 1.0 / 3.0).abs() < f64::EPSILON);
        assert!((cfg.max_shape() - 1000.0).abs() < f64::EPSILON);
        assert!((cfg.prob_floor() - 0.001).abs() < f64::EPSILON);
        assert!((cfg.prob_ceil() - 0.999).abs() < f64::EPSILON);
        assert_eq!(cfg.max_chunk(), 50_000);
    }

    #[test]
    fn builder_chaining() {
        let cfg = SpiConfig::new()
            .with_min_precip(0.1)
            .with_zero_max(0.5)
            .with_max_shape(f64::INFINITY)
            .with_prob_bounds(0.01, 0.99)
            .with_max_chunk(7);

        assert!((cfg.min_precip() - 0.1).abs() < f64::EPSILON);
        assert!((cfg.zero_max() - 0.5).abs() < f64::EPSILON);
        assert!(cfg.max_shape().is_infinite());
        assert!((cfg.prob_floor() - 0.01).abs() < f64::EPSILON);
        assert!((cfg.prob_ceil() - 0.99).abs() < f64::EPSILON);
        assert_eq!(cfg.max_chunk(), 7);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_ok() {
        assert!(SpiConfig::new().validate().is_ok());
    }

    #[test]
    fn validate_negative_min_precip() {
        assert!(SpiConfig::new().with_min_precip(-0.1).validate().is_err());
        assert!(SpiConfig::new().with_min_precip(f64::NAN).validate().is_err());
    }

    #[test]
    fn validate_zero_max_range() {
        assert!(SpiConfig::new().with_zero_max(0.0).validate().is_ok());
        assert!(SpiConfig::new().with_zero_max(1.0).validate().is_ok());
        assert!(SpiConfig::new().with_zero_max(1.1).validate().is_err());
        assert!(SpiConfig::new().with_zero_max(f64::NAN).validate().is_err());
    }

    #[test]
    fn validate_max_shape() {
        assert!(SpiConfig::new().with_max_shape(0.0).validate().is_err());
        assert!(SpiConfig::new().with_max_shape(f64::NAN).validate().is_err());
    }

    #[test]
    fn validate_prob_bounds() {
        assert!(SpiConfig::new().with_prob_bounds(0.0, 0.9).validate().is_err());
        assert!(SpiConfig::new().with_prob_bounds(0.1, 1.0).validate().is_err());
        assert!(SpiConfig::new().with_prob_bounds(0.6, 0.4).validate().is_err());
    }

    #[test]
    fn validate_zero_chunk() {
        assert!(SpiConfig::new().with_max_chunk(0).validate().is_err());
    }
}
