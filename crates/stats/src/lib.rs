//! Statistical helpers and special functions for the spidi crates.
//!
//! The SPI kernels need three special functions besides plain moments:
//! digamma and trigamma for the Newton refinement of the gamma shape, and the
//! inverse standard-normal CDF for the final standardization. Digamma and the
//! inverse complementary error function come from `statrs`; trigamma is not
//! provided there and is evaluated here by recurrence plus an asymptotic series.

use statrs::function::{erf, gamma};

/// Arithmetic mean of a slice. Returns 0.0 if empty.
pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    let sum: f64 = data.iter().sum();
    sum / data.len() as f64
}

/// Sample variance with N-1 denominator.
/// Returns 0.0 if fewer than 2 elements.
pub fn variance(data: &[f64]) -> f64 {
    let n = data.len();
    if n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let mean = data.iter().sum::<f64>() / nf;
    data.iter().map(|&x| (x - mean) * (x - mean)).sum::<f64>() / (nf - 1.0)
}

/// Sample standard deviation with N-1 denominator.
/// Returns 0.0 if fewer than 2 elements.
pub fn sd(data: &[f64]) -> f64 {
    variance(data).sqrt()
}

/// Digamma function ψ(x), the derivative of ln Γ(x).
pub fn digamma(x: f64) -> f64 {
    gamma::digamma(x)
}

/// Trigamma function ψ₁(x), the derivative of digamma.
///
/// Defined here for `x > 0` only; returns NaN for non-positive or NaN input.
/// Small arguments are shifted above 6 with ψ₁(x) = ψ₁(x + 1) + 1/x², then
/// the asymptotic expansion is summed to the x⁻⁹ term.
pub fn trigamma(x: f64) -> f64 {
    if x.is_nan() || x <= 0.0 {
        return f64::NAN;
    }

    let mut x = x;
    let mut acc = 0.0;
    while x < 6.0 {
        acc += 1.0 / (x * x);
        x += 1.0;
    }

    let inv = 1.0 / x;
    let inv2 = inv * inv;
    let tail = inv * inv2 * (1.0 / 6.0 - inv2 * (1.0 / 30.0 - inv2 * (1.0 / 42.0 - inv2 / 30.0)));
    acc + inv + 0.5 * inv2 + tail
}

/// Inverse CDF of the standard normal distribution.
///
/// Uses Φ⁻¹(p) = −√2 · erfc⁻¹(2p). Returns NaN outside `[0, 1]`, and ∓∞ at
/// the closed ends.
pub fn normal_quantile(p: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }
    -std::f64::consts::SQRT_2 * erf::erfc_inv(2.0 * p)
}
