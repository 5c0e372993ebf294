//! Series statistics — pure numeric helpers over close-price slices.
//!
//! Offsets count back from the end of a series with the latest value as offset 1,
//! so `value_at_offset(closes, 63)` is `closes[len - 63]`.

use crate::error::ScreenError;

/// Rolling mean over a trailing window, NaN-padded for the first `window - 1` slots.
///
/// A NaN anywhere inside a window yields NaN for that slot.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || n < window {
        return result;
    }

    let mut sum: f64 = values[..window].iter().sum();
    result[window - 1] = sum / window as f64;

    for i in window..n {
        let leaving = values[i - window];
        let entering = values[i];
        if leaving.is_nan() || entering.is_nan() || result[i - 1].is_nan() {
            // Rescan so a NaN that left the window stops poisoning the sum.
            sum = values[(i + 1 - window)..=i].iter().sum();
        } else {
            sum = sum - leaving + entering;
        }
        result[i] = sum / window as f64;
    }

    result
}

/// Arithmetic mean of the last `window` values.
pub fn trailing_mean(values: &[f64], window: usize) -> Result<f64, ScreenError> {
    if window == 0 || values.len() < window {
        return Err(ScreenError::insufficient(window, values.len()));
    }
    mean(&values[values.len() - window..])
}

pub fn mean(values: &[f64]) -> Result<f64, ScreenError> {
    if values.is_empty() {
        return Err(ScreenError::insufficient(1, 0));
    }
    finite(values.iter().sum::<f64>() / values.len() as f64, "mean")
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> Result<f64, ScreenError> {
    if values.len() < 2 {
        return Err(ScreenError::insufficient(2, values.len()));
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    finite(var.sqrt(), "standard deviation")
}

/// Simple return from `from` to `to`: `to / from - 1`.
pub fn simple_return(from: f64, to: f64) -> Result<f64, ScreenError> {
    if from.is_nan() || from <= 0.0 || !to.is_finite() {
        return Err(ScreenError::computation(format!(
            "return base {from} -> {to} is not usable"
        )));
    }
    finite(to / from - 1.0, "simple return")
}

/// Value `offset` observations back from the end (offset 1 = latest).
pub fn value_at_offset(values: &[f64], offset: usize) -> Result<f64, ScreenError> {
    if offset == 0 || values.len() < offset {
        return Err(ScreenError::insufficient(offset, values.len()));
    }
    Ok(values[values.len() - offset])
}

/// Simple return from the value `offset` observations back to the latest value.
pub fn return_over(values: &[f64], offset: usize) -> Result<f64, ScreenError> {
    let from = value_at_offset(values, offset)?;
    let to = value_at_offset(values, 1)?;
    simple_return(from, to)
}

/// Period-over-period percentage returns (`len - 1` values).
pub fn pct_returns(values: &[f64]) -> Result<Vec<f64>, ScreenError> {
    values
        .windows(2)
        .map(|w| simple_return(w[0], w[1]))
        .collect()
}

pub fn max(values: &[f64]) -> Result<f64, ScreenError> {
    if values.is_empty() {
        return Err(ScreenError::insufficient(1, 0));
    }
    finite(values.iter().copied().fold(f64::NEG_INFINITY, f64::max), "max")
}

pub fn min(values: &[f64]) -> Result<f64, ScreenError> {
    if values.is_empty() {
        return Err(ScreenError::insufficient(1, 0));
    }
    finite(values.iter().copied().fold(f64::INFINITY, f64::min), "min")
}

/// The last `window` values, or the whole slice if it is shorter.
pub fn tail(values: &[f64], window: usize) -> &[f64] {
    &values[values.len().saturating_sub(window)..]
}

/// Percentile of rank position `rank` (0 = best) within a cohort of `count`.
///
/// `100 * (count - rank) / count`, so the best rank maps to 100.
pub fn percentile_rank(rank: usize, count: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    100.0 * (count.saturating_sub(rank)) as f64 / count as f64
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

fn finite(value: f64, what: &str) -> Result<f64, ScreenError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ScreenError::computation(format!("{what} is not finite")))
    }
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for numeric tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
