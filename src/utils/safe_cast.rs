//! Safe casting utilities for fixed-point quantization

/// Quantize `value * scale` to the nearest i32, saturating at the word range.
///
/// NaN quantizes to zero.
#[must_use]
#[allow(clippy::cast_possible_truncation)] // Clamping ensures safe truncation
pub fn quantize(value: f64, scale: f64) -> i32 {
    let scaled = (value * scale).round();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32
}

/// Inverse of [`quantize`]
#[must_use]
pub fn dequantize(word: i32, scale: f64) -> f64 {
    f64::from(word) / scale
}
