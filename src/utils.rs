//! Small numeric helpers shared by the codec and the sequence generators.

pub mod safe_cast;

/// Evenly spaced position of step `index` out of `count` along `[0, 1]`.
///
/// A single step sits in the middle of the axis.
#[must_use]
#[allow(clippy::cast_precision_loss)] // Grid sizes are tiny
pub fn grid_fraction(index: usize, count: usize) -> f64 {
    if count <= 1 {
        0.5
    } else {
        index as f64 / (count - 1) as f64
    }
}

/// Clamp `t / duration` into `[0, 1]`, treating empty durations as complete
#[must_use]
pub fn phase(t: f64, duration: f64) -> f64 {
    if duration <= 0.0 {
        1.0
    } else {
        (t / duration).clamp(0.0, 1.0)
    }
}
