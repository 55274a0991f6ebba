//! Temporal smoothing filters for predicted gaze points.
//!
//! Raw per-frame predictions jitter; every model owns one of these filters
//! and runs its output through it, so the filter state lives exactly as long
//! as the model does.

/// Kalman filter with a constant-velocity motion model
pub mod kalman;

/// Moving average filter for simple smoothing
pub mod moving_average;

/// Exponential filter for responsive smoothing
pub mod exponential;

use crate::{
    constants::{DEFAULT_EXPONENTIAL_ALPHA, DEFAULT_MOVING_AVERAGE_WINDOW},
    landmarks::Point2D,
    Error, Result,
};

/// Trait for all point filters
pub trait PointFilter: Send + Sync {
    /// Feed one raw point and get the smoothed estimate
    fn apply(&mut self, point: Point2D) -> Point2D;

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes through values unchanged
pub struct NoFilter;

impl PointFilter for NoFilter {
    fn apply(&mut self, point: Point2D) -> Point2D {
        point
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

fn parse_param<T: std::str::FromStr>(spec: &str, value: Option<&str>, default: T) -> Result<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| Error::FilterError(format!("Invalid parameter '{raw}' in filter spec '{spec}'"))),
    }
}

/// Create a filter from a spec of the form `name[:param]`.
///
/// Known names: `none`, `exponential[:alpha]`, `movingaverage[:window]`,
/// `kalman`.
///
/// # Errors
///
/// Returns an error for unknown names or out-of-range parameters
pub fn create_filter(spec: &str) -> Result<Box<dyn PointFilter>> {
    let lowered = spec.to_lowercase();
    let mut parts = lowered.split(':');
    let name = parts.next().unwrap_or_default();
    let param = parts.next();

    match name {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "kalman" => Ok(Box::new(kalman::KalmanFilter::new())),
        "exponential" => {
            let alpha = parse_param(spec, param, DEFAULT_EXPONENTIAL_ALPHA)?;
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(Error::FilterError(format!("Alpha must be in (0, 1], got {alpha}")));
            }
            Ok(Box::new(exponential::ExponentialFilter::new(alpha)))
        }
        "moving_average" | "movingaverage" => {
            let window = parse_param(spec, param, DEFAULT_MOVING_AVERAGE_WINDOW)?;
            if window == 0 {
                return Err(Error::FilterError("Window size must be greater than 0".to_string()));
            }
            Ok(Box::new(moving_average::MovingAverageFilter::new(window)))
        }
        _ => Err(Error::FilterError(format!("Unknown filter type: {spec}"))),
    }
}
