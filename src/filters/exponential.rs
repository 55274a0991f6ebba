use super::PointFilter;
use crate::landmarks::Point2D;

/// Exponential smoothing filter
pub struct ExponentialFilter {
    alpha: f64,
    last: Option<Point2D>,
}

impl ExponentialFilter {
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "Alpha must be in (0, 1]");
        Self { alpha, last: None }
    }
}

impl PointFilter for ExponentialFilter {
    fn apply(&mut self, point: Point2D) -> Point2D {
        let filtered = match self.last {
            Some(last) => last.lerp(&point, self.alpha),
            None => point,
        };
        self.last = Some(filtered);
        filtered
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}
