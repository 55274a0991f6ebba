use super::PointFilter;
use crate::landmarks::Point2D;
use std::collections::VecDeque;

/// Moving average filter
pub struct MovingAverageFilter {
    window_size: usize,
    buffer: VecDeque<Point2D>,
}

impl MovingAverageFilter {
    pub fn new(window_size: usize) -> Self {
        assert!(window_size > 0, "Window size must be greater than 0");
        Self {
            window_size,
            buffer: VecDeque::with_capacity(window_size),
        }
    }
}

impl PointFilter for MovingAverageFilter {
    #[allow(clippy::cast_precision_loss)] // Window sizes are small
    fn apply(&mut self, point: Point2D) -> Point2D {
        if self.buffer.len() >= self.window_size {
            self.buffer.pop_front();
        }
        self.buffer.push_back(point);

        let n = self.buffer.len() as f64;
        let (sx, sy) = self.buffer.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2D::new(sx / n, sy / n)
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }

    fn name(&self) -> &str {
        "MovingAverageFilter"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average() {
        let mut filter = MovingAverageFilter::new(3);

        assert_eq!(filter.apply(Point2D::new(1.0, 2.0)), Point2D::new(1.0, 2.0));
        assert_eq!(filter.apply(Point2D::new(2.0, 3.0)), Point2D::new(1.5, 2.5));
        assert_eq!(filter.apply(Point2D::new(3.0, 4.0)), Point2D::new(2.0, 3.0));

        // Window is full, oldest value should be dropped
        assert_eq!(filter.apply(Point2D::new(4.0, 5.0)), Point2D::new(3.0, 4.0));
    }
}
