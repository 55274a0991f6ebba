use super::PointFilter;
use crate::landmarks::Point2D;
use nalgebra::{Matrix2, Matrix4, Vector2, Vector4};

type Matrix2x4<T> = nalgebra::Matrix<T, nalgebra::U2, nalgebra::U4, nalgebra::ArrayStorage<T, 2, 4>>;

/// Kalman filter tracking gaze position and velocity
pub struct KalmanFilter {
    // State: [x, y, vx, vy]
    state: Vector4<f64>,
    covariance: Matrix4<f64>,
    process_noise: Matrix4<f64>,
    measurement_noise: Matrix2<f64>,
    transition: Matrix4<f64>,
    measurement: Matrix2x4<f64>,
    initialized: bool,
}

impl KalmanFilter {
    /// Filter tuned for normalized screen coordinates at 30 frames per second
    pub fn new() -> Self {
        Self::with_noise(1.0 / 30.0, 1.0, 1e-3)
    }

    /// Filter for frame interval `dt`, process noise `q` and measurement noise `r`
    pub fn with_noise(dt: f64, q: f64, r: f64) -> Self {
        let transition = Matrix4::new(
            1.0, 0.0, dt, 0.0,
            0.0, 1.0, 0.0, dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        // We only measure position
        let measurement = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );

        let process_noise = Matrix4::new(
            q * dt.powi(4) / 4.0, 0.0, q * dt.powi(3) / 2.0, 0.0,
            0.0, q * dt.powi(4) / 4.0, 0.0, q * dt.powi(3) / 2.0,
            q * dt.powi(3) / 2.0, 0.0, q * dt.powi(2), 0.0,
            0.0, q * dt.powi(3) / 2.0, 0.0, q * dt.powi(2),
        );

        let measurement_noise = Matrix2::new(
            r, 0.0,
            0.0, r,
        );

        Self {
            state: Vector4::zeros(),
            covariance: Matrix4::identity(),
            process_noise,
            measurement_noise,
            transition,
            measurement,
            initialized: false,
        }
    }

    fn predict(&mut self) {
        self.state = self.transition * self.state;
        self.covariance = self.transition * self.covariance * self.transition.transpose() + self.process_noise;
    }

    fn update(&mut self, measurement: Vector2<f64>) {
        let innovation = measurement - self.measurement * self.state;
        let innovation_cov = self.measurement * self.covariance * self.measurement.transpose() + self.measurement_noise;

        // A singular innovation covariance leaves the prediction untouched
        let Some(inverse) = innovation_cov.try_inverse() else {
            log::debug!("Kalman innovation covariance is singular, skipping update");
            return;
        };
        let gain = self.covariance * self.measurement.transpose() * inverse;

        self.state += gain * innovation;
        self.covariance = (Matrix4::identity() - gain * self.measurement) * self.covariance;
    }
}

impl Default for KalmanFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl PointFilter for KalmanFilter {
    fn apply(&mut self, point: Point2D) -> Point2D {
        if !self.initialized {
            self.state = Vector4::new(point.x, point.y, 0.0, 0.0);
            self.initialized = true;
            return point;
        }

        self.predict();
        self.update(Vector2::new(point.x, point.y));
        Point2D::new(self.state[0], self.state[1])
    }

    fn reset(&mut self) {
        self.state = Vector4::zeros();
        self.covariance = Matrix4::identity();
        self.initialized = false;
    }

    fn name(&self) -> &str {
        "KalmanFilter"
    }
}
