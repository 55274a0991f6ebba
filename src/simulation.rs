//! Deterministic stand-ins for the camera and landmark detector.
//!
//! Used by the test suites, the benchmarks and the `simulate` subcommand to
//! drive a full calibration without hardware.

use crate::{
    collector::{MethodId, Sample},
    constants::{
        EYE_FEATURE_LANDMARKS, FACE_EDGE_LEFT, FACE_EDGE_RIGHT, NOSE_TIP, NUM_FACIAL_LANDMARKS, PUPIL_LEFT,
        PUPIL_RIGHT,
    },
    landmarks::{LandmarkFrame, Point2D, Point3},
    scheduler::FrameSource,
};

/// Angle between consecutive filler landmarks, spreads them evenly over the face
const GOLDEN_ANGLE: f64 = 2.399_963_229_728_653;

/// A perfectly still face whose irises follow the gaze target linearly
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticFace {
    /// Nose tip position in normalized frame coordinates
    pub center: Point2D,
    /// Edge-to-edge face width relative to the frame
    pub face_width: f64,
    /// Iris travel across the full screen width, in frame units
    pub gaze_range: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for SyntheticFace {
    fn default() -> Self {
        Self {
            center: Point2D::new(0.5, 0.5),
            face_width: 0.28,
            gaze_range: 0.04,
            width: 640.0,
            height: 480.0,
        }
    }
}

impl SyntheticFace {
    /// Same face moved so its nose tip sits at `center`
    #[must_use]
    pub fn with_center(mut self, center: Point2D) -> Self {
        self.center = center;
        self
    }

    /// Landmarks of this face looking at `target`
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn frame(&self, target: Point2D) -> LandmarkFrame {
        let fw = self.face_width;
        let c = self.center;
        let mut frame = LandmarkFrame::empty(self.width, self.height);
        let points = frame.points_mut();

        for (i, p) in points.iter_mut().enumerate() {
            let angle = i as f64 * GOLDEN_ANGLE;
            let radius = 0.45 * fw * ((i as f64 + 0.5) / NUM_FACIAL_LANDMARKS as f64).sqrt();
            *p = Point3::new(c.x + radius * angle.cos(), c.y + radius * angle.sin() * 1.3, 0.0);
        }

        points[NOSE_TIP] = Point3::new(c.x, c.y, -0.05);
        points[FACE_EDGE_LEFT] = Point3::new(c.x - fw / 2.0, c.y - 0.05 * fw, 0.02);
        points[FACE_EDGE_RIGHT] = Point3::new(c.x + fw / 2.0, c.y - 0.05 * fw, 0.02);

        let gaze = Point2D::new(
            (target.x - 0.5) * self.gaze_range,
            (target.y - 0.5) * self.gaze_range * 0.6,
        );
        let eye_centers = [
            Point2D::new(c.x - 0.2 * fw, c.y - 0.1 * fw),
            Point2D::new(c.x + 0.2 * fw, c.y - 0.1 * fw),
        ];
        for (side, eye_center) in eye_centers.into_iter().enumerate() {
            let lids = &EYE_FEATURE_LANDMARKS[side * 4..side * 4 + 4];
            points[lids[0]] = Point3::new(eye_center.x - 0.08 * fw, eye_center.y, 0.0);
            points[lids[1]] = Point3::new(eye_center.x + 0.08 * fw, eye_center.y, 0.0);
            points[lids[2]] = Point3::new(eye_center.x, eye_center.y - 0.03 * fw, 0.0);
            points[lids[3]] = Point3::new(eye_center.x, eye_center.y + 0.03 * fw, 0.0);

            let iris = Point2D::new(eye_center.x + gaze.x, eye_center.y + gaze.y);
            let pupil = if side == 0 { PUPIL_LEFT } else { PUPIL_RIGHT };
            let r = 0.02 * fw;
            points[pupil] = Point3::new(iris.x, iris.y, 0.0);
            points[pupil + 1] = Point3::new(iris.x + r, iris.y, 0.0);
            points[pupil + 2] = Point3::new(iris.x, iris.y - r, 0.0);
            points[pupil + 3] = Point3::new(iris.x - r, iris.y, 0.0);
            points[pupil + 4] = Point3::new(iris.x, iris.y + r, 0.0);
        }

        frame
    }

    /// Training sample pairing [`SyntheticFace::frame`] with its target
    #[must_use]
    pub fn sample(&self, target: Point2D, method: &str) -> Sample {
        Sample {
            features: self.frame(target),
            target,
            method: MethodId::from(method),
        }
    }
}

/// Camera double that records how often it was started and stopped
#[derive(Debug, Clone, Default)]
pub struct SimulatedCamera {
    /// When set, every start attempt fails
    pub unavailable: bool,
    running: bool,
    starts: usize,
    stops: usize,
}

impl SimulatedCamera {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    #[must_use]
    pub const fn starts(&self) -> usize {
        self.starts
    }

    #[must_use]
    pub const fn stops(&self) -> usize {
        self.stops
    }
}

impl FrameSource for SimulatedCamera {
    fn start(&mut self) -> bool {
        if self.unavailable {
            return false;
        }
        self.running = true;
        self.starts += 1;
        true
    }

    fn stop(&mut self) {
        self.running = false;
        self.stops += 1;
    }
}
