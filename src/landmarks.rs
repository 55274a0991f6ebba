//! Landmark frame data model and framing metrics.
//!
//! A [`LandmarkFrame`] always holds exactly [`NUM_FACIAL_LANDMARKS`] points.
//! When the detector finds no face it reports a zero-filled frame of the same
//! shape, so consumers only ever check whether values are degenerate.

use crate::{
    constants::{
        BORDER_RATIO, CENTERING_TOLERANCE, FACE_EDGE_LEFT, FACE_EDGE_RIGHT, FACE_RATIO_MAX, FACE_RATIO_MIN,
        NUM_FACIAL_LANDMARKS, PUPIL_LEFT, PUPIL_RIGHT,
    },
    Error, Result,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A point in normalized screen coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f64,
    pub y: f64,
}

impl Point2D {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    /// Linear interpolation towards `other` at `t` in `[0, 1]`
    #[must_use]
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        Self::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

/// A single 3D landmark in video-relative units
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Projection onto the image plane
    #[must_use]
    pub const fn xy(&self) -> Point2D {
        Point2D::new(self.x, self.y)
    }

    /// Euclidean distance in 3D
    #[must_use]
    pub fn distance(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Frame border the face is drifting out of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Top => "top",
            Self::Bottom => "bottom",
        };
        f.write_str(name)
    }
}

/// One frame of facial landmarks plus the source frame dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    points: Vec<Point3>,
    pub width: f64,
    pub height: f64,
    pub timestamp: Option<f64>,
}

impl LandmarkFrame {
    /// Create a frame from detector output
    ///
    /// # Errors
    ///
    /// Returns an error if `points` does not hold exactly [`NUM_FACIAL_LANDMARKS`] entries
    pub fn new(points: Vec<Point3>, width: f64, height: f64) -> Result<Self> {
        if points.len() != NUM_FACIAL_LANDMARKS {
            return Err(Error::InvalidInput(format!(
                "Expected {NUM_FACIAL_LANDMARKS} landmarks, got {}",
                points.len()
            )));
        }
        Ok(Self {
            points,
            width,
            height,
            timestamp: None,
        })
    }

    /// Zero-filled frame reported when no face was found
    #[must_use]
    pub fn empty(width: f64, height: f64) -> Self {
        Self {
            points: vec![Point3::default(); NUM_FACIAL_LANDMARKS],
            width,
            height,
            timestamp: None,
        }
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn points(&self) -> &[Point3] {
        &self.points
    }

    /// Landmark at `index`; every index below [`NUM_FACIAL_LANDMARKS`] is present
    #[must_use]
    pub fn point(&self, index: usize) -> Point3 {
        self.points.get(index).copied().unwrap_or_default()
    }

    /// Mutable access for detectors filling a frame in place
    pub fn points_mut(&mut self) -> &mut [Point3] {
        &mut self.points
    }

    /// Source aspect ratio (width / height)
    #[must_use]
    pub fn aspect(&self) -> f64 {
        if self.height.abs() < f64::EPSILON {
            1.0
        } else {
            self.width / self.height
        }
    }

    /// True for the zero-filled "no face" frame
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.points.iter().all(|p| p.x == 0.0 && p.y == 0.0 && p.z == 0.0)
    }

    #[must_use]
    pub fn left_pupil(&self) -> Point3 {
        self.point(PUPIL_LEFT)
    }

    #[must_use]
    pub fn right_pupil(&self) -> Point3 {
        self.point(PUPIL_RIGHT)
    }

    /// Width of the face relative to the frame, measured edge to edge
    #[must_use]
    pub fn face_ratio(&self) -> f64 {
        self.point(FACE_EDGE_LEFT).xy().distance(&self.point(FACE_EDGE_RIGHT).xy())
    }

    /// Score in `[0, 1]` describing how well the face is framed; 1 is ideal.
    ///
    /// The face-to-screen ratio is scored with a dead-band between
    /// [`FACE_RATIO_MIN`] and [`FACE_RATIO_MAX`], the pupil midpoint with a
    /// centring tolerance per axis. The ratio score is cubed and the centring
    /// score squared so any departure from the ideal window drops quickly.
    #[must_use]
    pub fn quality_metric(&self) -> f64 {
        let d = self.face_ratio();
        let f2s = if d < FACE_RATIO_MIN {
            d / FACE_RATIO_MIN
        } else if d > FACE_RATIO_MAX {
            1.0 - (d - FACE_RATIO_MAX) / (1.0 - FACE_RATIO_MAX)
        } else {
            1.0
        }
        .clamp(0.0, 1.0);

        let center = self.left_pupil().xy().lerp(&self.right_pupil().xy(), 0.5);
        let xerr = centering_score(center.x);
        let yerr = centering_score(center.y);
        let cerr = xerr * yerr * yerr;

        let score = f2s.powi(3) * cerr * cerr;
        if score.is_finite() {
            score.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    /// Which border the pupils have drifted into, if any.
    ///
    /// Horizontal checks win over vertical ones. The vertical band is the
    /// border ratio scaled by the frame aspect.
    #[must_use]
    pub fn is_outside(&self) -> Option<Edge> {
        let left = self.left_pupil();
        let right = self.right_pupil();
        let vertical = BORDER_RATIO * self.aspect();

        if left.x < BORDER_RATIO {
            Some(Edge::Left)
        } else if right.x > 1.0 - BORDER_RATIO {
            Some(Edge::Right)
        } else if left.y < vertical || right.y < vertical {
            Some(Edge::Top)
        } else if left.y > 1.0 - vertical || right.y > 1.0 - vertical {
            Some(Edge::Bottom)
        } else {
            None
        }
    }
}

/// Landmark detector run on every captured video frame.
///
/// Implementations report [`LandmarkFrame::empty`] when no face is visible.
pub trait LandmarkDetector: Send {
    fn detect(&mut self, image: &[u8], width: u32, height: u32) -> LandmarkFrame;
}

/// Per-axis centring score in `[0, 1]`
fn centering_score(value: f64) -> f64 {
    let offset = (2.0 * (value - 0.5).abs() - CENTERING_TOLERANCE).clamp(0.0, 1.0);
    (1.0 - offset / (1.0 - CENTERING_TOLERANCE)).clamp(0.0, 1.0)
}
