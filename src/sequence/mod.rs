//! Timed calibration target sequences.
//!
//! A sequence is a tree of [`Segment`]s. Primitive segments describe what the
//! target does over their own duration; [`Segment::List`] plays its children
//! back to back. The composite patterns (grid, scans, zigzag) are expanded by
//! the functions in [`generators`] into plain lists at construction time.

/// Pure constructors for primitive and composite segments
pub mod generators;

/// Calibration templates and the default production sequence
pub mod template;

/// Cooperative tick loop with cancellation
pub mod run;

use crate::{constants::MESSAGE_FADE_SECS, landmarks::Point2D, utils::phase, Error, Result};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

pub use generators::{grid, message, scan_x, scan_y, zigzag};
pub use run::{CalibrationRun, CancellationToken, Tick};
pub use template::{MessageSpec, SequenceSpec, SequenceTemplate, Speed};

/// How far a pulse shrinks the target at mid-cycle
const PULSE_DEPTH: f64 = 0.5;

/// Direction of an opacity ramp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeDirection {
    In,
    Out,
}

/// One node of a calibration timeline
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Nothing shown
    Wait { duration: f64 },
    /// Target held in place while its size pulses
    Pulse { x: f64, y: f64, duration: f64 },
    /// Target held in place while its opacity ramps
    Fade {
        x: f64,
        y: f64,
        duration: f64,
        direction: FadeDirection,
    },
    /// Target sweeping linearly from `start` to `end`
    Move { start: Point2D, end: Point2D, duration: f64 },
    /// Text shown instead of a target
    Message {
        text: String,
        duration: f64,
        show_elapsed: bool,
    },
    /// Children played back to back
    List(SegmentList),
}

/// Ordered children with their total duration fixed at construction
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentList {
    children: Vec<Segment>,
    duration: f64,
}

impl SegmentList {
    #[must_use]
    pub fn new(children: Vec<Segment>) -> Self {
        let duration = children.iter().map(Segment::duration).sum();
        Self { children, duration }
    }

    #[must_use]
    pub fn children(&self) -> &[Segment] {
        &self.children
    }

    #[must_use]
    pub const fn duration(&self) -> f64 {
        self.duration
    }
}

/// Leaf segment resolved for a query time, with the offset into it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Located<'a> {
    pub segment: &'a Segment,
    pub local: f64,
}

/// What the renderer should show at a point in time
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct TargetPoint {
    /// Target position in normalized screen coordinates, if a target is shown
    pub position: Option<Point2D>,
    /// Scale modifier for the target
    pub size: Option<f64>,
    /// Target or message opacity
    pub opacity: Option<f64>,
    /// Whether samples should be recorded against this target
    pub recording: bool,
    /// Text to display
    pub message: Option<String>,
}

impl TargetPoint {
    /// Nothing shown, nothing recorded
    #[must_use]
    pub fn hidden() -> Self {
        Self::default()
    }

    fn target(position: Point2D, size: f64, opacity: f64, recording: bool) -> Self {
        Self {
            position: Some(position),
            size: Some(size),
            opacity: Some(opacity),
            recording,
            message: None,
        }
    }
}

impl Segment {
    /// Wrap children into a list segment
    #[must_use]
    pub fn list(children: Vec<Segment>) -> Self {
        Self::List(SegmentList::new(children))
    }

    /// Duration in seconds; lists report their cached total
    #[must_use]
    pub const fn duration(&self) -> f64 {
        match self {
            Self::Wait { duration }
            | Self::Pulse { duration, .. }
            | Self::Fade { duration, .. }
            | Self::Move { duration, .. }
            | Self::Message { duration, .. } => *duration,
            Self::List(list) => list.duration(),
        }
    }

    /// Short tag for logs and the CLI
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Wait { .. } => "wait",
            Self::Pulse { .. } => "pulse",
            Self::Fade { .. } => "fade",
            Self::Move { .. } => "move",
            Self::Message { .. } => "message",
            Self::List(_) => "list",
        }
    }

    /// Resolve the leaf segment active at local time `t`.
    ///
    /// Lists walk their children accumulating elapsed time until the child
    /// whose window contains `t`, then recurse with the offset into it. Times
    /// past the end resolve to the last child. No state is kept between
    /// calls, so queries may arrive in any order.
    #[must_use]
    pub fn locate(&self, t: f64) -> Located<'_> {
        let Self::List(list) = self else {
            return Located { segment: self, local: t };
        };

        let mut elapsed = 0.0;
        for child in &list.children {
            let duration = child.duration();
            if t < elapsed + duration {
                return child.locate(t - elapsed);
            }
            elapsed += duration;
        }

        match list.children.last() {
            Some(last) => last.locate(t - (elapsed - last.duration())),
            None => Located { segment: self, local: t },
        }
    }

    /// Target state at local time `t`
    #[must_use]
    pub fn point_at(&self, t: f64) -> TargetPoint {
        match self {
            Self::Wait { .. } => TargetPoint::hidden(),
            Self::Pulse { x, y, duration } => {
                let size = 1.0 - PULSE_DEPTH * (PI * phase(t, *duration)).sin();
                TargetPoint::target(Point2D::new(*x, *y), size, 1.0, true)
            }
            Self::Fade {
                x,
                y,
                duration,
                direction,
            } => {
                let p = phase(t, *duration);
                let opacity = match direction {
                    FadeDirection::In => p,
                    FadeDirection::Out => 1.0 - p,
                };
                TargetPoint::target(Point2D::new(*x, *y), 1.0, opacity, false)
            }
            Self::Move { start, end, duration } => {
                TargetPoint::target(start.lerp(end, phase(t, *duration)), 1.0, 1.0, true)
            }
            Self::Message {
                text,
                duration,
                show_elapsed,
            } => message_point(text, t, *duration, *show_elapsed),
            Self::List(list) => {
                if list.children.is_empty() {
                    TargetPoint::hidden()
                } else {
                    let located = self.locate(t);
                    located.segment.point_at(located.local)
                }
            }
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // Non-negative and bounded by the hold time
fn message_point(text: &str, t: f64, duration: f64, show_elapsed: bool) -> TargetPoint {
    let fade_in = (t / MESSAGE_FADE_SECS).clamp(0.0, 1.0);
    let fade_out = ((duration - t) / MESSAGE_FADE_SECS).clamp(0.0, 1.0);

    let message = if show_elapsed {
        let hold = (duration - 2.0 * MESSAGE_FADE_SECS).max(0.0);
        let seconds = (t - MESSAGE_FADE_SECS).clamp(0.0, hold).floor() as u64;
        format!("{text} ({seconds})")
    } else {
        text.to_string()
    };

    TargetPoint {
        position: None,
        size: None,
        opacity: Some(fade_in.min(fade_out)),
        recording: false,
        message: Some(message),
    }
}

/// A built calibration timeline with its total duration fixed once
#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationSequencer {
    root: Segment,
    duration: f64,
}

impl CalibrationSequencer {
    /// Wrap an already expanded segment tree
    #[must_use]
    pub fn new(root: Segment) -> Self {
        let duration = root.duration();
        Self { root, duration }
    }

    /// Expand a sequence description into its timeline
    ///
    /// # Errors
    ///
    /// Returns an error if the description fails validation
    pub fn build(spec: &SequenceSpec) -> Result<Self> {
        spec.validate()?;
        let sequencer = Self::new(spec.expand());
        if !sequencer.duration.is_finite() || sequencer.duration <= 0.0 {
            return Err(Error::SequenceError(format!(
                "Sequence has invalid total duration {}",
                sequencer.duration
            )));
        }
        log::debug!(
            "Built {:?} sequence: size {}, {:.2}s",
            spec.template,
            spec.size,
            sequencer.duration
        );
        Ok(sequencer)
    }

    #[must_use]
    pub const fn duration(&self) -> f64 {
        self.duration
    }

    #[must_use]
    pub const fn root(&self) -> &Segment {
        &self.root
    }

    /// Leaf segment and local offset at `t`, clamped into the timeline
    #[must_use]
    pub fn locate(&self, t: f64) -> Located<'_> {
        self.root.locate(t.clamp(0.0, self.duration))
    }

    /// Target state at `t`, clamped into the timeline
    #[must_use]
    pub fn point_at(&self, t: f64) -> TargetPoint {
        self.root.point_at(t.clamp(0.0, self.duration))
    }
}
