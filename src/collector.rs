//! Pairing of landmark frames with known target positions.

use crate::landmarks::{LandmarkFrame, Point2D};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Tag identifying how a sample was elicited (e.g. the sequence template)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MethodId(String);

impl MethodId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for MethodId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for MethodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One training observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub features: LandmarkFrame,
    pub target: Point2D,
    pub method: MethodId,
}

/// Callback reporting where the visible target currently is
pub type PositionGetter = Box<dyn Fn() -> Point2D + Send>;

/// Buffers samples while sampling is enabled.
///
/// The collector knows nothing about segments: whoever drives the sequence
/// turns sampling on and off to match the active segment.
#[derive(Default)]
pub struct SampleCollector {
    method: Option<MethodId>,
    position_getter: Option<PositionGetter>,
    samples: Vec<Sample>,
}

impl SampleCollector {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tagging incoming frames with `method`
    pub fn start_sampling(&mut self, method: MethodId) {
        if self.method.as_ref() != Some(&method) {
            log::trace!("Sampling enabled for method {method}");
        }
        self.method = Some(method);
    }

    pub fn stop_sampling(&mut self) {
        self.method = None;
    }

    #[must_use]
    pub const fn is_sampling(&self) -> bool {
        self.method.is_some()
    }

    pub fn set_position_getter(&mut self, getter: PositionGetter) {
        self.position_getter = Some(getter);
    }

    pub fn clear_position_getter(&mut self) {
        self.position_getter = None;
    }

    /// Offer a frame; returns whether it was recorded
    pub fn on_frame(&mut self, frame: &LandmarkFrame) -> bool {
        let (Some(method), Some(getter)) = (&self.method, &self.position_getter) else {
            return false;
        };
        self.samples.push(Sample {
            features: frame.clone(),
            target: getter(),
            method: method.clone(),
        });
        true
    }

    #[must_use]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Hand the buffered samples over, leaving the buffer empty
    pub fn take_samples(&mut self) -> Vec<Sample> {
        std::mem::take(&mut self.samples)
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl fmt::Debug for SampleCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleCollector")
            .field("method", &self.method)
            .field("has_position_getter", &self.position_getter.is_some())
            .field("samples", &self.samples.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_collects_nothing() {
        let mut collector = SampleCollector::new();
        collector.set_position_getter(Box::new(|| Point2D::new(0.5, 0.5)));
        for _ in 0..10 {
            assert!(!collector.on_frame(&LandmarkFrame::empty(640.0, 480.0)));
        }
        assert!(collector.is_empty());
    }

    #[test]
    fn test_requires_position_getter() {
        let mut collector = SampleCollector::new();
        collector.start_sampling(MethodId::from("scan_xy"));
        assert!(!collector.on_frame(&LandmarkFrame::empty(640.0, 480.0)));
        assert!(collector.is_empty());
    }

    #[test]
    fn test_enabled_collects_every_frame() {
        let mut collector = SampleCollector::new();
        collector.set_position_getter(Box::new(|| Point2D::new(0.25, 0.75)));
        collector.start_sampling(MethodId::from("grid"));

        for _ in 0..7 {
            assert!(collector.on_frame(&LandmarkFrame::empty(640.0, 480.0)));
        }
        assert_eq!(collector.len(), 7);
        assert!(collector
            .samples()
            .iter()
            .all(|s| s.method.as_str() == "grid" && s.target == Point2D::new(0.25, 0.75)));

        collector.stop_sampling();
        assert!(!collector.on_frame(&LandmarkFrame::empty(640.0, 480.0)));

        let taken = collector.take_samples();
        assert_eq!(taken.len(), 7);
        assert!(collector.is_empty());
    }
}
