//! Cooperative playback of a calibration timeline.

use super::{CalibrationSequencer, TargetPoint};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

/// Shared flag asking a running calibration to stop at its next tick
///
/// Cancellation is one-way: a cancelled token stays cancelled, so every
/// calibration attempt needs its own fresh token.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Result of one sequencer tick
#[derive(Debug, Clone, PartialEq)]
pub enum Tick {
    /// Still playing; render this target
    Running(TargetPoint),
    /// Reached the end of the timeline
    Completed,
    /// Stopped by the cancellation token
    Cancelled,
}

/// One playback of a timeline, advanced once per animation frame
#[derive(Debug, Clone)]
pub struct CalibrationRun {
    sequencer: CalibrationSequencer,
    finished: Option<Tick>,
    ticks: u64,
}

impl CalibrationRun {
    #[must_use]
    pub const fn new(sequencer: CalibrationSequencer) -> Self {
        Self {
            sequencer,
            finished: None,
            ticks: 0,
        }
    }

    #[must_use]
    pub const fn sequencer(&self) -> &CalibrationSequencer {
        &self.sequencer
    }

    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Advance to `elapsed` since the run started.
    ///
    /// The token is checked once per call, so a token that was already
    /// cancelled ends the run on its first tick. Once the run has completed or been
    /// cancelled every later tick repeats that outcome.
    pub fn tick(&mut self, elapsed: Duration, token: &CancellationToken) -> Tick {
        if let Some(done) = &self.finished {
            return done.clone();
        }
        self.ticks += 1;

        if token.is_cancelled() {
            log::info!("Calibration cancelled after {} ticks", self.ticks);
            self.finished = Some(Tick::Cancelled);
            return Tick::Cancelled;
        }

        let t = elapsed.as_secs_f64();
        if t >= self.sequencer.duration() {
            log::info!("Calibration sequence completed ({:.2}s)", self.sequencer.duration());
            self.finished = Some(Tick::Completed);
            return Tick::Completed;
        }

        Tick::Running(self.sequencer.point_at(t))
    }
}
