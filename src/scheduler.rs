//! Reference-counted control of the frame capture loop.
//!
//! Several independent features want frames: the gaze toggle, an active
//! calibration and the diagnostics view. Capture runs while any of them
//! asks for it and is not suspended.

use log::{debug, info, warn};
use std::{collections::BTreeSet, fmt};

/// Anything that can deliver landmark frames once started
pub trait FrameSource: Send {
    /// Begin delivering frames; returns false if the source is unavailable
    fn start(&mut self) -> bool;

    fn stop(&mut self);
}

/// Features that may keep capture alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CaptureRequester {
    GazeToggle,
    Calibration,
    Diagnostics,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Stopped,
    Running,
}

/// Invoked once every time capture goes from running to stopped
pub type NoDataSink = Box<dyn FnMut() + Send>;

pub struct CaptureScheduler {
    source: Box<dyn FrameSource>,
    requests: BTreeSet<CaptureRequester>,
    suspended: usize,
    state: CaptureState,
    no_data: Option<NoDataSink>,
}

impl CaptureScheduler {
    #[must_use]
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self {
            source,
            requests: BTreeSet::new(),
            suspended: 0,
            state: CaptureState::Stopped,
            no_data: None,
        }
    }

    /// Sink told that no more data is coming when capture stops
    pub fn set_no_data_sink(&mut self, sink: NoDataSink) {
        self.no_data = Some(sink);
    }

    /// Record whether `requester` currently wants frames and reconcile
    pub fn request(&mut self, requester: CaptureRequester, wanted: bool) {
        let changed = if wanted {
            self.requests.insert(requester)
        } else {
            self.requests.remove(&requester)
        };
        if changed {
            debug!("Capture {} by {requester:?}", if wanted { "requested" } else { "released" });
        }
        self.reconcile();
    }

    #[must_use]
    pub fn is_requested(&self, requester: CaptureRequester) -> bool {
        self.requests.contains(&requester)
    }

    #[must_use]
    pub const fn state(&self) -> CaptureState {
        self.state
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == CaptureState::Running
    }

    /// Stop capture until the returned guard is dropped.
    ///
    /// Capture then returns to whatever the outstanding requests call for.
    pub fn suspend(&mut self) -> CaptureSuspension<'_> {
        self.suspended += 1;
        self.reconcile();
        CaptureSuspension { scheduler: self }
    }

    fn reconcile(&mut self) {
        let wanted = !self.requests.is_empty() && self.suspended == 0;
        match (self.state, wanted) {
            (CaptureState::Stopped, true) => {
                if self.source.start() {
                    info!("Capture started");
                    self.state = CaptureState::Running;
                } else {
                    warn!("Frame source unavailable, capture stays stopped");
                }
            }
            (CaptureState::Running, false) => {
                self.source.stop();
                self.state = CaptureState::Stopped;
                info!("Capture stopped");
                if let Some(sink) = self.no_data.as_mut() {
                    sink();
                }
            }
            _ => {}
        }
    }
}

impl fmt::Debug for CaptureScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureScheduler")
            .field("requests", &self.requests)
            .field("suspended", &self.suspended)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Keeps capture suspended while alive
#[must_use = "capture resumes as soon as the guard is dropped"]
pub struct CaptureSuspension<'a> {
    scheduler: &'a mut CaptureScheduler,
}

impl CaptureSuspension<'_> {
    #[must_use]
    pub fn state(&self) -> CaptureState {
        self.scheduler.state
    }
}

impl Drop for CaptureSuspension<'_> {
    fn drop(&mut self) {
        self.scheduler.suspended = self.scheduler.suspended.saturating_sub(1);
        self.scheduler.reconcile();
    }
}
