//! Testing utilities for the capturer
//!
//! A scriptable backend plus listener, reporter and permission doubles that record
//! everything they are handed.

pub mod mock;

pub use mock::MockBackend;

use crate::capturer::CapturerListener;
use crate::permissions::{PermissionChecker, PermissionKind};
use crate::reporting::{CapturerErrorReport, ErrorDomain, ErrorReporter};
use crate::types::{RawFrame, VideoFormat, VideoFrame};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Frame with a correctly sized payload for `format`.
pub fn raw_frame(format: &VideoFormat, rotation: i32, timestamp_ns: u64) -> RawFrame {
    RawFrame {
        data: crate::driver::synthetic::synthetic_frame(format, timestamp_ns),
        width: format.dimensions.width,
        height: format.dimensions.height,
        rotation,
        timestamp_ns,
    }
}

#[derive(Default)]
struct Recorded {
    started: Vec<bool>,
    frames: Vec<VideoFrame>,
}

/// Listener that keeps every callback and lets tests wait for them.
#[derive(Default)]
pub struct RecordingListener {
    recorded: Mutex<Recorded>,
    changed: Condvar,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn started(&self) -> Vec<bool> {
        self.lock().started.clone()
    }

    pub fn frames(&self) -> Vec<VideoFrame> {
        self.lock().frames.clone()
    }

    pub fn frame_count(&self) -> usize {
        self.lock().frames.len()
    }

    /// Blocks until `done` holds for the recorded callbacks or `timeout` passes.
    fn wait_until(&self, timeout: Duration, done: impl Fn(&Recorded) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        let mut recorded = self.lock();
        while !done(&recorded) {
            let Some(left) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            recorded = self
                .changed
                .wait_timeout(recorded, left)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    /// First start result, waiting up to `timeout` for it.
    pub fn wait_started(&self, timeout: Duration) -> Option<bool> {
        self.wait_until(timeout, |r| !r.started.is_empty())
            .then(|| self.lock().started[0])
    }

    pub fn wait_frames(&self, count: usize, timeout: Duration) -> bool {
        self.wait_until(timeout, |r| r.frames.len() >= count)
    }
}

impl CapturerListener for RecordingListener {
    fn on_capturer_started(&self, success: bool) {
        self.lock().started.push(success);
        self.changed.notify_all();
    }

    fn on_frame_captured(&self, frame: VideoFrame) {
        self.lock().frames.push(frame);
        self.changed.notify_all();
    }
}

/// Error sink that stores reports.
#[derive(Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<CapturerErrorReport>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<CapturerErrorReport> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn messages(&self) -> Vec<(ErrorDomain, String)> {
        self.reports()
            .into_iter()
            .map(|r| (r.domain, r.message))
            .collect()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, report: CapturerErrorReport) {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(report);
    }
}

/// Permission checker with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct FixedPermissions(pub bool);

impl PermissionChecker for FixedPermissions {
    fn has_permission(&self, _kind: PermissionKind) -> bool {
        self.0
    }
}
