//! Scriptable in-process backend.
//!
//! Nothing happens on its own: tests fire driver events by hand and decide when the
//! driver thread would run queued parameter work. Every call the capturer makes into
//! the backend is counted.

use crate::catalog::DeviceEnumerator;
use crate::driver::{CaptureDriver, DriverEvent, DriverHandle, DriverObserver};
use crate::errors::CapturerError;
use crate::injector::ParameterInjector;
use crate::parameters::CameraParameters;
use crate::types::{CameraDeviceInfo, DeviceId, Facing, RawFrame, VideoFormat};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Default)]
struct MockState {
    devices: Vec<CameraDeviceInfo>,
    enumeration_error: Option<String>,
    fail_create: bool,
    fail_stop: bool,
    fail_switch: bool,
    parameters_ready: bool,

    created: usize,
    released: usize,
    stop_calls: usize,
    inject_calls: usize,
    open_handles: usize,
    max_open_handles: usize,
    switches: Vec<DeviceId>,
    opened: Vec<DeviceId>,

    observer: Option<Arc<dyn DriverObserver>>,
    format: Option<VideoFormat>,
    scheduled: Vec<Arc<ParameterInjector>>,
    parameters: CameraParameters,
    applied: usize,
}

/// Backend double; clones share state, so keep one clone to drive the test.
#[derive(Clone)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// A back camera `"0"` and a front camera `"1"`, both advertising VGA and 720p.
    pub fn new() -> Self {
        let formats = vec![VideoFormat::vga(), VideoFormat::hd_720p()];
        Self::with_devices(vec![
            CameraDeviceInfo::new("0", "Mock Back Camera", Facing::Back)
                .with_orientation(90)
                .with_formats(formats.clone()),
            CameraDeviceInfo::new("1", "Mock Front Camera", Facing::Front)
                .with_orientation(270)
                .with_formats(formats),
        ])
    }

    pub fn with_devices(devices: Vec<CameraDeviceInfo>) -> Self {
        let state = MockState {
            devices,
            parameters_ready: true,
            ..MockState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_devices(&self, devices: Vec<CameraDeviceInfo>) {
        self.lock().devices = devices;
    }

    pub fn fail_enumeration(&self, message: impl Into<String>) {
        self.lock().enumeration_error = Some(message.into());
    }

    pub fn fail_create(&self, fail: bool) {
        self.lock().fail_create = fail;
    }

    pub fn fail_stop(&self, fail: bool) {
        self.lock().fail_stop = fail;
    }

    pub fn fail_switch(&self, fail: bool) {
        self.lock().fail_switch = fail;
    }

    /// Whether handles accept parameter injection right now.
    pub fn set_parameters_ready(&self, ready: bool) {
        self.lock().parameters_ready = ready;
    }

    /// Seeds the parameters the "device" reports before any update.
    pub fn set_parameters(&self, parameters: CameraParameters) {
        self.lock().parameters = parameters;
    }

    /// Sends `event` to the observer of the streaming handle, as the driver thread would.
    /// Returns `false` if nothing is streaming.
    pub fn send(&self, event: DriverEvent) -> bool {
        let observer = self.lock().observer.clone();
        match observer {
            Some(observer) => {
                observer.on_event(event);
                true
            }
            None => false,
        }
    }

    pub fn confirm_start(&self, success: bool) -> bool {
        self.send(DriverEvent::Started { success })
    }

    pub fn emit_frame(&self, frame: RawFrame) -> bool {
        self.send(DriverEvent::Frame(frame))
    }

    /// Marks the device ready and announces it.
    pub fn signal_ready(&self) -> bool {
        self.set_parameters_ready(true);
        self.send(DriverEvent::ParametersReady)
    }

    /// Runs the parameter work queued on the "driver thread". Returns how many
    /// updaters actually ran.
    pub fn pump(&self) -> usize {
        let (scheduled, mut parameters) = {
            let mut state = self.lock();
            (std::mem::take(&mut state.scheduled), state.parameters.clone())
        };
        let ran = scheduled
            .iter()
            .filter(|injector| injector.apply(&mut parameters))
            .count();

        let mut state = self.lock();
        state.parameters = parameters;
        state.applied += ran;
        ran
    }

    pub fn parameters(&self) -> CameraParameters {
        self.lock().parameters.clone()
    }

    pub fn streaming_format(&self) -> Option<VideoFormat> {
        self.lock().format
    }

    pub fn is_streaming(&self) -> bool {
        self.lock().observer.is_some()
    }

    pub fn created(&self) -> usize {
        self.lock().created
    }

    pub fn released(&self) -> usize {
        self.lock().released
    }

    pub fn stop_calls(&self) -> usize {
        self.lock().stop_calls
    }

    pub fn inject_calls(&self) -> usize {
        self.lock().inject_calls
    }

    pub fn applied(&self) -> usize {
        self.lock().applied
    }

    pub fn open_handles(&self) -> usize {
        self.lock().open_handles
    }

    /// Highest number of handles that were ever open at the same time.
    pub fn max_open_handles(&self) -> usize {
        self.lock().max_open_handles
    }

    pub fn switches(&self) -> Vec<DeviceId> {
        self.lock().switches.clone()
    }

    pub fn opened(&self) -> Vec<DeviceId> {
        self.lock().opened.clone()
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceEnumerator for MockBackend {
    fn list_devices(&self) -> Result<Vec<CameraDeviceInfo>, CapturerError> {
        let state = self.lock();
        match &state.enumeration_error {
            Some(message) => Err(CapturerError::EnumerationFailed(message.clone())),
            None => Ok(state.devices.clone()),
        }
    }
}

impl CaptureDriver for MockBackend {
    fn create(&self, device: &DeviceId) -> Result<Box<dyn DriverHandle>, CapturerError> {
        let mut state = self.lock();
        if state.fail_create {
            return Err(CapturerError::DriverCreationFailed(format!(
                "mock refused to open {device}"
            )));
        }
        state.created += 1;
        state.open_handles += 1;
        state.max_open_handles = state.max_open_handles.max(state.open_handles);
        state.opened.push(device.clone());
        Ok(Box::new(MockHandle {
            backend: self.clone(),
        }))
    }
}

struct MockHandle {
    backend: MockBackend,
}

impl DriverHandle for MockHandle {
    fn start_streaming(&mut self, format: &VideoFormat, observer: Arc<dyn DriverObserver>) {
        let mut state = self.backend.lock();
        state.format = Some(*format);
        state.observer = Some(observer);
    }

    fn stop_streaming(&mut self) -> Result<(), CapturerError> {
        let mut state = self.backend.lock();
        state.stop_calls += 1;
        state.observer = None;
        state.format = None;
        if state.fail_stop {
            return Err(CapturerError::DriverStopFailed("mock stop failure".into()));
        }
        Ok(())
    }

    fn switch_device(&mut self, device: &DeviceId) -> Result<(), CapturerError> {
        let mut state = self.backend.lock();
        if state.fail_switch {
            return Err(CapturerError::DriverSwitchFailed(format!(
                "mock cannot switch to {device}"
            )));
        }
        state.switches.push(device.clone());
        Ok(())
    }

    fn inject_parameters(&mut self, injector: Arc<ParameterInjector>) -> bool {
        let mut state = self.backend.lock();
        state.inject_calls += 1;
        if !state.parameters_ready {
            return false;
        }
        state.scheduled.push(injector);
        true
    }

    fn release(self: Box<Self>) {
        let mut state = self.backend.lock();
        state.released += 1;
        state.open_handles = state.open_handles.saturating_sub(1);
        state.observer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_handles() {
        let backend = MockBackend::new();
        let handle = backend.create(&DeviceId::new("0")).unwrap();
        assert_eq!(backend.open_handles(), 1);
        handle.release();
        assert_eq!(backend.open_handles(), 0);
        assert_eq!(backend.max_open_handles(), 1);
        assert_eq!(backend.released(), 1);
    }

    #[test]
    fn test_send_without_stream() {
        let backend = MockBackend::new();
        assert!(!backend.confirm_start(true));
    }

    #[test]
    fn test_pump_runs_queued_injector() {
        let backend = MockBackend::new();
        let mut handle = backend.create(&DeviceId::new("0")).unwrap();
        let injector = Arc::new(ParameterInjector::new());
        injector.submit(Box::new(|p: &mut CameraParameters| p.zoom = Some(2.0)));

        assert!(handle.inject_parameters(injector.clone()));
        assert_eq!(backend.pump(), 1);
        assert_eq!(backend.parameters().zoom, Some(2.0));
        // nothing left to run
        assert_eq!(backend.pump(), 0);
    }
}
