//! Boundary to the native capture driver.
//!
//! A [`CaptureDriver`] creates one [`DriverHandle`] per opened device. Once streaming, the
//! driver reports everything that happens on its own thread as [`DriverEvent`] messages
//! sent to the [`DriverObserver`] it was given in [`DriverHandle::start_streaming`].
//!
//! Handles must never call the observer re-entrantly from inside one of their own
//! methods: the capturer may be holding its state lock while calling into the handle.

pub mod synthetic;

#[cfg(feature = "native")]
pub mod native;

use crate::errors::CapturerError;
use crate::injector::ParameterInjector;
use crate::types::{DeviceId, RawFrame, VideoFormat};
use std::sync::Arc;

/// Message sent from the driver thread to the capturer.
#[derive(Debug, Clone)]
pub enum DriverEvent {
    /// Result of the asynchronous stream activation.
    Started { success: bool },
    Frame(RawFrame),
    /// The device can accept parameter changes again after reporting "not ready".
    ParametersReady,
    CameraError(String),
    CameraFreeze(String),
    Opening(String),
    FirstFrameAvailable,
    Closed,
}

pub trait DriverObserver: Send + Sync {
    fn on_event(&self, event: DriverEvent);
}

/// Factory for device handles.
pub trait CaptureDriver: Send + Sync {
    fn create(&self, device: &DeviceId) -> Result<Box<dyn DriverHandle>, CapturerError>;
}

/// An opened capture device.
pub trait DriverHandle: Send {
    /// Begins streaming at `format`. Returns immediately; the outcome arrives later as
    /// [`DriverEvent::Started`].
    fn start_streaming(&mut self, format: &VideoFormat, observer: Arc<dyn DriverObserver>);

    /// Stops streaming and waits for the driver thread to quiesce.
    fn stop_streaming(&mut self) -> Result<(), CapturerError>;

    /// Moves the running stream to another physical device in place.
    fn switch_device(&mut self, device: &DeviceId) -> Result<(), CapturerError>;

    /// Schedules `injector` to be applied on the driver thread. `false` means the
    /// device is not ready; the driver sends [`DriverEvent::ParametersReady`] once it is.
    fn inject_parameters(&mut self, injector: Arc<ParameterInjector>) -> bool;

    /// Frees the device. Consumes the handle so it cannot be released twice.
    fn release(self: Box<Self>);
}
