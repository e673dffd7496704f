//! Camera capturer: owns the device handle and serializes the capture lifecycle.
//!
//! States move `Idle -> Starting -> Running -> Stopping -> Idle`. Consumer calls and
//! driver events both go through one state lock; nothing slow runs while it is held.
//! Device creation and `stop_streaming` happen with the lock released, bracketed by the
//! `Starting` and `Stopping` states so no second handle can be opened meanwhile. A device
//! switch takes the handle out under a `switching` flag and runs unlocked as well.
//!
//! Frames take a separate path: the driver thread hands them to the session observer,
//! which forwards them to the listener without touching the state lock.

use crate::assert_invariant;
use crate::catalog::{DeviceEnumerator, FormatCatalog};
use crate::driver::{CaptureDriver, DriverEvent, DriverHandle, DriverObserver};
use crate::errors::CapturerError;
use crate::injector::{InjectorStats, ParameterInjector};
use crate::parameters::CameraParameters;
use crate::permissions::{PermissionChecker, PermissionKind};
use crate::reporting::{CapturerErrorReport, ErrorDomain, ErrorReporter};
use crate::types::{CameraSource, FrameRotation, RawFrame, VideoDimensions, VideoFormat, VideoFrame};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, Weak};
use uuid::Uuid;

const SINGLE_HANDLE: &str = "At most one device handle is open";
const HANDLE_RELEASED: &str = "Idle capturer holds no device handle";

/// Consumer of capture results.
///
/// `on_capturer_started` fires exactly once per `start_capture` call; frames only follow
/// a `true` result. Both may run on the driver thread.
pub trait CapturerListener: Send + Sync {
    fn on_capturer_started(&self, success: bool);
    fn on_frame_captured(&self, frame: VideoFrame);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum CapturerState {
    Idle,
    Starting,
    Running,
    Stopping,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CaptureStats {
    pub capturer_id: Uuid,
    pub state: CapturerState,
    pub camera_source: CameraSource,
    pub format: Option<VideoFormat>,
    pub frames_delivered: u64,
    pub frames_dropped: u64,
    pub parameters: InjectorStats,
}

struct Inner {
    state: CapturerState,
    source: CameraSource,
    handle: Option<Box<dyn DriverHandle>>,
    /// Source the open handle is streaming from; lags `source` until a switch succeeds.
    device_source: CameraSource,
    session: Option<Arc<Session>>,
    generation: u64,
    stop_requested: bool,
    switching: bool,
}

struct Shared {
    id: Uuid,
    catalog: FormatCatalog,
    driver: Arc<dyn CaptureDriver>,
    reporter: Option<Arc<dyn ErrorReporter>>,
    injector: Arc<ParameterInjector>,
    inner: Mutex<Inner>,
    transitions: Condvar,
}

/// Captures frames from the camera behind a logical [`CameraSource`].
///
/// The capturer can be restarted after `stop_capture` but serves one listener at a time.
pub struct CameraCapturer {
    shared: Arc<Shared>,
}

impl CameraCapturer {
    /// Creates a capturer whose backend both enumerates and opens devices.
    pub fn new<B>(
        source: CameraSource,
        backend: Arc<B>,
        permissions: &dyn PermissionChecker,
        reporter: Option<Arc<dyn ErrorReporter>>,
    ) -> Self
    where
        B: DeviceEnumerator + CaptureDriver + 'static,
    {
        let enumerator: Arc<dyn DeviceEnumerator> = backend.clone();
        let driver: Arc<dyn CaptureDriver> = backend;
        Self::from_parts(source, FormatCatalog::new(enumerator), driver, permissions, reporter)
    }

    pub fn from_parts(
        source: CameraSource,
        catalog: FormatCatalog,
        driver: Arc<dyn CaptureDriver>,
        permissions: &dyn PermissionChecker,
        reporter: Option<Arc<dyn ErrorReporter>>,
    ) -> Self {
        let shared = Arc::new(Shared {
            id: Uuid::new_v4(),
            catalog,
            driver,
            reporter,
            injector: Arc::new(ParameterInjector::new()),
            inner: Mutex::new(Inner {
                state: CapturerState::Idle,
                source,
                handle: None,
                device_source: source,
                session: None,
                generation: 0,
                stop_requested: false,
                switching: false,
            }),
            transitions: Condvar::new(),
        });

        if !permissions.has_permission(PermissionKind::Camera) {
            log::warn!("[{}] CAMERA permission not granted", shared.id);
            shared.report(ErrorDomain::Camera, "CAMERA permission not granted");
        }

        log::debug!("[{}] Capturer created for {} camera", shared.id, source);
        Self { shared }
    }

    pub fn id(&self) -> Uuid {
        self.shared.id
    }

    pub fn camera_source(&self) -> CameraSource {
        self.shared.lock().source
    }

    pub fn state(&self) -> CapturerState {
        self.shared.lock().state
    }

    pub fn catalog(&self) -> &FormatCatalog {
        &self.shared.catalog
    }

    /// Formats the device behind the current source advertises.
    pub fn supported_formats(&self) -> Result<Vec<VideoFormat>, CapturerError> {
        let source = self.camera_source();
        self.shared.catalog.supported_formats(source)
    }

    pub fn has_pending_parameters(&self) -> bool {
        self.shared.injector.has_pending()
    }

    pub fn stats(&self) -> CaptureStats {
        let inner = self.shared.lock();
        let session = inner.session.as_ref();
        CaptureStats {
            capturer_id: self.shared.id,
            state: inner.state,
            camera_source: inner.source,
            format: session.map(|s| s.format),
            frames_delivered: session.map_or(0, |s| s.delivered.load(Ordering::Relaxed)),
            frames_dropped: session.map_or(0, |s| s.dropped.load(Ordering::Relaxed)),
            parameters: self.shared.injector.stats(),
        }
    }

    /// Opens the device behind the current source and asks the driver to stream
    /// `format`. Returns before the stream is up; `listener` learns the outcome through
    /// `on_capturer_started`.
    pub fn start_capture(&self, format: VideoFormat, listener: Arc<dyn CapturerListener>) {
        let shared = &self.shared;
        let (source, generation) = {
            let mut inner = shared.lock();
            if inner.state != CapturerState::Idle {
                log::warn!(
                    "[{}] start_capture ignored while {:?}",
                    shared.id,
                    inner.state
                );
                drop(inner);
                listener.on_capturer_started(false);
                return;
            }
            inner.state = CapturerState::Starting;
            inner.stop_requested = false;
            inner.generation += 1;
            (inner.source, inner.generation)
        };

        let opened = shared.open_device(source);

        let mut inner = shared.lock();
        let mut handle = match opened {
            Some(handle) => handle,
            None => {
                inner.state = CapturerState::Idle;
                inner.stop_requested = false;
                shared.transitions.notify_all();
                drop(inner);
                listener.on_capturer_started(false);
                return;
            }
        };

        if inner.stop_requested {
            log::info!("[{}] Capture stopped before the device opened", shared.id);
            inner.state = CapturerState::Stopping;
            drop(inner);
            handle.release();
            shared.finish_stopping();
            listener.on_capturer_started(false);
            return;
        }

        assert_invariant!(inner.handle.is_none(), SINGLE_HANDLE);
        let session = Arc::new(Session::new(
            generation,
            format,
            listener,
            Arc::downgrade(shared),
        ));
        handle.start_streaming(&format, session.clone());
        inner.handle = Some(handle);
        inner.device_source = source;
        inner.session = Some(session);
        log::info!(
            "[{}] Starting capture on {} camera at {}",
            shared.id,
            source,
            format
        );
    }

    /// Stops streaming and releases the device. When this returns the device can be
    /// opened again. A no-op on an idle capturer.
    pub fn stop_capture(&self) {
        let shared = &self.shared;
        let mut inner = shared.lock();
        loop {
            match inner.state {
                CapturerState::Idle => {
                    log::debug!("[{}] stop_capture on idle capturer", shared.id);
                    return;
                }
                CapturerState::Stopping => inner = shared.wait(inner),
                // the handle is out for a device switch
                CapturerState::Running if inner.switching => inner = shared.wait(inner),
                // device creation is in flight on another thread
                CapturerState::Starting if inner.handle.is_none() => {
                    inner.stop_requested = true;
                    inner = shared.wait(inner);
                }
                CapturerState::Starting | CapturerState::Running => break,
            }
        }

        let was_starting = inner.state == CapturerState::Starting;
        inner.state = CapturerState::Stopping;
        let handle = inner.handle.take();
        let session = inner.session.take();
        drop(inner);

        if let Some(session) = &session {
            session.streaming.store(false, Ordering::Release);
        }
        if let Some(mut handle) = handle {
            if let Err(e) = handle.stop_streaming() {
                log::error!("[{}] Failed to stop camera capturer: {}", shared.id, e);
            }
            handle.release();
        }
        shared.finish_stopping();
        log::info!("[{}] Capture stopped", shared.id);

        if was_starting {
            if let Some(session) = session {
                session.report_started(false);
            }
        }
    }

    /// Toggles the camera source. While running, the driver is asked to move the stream
    /// to the other device in place; if it cannot, the toggle is still recorded. A toggle
    /// during `Starting` is applied once the driver confirms the start.
    /// Returns the new source.
    pub fn switch_camera(&self) -> CameraSource {
        let shared = &self.shared;
        let target = {
            let mut inner = shared.lock();
            let previous = inner.source;
            inner.source = previous.toggled();
            assert_invariant!(inner.source != previous, "Switching toggles the source once");
            inner.source
        };

        match shared.follow_source() {
            Ok(()) => log::info!("[{}] Camera source switched to {}", shared.id, target),
            Err(e) => shared.switch_failed(target, &e),
        }
        target
    }

    /// Stores `updater` as the pending parameter update, replacing any unapplied one.
    ///
    /// While running, the driver is asked to apply it right away; the return value is
    /// `false` if the driver was not ready, in which case it is applied once the driver
    /// signals readiness. When not running, returns `true` and the update is applied
    /// after the next successful start.
    pub fn update_camera_parameters<F>(&self, updater: F) -> bool
    where
        F: Fn(&mut CameraParameters) + Send + Sync + 'static,
    {
        let shared = &self.shared;
        let mut inner = shared.lock();
        shared.injector.submit(Box::new(updater));

        if inner.state != CapturerState::Running {
            return true;
        }
        match inner.handle.as_mut() {
            Some(handle) => {
                let scheduled = handle.inject_parameters(shared.injector.clone());
                if !scheduled {
                    log::warn!(
                        "[{}] Camera parameter update deferred until driver is ready",
                        shared.id
                    );
                }
                scheduled
            }
            None => true,
        }
    }
}

impl Drop for CameraCapturer {
    fn drop(&mut self) {
        self.stop_capture();
        assert_invariant!(self.shared.lock().handle.is_none(), HANDLE_RELEASED);
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, Inner>) -> MutexGuard<'a, Inner> {
        self.transitions
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, domain: ErrorDomain, message: impl Into<String>) {
        if let Some(reporter) = &self.reporter {
            reporter.report(CapturerErrorReport::new(domain, message));
        }
    }

    fn switch_failed(&self, target: CameraSource, e: &CapturerError) {
        log::warn!(
            "[{}] Camera switch to {} failed, active device unchanged: {}",
            self.id,
            target,
            e
        );
        self.report(ErrorDomain::Camera, format!("Failed to switch camera: {e}"));
    }

    /// Moves a running stream onto the device behind the current source. The handle is
    /// taken out while the driver switches so the state lock stays free for driver events.
    fn follow_source(&self) -> Result<(), CapturerError> {
        let mut inner = self.lock();
        while inner.switching {
            inner = self.wait(inner);
        }
        if inner.state != CapturerState::Running || inner.device_source == inner.source {
            return Ok(());
        }
        let target = inner.source;
        let Some(mut handle) = inner.handle.take() else {
            return Ok(());
        };
        inner.switching = true;
        drop(inner);

        let result = self
            .catalog
            .resolve_device_id(target)
            .and_then(|device| handle.switch_device(&device));

        let mut inner = self.lock();
        inner.switching = false;
        if result.is_ok() {
            inner.device_source = target;
        }
        // a readiness signal that arrived mid-switch found no handle
        if self.injector.has_pending() && !handle.inject_parameters(self.injector.clone()) {
            log::debug!("[{}] Parameter update waits for the switched device", self.id);
        }
        inner.handle = Some(handle);
        self.transitions.notify_all();
        result
    }

    fn finish_stopping(&self) {
        let mut inner = self.lock();
        assert_invariant!(inner.handle.is_none(), HANDLE_RELEASED);
        inner.state = CapturerState::Idle;
        inner.stop_requested = false;
        self.transitions.notify_all();
    }

    fn open_device(&self, source: CameraSource) -> Option<Box<dyn DriverHandle>> {
        let device = match self.catalog.resolve_device_id(source) {
            Ok(device) => device,
            Err(e) => {
                log::error!("[{}] Failed to find camera source: {}", self.id, e);
                self.report(ErrorDomain::Camera, "Unsupported camera source provided");
                return None;
            }
        };

        match self.driver.create(&device) {
            Ok(handle) => Some(handle),
            Err(e) => {
                log::error!("[{}] Failed to create capturer for {}: {}", self.id, device, e);
                self.report(ErrorDomain::Capturer, "Failed to create capturer");
                None
            }
        }
    }

    fn is_current(&self, inner: &Inner, session: &Session) -> bool {
        inner
            .session
            .as_ref()
            .is_some_and(|current| current.generation == session.generation)
    }

    fn handle_driver_event(self: &Arc<Self>, session: &Session, event: DriverEvent) {
        match event {
            DriverEvent::Started { success } => self.on_driver_started(session, success),
            DriverEvent::ParametersReady => self.on_parameters_ready(session),
            DriverEvent::CameraError(message) => {
                log::error!("[{}] Camera error: {}", self.id, message);
                if self.is_current(&self.lock(), session) {
                    self.report(ErrorDomain::Camera, message);
                }
            }
            DriverEvent::CameraFreeze(message) => {
                log::warn!("[{}] Camera freeze: {}", self.id, message);
                if self.is_current(&self.lock(), session) {
                    self.report(ErrorDomain::Camera, message);
                }
            }
            DriverEvent::Opening(name) => log::info!("[{}] Opening camera {}", self.id, name),
            DriverEvent::FirstFrameAvailable => {
                log::info!("[{}] First frame available", self.id)
            }
            DriverEvent::Closed => log::info!("[{}] Camera closed", self.id),
            DriverEvent::Frame(raw) => session.deliver_frame(raw),
        }
    }

    fn on_driver_started(self: &Arc<Self>, session: &Session, success: bool) {
        let mut inner = self.lock();
        if !self.is_current(&inner, session) || inner.state != CapturerState::Starting {
            log::debug!(
                "[{}] Ignoring start confirmation for stale session {}",
                self.id,
                session.generation
            );
            return;
        }

        if !success {
            log::error!("[{}] Driver failed to start streaming", self.id);
            inner.state = CapturerState::Stopping;
            let handle = inner.handle.take();
            inner.session = None;
            drop(inner);
            if let Some(handle) = handle {
                handle.release();
            }
            self.finish_stopping();
            session.report_started(false);
            return;
        }

        inner.state = CapturerState::Running;
        // updates queued before the device was ready go in now, once
        if self.injector.has_pending() {
            if let Some(handle) = inner.handle.as_mut() {
                if !handle.inject_parameters(self.injector.clone()) {
                    log::error!(
                        "[{}] Failed to schedule camera parameter update after capturer started",
                        self.id
                    );
                }
            }
        }
        drop(inner);

        log::info!("[{}] Capture running", self.id);
        session.report_started(true);

        let inner = self.lock();
        if !self.is_current(&inner, session) || inner.state != CapturerState::Running {
            return;
        }
        session.streaming.store(true, Ordering::Release);
        if inner.source != inner.device_source {
            drop(inner);
            self.spawn_follow_source();
        }
    }

    /// Applies a switch requested while starting. Runs off the driver thread, since the
    /// driver may wait on its own thread to carry out the switch.
    fn spawn_follow_source(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name("capturer-switch".to_string())
            .spawn(move || {
                let target = shared.lock().source;
                match shared.follow_source() {
                    Ok(()) => log::info!("[{}] Deferred switch to {} applied", shared.id, target),
                    Err(e) => shared.switch_failed(target, &e),
                }
            });
        if let Err(e) = spawned {
            log::error!("[{}] Failed to spawn camera switch thread: {}", self.id, e);
        }
    }

    fn on_parameters_ready(&self, session: &Session) {
        let mut inner = self.lock();
        if !self.is_current(&inner, session) || inner.state != CapturerState::Running {
            return;
        }
        if !self.injector.has_pending() {
            return;
        }
        if let Some(handle) = inner.handle.as_mut() {
            if !handle.inject_parameters(self.injector.clone()) {
                log::warn!(
                    "[{}] Driver signalled ready but rejected parameter update",
                    self.id
                );
            }
        }
    }
}

/// Per-start observer handed to the driver. Late events from an old session are
/// recognised by generation and ignored.
struct Session {
    generation: u64,
    format: VideoFormat,
    listener: Arc<dyn CapturerListener>,
    streaming: AtomicBool,
    started_reported: AtomicBool,
    last_timestamp_ns: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    capturer: Weak<Shared>,
}

impl Session {
    fn new(
        generation: u64,
        format: VideoFormat,
        listener: Arc<dyn CapturerListener>,
        capturer: Weak<Shared>,
    ) -> Self {
        Self {
            generation,
            format,
            listener,
            streaming: AtomicBool::new(false),
            started_reported: AtomicBool::new(false),
            last_timestamp_ns: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            capturer,
        }
    }

    fn report_started(&self, success: bool) {
        if !self.started_reported.swap(true, Ordering::AcqRel) {
            self.listener.on_capturer_started(success);
        }
    }

    fn deliver_frame(&self, raw: RawFrame) {
        if !self.streaming.load(Ordering::Acquire) {
            return;
        }

        let rotation = match FrameRotation::try_from(raw.rotation) {
            Ok(rotation) => rotation,
            Err(e) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                log::warn!("Dropping frame: {}", e);
                return;
            }
        };

        // clamp so timestamps never go backwards within a session
        let previous = self
            .last_timestamp_ns
            .fetch_max(raw.timestamp_ns, Ordering::AcqRel);
        let timestamp_ns = raw.timestamp_ns.max(previous);

        let frame = VideoFrame::new(
            raw.data,
            VideoDimensions::new(raw.width, raw.height),
            self.format.pixel_format,
            rotation,
            timestamp_ns,
        );
        if !frame.is_consistent() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            log::warn!(
                "Dropping frame: {} bytes does not match {} {}",
                frame.size_bytes(),
                frame.dimensions,
                frame.pixel_format
            );
            return;
        }

        self.delivered.fetch_add(1, Ordering::Relaxed);
        self.listener.on_frame_captured(frame);
    }
}

impl DriverObserver for Session {
    fn on_event(&self, event: DriverEvent) {
        match event {
            DriverEvent::Frame(raw) => self.deliver_frame(raw),
            other => match self.capturer.upgrade() {
                Some(shared) => shared.handle_driver_event(self, other),
                None => log::debug!("Driver event after capturer was dropped: {:?}", other),
            },
        }
    }
}
