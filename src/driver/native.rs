//! Hardware backend on top of `nokhwa`.
//!
//! Each handle owns a driver thread that creates the `CallbackCamera`, keeps it for the
//! life of the stream and applies parameter updates between commands. The camera never
//! leaves that thread; frames arrive on nokhwa's callback thread and go straight to the
//! observer.

use super::{CaptureDriver, DriverEvent, DriverHandle, DriverObserver};
use crate::catalog::DeviceEnumerator;
use crate::errors::CapturerError;
use crate::injector::ParameterInjector;
use crate::parameters::{CameraParameters, ParameterId, WhiteBalance};
use crate::timing::FrameClock;
use crate::types::{
    CameraDeviceInfo, DeviceId, Facing, RawFrame, VideoDimensions, VideoFormat, VideoPixelFormat,
};
use bytes::Bytes;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use nokhwa::{
    pixel_format::RgbFormat,
    query,
    utils::{
        ApiBackend, CameraFormat, CameraIndex, ControlValueSetter, FrameFormat,
        KnownCameraControl, RequestedFormat, RequestedFormatType, Resolution,
    },
    Buffer, CallbackCamera, Camera,
};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

const SWITCH_TIMEOUT: Duration = Duration::from_secs(5);

fn pixel_format_of(format: FrameFormat) -> Option<VideoPixelFormat> {
    match format {
        FrameFormat::MJPEG => Some(VideoPixelFormat::Mjpeg),
        FrameFormat::YUYV => Some(VideoPixelFormat::Yuyv),
        FrameFormat::RAWRGB => Some(VideoPixelFormat::Rgb24),
        _ => None,
    }
}

fn frame_format_of(format: VideoPixelFormat) -> Option<FrameFormat> {
    match format {
        VideoPixelFormat::Mjpeg => Some(FrameFormat::MJPEG),
        VideoPixelFormat::Yuyv => Some(FrameFormat::YUYV),
        VideoPixelFormat::Rgb24 => Some(FrameFormat::RAWRGB),
        _ => None,
    }
}

fn camera_index(device: &DeviceId) -> CameraIndex {
    match device.as_str().parse::<u32>() {
        Ok(index) => CameraIndex::Index(index),
        Err(_) => CameraIndex::String(device.as_str().to_string()),
    }
}

/// Desktop devices rarely report facing; guess from the name, else the first device is
/// the front (built-in) camera.
fn guess_facing(name: &str, position: usize) -> Facing {
    let lower = name.to_ascii_lowercase();
    if lower.contains("back") || lower.contains("rear") {
        Facing::Back
    } else if lower.contains("front") || lower.contains("facetime") || lower.contains("integrated") {
        Facing::Front
    } else if position == 0 {
        Facing::Front
    } else {
        Facing::Back
    }
}

/// Backend for the platform's capture API.
#[derive(Debug, Clone)]
pub struct NativeBackend {
    api: ApiBackend,
    clock: FrameClock,
}

impl NativeBackend {
    pub fn new() -> Self {
        Self::with_api(ApiBackend::Auto)
    }

    pub fn with_api(api: ApiBackend) -> Self {
        Self {
            api,
            clock: FrameClock::new(),
        }
    }
}

impl Default for NativeBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceEnumerator for NativeBackend {
    fn list_devices(&self) -> Result<Vec<CameraDeviceInfo>, CapturerError> {
        let cameras = query(self.api).map_err(|e| {
            CapturerError::EnumerationFailed(format!("Failed to query cameras: {}", e))
        })?;

        Ok(cameras
            .iter()
            .enumerate()
            .map(|(position, info)| {
                let name = info.human_name();
                let facing = guess_facing(&name, position);
                CameraDeviceInfo::new(info.index().to_string(), name, facing)
            })
            .collect())
    }

    /// Opens the device without streaming to read its compatible formats.
    fn list_formats(&self, device: &DeviceId) -> Result<Vec<VideoFormat>, CapturerError> {
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::None);
        let mut camera = Camera::new(camera_index(device), requested).map_err(|e| {
            CapturerError::DeviceUnavailable(format!("Failed to open {}: {}", device, e))
        })?;
        let formats = camera.compatible_camera_formats().map_err(|e| {
            CapturerError::EnumerationFailed(format!("Failed to list formats: {}", e))
        })?;

        Ok(formats
            .into_iter()
            .filter_map(|f| {
                let pixel_format = pixel_format_of(f.format())?;
                Some(VideoFormat::new(
                    VideoDimensions::new(f.resolution().width(), f.resolution().height()),
                    f.frame_rate(),
                    pixel_format,
                ))
            })
            .collect())
    }
}

impl CaptureDriver for NativeBackend {
    fn create(&self, device: &DeviceId) -> Result<Box<dyn DriverHandle>, CapturerError> {
        log::debug!("Creating native capturer for device {}", device);
        Ok(Box::new(NativeHandle {
            index: camera_index(device),
            clock: self.clock.clone(),
            commands: None,
            thread: None,
        }))
    }
}

enum Command {
    Inject(Arc<ParameterInjector>),
    Switch(CameraIndex, Sender<Result<(), CapturerError>>),
    Stop,
}

pub struct NativeHandle {
    index: CameraIndex,
    clock: FrameClock,
    commands: Option<Sender<Command>>,
    thread: Option<JoinHandle<()>>,
}

impl DriverHandle for NativeHandle {
    fn start_streaming(&mut self, format: &VideoFormat, observer: Arc<dyn DriverObserver>) {
        let (tx, rx) = unbounded();
        let worker = NativeDriverThread {
            index: self.index.clone(),
            format: *format,
            clock: self.clock.clone(),
            observer: observer.clone(),
            parameters: CameraParameters::default(),
        };

        match std::thread::Builder::new()
            .name("native-capture-driver".to_string())
            .spawn(move || worker.run(rx))
        {
            Ok(thread) => {
                self.commands = Some(tx);
                self.thread = Some(thread);
            }
            Err(e) => {
                log::error!("Failed to spawn native driver thread: {}", e);
                let _ = std::thread::Builder::new()
                    .name("native-capture-failure".to_string())
                    .spawn(move || observer.on_event(DriverEvent::Started { success: false }));
            }
        }
    }

    fn stop_streaming(&mut self) -> Result<(), CapturerError> {
        if let Some(commands) = self.commands.take() {
            let _ = commands.send(Command::Stop);
        }
        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        if thread.thread().id() == std::thread::current().id() {
            return Ok(());
        }
        thread
            .join()
            .map_err(|_| CapturerError::DriverStopFailed("native driver thread panicked".into()))
    }

    fn switch_device(&mut self, device: &DeviceId) -> Result<(), CapturerError> {
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| CapturerError::DriverSwitchFailed("not streaming".into()))?;
        let index = camera_index(device);
        let (reply_tx, reply_rx) = bounded(1);
        commands
            .send(Command::Switch(index.clone(), reply_tx))
            .map_err(|_| CapturerError::DriverSwitchFailed("driver thread gone".into()))?;
        reply_rx
            .recv_timeout(SWITCH_TIMEOUT)
            .map_err(|e| CapturerError::DriverSwitchFailed(format!("no reply from driver: {e}")))??;
        self.index = index;
        Ok(())
    }

    fn inject_parameters(&mut self, injector: Arc<ParameterInjector>) -> bool {
        match &self.commands {
            Some(commands) => commands.send(Command::Inject(injector)).is_ok(),
            None => false,
        }
    }

    fn release(mut self: Box<Self>) {
        if self.thread.is_some() {
            if let Err(e) = self.stop_streaming() {
                log::warn!("Native driver stop during release failed: {}", e);
            }
        }
        log::debug!("Released native capturer {}", self.index);
    }
}

struct NativeDriverThread {
    index: CameraIndex,
    format: VideoFormat,
    clock: FrameClock,
    observer: Arc<dyn DriverObserver>,
    parameters: CameraParameters,
}

impl NativeDriverThread {
    fn run(mut self, commands: Receiver<Command>) {
        self.observer.on_event(DriverEvent::Opening(self.index.to_string()));

        let mut camera = match self.open(&self.index) {
            Ok(camera) => camera,
            Err(e) => {
                log::error!("Failed to start native capture on {}: {}", self.index, e);
                self.observer.on_event(DriverEvent::Started { success: false });
                return;
            }
        };
        self.observer.on_event(DriverEvent::Started { success: true });

        while let Ok(command) = commands.recv() {
            match command {
                Command::Stop => break,
                Command::Inject(injector) => self.apply(&mut camera, &injector),
                Command::Switch(index, reply) => {
                    // reply before any other event goes out
                    match self.open(&index) {
                        Ok(next) => {
                            if let Err(e) = camera.stop_stream() {
                                log::warn!("Failed to stop previous camera: {}", e);
                            }
                            camera = next;
                            self.index = index;
                            let _ = reply.send(Ok(()));
                        }
                        Err(e) => {
                            let _ = reply.send(Err(e));
                        }
                    }
                }
            }
        }

        if let Err(e) = camera.stop_stream() {
            log::error!("Failed to stop native stream: {}", e);
        }
        self.observer.on_event(DriverEvent::Closed);
    }

    fn open(&self, index: &CameraIndex) -> Result<CallbackCamera, CapturerError> {
        let frame_format = frame_format_of(self.format.pixel_format).ok_or_else(|| {
            CapturerError::InvalidFormat(format!(
                "{} is not available from the native backend",
                self.format.pixel_format
            ))
        })?;
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Exact(
            CameraFormat::new(
                Resolution::new(self.format.dimensions.width, self.format.dimensions.height),
                frame_format,
                self.format.framerate,
            ),
        ));

        let observer = self.observer.clone();
        let clock = self.clock.clone();
        let mut camera = CallbackCamera::new(index.clone(), requested, move |buffer: Buffer| {
            observer.on_event(DriverEvent::Frame(RawFrame {
                data: Bytes::copy_from_slice(buffer.buffer()),
                width: buffer.resolution().width_x,
                height: buffer.resolution().height_y,
                rotation: 0,
                timestamp_ns: clock.now_ns(),
            }));
        })
        .map_err(|e| CapturerError::DriverStartFailed(format!("Failed to open camera: {}", e)))?;

        camera.open_stream().map_err(|e| {
            CapturerError::DriverStartFailed(format!("Failed to start stream: {}", e))
        })?;
        Ok(camera)
    }

    fn apply(&mut self, camera: &mut CallbackCamera, injector: &ParameterInjector) {
        let before = self.parameters.clone();
        if !injector.apply(&mut self.parameters) {
            return;
        }

        for id in self.parameters.diff(&before) {
            let Some((control, value)) = control_for(&self.parameters, id) else {
                log::debug!("{:?} is not supported by the native backend", id);
                continue;
            };
            if let Err(e) = camera.set_camera_control(control, value) {
                log::warn!("Failed to set {:?}: {}", control, e);
            }
        }
    }
}

/// Normalized controls in -1.0..=1.0 are sent scaled by 100.
fn control_for(
    parameters: &CameraParameters,
    id: ParameterId,
) -> Option<(KnownCameraControl, ControlValueSetter)> {
    let scaled = |v: f32| ControlValueSetter::Integer((v * 100.0).round() as i64);
    match id {
        ParameterId::Brightness => Some((KnownCameraControl::Brightness, scaled(parameters.brightness?))),
        ParameterId::Contrast => Some((KnownCameraControl::Contrast, scaled(parameters.contrast?))),
        ParameterId::Saturation => Some((KnownCameraControl::Saturation, scaled(parameters.saturation?))),
        ParameterId::Sharpness => Some((KnownCameraControl::Sharpness, scaled(parameters.sharpness?))),
        ParameterId::Zoom => Some((
            KnownCameraControl::Zoom,
            ControlValueSetter::Integer(parameters.zoom?.round() as i64),
        )),
        ParameterId::ExposureCompensation => Some((
            KnownCameraControl::Exposure,
            ControlValueSetter::Integer(i64::from(parameters.exposure_compensation?)),
        )),
        ParameterId::WhiteBalance => {
            let kelvin = match parameters.white_balance? {
                WhiteBalance::Auto => return None,
                WhiteBalance::Daylight => 5500,
                WhiteBalance::Cloudy => 6500,
                WhiteBalance::Tungsten => 3200,
                WhiteBalance::Fluorescent => 4000,
            };
            Some((KnownCameraControl::WhiteBalance, ControlValueSetter::Integer(kelvin)))
        }
        ParameterId::FlashMode | ParameterId::FocusMode | ParameterId::AutoExposureLock => None,
    }
}
