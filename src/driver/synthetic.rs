//! Threaded driver that produces generated frames.
//!
//! Each handle runs its own driver thread which sends the start confirmation, paces
//! frames at the negotiated framerate and applies injected parameters between frames.

use super::{CaptureDriver, DriverEvent, DriverHandle, DriverObserver};
use crate::catalog::DeviceEnumerator;
use crate::errors::CapturerError;
use crate::injector::ParameterInjector;
use crate::parameters::{CameraParameters, FlashMode, FocusMode, WhiteBalance};
use crate::timing::FrameClock;
use crate::types::{
    CameraDeviceInfo, DeviceId, Facing, RawFrame, VideoDimensions, VideoFormat, VideoPixelFormat,
};
use bytes::Bytes;
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Fill a payload for `format` with a moving gradient so consecutive frames differ.
pub fn synthetic_frame(format: &VideoFormat, frame_number: u64) -> Bytes {
    let VideoDimensions { width, height } = format.dimensions;
    let base = (frame_number % 256) as u8;

    let Some(size) = format.frame_size() else {
        // compressed layouts only need a plausible marker-framed payload
        return Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]);
    };

    let mut data = vec![0u8; size];
    match format.pixel_format {
        VideoPixelFormat::Nv21 | VideoPixelFormat::I420 => {
            let luma = (width * height) as usize;
            for y in 0..height {
                for x in 0..width {
                    data[(y * width + x) as usize] = base.wrapping_add(((x + y) % 256) as u8);
                }
            }
            data[luma..].fill(128);
        }
        VideoPixelFormat::Yuyv => {
            for (i, px) in data.chunks_exact_mut(2).enumerate() {
                px[0] = base.wrapping_add((i % 256) as u8);
                px[1] = 128;
            }
        }
        VideoPixelFormat::Rgb24 | VideoPixelFormat::Rgba8888 => {
            let bpp = if format.pixel_format == VideoPixelFormat::Rgb24 { 3 } else { 4 };
            for y in 0..height {
                for x in 0..width {
                    let idx = ((y * width + x) * bpp) as usize;
                    data[idx] = base.wrapping_add((x % 256) as u8);
                    data[idx + 1] = base.wrapping_add((y % 256) as u8);
                    data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8);
                    if bpp == 4 {
                        data[idx + 3] = 255;
                    }
                }
            }
        }
        VideoPixelFormat::Mjpeg => {}
    }
    Bytes::from(data)
}

fn default_formats() -> Vec<VideoFormat> {
    let mut formats = Vec::new();
    for dims in [
        VideoDimensions::new(640, 480),
        VideoDimensions::new(1280, 720),
        VideoDimensions::new(1920, 1080),
    ] {
        for fps in [15, 30] {
            formats.push(VideoFormat::new(dims, fps, VideoPixelFormat::Nv21));
        }
    }
    formats.push(VideoFormat::hd_720p().with_pixel_format(VideoPixelFormat::Yuyv));
    formats
}

/// Parameters a freshly opened synthetic camera reports.
fn default_parameters(facing: Facing) -> CameraParameters {
    CameraParameters {
        // front sensors have no flash unit
        flash_mode: (facing != Facing::Front).then_some(FlashMode::Off),
        focus_mode: Some(FocusMode::ContinuousVideo),
        auto_exposure_lock: Some(false),
        exposure_compensation: Some(0),
        zoom: Some(1.0),
        white_balance: Some(WhiteBalance::Auto),
        brightness: Some(0.0),
        contrast: Some(0.0),
        saturation: Some(0.0),
        sharpness: Some(0.0),
    }
}

/// Backend with a front and a back synthetic camera.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    devices: Vec<CameraDeviceInfo>,
    clock: FrameClock,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self::with_devices(vec![
            CameraDeviceInfo::new("synthetic-0", "Synthetic Back Camera", Facing::Back)
                .with_orientation(90)
                .with_formats(default_formats()),
            CameraDeviceInfo::new("synthetic-1", "Synthetic Front Camera", Facing::Front)
                .with_orientation(270)
                .with_formats(default_formats()),
        ])
    }

    pub fn with_devices(devices: Vec<CameraDeviceInfo>) -> Self {
        Self {
            devices,
            clock: FrameClock::new(),
        }
    }

    fn device(&self, id: &DeviceId) -> Option<&CameraDeviceInfo> {
        self.devices.iter().find(|d| &d.id == id)
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceEnumerator for SyntheticBackend {
    fn list_devices(&self) -> Result<Vec<CameraDeviceInfo>, CapturerError> {
        Ok(self.devices.clone())
    }
}

impl CaptureDriver for SyntheticBackend {
    fn create(&self, device: &DeviceId) -> Result<Box<dyn DriverHandle>, CapturerError> {
        let info = self
            .device(device)
            .filter(|d| d.is_available)
            .ok_or_else(|| {
                CapturerError::DriverCreationFailed(format!("no synthetic device {device}"))
            })?;
        log::debug!("Created synthetic capturer for {}", info.name);
        Ok(Box::new(SyntheticHandle {
            current: info.clone(),
            devices: self.devices.clone(),
            clock: self.clock.clone(),
            commands: None,
            thread: None,
        }))
    }
}

enum Command {
    Inject(Arc<ParameterInjector>),
    Switch(CameraDeviceInfo),
    Stop,
}

pub struct SyntheticHandle {
    current: CameraDeviceInfo,
    devices: Vec<CameraDeviceInfo>,
    clock: FrameClock,
    commands: Option<Sender<Command>>,
    thread: Option<JoinHandle<()>>,
}

impl DriverHandle for SyntheticHandle {
    fn start_streaming(&mut self, format: &VideoFormat, observer: Arc<dyn DriverObserver>) {
        let (tx, rx) = unbounded();
        let worker = DriverThread {
            device: self.current.clone(),
            format: *format,
            clock: self.clock.clone(),
            observer: observer.clone(),
            parameters: default_parameters(self.current.facing),
        };

        match std::thread::Builder::new()
            .name("synthetic-capture-driver".to_string())
            .spawn(move || worker.run(rx))
        {
            Ok(thread) => {
                self.commands = Some(tx);
                self.thread = Some(thread);
            }
            Err(e) => {
                log::error!("Failed to spawn synthetic driver thread: {}", e);
                // report from a helper thread; never call back re-entrantly
                let _ = std::thread::Builder::new()
                    .name("synthetic-capture-failure".to_string())
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
            // stopped from a listener callback; the loop exits on its own
            return Ok(());
        }
        thread
            .join()
            .map_err(|_| CapturerError::DriverStopFailed("synthetic driver thread panicked".into()))
    }

    fn switch_device(&mut self, device: &DeviceId) -> Result<(), CapturerError> {
        let next = self
            .devices
            .iter()
            .find(|d| &d.id == device && d.is_available)
            .cloned()
            .ok_or_else(|| CapturerError::DriverSwitchFailed(format!("no synthetic device {device}")))?;
        let commands = self
            .commands
            .as_ref()
            .ok_or_else(|| CapturerError::DriverSwitchFailed("not streaming".into()))?;
        commands
            .send(Command::Switch(next.clone()))
            .map_err(|_| CapturerError::DriverSwitchFailed("driver thread gone".into()))?;
        self.current = next;
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
                log::warn!("Synthetic driver stop during release failed: {}", e);
            }
        }
        log::debug!("Released synthetic capturer {}", self.current.id);
    }
}

struct DriverThread {
    device: CameraDeviceInfo,
    format: VideoFormat,
    clock: FrameClock,
    observer: Arc<dyn DriverObserver>,
    parameters: CameraParameters,
}

impl DriverThread {
    fn run(mut self, commands: Receiver<Command>) {
        self.observer.on_event(DriverEvent::Opening(self.device.name.clone()));
        self.observer.on_event(DriverEvent::Started { success: true });

        let interval = Duration::from_secs(1) / self.format.framerate.max(1);
        let mut next_frame = Instant::now();
        let mut frame_number: u64 = 0;

        loop {
            match commands.recv_deadline(next_frame) {
                Ok(Command::Stop) => break,
                Ok(Command::Inject(injector)) => self.apply(&injector),
                Ok(Command::Switch(device)) => {
                    log::info!("Synthetic driver switched to {}", device.name);
                    self.parameters = default_parameters(device.facing);
                    self.device = device;
                }
                Err(RecvTimeoutError::Timeout) => {
                    self.emit_frame(frame_number);
                    if frame_number == 0 {
                        self.observer.on_event(DriverEvent::FirstFrameAvailable);
                    }
                    frame_number += 1;
                    next_frame += interval;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.observer.on_event(DriverEvent::Closed);
    }

    fn apply(&mut self, injector: &ParameterInjector) {
        let before = self.parameters.clone();
        if injector.apply(&mut self.parameters) {
            let changed = self.parameters.diff(&before);
            log::debug!("Synthetic driver applied parameters {:?}", changed);
        }
    }

    fn emit_frame(&self, frame_number: u64) {
        let rotation = self.device.orientation as i32;
        self.observer.on_event(DriverEvent::Frame(RawFrame {
            data: synthetic_frame(&self.format, frame_number),
            width: self.format.dimensions.width,
            height: self.format.dimensions.height,
            rotation,
            timestamp_ns: self.clock.now_ns(),
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_frame_sizes_match_format() {
        for format in default_formats() {
            let payload = synthetic_frame(&format, 7);
            assert_eq!(Some(payload.len()), format.frame_size(), "{format}");
        }
    }

    #[test]
    fn test_frames_vary_between_numbers() {
        let format = VideoFormat::vga();
        assert_ne!(synthetic_frame(&format, 0), synthetic_frame(&format, 1));
    }

    #[test]
    fn test_create_unknown_device_fails() {
        let backend = SyntheticBackend::new();
        let err = backend.create(&DeviceId::new("missing")).err().unwrap();
        assert_eq!(err.kind(), crate::errors::ErrorKind::DriverCreationFailed);
    }
}
