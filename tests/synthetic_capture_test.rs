//! End-to-end capture through the threaded synthetic driver.

use camera_capturer::driver::synthetic::SyntheticBackend;
use camera_capturer::listener::{CaptureEvent, ChannelListener};
use camera_capturer::parameters::CameraParameters;
use camera_capturer::testing::{FixedPermissions, RecordingListener};
use camera_capturer::{
    CameraCapturer, CameraSource, CapturerListener, CapturerState, FrameRotation, VideoFormat,
    VideoFrame,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(5);

fn capturer(source: CameraSource) -> CameraCapturer {
    CameraCapturer::new(
        source,
        Arc::new(SyntheticBackend::new()),
        &FixedPermissions(true),
        None,
    )
}

#[test]
fn test_synthetic_stream_delivers_frames() {
    let capturer = capturer(CameraSource::BackCamera);
    let listener = Arc::new(RecordingListener::new());

    capturer.start_capture(VideoFormat::vga(), listener.clone());

    assert_eq!(listener.wait_started(WAIT), Some(true));
    assert!(listener.wait_frames(3, WAIT));
    assert_eq!(capturer.state(), CapturerState::Running);

    capturer.stop_capture();
    assert_eq!(capturer.state(), CapturerState::Idle);

    let frames = listener.frames();
    assert!(frames.iter().all(|f| f.is_consistent()));
    assert!(frames.iter().all(|f| f.rotation == FrameRotation::Deg90));
    assert!(frames
        .windows(2)
        .all(|pair| pair[0].timestamp_ns <= pair[1].timestamp_ns));
}

#[test]
fn test_synthetic_parameters_and_switch_while_streaming() {
    let capturer = capturer(CameraSource::BackCamera);
    let (listener, events) = ChannelListener::new(64);

    assert!(capturer.update_camera_parameters(|p: &mut CameraParameters| p.zoom = Some(2.0)));
    capturer.start_capture(VideoFormat::vga(), listener);
    assert!(matches!(
        events.recv_timeout(WAIT),
        Ok(CaptureEvent::Started(true))
    ));

    assert!(capturer.update_camera_parameters(|p: &mut CameraParameters| p.zoom = Some(3.0)));
    assert_eq!(capturer.switch_camera(), CameraSource::FrontCamera);

    // frames keep coming from the front camera's orientation after the switch
    let front = (0..200)
        .filter_map(|_| match events.recv_timeout(WAIT) {
            Ok(CaptureEvent::Frame(frame)) => Some(frame),
            _ => None,
        })
        .find(|frame| frame.rotation == FrameRotation::Deg270);
    assert!(front.is_some());

    capturer.stop_capture();
    assert_eq!(capturer.state(), CapturerState::Idle);
}

/// Stops the capturer from inside the frame callback on the driver thread.
struct StopOnFirstFrame {
    capturer: Mutex<Option<Arc<CameraCapturer>>>,
    started: Mutex<Vec<bool>>,
}

impl CapturerListener for StopOnFirstFrame {
    fn on_capturer_started(&self, success: bool) {
        self.started.lock().unwrap().push(success);
    }

    fn on_frame_captured(&self, _frame: VideoFrame) {
        if let Some(capturer) = self.capturer.lock().unwrap().take() {
            capturer.stop_capture();
        }
    }
}

#[test]
fn test_stop_from_driver_thread_does_not_deadlock() {
    let capturer = Arc::new(capturer(CameraSource::FrontCamera));
    let listener = Arc::new(StopOnFirstFrame {
        capturer: Mutex::new(Some(capturer.clone())),
        started: Mutex::new(Vec::new()),
    });

    capturer.start_capture(VideoFormat::vga(), listener.clone());

    let deadline = std::time::Instant::now() + WAIT;
    while capturer.state() != CapturerState::Idle || listener.started.lock().unwrap().is_empty() {
        assert!(std::time::Instant::now() < deadline, "capturer never stopped");
        std::thread::sleep(Duration::from_millis(5));
    }
    assert_eq!(*listener.started.lock().unwrap(), vec![true]);
}

#[test]
fn test_undrained_listener_reused_across_sessions() {
    let capturer = Arc::new(capturer(CameraSource::BackCamera));
    let (listener, events) = ChannelListener::new(1);

    for _ in 0..2 {
        capturer.start_capture(VideoFormat::vga(), listener.clone());
        let deadline = std::time::Instant::now() + WAIT;
        while capturer.state() != CapturerState::Running {
            assert!(std::time::Instant::now() < deadline, "capturer never started");
            std::thread::sleep(Duration::from_millis(5));
        }

        let (done, stopped) = crossbeam_channel::bounded(1);
        let stopper = {
            let capturer = capturer.clone();
            std::thread::spawn(move || {
                capturer.stop_capture();
                let _ = done.send(());
            })
        };
        assert!(stopped.recv_timeout(WAIT).is_ok(), "stop_capture hung");
        stopper.join().unwrap();
        assert_eq!(capturer.state(), CapturerState::Idle);
    }

    // only the newest start result is left in the queue
    assert_eq!(events.len(), 1);
    assert!(matches!(events.try_recv(), Ok(CaptureEvent::Started(true))));
}
