//! Performance benchmarks for the frame delivery path
//!
//! Run with: cargo bench --bench delivery_benchmarks
//!
//! Measures the per-frame cost the capturer adds between the driver callback and the
//! listener, and the cost of the parameter mailbox.

use camera_capturer::injector::ParameterInjector;
use camera_capturer::parameters::CameraParameters;
use camera_capturer::testing::{raw_frame, FixedPermissions, MockBackend};
use camera_capturer::{CameraCapturer, CameraSource, CapturerListener, VideoFormat, VideoFrame};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::sync::Arc;

struct NullListener;

impl CapturerListener for NullListener {
    fn on_capturer_started(&self, _success: bool) {}

    fn on_frame_captured(&self, frame: VideoFrame) {
        black_box(frame);
    }
}

fn bench_frame_delivery(c: &mut Criterion) {
    let mut group = c.benchmark_group("Frame Delivery");
    group.throughput(Throughput::Elements(1));

    for (format, name) in [
        (VideoFormat::vga(), "480p"),
        (VideoFormat::hd_720p(), "720p"),
        (VideoFormat::full_hd(), "1080p"),
    ] {
        let backend = MockBackend::new();
        let capturer = CameraCapturer::new(
            CameraSource::BackCamera,
            Arc::new(backend.clone()),
            &FixedPermissions(true),
            None,
        );
        capturer.start_capture(format, Arc::new(NullListener));
        backend.confirm_start(true);

        let frame = raw_frame(&format, 90, 0);
        let mut timestamp = 0u64;
        group.bench_with_input(BenchmarkId::new("deliver", name), &frame, |b, frame| {
            b.iter(|| {
                timestamp += 33_333_333;
                let mut next = frame.clone();
                next.timestamp_ns = timestamp;
                backend.emit_frame(next)
            })
        });

        capturer.stop_capture();
    }

    group.finish();
}

fn bench_parameter_mailbox(c: &mut Criterion) {
    let injector = ParameterInjector::new();
    let mut parameters = CameraParameters::default();

    c.bench_function("submit_and_apply", |b| {
        b.iter(|| {
            injector.submit(Box::new(|p: &mut CameraParameters| p.zoom = Some(2.0)));
            black_box(injector.apply(&mut parameters))
        })
    });
}

criterion_group!(benches, bench_frame_delivery, bench_parameter_mailbox);
criterion_main!(benches);
