use camera_capturer::permissions::{
    check_permission, check_permission_detailed, PermissionChecker, PermissionKind,
    PermissionStatus, SystemPermissions,
};
use camera_capturer::reporting::ErrorDomain;
use camera_capturer::testing::{MockBackend, RecordingReporter};
use camera_capturer::{CameraCapturer, CameraSource, ErrorReporter};
use std::sync::Arc;

#[test]
fn test_permission_status_display() {
    assert_eq!(PermissionStatus::Granted.to_string(), "granted");
    assert_eq!(PermissionStatus::NotDetermined.to_string(), "not_determined");
}

#[test]
fn test_detailed_status_matches_simple_check() {
    let info = check_permission_detailed();
    assert_eq!(info.status, check_permission());
    assert!(!info.message.is_empty());
}

#[test]
fn test_system_checker_agrees_with_probe() {
    let granted = check_permission() == PermissionStatus::Granted;
    assert_eq!(SystemPermissions.has_permission(PermissionKind::Camera), granted);
}

#[test]
fn test_closure_checker_is_queried_once_at_construction() {
    let calls = std::sync::atomic::AtomicUsize::new(0);
    let checker = |kind: PermissionKind| {
        calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        kind != PermissionKind::Camera
    };
    let reporter = Arc::new(RecordingReporter::new());
    let sink: Arc<dyn ErrorReporter> = reporter.clone();

    let capturer = CameraCapturer::new(
        CameraSource::BackCamera,
        Arc::new(MockBackend::new()),
        &checker,
        Some(sink),
    );
    capturer.stop_capture();

    assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    assert_eq!(reporter.messages().len(), 1);
    assert_eq!(reporter.messages()[0].0, ErrorDomain::Camera);
}
