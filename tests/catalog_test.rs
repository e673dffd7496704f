#[cfg(test)]
mod catalog_tests {
    use camera_capturer::catalog::FormatCatalog;
    use camera_capturer::driver::synthetic::SyntheticBackend;
    use camera_capturer::testing::{FixedPermissions, MockBackend};
    use camera_capturer::{
        CameraCapturer, CameraDeviceInfo, CameraSource, DeviceId, ErrorKind, Facing,
        VideoDimensions, VideoFormat, VideoPixelFormat,
    };
    use std::sync::Arc;

    #[test]
    fn test_synthetic_devices_cover_both_sources() {
        let catalog = FormatCatalog::new(Arc::new(SyntheticBackend::new()));
        let devices = catalog.list_devices().unwrap();
        assert_eq!(devices.len(), 2);

        let back = catalog.resolve_device_id(CameraSource::BackCamera).unwrap();
        let front = catalog.resolve_device_id(CameraSource::FrontCamera).unwrap();
        assert_ne!(back, front);
    }

    #[test]
    fn test_supported_formats_are_fresh_per_call() {
        let backend = MockBackend::new();
        let catalog = FormatCatalog::new(Arc::new(backend.clone()));
        assert_eq!(catalog.supported_formats(CameraSource::BackCamera).unwrap().len(), 2);

        backend.set_devices(vec![CameraDeviceInfo::new("0", "Back", Facing::Back)
            .with_formats(vec![VideoFormat::full_hd()])]);
        assert_eq!(
            catalog.supported_formats(CameraSource::BackCamera).unwrap(),
            vec![VideoFormat::full_hd()]
        );
    }

    #[test]
    fn test_unresolvable_source_is_device_unavailable() {
        let backend = MockBackend::with_devices(vec![CameraDeviceInfo::new(
            "7",
            "External",
            Facing::External,
        )]);
        let catalog = FormatCatalog::new(Arc::new(backend));
        let err = catalog
            .supported_formats(CameraSource::FrontCamera)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
    }

    #[test]
    fn test_enumeration_failure_maps_to_device_unavailable() {
        let backend = MockBackend::new();
        backend.fail_enumeration("bus reset");
        let catalog = FormatCatalog::new(Arc::new(backend));
        let err = catalog.resolve_device_id(CameraSource::BackCamera).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DeviceUnavailable);
        assert!(err.to_string().contains("bus reset"));
    }

    #[test]
    fn test_first_matching_device_wins() {
        let backend = MockBackend::with_devices(vec![
            CameraDeviceInfo::new("3", "Busy Back", Facing::Back).with_availability(false),
            CameraDeviceInfo::new("4", "Back A", Facing::Back),
            CameraDeviceInfo::new("5", "Back B", Facing::Back),
        ]);
        let catalog = FormatCatalog::new(Arc::new(backend));
        assert_eq!(
            catalog.resolve_device_id(CameraSource::BackCamera).unwrap(),
            DeviceId::new("4")
        );
    }

    #[test]
    fn test_closest_format_prefers_requested_layout() {
        let catalog = FormatCatalog::new(Arc::new(SyntheticBackend::new()));
        let requested = VideoFormat::new(VideoDimensions::new(1280, 720), 30, VideoPixelFormat::Yuyv);
        let best = catalog
            .closest_format(CameraSource::BackCamera, &requested)
            .unwrap();
        assert_eq!(best, requested);
        assert!(catalog.is_supported(CameraSource::BackCamera, &best));
    }

    #[test]
    fn test_capturer_lists_formats_for_current_source() {
        let capturer = CameraCapturer::new(
            CameraSource::FrontCamera,
            Arc::new(MockBackend::new()),
            &FixedPermissions(true),
            None,
        );
        let formats = capturer.supported_formats().unwrap();
        assert!(formats.contains(&VideoFormat::hd_720p()));
        assert_eq!(capturer.catalog().list_devices().unwrap().len(), 2);
    }
}
