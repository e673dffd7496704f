#[cfg(test)]
mod error_tests {
    use camera_capturer::errors::{CapturerError, ErrorKind};
    use camera_capturer::reporting::{CapturerErrorReport, ErrorDomain};
    use std::error::Error;

    #[test]
    fn test_device_unavailable_message() {
        let error = CapturerError::DeviceUnavailable("no front camera found".to_string());
        assert!(error.to_string().contains("Camera device unavailable"));
        assert!(error.to_string().contains("no front camera found"));
    }

    #[test]
    fn test_error_display_trait() {
        let error = CapturerError::DriverStopFailed("Display test".to_string());
        assert_eq!(format!("{}", error), "Driver stop failed: Display test");
    }

    #[test]
    fn test_error_debug_format() {
        let error = CapturerError::DriverCreationFailed("Debug test".to_string());
        let debug_str = format!("{:?}", error);
        assert!(debug_str.contains("DriverCreationFailed"));
        assert!(debug_str.contains("Debug test"));
    }

    #[test]
    fn test_error_implements_error_trait() {
        let error = CapturerError::PermissionDenied("Error trait test".to_string());
        let _error_trait: &dyn Error = &error;
        assert!(error.source().is_none());
    }

    #[test]
    fn test_kinds_and_driver_classification() {
        let errors = vec![
            (CapturerError::DeviceUnavailable("a".into()), ErrorKind::DeviceUnavailable, false),
            (CapturerError::PermissionDenied("b".into()), ErrorKind::PermissionDenied, false),
            (CapturerError::DriverCreationFailed("c".into()), ErrorKind::DriverCreationFailed, true),
            (CapturerError::DriverStartFailed("d".into()), ErrorKind::DriverStartFailed, true),
            (CapturerError::DriverStopFailed("e".into()), ErrorKind::DriverStopFailed, true),
            (CapturerError::DriverSwitchFailed("f".into()), ErrorKind::DriverSwitchFailed, true),
            (CapturerError::EnumerationFailed("g".into()), ErrorKind::EnumerationFailed, false),
            (CapturerError::InvalidFormat("h".into()), ErrorKind::InvalidFormat, false),
            (CapturerError::InvalidParameter("i".into()), ErrorKind::InvalidParameter, false),
            (CapturerError::ConfigError("j".into()), ErrorKind::Config, false),
        ];

        for (error, kind, driver) in errors {
            assert_eq!(error.kind(), kind, "{error}");
            assert_eq!(error.is_driver_error(), driver, "{error}");
            assert!(!error.to_string().is_empty());
        }
    }

    #[test]
    fn test_error_report_display() {
        let report = CapturerErrorReport::new(ErrorDomain::Capturer, "Failed to create capturer");
        assert_eq!(report.to_string(), "[Capturer] Failed to create capturer");
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"domain\":\"Capturer\""));
    }
}
