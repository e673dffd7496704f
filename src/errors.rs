use thiserror::Error;

/// Fieldless discriminant of [`CapturerError`], handy for matching without payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    DeviceUnavailable,
    PermissionDenied,
    DriverCreationFailed,
    DriverStartFailed,
    DriverStopFailed,
    DriverSwitchFailed,
    EnumerationFailed,
    InvalidFormat,
    InvalidParameter,
    Config,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapturerError {
    #[error("Camera device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("Permission denied error: {0}")]
    PermissionDenied(String),
    #[error("Driver creation failed: {0}")]
    DriverCreationFailed(String),
    #[error("Driver start failed: {0}")]
    DriverStartFailed(String),
    #[error("Driver stop failed: {0}")]
    DriverStopFailed(String),
    #[error("Driver switch failed: {0}")]
    DriverSwitchFailed(String),
    #[error("Device enumeration failed: {0}")]
    EnumerationFailed(String),
    #[error("Invalid format: {0}")]
    InvalidFormat(String),
    #[error("Invalid camera parameter: {0}")]
    InvalidParameter(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl CapturerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CapturerError::DeviceUnavailable(_) => ErrorKind::DeviceUnavailable,
            CapturerError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            CapturerError::DriverCreationFailed(_) => ErrorKind::DriverCreationFailed,
            CapturerError::DriverStartFailed(_) => ErrorKind::DriverStartFailed,
            CapturerError::DriverStopFailed(_) => ErrorKind::DriverStopFailed,
            CapturerError::DriverSwitchFailed(_) => ErrorKind::DriverSwitchFailed,
            CapturerError::EnumerationFailed(_) => ErrorKind::EnumerationFailed,
            CapturerError::InvalidFormat(_) => ErrorKind::InvalidFormat,
            CapturerError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            CapturerError::ConfigError(_) => ErrorKind::Config,
        }
    }

    /// Errors the driver layer raises; everything else originates in the crate itself.
    pub fn is_driver_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::DriverCreationFailed
                | ErrorKind::DriverStartFailed
                | ErrorKind::DriverStopFailed
                | ErrorKind::DriverSwitchFailed
        )
    }
}

pub type Result<T> = std::result::Result<T, CapturerError>;
