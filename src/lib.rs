//! Camera capturer: a capture controller for one logical camera source.
//!
//! This crate opens the physical device behind a front or back camera, streams frames
//! to a listener, queues hardware parameter updates until the device can take them and
//! switches between cameras without tearing down the stream.
//!
//! # Features
//! - Asynchronous start with exactly one start result per request
//! - Latest-wins parameter updates applied on the driver thread
//! - In-place camera switching with a logical toggle that survives driver failures
//! - Device and format enumeration with closest-format negotiation
//! - A synthetic backend for offline use and a `nokhwa` backend behind the `native` feature
//!
//! # Usage
//! ```rust,no_run
//! use camera_capturer::driver::synthetic::SyntheticBackend;
//! use camera_capturer::listener::ChannelListener;
//! use camera_capturer::permissions::SystemPermissions;
//! use camera_capturer::{CameraCapturer, CameraSource, VideoFormat};
//! use std::sync::Arc;
//!
//! let backend = Arc::new(SyntheticBackend::new());
//! let capturer = CameraCapturer::new(CameraSource::BackCamera, backend, &SystemPermissions, None);
//! let (listener, events) = ChannelListener::new(8);
//! capturer.start_capture(VideoFormat::hd_720p(), listener);
//! let _first = events.recv();
//! capturer.stop_capture();
//! ```
pub mod capturer;
pub mod catalog;
pub mod config;
pub mod driver;
pub mod errors;
pub mod injector;
pub mod invariants;
pub mod listener;
pub mod parameters;
pub mod permissions;
pub mod reporting;
pub mod timing;
pub mod types;

// Testing utilities - scriptable backend and recording doubles
pub mod testing;

pub use capturer::{CameraCapturer, CaptureStats, CapturerListener, CapturerState};
pub use catalog::{DeviceEnumerator, FormatCatalog};
pub use config::CapturerConfig;
pub use errors::{CapturerError, ErrorKind};
pub use injector::{ParameterInjector, ParameterUpdater};
pub use parameters::CameraParameters;
pub use reporting::{CapturerErrorReport, ErrorDomain, ErrorReporter};
pub use types::{
    CameraDeviceInfo, CameraSource, DeviceId, Facing, FrameRotation, VideoDimensions,
    VideoFormat, VideoFrame, VideoPixelFormat,
};

/// Log filter applied when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "camera_capturer=info";

/// Initialize logging for the capturer
pub fn init_logging() {
    init_logging_with(DEFAULT_LOG_FILTER);
}

/// Initialize logging with `filter` as the fallback for an unset `RUST_LOG`.
pub fn init_logging_with(filter: &str) {
    let env = env_logger::Env::default().default_filter_or(filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Get crate information
pub fn get_info() -> CrateInfo {
    CrateInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
        native_backend: cfg!(feature = "native"),
    }
}

/// Crate information structure
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrateInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub native_backend: bool,
}

#[cfg(test)]
mod lib_tests {
    use super::*;

    #[test]
    fn test_crate_info() {
        let info = get_info();
        assert_eq!(info.name, "camera-capturer");
        assert!(!info.version.is_empty());
        assert!(!info.description.is_empty());
    }

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
    }
}
