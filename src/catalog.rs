//! Device enumeration and capture format queries.

use crate::errors::CapturerError;
use crate::types::{CameraDeviceInfo, CameraSource, DeviceId, VideoFormat};
use std::sync::Arc;

/// Read-only view of the capture devices a platform exposes.
pub trait DeviceEnumerator: Send + Sync {
    fn list_devices(&self) -> Result<Vec<CameraDeviceInfo>, CapturerError>;

    /// Formats advertised by `device`. The default reads them off the enumeration result.
    fn list_formats(&self, device: &DeviceId) -> Result<Vec<VideoFormat>, CapturerError> {
        self.list_devices()?
            .into_iter()
            .find(|d| &d.id == device)
            .map(|d| d.formats)
            .ok_or_else(|| CapturerError::DeviceUnavailable(format!("device not found: {device}")))
    }
}

/// Resolves logical camera sources to devices and lists what they can capture.
///
/// Holds no state of its own; every query goes to the enumerator.
#[derive(Clone)]
pub struct FormatCatalog {
    enumerator: Arc<dyn DeviceEnumerator>,
}

impl FormatCatalog {
    pub fn new(enumerator: Arc<dyn DeviceEnumerator>) -> Self {
        Self { enumerator }
    }

    pub fn list_devices(&self) -> Result<Vec<CameraDeviceInfo>, CapturerError> {
        self.enumerator.list_devices()
    }

    /// Maps `source` to the first available device whose facing matches.
    pub fn resolve_device_id(&self, source: CameraSource) -> Result<DeviceId, CapturerError> {
        let wanted = source.facing();
        let devices = self.enumerator.list_devices().map_err(|e| {
            CapturerError::DeviceUnavailable(format!("failed to enumerate cameras: {e}"))
        })?;

        devices
            .into_iter()
            .find(|d| d.is_available && d.facing == wanted)
            .map(|d| d.id)
            .ok_or_else(|| {
                CapturerError::DeviceUnavailable(format!("no {source} camera found"))
            })
    }

    /// Fresh snapshot of the formats the device behind `source` advertises.
    pub fn supported_formats(&self, source: CameraSource) -> Result<Vec<VideoFormat>, CapturerError> {
        let device = self.resolve_device_id(source)?;
        let mut formats = self.enumerator.list_formats(&device)?;
        formats.dedup();
        log::debug!("{} camera ({}) supports {} formats", source, device, formats.len());
        Ok(formats)
    }

    /// Supported format closest to `requested`: smallest pixel-area distance, then
    /// framerate distance, preferring the requested pixel layout on ties.
    pub fn closest_format(
        &self,
        source: CameraSource,
        requested: &VideoFormat,
    ) -> Result<VideoFormat, CapturerError> {
        let formats = self.supported_formats(source)?;
        formats
            .into_iter()
            .min_by_key(|f| {
                (
                    f.dimensions.area().abs_diff(requested.dimensions.area()),
                    f.framerate.abs_diff(requested.framerate),
                    f.pixel_format != requested.pixel_format,
                )
            })
            .ok_or_else(|| {
                CapturerError::InvalidFormat(format!("{source} camera advertises no formats"))
            })
    }

    /// Whether `format` is one the device behind `source` advertises.
    pub fn is_supported(&self, source: CameraSource, format: &VideoFormat) -> bool {
        self.supported_formats(source)
            .map(|formats| formats.contains(format))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Facing, VideoDimensions, VideoPixelFormat};

    struct StaticEnumerator(Vec<CameraDeviceInfo>);

    impl DeviceEnumerator for StaticEnumerator {
        fn list_devices(&self) -> Result<Vec<CameraDeviceInfo>, CapturerError> {
            Ok(self.0.clone())
        }
    }

    fn catalog() -> FormatCatalog {
        let back = CameraDeviceInfo::new("0", "Back", Facing::Back)
            .with_orientation(90)
            .with_formats(vec![
                VideoFormat::vga(),
                VideoFormat::hd_720p(),
                VideoFormat::hd_720p().with_pixel_format(VideoPixelFormat::Yuyv),
                VideoFormat::new(VideoDimensions::new(1280, 720), 15, VideoPixelFormat::Nv21),
            ]);
        let usb = CameraDeviceInfo::new("2", "USB", Facing::External);
        FormatCatalog::new(Arc::new(StaticEnumerator(vec![back, usb])))
    }

    #[test]
    fn test_resolve_by_facing() {
        let catalog = catalog();
        assert_eq!(
            catalog.resolve_device_id(CameraSource::BackCamera).unwrap(),
            DeviceId::new("0")
        );
        let err = catalog.resolve_device_id(CameraSource::FrontCamera).unwrap_err();
        assert_eq!(err.kind(), crate::errors::ErrorKind::DeviceUnavailable);
    }

    #[test]
    fn test_supported_formats_requires_device() {
        let catalog = catalog();
        assert_eq!(catalog.supported_formats(CameraSource::BackCamera).unwrap().len(), 4);
        assert!(catalog.supported_formats(CameraSource::FrontCamera).is_err());
    }

    #[test]
    fn test_closest_format() {
        let catalog = catalog();
        let requested = VideoFormat::new(VideoDimensions::new(1280, 720), 24, VideoPixelFormat::Yuyv);
        let best = catalog.closest_format(CameraSource::BackCamera, &requested).unwrap();
        assert_eq!(best.dimensions, VideoDimensions::new(1280, 720));
        assert_eq!(best.framerate, 30);
        assert_eq!(best.pixel_format, VideoPixelFormat::Yuyv);

        let tiny = VideoFormat::new(VideoDimensions::new(160, 120), 30, VideoPixelFormat::Nv21);
        assert_eq!(
            catalog.closest_format(CameraSource::BackCamera, &tiny).unwrap(),
            VideoFormat::vga()
        );
    }

    #[test]
    fn test_unavailable_device_is_skipped() {
        let busy = CameraDeviceInfo::new("1", "Front", Facing::Front).with_availability(false);
        let catalog = FormatCatalog::new(Arc::new(StaticEnumerator(vec![busy])));
        assert!(catalog.resolve_device_id(CameraSource::FrontCamera).is_err());
    }
}
