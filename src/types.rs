//! Value types shared by the catalog, the drivers and the capturer.

use crate::errors::CapturerError;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical camera selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CameraSource {
    FrontCamera,
    BackCamera,
}

impl CameraSource {
    /// The other camera.
    pub fn toggled(self) -> Self {
        match self {
            CameraSource::FrontCamera => CameraSource::BackCamera,
            CameraSource::BackCamera => CameraSource::FrontCamera,
        }
    }

    /// Facing a physical device must report to back this source.
    pub fn facing(self) -> Facing {
        match self {
            CameraSource::FrontCamera => Facing::Front,
            CameraSource::BackCamera => Facing::Back,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CameraSource::FrontCamera => "front",
            CameraSource::BackCamera => "back",
        }
    }
}

impl fmt::Display for CameraSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CameraSource {
    type Err = CapturerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "front" | "front_camera" | "frontcamera" => Ok(CameraSource::FrontCamera),
            "back" | "back_camera" | "backcamera" | "rear" => Ok(CameraSource::BackCamera),
            other => Err(CapturerError::ConfigError(format!(
                "unknown camera source: {other}"
            ))),
        }
    }
}

/// Facing metadata reported by device enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Facing {
    Front,
    Back,
    External,
}

/// Physical device identifier as understood by a driver.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoDimensions {
    pub width: u32,
    pub height: u32,
}

impl VideoDimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn area(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for VideoDimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Pixel layout of a raw frame payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoPixelFormat {
    Nv21,
    I420,
    Yuyv,
    Rgb24,
    Rgba8888,
    Mjpeg,
}

impl VideoPixelFormat {
    /// Exact payload size for the given dimensions, `None` for compressed layouts.
    pub fn frame_size(&self, dimensions: VideoDimensions) -> Option<usize> {
        let pixels = dimensions.width as usize * dimensions.height as usize;
        match self {
            // 4:2:0 chroma planes are rounded up for odd dimensions
            VideoPixelFormat::Nv21 | VideoPixelFormat::I420 => {
                let chroma_w = (dimensions.width as usize).div_ceil(2);
                let chroma_h = (dimensions.height as usize).div_ceil(2);
                Some(pixels + 2 * chroma_w * chroma_h)
            }
            VideoPixelFormat::Yuyv => Some(pixels * 2),
            VideoPixelFormat::Rgb24 => Some(pixels * 3),
            VideoPixelFormat::Rgba8888 => Some(pixels * 4),
            VideoPixelFormat::Mjpeg => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoPixelFormat::Nv21 => "NV21",
            VideoPixelFormat::I420 => "I420",
            VideoPixelFormat::Yuyv => "YUYV",
            VideoPixelFormat::Rgb24 => "RGB24",
            VideoPixelFormat::Rgba8888 => "RGBA8888",
            VideoPixelFormat::Mjpeg => "MJPEG",
        }
    }
}

impl fmt::Display for VideoPixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoPixelFormat {
    type Err = CapturerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NV21" => Ok(VideoPixelFormat::Nv21),
            "I420" => Ok(VideoPixelFormat::I420),
            "YUYV" | "YUY2" => Ok(VideoPixelFormat::Yuyv),
            "RGB24" | "RGB8" | "RGB" => Ok(VideoPixelFormat::Rgb24),
            "RGBA8888" | "RGBA" => Ok(VideoPixelFormat::Rgba8888),
            "MJPEG" | "MJPG" => Ok(VideoPixelFormat::Mjpeg),
            other => Err(CapturerError::InvalidFormat(format!(
                "unknown pixel format: {other}"
            ))),
        }
    }
}

/// A negotiable capture configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoFormat {
    pub dimensions: VideoDimensions,
    pub framerate: u32,
    pub pixel_format: VideoPixelFormat,
}

impl VideoFormat {
    pub fn new(dimensions: VideoDimensions, framerate: u32, pixel_format: VideoPixelFormat) -> Self {
        Self {
            dimensions,
            framerate,
            pixel_format,
        }
    }

    pub fn vga() -> Self {
        Self::new(VideoDimensions::new(640, 480), 30, VideoPixelFormat::Nv21)
    }

    pub fn hd_720p() -> Self {
        Self::new(VideoDimensions::new(1280, 720), 30, VideoPixelFormat::Nv21)
    }

    pub fn full_hd() -> Self {
        Self::new(VideoDimensions::new(1920, 1080), 30, VideoPixelFormat::Nv21)
    }

    pub fn with_pixel_format(mut self, pixel_format: VideoPixelFormat) -> Self {
        self.pixel_format = pixel_format;
        self
    }

    /// Expected payload length for frames captured in this format.
    pub fn frame_size(&self) -> Option<usize> {
        self.pixel_format.frame_size(self.dimensions)
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{} {}", self.dimensions, self.framerate, self.pixel_format)
    }
}

/// Parses `WxH@fps` with an optional trailing pixel format, e.g. `1280x720@30 NV21`.
impl FromStr for VideoFormat {
    type Err = CapturerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CapturerError::InvalidFormat(format!("expected WxH@fps, got {s:?}"));

        let mut parts = s.split_whitespace();
        let geometry = parts.next().ok_or_else(invalid)?;
        let pixel_format = match parts.next() {
            Some(p) => p.parse()?,
            None => VideoPixelFormat::Nv21,
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        let (size, fps) = geometry.split_once('@').ok_or_else(invalid)?;
        let (w, h) = size.split_once('x').ok_or_else(invalid)?;
        let width: u32 = w.parse().map_err(|_| invalid())?;
        let height: u32 = h.parse().map_err(|_| invalid())?;
        let framerate: u32 = fps.parse().map_err(|_| invalid())?;
        if width == 0 || height == 0 || framerate == 0 {
            return Err(invalid());
        }

        Ok(VideoFormat::new(
            VideoDimensions::new(width, height),
            framerate,
            pixel_format,
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameRotation {
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl FrameRotation {
    pub fn degrees(&self) -> u32 {
        match self {
            FrameRotation::Deg0 => 0,
            FrameRotation::Deg90 => 90,
            FrameRotation::Deg180 => 180,
            FrameRotation::Deg270 => 270,
        }
    }
}

impl TryFrom<i32> for FrameRotation {
    type Error = CapturerError;

    fn try_from(degrees: i32) -> Result<Self, Self::Error> {
        match degrees.rem_euclid(360) {
            0 => Ok(FrameRotation::Deg0),
            90 => Ok(FrameRotation::Deg90),
            180 => Ok(FrameRotation::Deg180),
            270 => Ok(FrameRotation::Deg270),
            _ => Err(CapturerError::InvalidFormat(format!(
                "unsupported frame rotation: {degrees}"
            ))),
        }
    }
}

/// Raw frame data as handed over by a driver callback.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub rotation: i32,
    pub timestamp_ns: u64,
}

/// One delivered frame. Ownership passes to the listener; the capturer keeps no copy.
#[derive(Clone, Serialize)]
pub struct VideoFrame {
    #[serde(skip)]
    pub payload: Bytes,
    pub dimensions: VideoDimensions,
    pub pixel_format: VideoPixelFormat,
    pub rotation: FrameRotation,
    pub timestamp_ns: u64,
}

impl VideoFrame {
    pub fn new(
        payload: Bytes,
        dimensions: VideoDimensions,
        pixel_format: VideoPixelFormat,
        rotation: FrameRotation,
        timestamp_ns: u64,
    ) -> Self {
        Self {
            payload,
            dimensions,
            pixel_format,
            rotation,
            timestamp_ns,
        }
    }

    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }

    /// Payload length matches dimensions and pixel layout.
    pub fn is_consistent(&self) -> bool {
        match self.pixel_format.frame_size(self.dimensions) {
            Some(expected) => expected == self.payload.len(),
            None => !self.payload.is_empty(),
        }
    }
}

impl fmt::Debug for VideoFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VideoFrame")
            .field("dimensions", &self.dimensions)
            .field("pixel_format", &self.pixel_format)
            .field("rotation", &self.rotation)
            .field("timestamp_ns", &self.timestamp_ns)
            .field("payload_bytes", &self.payload.len())
            .finish()
    }
}

/// A physical capture device as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraDeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub facing: Facing,
    /// Sensor mounting orientation in degrees.
    pub orientation: u32,
    pub is_available: bool,
    pub formats: Vec<VideoFormat>,
}

impl CameraDeviceInfo {
    pub fn new(id: impl Into<String>, name: impl Into<String>, facing: Facing) -> Self {
        Self {
            id: DeviceId::new(id),
            name: name.into(),
            facing,
            orientation: 0,
            is_available: true,
            formats: Vec::new(),
        }
    }

    pub fn with_orientation(mut self, orientation: u32) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_formats(mut self, formats: Vec<VideoFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_availability(mut self, available: bool) -> Self {
        self.is_available = available;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_toggle() {
        assert_eq!(CameraSource::FrontCamera.toggled(), CameraSource::BackCamera);
        assert_eq!(CameraSource::BackCamera.toggled(), CameraSource::FrontCamera);
        assert_eq!(CameraSource::FrontCamera.toggled().toggled(), CameraSource::FrontCamera);
    }

    #[test]
    fn test_frame_sizes() {
        let dims = VideoDimensions::new(640, 480);
        assert_eq!(VideoPixelFormat::Nv21.frame_size(dims), Some(640 * 480 * 3 / 2));
        assert_eq!(VideoPixelFormat::Yuyv.frame_size(dims), Some(640 * 480 * 2));
        assert_eq!(VideoPixelFormat::Rgba8888.frame_size(dims), Some(640 * 480 * 4));
        assert_eq!(VideoPixelFormat::Mjpeg.frame_size(dims), None);

        // odd sizes round the chroma planes up
        let odd = VideoDimensions::new(3, 3);
        assert_eq!(VideoPixelFormat::I420.frame_size(odd), Some(9 + 2 * 4));
    }

    #[test]
    fn test_format_parse() {
        let format: VideoFormat = "1280x720@30".parse().unwrap();
        assert_eq!(format, VideoFormat::hd_720p());

        let yuyv: VideoFormat = "640x480@15 YUYV".parse().unwrap();
        assert_eq!(yuyv.pixel_format, VideoPixelFormat::Yuyv);
        assert_eq!(yuyv.framerate, 15);

        assert!("1280x720".parse::<VideoFormat>().is_err());
        assert!("0x720@30".parse::<VideoFormat>().is_err());
        assert!("1280x720@30 NV21 extra".parse::<VideoFormat>().is_err());
    }

    #[test]
    fn test_format_display_parses_back() {
        let format = VideoFormat::full_hd().with_pixel_format(VideoPixelFormat::Rgb24);
        let parsed: VideoFormat = format.to_string().parse().unwrap();
        assert_eq!(parsed, format);
    }

    #[test]
    fn test_rotation_from_degrees() {
        assert_eq!(FrameRotation::try_from(90).unwrap(), FrameRotation::Deg90);
        assert_eq!(FrameRotation::try_from(-90).unwrap(), FrameRotation::Deg270);
        assert_eq!(FrameRotation::try_from(360).unwrap(), FrameRotation::Deg0);
        assert!(FrameRotation::try_from(45).is_err());
    }

    #[test]
    fn test_frame_consistency() {
        let dims = VideoDimensions::new(4, 2);
        let good = VideoFrame::new(
            Bytes::from(vec![0u8; 12]),
            dims,
            VideoPixelFormat::Nv21,
            FrameRotation::Deg0,
            0,
        );
        assert!(good.is_consistent());

        let short = VideoFrame::new(
            Bytes::from(vec![0u8; 5]),
            dims,
            VideoPixelFormat::Nv21,
            FrameRotation::Deg0,
            0,
        );
        assert!(!short.is_consistent());
    }

    #[test]
    fn test_source_parse() {
        assert_eq!("front".parse::<CameraSource>().unwrap(), CameraSource::FrontCamera);
        assert_eq!("BACK".parse::<CameraSource>().unwrap(), CameraSource::BackCamera);
        assert!("side".parse::<CameraSource>().is_err());
    }
}
