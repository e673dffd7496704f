//! Live camera parameters that a [`ParameterUpdater`](crate::injector::ParameterUpdater)
//! may mutate on the driver thread.

use crate::errors::CapturerError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlashMode {
    Off,
    On,
    Auto,
    Torch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FocusMode {
    Auto,
    ContinuousVideo,
    Infinity,
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WhiteBalance {
    Auto,
    Daylight,
    Cloudy,
    Tungsten,
    Fluorescent,
}

/// Snapshot of the tunable hardware parameters of an open device.
///
/// `None` means the device does not expose the parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CameraParameters {
    pub flash_mode: Option<FlashMode>,
    pub focus_mode: Option<FocusMode>,
    pub auto_exposure_lock: Option<bool>,
    pub exposure_compensation: Option<i32>,
    pub zoom: Option<f32>,
    pub white_balance: Option<WhiteBalance>,
    pub brightness: Option<f32>,
    pub contrast: Option<f32>,
    pub saturation: Option<f32>,
    pub sharpness: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterId {
    FlashMode,
    FocusMode,
    AutoExposureLock,
    ExposureCompensation,
    Zoom,
    WhiteBalance,
    Brightness,
    Contrast,
    Saturation,
    Sharpness,
}

impl ParameterId {
    pub const ALL: [ParameterId; 10] = [
        ParameterId::FlashMode,
        ParameterId::FocusMode,
        ParameterId::AutoExposureLock,
        ParameterId::ExposureCompensation,
        ParameterId::Zoom,
        ParameterId::WhiteBalance,
        ParameterId::Brightness,
        ParameterId::Contrast,
        ParameterId::Saturation,
        ParameterId::Sharpness,
    ];
}

impl FromStr for ParameterId {
    type Err = CapturerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParameterId::ALL
            .into_iter()
            .find(|id| format!("{id:?}").eq_ignore_ascii_case(s))
            .ok_or_else(|| CapturerError::InvalidParameter(format!("unknown parameter: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParameterKind {
    Bool,
    I32,
    F32,
    Flash,
    Focus,
    WhiteBalance,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Bool(bool),
    I32(i32),
    F32(f32),
    Flash(FlashMode),
    Focus(FocusMode),
    WhiteBalance(WhiteBalance),
}

impl ParameterValue {
    pub fn kind(&self) -> ParameterKind {
        match self {
            ParameterValue::Bool(_) => ParameterKind::Bool,
            ParameterValue::I32(_) => ParameterKind::I32,
            ParameterValue::F32(_) => ParameterKind::F32,
            ParameterValue::Flash(_) => ParameterKind::Flash,
            ParameterValue::Focus(_) => ParameterKind::Focus,
            ParameterValue::WhiteBalance(_) => ParameterKind::WhiteBalance,
        }
    }
}

/// Schema entry: value kind and inclusive numeric bounds.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ParameterInfo {
    pub id: ParameterId,
    pub kind: ParameterKind,
    pub min: Option<f32>,
    pub max: Option<f32>,
}

impl ParameterInfo {
    const fn new(id: ParameterId, kind: ParameterKind) -> Self {
        Self {
            id,
            kind,
            min: None,
            max: None,
        }
    }

    const fn bounded(id: ParameterId, kind: ParameterKind, min: f32, max: f32) -> Self {
        Self {
            id,
            kind,
            min: Some(min),
            max: Some(max),
        }
    }
}

pub fn all_parameters() -> Vec<ParameterInfo> {
    vec![
        ParameterInfo::new(ParameterId::FlashMode, ParameterKind::Flash),
        ParameterInfo::new(ParameterId::FocusMode, ParameterKind::Focus),
        ParameterInfo::new(ParameterId::AutoExposureLock, ParameterKind::Bool),
        ParameterInfo::bounded(ParameterId::ExposureCompensation, ParameterKind::I32, -12.0, 12.0),
        ParameterInfo::bounded(ParameterId::Zoom, ParameterKind::F32, 1.0, 10.0),
        ParameterInfo::new(ParameterId::WhiteBalance, ParameterKind::WhiteBalance),
        ParameterInfo::bounded(ParameterId::Brightness, ParameterKind::F32, -1.0, 1.0),
        ParameterInfo::bounded(ParameterId::Contrast, ParameterKind::F32, -1.0, 1.0),
        ParameterInfo::bounded(ParameterId::Saturation, ParameterKind::F32, -1.0, 1.0),
        ParameterInfo::bounded(ParameterId::Sharpness, ParameterKind::F32, -1.0, 1.0),
    ]
}

pub fn parameter_info(id: ParameterId) -> ParameterInfo {
    all_parameters()
        .into_iter()
        .find(|info| info.id == id)
        .unwrap_or(ParameterInfo::new(id, ParameterKind::Bool))
}

pub fn validate_parameter_value(id: ParameterId, value: &ParameterValue) -> Result<(), CapturerError> {
    let info = parameter_info(id);
    if info.kind != value.kind() {
        return Err(CapturerError::InvalidParameter(format!(
            "{id:?} expects {:?}, got {:?}",
            info.kind,
            value.kind()
        )));
    }

    let numeric = match value {
        ParameterValue::I32(v) => Some(*v as f32),
        ParameterValue::F32(v) => {
            if !v.is_finite() {
                return Err(CapturerError::InvalidParameter(format!(
                    "{id:?} must be finite"
                )));
            }
            Some(*v)
        }
        _ => None,
    };

    if let Some(v) = numeric {
        if info.min.is_some_and(|min| v < min) {
            return Err(CapturerError::InvalidParameter(format!(
                "{id:?} below minimum"
            )));
        }
        if info.max.is_some_and(|max| v > max) {
            return Err(CapturerError::InvalidParameter(format!(
                "{id:?} above maximum"
            )));
        }
    }
    Ok(())
}

impl CameraParameters {
    pub fn get(&self, id: ParameterId) -> Option<ParameterValue> {
        match id {
            ParameterId::FlashMode => self.flash_mode.map(ParameterValue::Flash),
            ParameterId::FocusMode => self.focus_mode.map(ParameterValue::Focus),
            ParameterId::AutoExposureLock => self.auto_exposure_lock.map(ParameterValue::Bool),
            ParameterId::ExposureCompensation => {
                self.exposure_compensation.map(ParameterValue::I32)
            }
            ParameterId::Zoom => self.zoom.map(ParameterValue::F32),
            ParameterId::WhiteBalance => self.white_balance.map(ParameterValue::WhiteBalance),
            ParameterId::Brightness => self.brightness.map(ParameterValue::F32),
            ParameterId::Contrast => self.contrast.map(ParameterValue::F32),
            ParameterId::Saturation => self.saturation.map(ParameterValue::F32),
            ParameterId::Sharpness => self.sharpness.map(ParameterValue::F32),
        }
    }

    /// Sets a parameter after validating it against [`all_parameters`].
    pub fn set(&mut self, id: ParameterId, value: ParameterValue) -> Result<(), CapturerError> {
        validate_parameter_value(id, &value)?;
        match (id, value) {
            (ParameterId::FlashMode, ParameterValue::Flash(v)) => self.flash_mode = Some(v),
            (ParameterId::FocusMode, ParameterValue::Focus(v)) => self.focus_mode = Some(v),
            (ParameterId::AutoExposureLock, ParameterValue::Bool(v)) => {
                self.auto_exposure_lock = Some(v)
            }
            (ParameterId::ExposureCompensation, ParameterValue::I32(v)) => {
                self.exposure_compensation = Some(v)
            }
            (ParameterId::Zoom, ParameterValue::F32(v)) => self.zoom = Some(v),
            (ParameterId::WhiteBalance, ParameterValue::WhiteBalance(v)) => {
                self.white_balance = Some(v)
            }
            (ParameterId::Brightness, ParameterValue::F32(v)) => self.brightness = Some(v),
            (ParameterId::Contrast, ParameterValue::F32(v)) => self.contrast = Some(v),
            (ParameterId::Saturation, ParameterValue::F32(v)) => self.saturation = Some(v),
            (ParameterId::Sharpness, ParameterValue::F32(v)) => self.sharpness = Some(v),
            _ => {
                return Err(CapturerError::InvalidParameter(format!(
                    "{id:?} kind mismatch"
                )))
            }
        }
        Ok(())
    }

    /// Ids whose value differs from `previous`; drivers push only these to hardware.
    pub fn diff(&self, previous: &CameraParameters) -> Vec<ParameterId> {
        ParameterId::ALL
            .into_iter()
            .filter(|id| self.get(*id) != previous.get(*id))
            .collect()
    }

    /// Whether the device exposes a flash unit.
    pub fn supports_flash(&self) -> bool {
        self.flash_mode.is_some()
    }
}
