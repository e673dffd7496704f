//! Camera permission probing.
//!
//! The capturer only asks once, at construction, and treats a missing permission as a
//! reportable condition rather than a failure: platforms may grant it later.

/// Permission status enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PermissionStatus {
    Granted,
    Denied,
    /// The user has not been asked yet
    NotDetermined,
    /// Blocked by system policy
    Restricted,
}

impl std::fmt::Display for PermissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionStatus::Granted => write!(f, "granted"),
            PermissionStatus::Denied => write!(f, "denied"),
            PermissionStatus::NotDetermined => write!(f, "not_determined"),
            PermissionStatus::Restricted => write!(f, "restricted"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum PermissionKind {
    Camera,
}

/// Collaborator answering whether the process holds a permission.
pub trait PermissionChecker: Send + Sync {
    fn has_permission(&self, kind: PermissionKind) -> bool;
}

impl<F> PermissionChecker for F
where
    F: Fn(PermissionKind) -> bool + Send + Sync,
{
    fn has_permission(&self, kind: PermissionKind) -> bool {
        self(kind)
    }
}

/// Permission checker backed by the host platform.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPermissions;

impl PermissionChecker for SystemPermissions {
    fn has_permission(&self, kind: PermissionKind) -> bool {
        match kind {
            PermissionKind::Camera => check_permission() == PermissionStatus::Granted,
        }
    }
}

/// Detailed permission information
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PermissionInfo {
    pub status: PermissionStatus,
    pub message: String,
    pub can_request: bool,
}

pub fn check_permission() -> PermissionStatus {
    check_permission_detailed().status
}

pub fn check_permission_detailed() -> PermissionInfo {
    #[cfg(target_os = "linux")]
    {
        check_permission_linux()
    }

    #[cfg(not(target_os = "linux"))]
    {
        PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "Permission probing not supported on this platform".to_string(),
            can_request: false,
        }
    }
}

#[cfg(target_os = "linux")]
fn check_permission_linux() -> PermissionInfo {
    use std::fs::OpenOptions;
    use std::path::Path;

    let video_devices: Vec<String> = (0..10)
        .map(|i| format!("/dev/video{}", i))
        .filter(|path| Path::new(path).exists())
        .collect();

    let Some(first_device) = video_devices.first() else {
        return PermissionInfo {
            status: PermissionStatus::NotDetermined,
            message: "No video devices found at /dev/video*".to_string(),
            can_request: false,
        };
    };

    // Opening read-only is the only reliable check; group lookups miss ACLs.
    match OpenOptions::new().read(true).open(first_device) {
        Ok(_) => PermissionInfo {
            status: PermissionStatus::Granted,
            message: format!(
                "Camera access granted via {} ({} video devices present)",
                first_device,
                video_devices.len()
            ),
            can_request: false,
        },
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => PermissionInfo {
            status: PermissionStatus::Denied,
            message: format!(
                "Camera device {} exists but is not readable - run: sudo usermod -a -G video $USER",
                first_device
            ),
            can_request: true,
        },
        Err(e) => PermissionInfo {
            status: PermissionStatus::Restricted,
            message: format!("Cannot access {}: {}", first_device, e),
            can_request: false,
        },
    }
}
