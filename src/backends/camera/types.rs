// SPDX-License-Identifier: GPL-3.0-only

//! Devices, formats, frames and errors shared by all camera backends

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Camera backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CameraBackendType {
    /// Video4Linux2 devices under `/dev/video*`
    #[default]
    V4l2,
    /// Synthetic in-process camera (demos and tests)
    Virtual,
}

impl std::fmt::Display for CameraBackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraBackendType::V4l2 => write!(f, "v4l2"),
            CameraBackendType::Virtual => write!(f, "virtual"),
        }
    }
}

impl std::str::FromStr for CameraBackendType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v4l2" | "v4l" => Ok(CameraBackendType::V4l2),
            "virtual" | "fake" => Ok(CameraBackendType::Virtual),
            other => Err(format!("unknown camera backend: {}", other)),
        }
    }
}

/// Which physical sensor is active
///
/// `Front` is the user-facing camera, `Back` the environment-facing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FacingMode {
    Front,
    #[default]
    Back,
}

impl FacingMode {
    /// The other sensor
    pub fn opposite(self) -> Self {
        match self {
            FacingMode::Front => FacingMode::Back,
            FacingMode::Back => FacingMode::Front,
        }
    }
}

impl std::fmt::Display for FacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FacingMode::Front => write!(f, "front"),
            FacingMode::Back => write!(f, "back"),
        }
    }
}

impl std::str::FromStr for FacingMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "front" | "user" => Ok(FacingMode::Front),
            "back" | "rear" | "environment" => Ok(FacingMode::Back),
            other => Err(format!("unknown facing mode: {}", other)),
        }
    }
}

/// Frame dimensions in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Pixel count
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Represents a camera device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    pub name: String,
    /// Backend-specific location (e.g. `/dev/video0`, `virtual:0`)
    pub path: String,
    /// Driver name if the backend reports one
    pub driver: Option<String>,
    /// Sensor orientation; `None` for external or unknown cameras
    pub facing: Option<FacingMode>,
}

/// Camera format specification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraFormat {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl CameraFormat {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

impl std::fmt::Display for CameraFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.pixel_format)
    }
}

/// Pixel format of raw camera frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 8-bit R, G, B, A
    RGBA,
    /// 8-bit R, G, B
    RGB24,
    /// 4:2:2, byte order Y0 U Y1 V
    YUYV,
    /// 4:2:2, byte order U Y0 V Y1
    UYVY,
    /// Luma only (IR and monochrome sensors)
    Gray8,
    /// Motion-JPEG, each frame is a complete JPEG image
    MJPEG,
}

impl PixelFormat {
    /// V4L2 FourCC code for this format
    pub fn fourcc(&self) -> &'static [u8; 4] {
        match self {
            PixelFormat::RGBA => b"AB24",
            PixelFormat::RGB24 => b"RGB3",
            PixelFormat::YUYV => b"YUYV",
            PixelFormat::UYVY => b"UYVY",
            PixelFormat::Gray8 => b"GREY",
            PixelFormat::MJPEG => b"MJPG",
        }
    }

    /// Parse a V4L2 FourCC code
    pub fn from_fourcc(code: &[u8; 4]) -> Option<Self> {
        match code {
            b"AB24" | b"RGBA" => Some(PixelFormat::RGBA),
            b"RGB3" => Some(PixelFormat::RGB24),
            b"YUYV" | b"YUY2" => Some(PixelFormat::YUYV),
            b"UYVY" => Some(PixelFormat::UYVY),
            b"GREY" | b"Y8  " => Some(PixelFormat::Gray8),
            b"MJPG" | b"JPEG" => Some(PixelFormat::MJPEG),
            _ => None,
        }
    }

    /// Preference when negotiating with a device (lower is better)
    ///
    /// Uncompressed YUYV avoids MJPEG decode artefacts on cheap webcams.
    pub fn preference(&self) -> u8 {
        match self {
            PixelFormat::YUYV => 0,
            PixelFormat::MJPEG => 1,
            PixelFormat::RGB24 => 2,
            PixelFormat::RGBA => 3,
            PixelFormat::UYVY => 4,
            PixelFormat::Gray8 => 5,
        }
    }

    /// Bytes per pixel for uncompressed formats, `None` for MJPEG
    pub fn bytes_per_pixel(&self) -> Option<u32> {
        match self {
            PixelFormat::RGBA => Some(4),
            PixelFormat::RGB24 => Some(3),
            PixelFormat::YUYV | PixelFormat::UYVY => Some(2),
            PixelFormat::Gray8 => Some(1),
            PixelFormat::MJPEG => None,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = self.fourcc();
        write!(f, "{}", String::from_utf8_lossy(code))
    }
}

/// A single raw frame from the camera
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub width: u32,
    pub height: u32,
    pub data: Arc<[u8]>,
    pub format: PixelFormat,
    /// Row stride in bytes (may include padding); 0 for MJPEG
    pub stride: u32,
    /// When the frame left the device
    pub captured_at: Instant,
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BackendError {
    /// No camera, permission denied, or the device is held by another stream
    #[error("Camera unavailable: {0}")]
    DeviceUnavailable(String),
    /// The camera cannot perform the requested control (e.g. torch)
    #[error("Capability not supported: {0}")]
    CapabilityUnsupported(String),
    /// The stream has not produced a usable frame yet
    #[error("No frame available: {0}")]
    FrameUnavailable(String),
    /// General I/O error
    #[error("I/O error: {0}")]
    Io(String),
    /// Other errors
    #[error("Error: {0}")]
    Other(String),
}

impl From<std::io::Error> for BackendError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                BackendError::DeviceUnavailable(err.to_string())
            }
            _ => BackendError::Io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facing_opposite() {
        assert_eq!(FacingMode::Front.opposite(), FacingMode::Back);
        assert_eq!(FacingMode::Back.opposite(), FacingMode::Front);
    }

    #[test]
    fn test_facing_parse_aliases() {
        assert_eq!("environment".parse::<FacingMode>(), Ok(FacingMode::Back));
        assert_eq!("USER".parse::<FacingMode>(), Ok(FacingMode::Front));
        assert!("sideways".parse::<FacingMode>().is_err());
    }

    #[test]
    fn test_fourcc_aliases() {
        assert_eq!(PixelFormat::from_fourcc(b"YUY2"), Some(PixelFormat::YUYV));
        assert_eq!(PixelFormat::from_fourcc(b"JPEG"), Some(PixelFormat::MJPEG));
        // Compressed video formats cannot be rasterized to a still
        assert_eq!(PixelFormat::from_fourcc(b"H264"), None);
    }

    #[test]
    fn test_yuyv_preferred_over_mjpeg() {
        assert!(PixelFormat::YUYV.preference() < PixelFormat::MJPEG.preference());
    }

    #[test]
    fn test_io_error_maps_permission_to_unavailable() {
        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(matches!(
            BackendError::from(err),
            BackendError::DeviceUnavailable(_)
        ));
    }
}
