// SPDX-License-Identifier: GPL-3.0-only

//! Torch and orientation controls on V4L2 nodes
//!
//! The `v4l` crate does not expose the flash class, so the two controls
//! the capture pipeline reads are driven with raw `VIDIOC_*CTRL` ioctls.

use crate::backends::camera::types::FacingMode;
use std::fs::File;
use std::os::unix::io::AsRawFd;
use tracing::{debug, warn};

// ===== V4L2 Control Class Bases =====
const V4L2_CTRL_CLASS_CAMERA: u32 = 0x009a0000;
const V4L2_CTRL_CLASS_FLASH: u32 = 0x009c0000;

const V4L2_CID_CAMERA_CLASS_BASE: u32 = V4L2_CTRL_CLASS_CAMERA | 0x900;
const V4L2_CID_FLASH_CLASS_BASE: u32 = V4L2_CTRL_CLASS_FLASH | 0x900;

/// Flash LED mode: none, flash, or torch
pub const V4L2_CID_FLASH_LED_MODE: u32 = V4L2_CID_FLASH_CLASS_BASE + 1;
/// Physical mounting of the sensor: front, back, or external
pub const V4L2_CID_CAMERA_ORIENTATION: u32 = V4L2_CID_CAMERA_CLASS_BASE + 34;

// ===== Menu Values =====

pub const V4L2_FLASH_LED_MODE_NONE: i32 = 0;
pub const V4L2_FLASH_LED_MODE_TORCH: i32 = 2;

pub const V4L2_CAMERA_ORIENTATION_FRONT: i32 = 0;
pub const V4L2_CAMERA_ORIENTATION_BACK: i32 = 1;

// ===== Control Flags =====
const V4L2_CTRL_FLAG_DISABLED: u32 = 0x0001;
const V4L2_CTRL_FLAG_READ_ONLY: u32 = 0x0004;

// ===== ioctl Numbers =====
// (dir << 30) | (size << 16) | ('V' << 8) | nr

const VIDIOC_G_CTRL: libc::c_ulong = 0xC008561B;
const VIDIOC_S_CTRL: libc::c_ulong = 0xC008561C;
const VIDIOC_QUERYCTRL: libc::c_ulong = 0xC0445624;

/// `struct v4l2_control`
#[repr(C)]
struct RawControl {
    id: u32,
    value: i32,
}

/// `struct v4l2_queryctrl`
#[repr(C)]
struct RawQueryCtrl {
    id: u32,
    ctrl_type: u32,
    name: [u8; 32],
    minimum: i32,
    maximum: i32,
    step: i32,
    default_value: i32,
    flags: u32,
    reserved: [u32; 2],
}

/// Range and flags a driver reports for one control
#[derive(Debug, Clone)]
pub struct ControlInfo {
    pub id: u32,
    pub name: String,
    pub minimum: i32,
    pub maximum: i32,
    pub flags: u32,
}

impl ControlInfo {
    /// Present, enabled and writable
    pub fn is_writable(&self) -> bool {
        self.flags & (V4L2_CTRL_FLAG_DISABLED | V4L2_CTRL_FLAG_READ_ONLY) == 0
    }

    pub fn accepts(&self, value: i32) -> bool {
        (self.minimum..=self.maximum).contains(&value)
    }
}

/// Control-only fd on a video node
///
/// Opened separately from the streaming fd; drivers allow controls on any
/// open handle.
pub struct ControlFd {
    file: File,
    path: String,
}

impl ControlFd {
    pub fn open(device_path: &str) -> std::io::Result<Self> {
        Ok(Self {
            file: File::open(device_path)?,
            path: device_path.to_string(),
        })
    }

    fn ioctl<T>(&self, request: libc::c_ulong, arg: &mut T) -> std::io::Result<()> {
        // SAFETY: `arg` is the repr(C) struct that `request` expects and
        // outlives the call
        let result = unsafe { libc::ioctl(self.file.as_raw_fd(), request as _, arg as *mut T) };
        if result < 0 {
            Err(std::io::Error::last_os_error())
        } else {
            Ok(())
        }
    }

    /// Describe a control, or `None` if the driver does not have it
    pub fn query(&self, control_id: u32) -> Option<ControlInfo> {
        // SAFETY: all-zero is a valid v4l2_queryctrl
        let mut raw: RawQueryCtrl = unsafe { std::mem::zeroed() };
        raw.id = control_id;
        self.ioctl(VIDIOC_QUERYCTRL, &mut raw).ok()?;

        let len = raw.name.iter().position(|&c| c == 0).unwrap_or(raw.name.len());
        Some(ControlInfo {
            id: raw.id,
            name: String::from_utf8_lossy(&raw.name[..len]).into_owned(),
            minimum: raw.minimum,
            maximum: raw.maximum,
            flags: raw.flags,
        })
    }

    pub fn get(&self, control_id: u32) -> Option<i32> {
        let mut raw = RawControl {
            id: control_id,
            value: 0,
        };
        match self.ioctl(VIDIOC_G_CTRL, &mut raw) {
            Ok(()) => Some(raw.value),
            Err(e) => {
                debug!(device_path = %self.path, control_id, error = %e, "Control not readable");
                None
            }
        }
    }

    pub fn set(&self, control_id: u32, value: i32) -> std::io::Result<()> {
        let mut raw = RawControl {
            id: control_id,
            value,
        };
        self.ioctl(VIDIOC_S_CTRL, &mut raw).inspect_err(|e| {
            warn!(device_path = %self.path, control_id, value, error = %e, "Failed to set V4L2 control");
        })
    }
}

/// Whether the device exposes a torch mode on its flash LED control
pub fn supports_torch(device_path: &str) -> bool {
    ControlFd::open(device_path)
        .ok()
        .and_then(|fd| fd.query(V4L2_CID_FLASH_LED_MODE))
        .is_some_and(|info| info.is_writable() && info.accepts(V4L2_FLASH_LED_MODE_TORCH))
}

/// Switch the flash LED between torch and off
pub fn set_torch(device_path: &str, enabled: bool) -> std::io::Result<()> {
    let mode = if enabled {
        V4L2_FLASH_LED_MODE_TORCH
    } else {
        V4L2_FLASH_LED_MODE_NONE
    };
    ControlFd::open(device_path)?.set(V4L2_CID_FLASH_LED_MODE, mode)
}

/// Map a `V4L2_CID_CAMERA_ORIENTATION` value to a facing mode
pub fn facing_from_orientation(value: i32) -> Option<FacingMode> {
    match value {
        V4L2_CAMERA_ORIENTATION_FRONT => Some(FacingMode::Front),
        V4L2_CAMERA_ORIENTATION_BACK => Some(FacingMode::Back),
        _ => None,
    }
}

/// Read the sensor facing, if the driver reports one
pub fn query_facing(device_path: &str) -> Option<FacingMode> {
    ControlFd::open(device_path)
        .ok()?
        .get(V4L2_CID_CAMERA_ORIENTATION)
        .and_then(facing_from_orientation)
}
