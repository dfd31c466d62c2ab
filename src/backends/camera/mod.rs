// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! ```text
//! ┌─────────────────────┐
//! │  CaptureController  │  ← state machine, user intents
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ MediaDeviceSession  │  ← camera selection, single-stream ownership
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CameraBackend Trait │  ← enumeration + open
//! └──────────┬──────────┘
//!            │
//!       ┌────┴─────┐
//!       ▼          ▼
//!    ┌──────┐  ┌─────────┐
//!    │ V4L2 │  │ Virtual │
//!    └──────┘  └─────────┘
//! ```

pub mod format_converters;
pub mod session;
pub mod types;
pub mod v4l2;
pub mod v4l2_controls;
pub mod virtual_camera;

pub use session::{MediaDeviceSession, StreamHandle};
pub use types::*;

use std::sync::Arc;

/// Camera backend trait
///
/// A backend knows which cameras exist and how to open one of them.
/// Everything that happens on an open camera goes through [`CameraStream`].
pub trait CameraBackend: Send + Sync {
    /// Enumerate available cameras on this backend
    fn enumerate_cameras(&self) -> Vec<CameraDevice>;

    /// Get supported formats for a specific camera device
    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat>;

    /// Whether a torch LED is tied to `device`, without opening it
    fn has_torch(&self, device: &CameraDevice) -> bool;

    /// Open the device and start delivering frames
    ///
    /// # Returns
    /// * `Ok(stream)` - Hardware is streaming; the stream owns the device
    /// * `Err(BackendError::DeviceUnavailable)` - Missing device or permission denied
    fn open(
        &self,
        device: &CameraDevice,
        format: &CameraFormat,
    ) -> BackendResult<Box<dyn CameraStream>>;

    /// Get the backend type identifier
    fn backend_type(&self) -> CameraBackendType;

    /// Check if this backend is usable on the current system
    fn is_available(&self) -> bool;
}

/// A live hardware stream
///
/// Dropping a stream must have the same effect as [`CameraStream::stop`].
pub trait CameraStream: Send {
    /// The format the device actually negotiated
    fn format(&self) -> &CameraFormat;

    /// True once at least one frame has been delivered
    fn is_ready(&self) -> bool;

    /// Whether the torch LED tied to this camera can be controlled
    fn torch_supported(&self) -> bool;

    /// Switch the torch on or off
    ///
    /// Fails with `CapabilityUnsupported` when [`torch_supported`](Self::torch_supported)
    /// is false. Either the LED changes or the call fails; there is no partial state.
    fn set_torch(&mut self, enabled: bool) -> BackendResult<()>;

    /// Most recent raw frame
    fn grab_frame(&mut self) -> BackendResult<CameraFrame>;

    /// Stop hardware delivery, switch the torch off and close the device.
    /// Idempotent.
    fn stop(&mut self);
}

/// Get a concrete backend instance
pub fn get_backend_for_type(backend_type: CameraBackendType) -> Arc<dyn CameraBackend> {
    match backend_type {
        CameraBackendType::V4l2 => Arc::new(v4l2::V4l2Backend::new()),
        CameraBackendType::Virtual => Arc::new(virtual_camera::VirtualBackend::default()),
    }
}
