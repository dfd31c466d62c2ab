// SPDX-License-Identifier: GPL-3.0-only

//! Media device session
//!
//! Owns acquisition and release of exactly one camera stream at a time:
//! - Camera and format selection from a facing preference and ideal size
//! - Exclusive ownership through [`StreamHandle`], released on every path
//! - Torch capability queries and atomic try-set
//! - Still frame capture into an [`ImageArtifact`]
//!
//! Every call here may block on hardware. Async callers run them on
//! `tokio::task::spawn_blocking`.

use super::types::*;
use super::{CameraBackend, CameraStream};
use crate::errors::MediaError;
use crate::media::{ImageArtifact, PhotoEncoder};
use std::cmp::Reverse;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Camera access point shared by everything that needs the camera
///
/// Clones share the same backend and the same single-stream slot.
#[derive(Clone)]
pub struct MediaDeviceSession {
    backend: Arc<dyn CameraBackend>,
    encoder: PhotoEncoder,
    /// Set while a [`StreamHandle`] holds a live stream
    in_use: Arc<AtomicBool>,
}

impl fmt::Debug for MediaDeviceSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaDeviceSession")
            .field("backend", &self.backend.backend_type())
            .field("encoder", &self.encoder)
            .field("in_use", &self.in_use.load(Ordering::Acquire))
            .finish()
    }
}

impl MediaDeviceSession {
    pub fn new(backend: Arc<dyn CameraBackend>, encoder: PhotoEncoder) -> Self {
        info!(backend = %backend.backend_type(), "Creating media device session");
        Self {
            backend,
            encoder,
            in_use: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn backend_type(&self) -> CameraBackendType {
        self.backend.backend_type()
    }

    pub fn encoder(&self) -> &PhotoEncoder {
        &self.encoder
    }

    /// Cameras visible to the backend
    pub fn cameras(&self) -> Vec<CameraDevice> {
        self.backend.enumerate_cameras()
    }

    /// Formats a camera advertises
    pub fn formats(&self, device: &CameraDevice) -> Vec<CameraFormat> {
        self.backend.get_formats(device)
    }

    /// Torch support of a camera, known without opening it
    pub fn has_torch(&self, device: &CameraDevice) -> bool {
        self.backend.has_torch(device)
    }

    /// True while a handle from this session holds a live stream
    pub fn is_streaming(&self) -> bool {
        self.in_use.load(Ordering::Acquire)
    }

    /// Acquire exclusive access to a camera and start streaming
    ///
    /// Picks the first camera with the requested facing, falling back to the
    /// first camera at all. Fails with `DeviceUnavailable` when there is no
    /// camera, permission is denied, or another handle is still live.
    pub fn acquire(&self, facing: FacingMode, ideal: Resolution) -> BackendResult<StreamHandle> {
        if self
            .in_use
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(?facing, "Camera acquire rejected, another stream is live");
            return Err(BackendError::DeviceUnavailable("device busy".to_string()));
        }

        match self.open_stream(facing, ideal) {
            Ok(handle) => Ok(handle),
            Err(e) => {
                self.in_use.store(false, Ordering::Release);
                warn!(?facing, error = %e, "Camera acquire failed");
                Err(e)
            }
        }
    }

    fn open_stream(&self, facing: FacingMode, ideal: Resolution) -> BackendResult<StreamHandle> {
        let cameras = self.backend.enumerate_cameras();
        let device = select_camera(&cameras, facing)
            .cloned()
            .ok_or_else(|| BackendError::DeviceUnavailable("no camera found".to_string()))?;

        let formats = self.backend.get_formats(&device);
        let requested = select_format(&formats, ideal);

        info!(
            device = %device.name,
            path = %device.path,
            ?facing,
            format = %requested,
            "Acquiring camera"
        );

        let stream = self.backend.open(&device, &requested)?;
        let format = stream.format().clone();
        if format != requested {
            debug!(requested = %requested, negotiated = %format, "Driver adjusted format");
        }

        Ok(StreamHandle {
            stream: Some(stream),
            device,
            format,
            facing,
            in_use: Arc::clone(&self.in_use),
        })
    }

    /// Stop the stream behind `handle`. Safe to call any number of times.
    pub fn release(&self, handle: &mut StreamHandle) {
        handle.release();
    }

    /// Whether the handle's camera has a controllable torch
    ///
    /// False for released handles and for cameras without a flash LED.
    pub fn query_torch_capability(&self, handle: &StreamHandle) -> bool {
        handle
            .stream
            .as_ref()
            .is_some_and(|stream| stream.torch_supported())
    }

    /// Switch the torch, or fail with `CapabilityUnsupported` and change nothing
    pub fn set_torch(&self, handle: &mut StreamHandle, enabled: bool) -> BackendResult<()> {
        let stream = handle.stream_mut()?;
        if !stream.torch_supported() {
            return Err(BackendError::CapabilityUnsupported(
                "camera has no torch".to_string(),
            ));
        }
        stream.set_torch(enabled)?;
        info!(device = %handle.device.name, enabled, "Torch changed");
        Ok(())
    }

    /// Rasterize the current frame into a JPEG at the stream's native size
    ///
    /// Fails with `FrameUnavailable` before the stream is ready, after the
    /// handle was released, or when the frame is corrupt.
    pub fn capture_frame(&self, handle: &mut StreamHandle) -> BackendResult<ImageArtifact> {
        let stream = handle
            .stream
            .as_mut()
            .ok_or_else(|| BackendError::FrameUnavailable("stream released".to_string()))?;

        let frame = stream.grab_frame()?;
        let artifact = self.encoder.encode_frame(&frame).map_err(|e| match e {
            MediaError::Decode(msg) => BackendError::FrameUnavailable(format!("corrupt frame: {}", msg)),
            MediaError::Encode(msg) | MediaError::UnsupportedFormat(msg) => BackendError::Other(msg),
        })?;

        info!(
            device = %handle.device.name,
            width = artifact.width(),
            height = artifact.height(),
            size = artifact.len(),
            "Frame captured"
        );
        Ok(artifact)
    }
}

/// Exclusive ownership of one live camera stream
///
/// Dropping the handle releases the stream.
pub struct StreamHandle {
    stream: Option<Box<dyn CameraStream>>,
    device: CameraDevice,
    format: CameraFormat,
    facing: FacingMode,
    in_use: Arc<AtomicBool>,
}

impl StreamHandle {
    pub fn device(&self) -> &CameraDevice {
        &self.device
    }

    pub fn format(&self) -> &CameraFormat {
        &self.format
    }

    /// The facing that was requested when acquiring
    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    pub fn is_ready(&self) -> bool {
        self.stream.as_ref().is_some_and(|stream| stream.is_ready())
    }

    /// Stop the hardware stream; later calls do nothing
    pub fn release(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
            drop(stream);
            self.in_use.store(false, Ordering::Release);
            info!(device = %self.device.name, "Camera released");
        }
    }

    fn stream_mut(&mut self) -> BackendResult<&mut Box<dyn CameraStream>> {
        self.stream
            .as_mut()
            .ok_or_else(|| BackendError::DeviceUnavailable("stream released".to_string()))
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("device", &self.device.path)
            .field("format", &self.format)
            .field("facing", &self.facing)
            .field("active", &self.is_active())
            .finish()
    }
}

/// First camera with a matching facing, else the first camera
pub fn select_camera(cameras: &[CameraDevice], facing: FacingMode) -> Option<&CameraDevice> {
    cameras
        .iter()
        .find(|camera| camera.facing == Some(facing))
        .or_else(|| cameras.first())
}

/// Format whose area is closest to `ideal`
///
/// Ties prefer the larger format, then the preferred pixel format. With no
/// advertised formats the ideal size is requested in YUYV and the driver
/// adjusts it.
pub fn select_format(formats: &[CameraFormat], ideal: Resolution) -> CameraFormat {
    let target = ideal.area();
    formats
        .iter()
        .min_by_key(|format| {
            let area = format.resolution().area();
            (
                area.abs_diff(target),
                Reverse(area),
                format.pixel_format.preference(),
            )
        })
        .cloned()
        .unwrap_or(CameraFormat {
            width: ideal.width,
            height: ideal.height,
            pixel_format: PixelFormat::YUYV,
        })
}

#[cfg(test)]
mod tests {
    use super::super::virtual_camera::{DeviceEvent, VirtualBackend, VirtualCameraSpec};
    use super::*;

    const HD: Resolution = Resolution::new(1920, 1080);

    fn session_with(backend: &VirtualBackend) -> MediaDeviceSession {
        MediaDeviceSession::new(Arc::new(backend.clone()), PhotoEncoder::default())
    }

    fn fmt(width: u32, height: u32, pixel_format: PixelFormat) -> CameraFormat {
        CameraFormat {
            width,
            height,
            pixel_format,
        }
    }

    #[test]
    fn test_select_camera_prefers_facing_then_first() {
        let cameras = VirtualBackend::default().enumerate_cameras();
        assert_eq!(
            select_camera(&cameras, FacingMode::Front).unwrap().facing,
            Some(FacingMode::Front)
        );

        let laptop = VirtualBackend::new(vec![VirtualCameraSpec::new("Webcam", None)]);
        let cameras = laptop.enumerate_cameras();
        assert_eq!(
            select_camera(&cameras, FacingMode::Back).unwrap().name,
            "Webcam"
        );
        assert!(select_camera(&[], FacingMode::Back).is_none());
    }

    #[test]
    fn test_select_format_closest_area() {
        let formats = vec![
            fmt(640, 480, PixelFormat::YUYV),
            fmt(1280, 720, PixelFormat::MJPEG),
            fmt(2592, 1944, PixelFormat::YUYV),
        ];
        assert_eq!(select_format(&formats, HD), fmt(1280, 720, PixelFormat::MJPEG));
    }

    #[test]
    fn test_select_format_tie_prefers_larger_then_yuyv() {
        // 100x100 and 300x100 are both 10000 pixels away from 200x100
        let formats = vec![
            fmt(100, 100, PixelFormat::YUYV),
            fmt(300, 100, PixelFormat::MJPEG),
            fmt(300, 100, PixelFormat::YUYV),
        ];
        assert_eq!(
            select_format(&formats, Resolution::new(200, 100)),
            fmt(300, 100, PixelFormat::YUYV)
        );
    }

    #[test]
    fn test_select_format_without_formats_uses_ideal() {
        assert_eq!(select_format(&[], HD), fmt(1920, 1080, PixelFormat::YUYV));
    }

    #[test]
    fn test_acquire_without_camera_is_unavailable() {
        let session = session_with(&VirtualBackend::empty());
        assert!(matches!(
            session.acquire(FacingMode::Back, HD),
            Err(BackendError::DeviceUnavailable(_))
        ));
        assert!(!session.is_streaming());
    }

    #[test]
    fn test_second_acquire_is_busy_until_release() {
        let backend = VirtualBackend::default();
        let session = session_with(&backend);
        let other = session.clone();

        let mut handle = session.acquire(FacingMode::Back, HD).unwrap();
        assert!(matches!(
            other.acquire(FacingMode::Front, HD),
            Err(BackendError::DeviceUnavailable(msg)) if msg == "device busy"
        ));

        session.release(&mut handle);
        let again = other.acquire(FacingMode::Front, HD).unwrap();
        assert_eq!(again.device().facing, Some(FacingMode::Front));
        assert_eq!(backend.log().peak_open_streams(), 1);
    }

    #[test]
    fn test_release_is_idempotent() {
        let backend = VirtualBackend::default();
        let session = session_with(&backend);
        let mut handle = session.acquire(FacingMode::Back, HD).unwrap();

        session.release(&mut handle);
        session.release(&mut handle);
        drop(handle);

        let closes = backend
            .log()
            .events()
            .into_iter()
            .filter(|e| matches!(e, DeviceEvent::Closed { .. }))
            .count();
        assert_eq!(closes, 1);
        assert!(!session.is_streaming());
    }

    #[test]
    fn test_drop_releases() {
        let backend = VirtualBackend::default();
        let session = session_with(&backend);
        {
            let _handle = session.acquire(FacingMode::Back, HD).unwrap();
            assert_eq!(backend.log().open_streams(), 1);
        }
        assert_eq!(backend.log().open_streams(), 0);
        assert!(!session.is_streaming());
    }

    #[test]
    fn test_torch_capability() {
        let session = session_with(&VirtualBackend::default());

        let mut front = session.acquire(FacingMode::Front, HD).unwrap();
        assert!(!session.query_torch_capability(&front));
        assert!(matches!(
            session.set_torch(&mut front, true),
            Err(BackendError::CapabilityUnsupported(_))
        ));
        session.release(&mut front);

        let mut back = session.acquire(FacingMode::Back, HD).unwrap();
        assert!(session.query_torch_capability(&back));
        session.set_torch(&mut back, true).unwrap();
        session.release(&mut back);
        assert!(!session.query_torch_capability(&back));
    }

    #[test]
    fn test_capture_before_ready_then_after() {
        let backend = VirtualBackend::new(vec![
            VirtualCameraSpec::new("Slow", Some(FacingMode::Back))
                .with_resolution(32, 16)
                .with_warmup_frames(1),
        ]);
        let session = session_with(&backend);
        let mut handle = session.acquire(FacingMode::Back, HD).unwrap();

        assert!(matches!(
            session.capture_frame(&mut handle),
            Err(BackendError::FrameUnavailable(_))
        ));
        let artifact = session.capture_frame(&mut handle).unwrap();
        assert_eq!((artifact.width(), artifact.height()), (32, 16));

        session.release(&mut handle);
        assert!(matches!(
            session.capture_frame(&mut handle),
            Err(BackendError::FrameUnavailable(_))
        ));
    }
}
