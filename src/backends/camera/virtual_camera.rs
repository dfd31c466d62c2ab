// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic in-process camera backend
//!
//! Stands in for real hardware in demos, on machines without a webcam and
//! in tests. Each camera is described by a [`VirtualCameraSpec`]. Frames are
//! either a moving RGB test pattern or a still image loaded from disk.
//!
//! All streams opened from one backend share a [`DeviceLog`] recording every
//! open, close and torch change, along with the peak number of streams that
//! were open at the same time.

use super::types::{
    BackendError, BackendResult, CameraBackendType, CameraDevice, CameraFormat, CameraFrame,
    FacingMode, PixelFormat, Resolution,
};
use super::{CameraBackend, CameraStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tracing::{debug, info};

const PATH_PREFIX: &str = "virtual:";

/// Description of one virtual camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualCameraSpec {
    pub name: String,
    pub facing: Option<FacingMode>,
    /// Whether the camera has a controllable torch LED
    pub torch: bool,
    pub resolution: Resolution,
    /// Frames dropped before the stream reports ready
    pub warmup_frames: u32,
    /// Serve this image instead of the test pattern
    pub image: Option<PathBuf>,
}

impl VirtualCameraSpec {
    pub fn new(name: impl Into<String>, facing: Option<FacingMode>) -> Self {
        Self {
            name: name.into(),
            facing,
            torch: false,
            resolution: Resolution::new(1280, 720),
            warmup_frames: 0,
            image: None,
        }
    }

    pub fn with_torch(mut self, torch: bool) -> Self {
        self.torch = torch;
        self
    }

    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Resolution::new(width, height);
        self
    }

    pub fn with_warmup_frames(mut self, frames: u32) -> Self {
        self.warmup_frames = frames;
        self
    }

    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.image = Some(path.into());
        self
    }
}

/// Something that happened to a virtual device
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceEvent {
    Opened { path: String },
    Closed { path: String },
    TorchChanged { path: String, enabled: bool },
}

#[derive(Debug, Default)]
struct DeviceLogInner {
    events: Vec<DeviceEvent>,
    open: usize,
    peak_open: usize,
}

/// Shared record of device activity
#[derive(Debug, Clone, Default)]
pub struct DeviceLog {
    inner: Arc<Mutex<DeviceLogInner>>,
}

impl DeviceLog {
    fn lock(&self) -> MutexGuard<'_, DeviceLogInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, event: DeviceEvent) {
        let mut inner = self.lock();
        match &event {
            DeviceEvent::Opened { .. } => {
                inner.open += 1;
                inner.peak_open = inner.peak_open.max(inner.open);
            }
            DeviceEvent::Closed { .. } => inner.open = inner.open.saturating_sub(1),
            DeviceEvent::TorchChanged { .. } => {}
        }
        inner.events.push(event);
    }

    /// Every event so far, oldest first
    pub fn events(&self) -> Vec<DeviceEvent> {
        self.lock().events.clone()
    }

    /// Streams currently open
    pub fn open_streams(&self) -> usize {
        self.lock().open
    }

    /// Highest number of streams that were ever open at once
    pub fn peak_open_streams(&self) -> usize {
        self.lock().peak_open
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.events.clear();
        inner.peak_open = inner.open;
    }
}

/// Virtual camera backend
#[derive(Debug, Clone)]
pub struct VirtualBackend {
    cameras: Vec<VirtualCameraSpec>,
    /// Simulates a denied camera permission
    denied: Arc<AtomicBool>,
    log: DeviceLog,
}

impl Default for VirtualBackend {
    /// A phone-like pair: rear camera with torch, front camera without
    fn default() -> Self {
        Self::new(vec![
            VirtualCameraSpec::new("Virtual Rear Camera", Some(FacingMode::Back))
                .with_torch(true)
                .with_resolution(1920, 1080),
            VirtualCameraSpec::new("Virtual Front Camera", Some(FacingMode::Front))
                .with_resolution(1280, 720),
        ])
    }
}

impl VirtualBackend {
    pub fn new(cameras: Vec<VirtualCameraSpec>) -> Self {
        Self {
            cameras,
            denied: Arc::new(AtomicBool::new(false)),
            log: DeviceLog::default(),
        }
    }

    /// A system with no camera at all
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Make every subsequent `open` fail as if permission were denied
    pub fn set_permission_denied(&self, denied: bool) {
        self.denied.store(denied, Ordering::SeqCst);
    }

    pub fn log(&self) -> DeviceLog {
        self.log.clone()
    }

    fn spec_for(&self, device: &CameraDevice) -> Option<&VirtualCameraSpec> {
        let index: usize = device.path.strip_prefix(PATH_PREFIX)?.parse().ok()?;
        self.cameras.get(index)
    }
}

impl CameraBackend for VirtualBackend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        self.cameras
            .iter()
            .enumerate()
            .map(|(index, spec)| CameraDevice {
                name: spec.name.clone(),
                path: format!("{}{}", PATH_PREFIX, index),
                driver: Some("virtual".to_string()),
                facing: spec.facing,
            })
            .collect()
    }

    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat> {
        let Some(spec) = self.spec_for(device) else {
            return Vec::new();
        };

        if let Some(path) = &spec.image {
            return match image::image_dimensions(path) {
                Ok((width, height)) => vec![CameraFormat {
                    width,
                    height,
                    pixel_format: PixelFormat::RGBA,
                }],
                Err(_) => Vec::new(),
            };
        }

        let Resolution { width, height } = spec.resolution;
        vec![
            CameraFormat {
                width,
                height,
                pixel_format: PixelFormat::RGB24,
            },
            CameraFormat {
                width: width / 2,
                height: height / 2,
                pixel_format: PixelFormat::RGB24,
            },
        ]
    }

    fn has_torch(&self, device: &CameraDevice) -> bool {
        self.spec_for(device).is_some_and(|spec| spec.torch)
    }

    fn open(
        &self,
        device: &CameraDevice,
        format: &CameraFormat,
    ) -> BackendResult<Box<dyn CameraStream>> {
        if self.denied.load(Ordering::SeqCst) {
            return Err(BackendError::DeviceUnavailable(
                "camera permission denied".to_string(),
            ));
        }

        let spec = self
            .spec_for(device)
            .ok_or_else(|| BackendError::DeviceUnavailable(format!("no such camera: {}", device.path)))?
            .clone();

        let still = match &spec.image {
            Some(path) => Some(load_image_as_frame(path)?),
            None => None,
        };

        let format = match &still {
            Some(frame) => CameraFormat {
                width: frame.width,
                height: frame.height,
                pixel_format: frame.format,
            },
            None => CameraFormat {
                width: format.width,
                height: format.height,
                pixel_format: PixelFormat::RGB24,
            },
        };

        info!(device = %spec.name, path = %device.path, %format, "Virtual camera opened");
        self.log.record(DeviceEvent::Opened {
            path: device.path.clone(),
        });

        Ok(Box::new(VirtualStream {
            path: device.path.clone(),
            warmup_remaining: spec.warmup_frames,
            spec,
            format,
            still,
            sequence: 0,
            torch: false,
            stopped: false,
            log: self.log.clone(),
        }))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::Virtual
    }

    fn is_available(&self) -> bool {
        true
    }
}

/// Load an image file as an RGBA frame
pub fn load_image_as_frame(path: &Path) -> BackendResult<CameraFrame> {
    let img = image::open(path).map_err(|e| {
        BackendError::Other(format!("Failed to load image '{}': {}", path.display(), e))
    })?;

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    debug!(path = %path.display(), width, height, "Still image loaded");

    Ok(CameraFrame {
        data: Arc::from(rgba.into_raw()),
        width,
        height,
        stride: width * 4,
        format: PixelFormat::RGBA,
        captured_at: Instant::now(),
    })
}

struct VirtualStream {
    path: String,
    spec: VirtualCameraSpec,
    format: CameraFormat,
    still: Option<CameraFrame>,
    warmup_remaining: u32,
    sequence: u32,
    torch: bool,
    stopped: bool,
    log: DeviceLog,
}

impl VirtualStream {
    /// Horizontal red and vertical green ramps, blue cycling per frame
    fn pattern_frame(&self) -> CameraFrame {
        let (width, height) = (self.format.width, self.format.height);
        let blue = (self.sequence.wrapping_mul(8) % 256) as u8;
        let mut data = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            let green = (y * 255 / height.max(1)) as u8;
            for x in 0..width {
                let red = (x * 255 / width.max(1)) as u8;
                data.extend_from_slice(&[red, green, blue]);
            }
        }
        CameraFrame {
            width,
            height,
            data: Arc::from(data),
            format: PixelFormat::RGB24,
            stride: width * 3,
            captured_at: Instant::now(),
        }
    }
}

impl CameraStream for VirtualStream {
    fn format(&self) -> &CameraFormat {
        &self.format
    }

    fn is_ready(&self) -> bool {
        !self.stopped && self.warmup_remaining == 0
    }

    fn torch_supported(&self) -> bool {
        self.spec.torch
    }

    fn set_torch(&mut self, enabled: bool) -> BackendResult<()> {
        if !self.spec.torch {
            return Err(BackendError::CapabilityUnsupported(format!(
                "{} has no torch",
                self.spec.name
            )));
        }
        if self.stopped {
            return Err(BackendError::DeviceUnavailable("stream stopped".into()));
        }
        self.torch = enabled;
        self.log.record(DeviceEvent::TorchChanged {
            path: self.path.clone(),
            enabled,
        });
        debug!(path = %self.path, enabled, "Virtual torch changed");
        Ok(())
    }

    fn grab_frame(&mut self) -> BackendResult<CameraFrame> {
        if self.stopped {
            return Err(BackendError::FrameUnavailable("stream stopped".into()));
        }
        if self.warmup_remaining > 0 {
            self.warmup_remaining -= 1;
            return Err(BackendError::FrameUnavailable(format!(
                "camera warming up ({} frames left)",
                self.warmup_remaining
            )));
        }

        self.sequence = self.sequence.wrapping_add(1);
        Ok(match &self.still {
            Some(frame) => CameraFrame {
                captured_at: Instant::now(),
                ..frame.clone()
            },
            None => self.pattern_frame(),
        })
    }

    fn stop(&mut self) {
        if self.stopped {
            return;
        }
        if self.torch {
            self.torch = false;
            self.log.record(DeviceEvent::TorchChanged {
                path: self.path.clone(),
                enabled: false,
            });
        }
        self.stopped = true;
        self.log.record(DeviceEvent::Closed {
            path: self.path.clone(),
        });
        info!(path = %self.path, "Virtual camera closed");
    }
}

impl Drop for VirtualStream {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_first(backend: &VirtualBackend) -> Box<dyn CameraStream> {
        let device = backend.enumerate_cameras().remove(0);
        let format = backend.get_formats(&device).remove(0);
        backend.open(&device, &format).unwrap()
    }

    #[test]
    fn test_default_has_rear_and_front() {
        let facings: Vec<_> = VirtualBackend::default()
            .enumerate_cameras()
            .into_iter()
            .map(|d| d.facing)
            .collect();
        assert_eq!(facings, vec![Some(FacingMode::Back), Some(FacingMode::Front)]);
    }

    #[test]
    fn test_torch_known_without_opening() {
        let backend = VirtualBackend::default();
        let torches: Vec<bool> = backend
            .enumerate_cameras()
            .iter()
            .map(|d| backend.has_torch(d))
            .collect();
        assert_eq!(torches, [true, false]);
        assert!(backend.log().events().is_empty());
    }

    #[test]
    fn test_warmup_frames_are_unavailable() {
        let backend = VirtualBackend::new(vec![
            VirtualCameraSpec::new("Slow", None)
                .with_resolution(8, 4)
                .with_warmup_frames(2),
        ]);
        let mut stream = open_first(&backend);

        assert!(!stream.is_ready());
        assert!(matches!(stream.grab_frame(), Err(BackendError::FrameUnavailable(_))));
        assert!(matches!(stream.grab_frame(), Err(BackendError::FrameUnavailable(_))));

        let frame = stream.grab_frame().unwrap();
        assert!(stream.is_ready());
        assert_eq!((frame.width, frame.height), (8, 4));
        assert_eq!(frame.data.len(), 8 * 4 * 3);
    }

    #[test]
    fn test_torch_without_led_is_unsupported() {
        let backend = VirtualBackend::new(vec![VirtualCameraSpec::new("No LED", None)]);
        let mut stream = open_first(&backend);
        assert!(!stream.torch_supported());
        assert!(matches!(
            stream.set_torch(true),
            Err(BackendError::CapabilityUnsupported(_))
        ));
        assert!(
            !backend
                .log()
                .events()
                .iter()
                .any(|e| matches!(e, DeviceEvent::TorchChanged { .. }))
        );
    }

    #[test]
    fn test_stop_turns_torch_off_once() {
        let backend = VirtualBackend::default();
        let mut stream = open_first(&backend);
        stream.set_torch(true).unwrap();
        stream.stop();
        stream.stop();
        drop(stream);

        let path = "virtual:0".to_string();
        assert_eq!(
            backend.log().events(),
            vec![
                DeviceEvent::Opened { path: path.clone() },
                DeviceEvent::TorchChanged {
                    path: path.clone(),
                    enabled: true
                },
                DeviceEvent::TorchChanged {
                    path: path.clone(),
                    enabled: false
                },
                DeviceEvent::Closed { path },
            ]
        );
        assert_eq!(backend.log().open_streams(), 0);
    }

    #[test]
    fn test_permission_denied() {
        let backend = VirtualBackend::default();
        backend.set_permission_denied(true);
        let device = backend.enumerate_cameras().remove(0);
        let format = backend.get_formats(&device).remove(0);
        assert!(matches!(
            backend.open(&device, &format),
            Err(BackendError::DeviceUnavailable(_))
        ));
        assert_eq!(backend.log().peak_open_streams(), 0);
    }

    #[test]
    fn test_still_image_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plate.png");
        image::RgbImage::from_pixel(6, 3, image::Rgb([10, 200, 30]))
            .save(&path)
            .unwrap();

        let backend = VirtualBackend::new(vec![VirtualCameraSpec::new("Plate", None).with_image(&path)]);
        let device = backend.enumerate_cameras().remove(0);
        let formats = backend.get_formats(&device);
        assert_eq!(formats.len(), 1);
        assert_eq!((formats[0].width, formats[0].height), (6, 3));

        let mut stream = backend.open(&device, &formats[0]).unwrap();
        let frame = stream.grab_frame().unwrap();
        assert_eq!(frame.format, PixelFormat::RGBA);
        assert_eq!(&frame.data[..4], &[10, 200, 30, 255]);
    }
}
