// SPDX-License-Identifier: GPL-3.0-only

//! Video4Linux2 camera backend
//!
//! Each open stream owns a capture thread that holds the device fd and a
//! memory-mapped buffer queue. The thread keeps only the most recent frame;
//! a still capture simply takes that frame. Stopping the stream joins the
//! thread, so the device is closed by the time `stop` returns.

use super::types::*;
use super::v4l2_controls;
use super::{CameraBackend, CameraStream};
use crate::constants::v4l2::{BUFFER_COUNT, OPEN_TIMEOUT, STEPWISE_RESOLUTIONS};
use crate::flash::TorchLed;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream as _;
use v4l::prelude::*;
use v4l::video::Capture;

/// V4L2 backend
#[derive(Debug, Default)]
pub struct V4l2Backend;

impl V4l2Backend {
    pub fn new() -> Self {
        Self
    }
}

impl CameraBackend for V4l2Backend {
    fn enumerate_cameras(&self) -> Vec<CameraDevice> {
        let mut nodes = v4l::context::enum_devices();
        nodes.sort_by_key(|node| node.index());

        let mut cameras = Vec::new();
        for node in nodes {
            let path = node.path().to_string_lossy().to_string();
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };

            // Metadata and output nodes share the /dev/video* namespace
            let has_capture_format = dev
                .enum_formats()
                .into_iter()
                .flatten()
                .any(|desc| PixelFormat::from_fourcc(&desc.fourcc.repr).is_some());
            if !has_capture_format {
                debug!(path, "Skipping node without still-capable formats");
                continue;
            }

            let facing = v4l2_controls::query_facing(&path);
            info!(name = %caps.card, path, ?facing, "Found V4L2 camera");

            cameras.push(CameraDevice {
                name: caps.card.clone(),
                path,
                driver: Some(caps.driver.clone()),
                facing,
            });
        }
        cameras
    }

    fn get_formats(&self, device: &CameraDevice) -> Vec<CameraFormat> {
        let dev = match Device::with_path(&device.path) {
            Ok(d) => d,
            Err(_) => return Vec::new(),
        };

        let mut formats = Vec::new();

        if let Ok(format_iter) = dev.enum_formats() {
            for fmt_desc in format_iter {
                let Some(pixel_format) = PixelFormat::from_fourcc(&fmt_desc.fourcc.repr) else {
                    continue;
                };
                let Ok(frame_sizes) = dev.enum_framesizes(fmt_desc.fourcc) else {
                    continue;
                };
                for size in frame_sizes {
                    match size.size {
                        v4l::framesize::FrameSizeEnum::Discrete(discrete) => {
                            formats.push(CameraFormat {
                                width: discrete.width,
                                height: discrete.height,
                                pixel_format,
                            });
                        }
                        v4l::framesize::FrameSizeEnum::Stepwise(step) => {
                            // Offer common resolutions plus the sensor maximum
                            let candidates = STEPWISE_RESOLUTIONS
                                .iter()
                                .copied()
                                .chain(std::iter::once((step.max_width, step.max_height)));
                            for (w, h) in candidates {
                                if (step.min_width..=step.max_width).contains(&w)
                                    && (step.min_height..=step.max_height).contains(&h)
                                {
                                    formats.push(CameraFormat {
                                        width: w,
                                        height: h,
                                        pixel_format,
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        formats.sort_by_key(|f| (f.pixel_format.preference(), std::cmp::Reverse(f.resolution().area())));
        formats.dedup();
        formats
    }

    fn has_torch(&self, device: &CameraDevice) -> bool {
        !matches!(TorchControl::detect(device), TorchControl::None)
    }

    fn open(
        &self,
        device: &CameraDevice,
        format: &CameraFormat,
    ) -> BackendResult<Box<dyn CameraStream>> {
        let stream = V4l2Stream::start(device, format)?;
        Ok(Box::new(stream))
    }

    fn backend_type(&self) -> CameraBackendType {
        CameraBackendType::V4l2
    }

    fn is_available(&self) -> bool {
        !v4l::context::enum_devices().is_empty()
    }
}

/// How the torch of a stream is driven
#[derive(Debug)]
enum TorchControl {
    /// `V4L2_CID_FLASH_LED_MODE` on the video node itself
    V4l2,
    /// Separate sysfs LED (phones)
    Sysfs(TorchLed),
    None,
}

impl TorchControl {
    fn detect(device: &CameraDevice) -> Self {
        if v4l2_controls::supports_torch(&device.path) {
            return TorchControl::V4l2;
        }
        // The sysfs LED sits next to the rear sensor
        if device.facing == Some(FacingMode::Back)
            && let Some(led) = TorchLed::discover().into_iter().next()
        {
            return TorchControl::Sysfs(led);
        }
        TorchControl::None
    }

    fn apply(&self, path: &str, enabled: bool) -> BackendResult<()> {
        match self {
            TorchControl::V4l2 => v4l2_controls::set_torch(path, enabled).map_err(BackendError::from),
            TorchControl::Sysfs(led) => led.set(enabled).map_err(BackendError::from),
            TorchControl::None => Err(BackendError::CapabilityUnsupported(
                "camera has no torch".to_string(),
            )),
        }
    }
}

struct V4l2Stream {
    path: String,
    format: CameraFormat,
    latest: Arc<Mutex<Option<CameraFrame>>>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
    torch: TorchControl,
    torch_on: bool,
}

impl V4l2Stream {
    fn start(device: &CameraDevice, requested: &CameraFormat) -> BackendResult<Self> {
        info!(
            device_path = %device.path,
            format = %requested,
            "Starting V4L2 capture"
        );

        let running = Arc::new(AtomicBool::new(true));
        let latest = Arc::new(Mutex::new(None));
        let (opened_tx, opened_rx) = mpsc::channel();

        let thread_handle = {
            let path = device.path.clone();
            let requested = requested.clone();
            let running = Arc::clone(&running);
            let latest = Arc::clone(&latest);
            std::thread::Builder::new()
                .name("v4l2-capture".to_string())
                .spawn(move || capture_loop(&path, &requested, opened_tx, latest, running))
                .map_err(BackendError::from)?
        };

        let (format, thread_handle) = await_open(
            &device.path,
            &opened_rx,
            thread_handle,
            &running,
            OPEN_TIMEOUT,
        )?;

        Ok(Self {
            path: device.path.clone(),
            format,
            latest,
            running,
            thread_handle: Some(thread_handle),
            torch: TorchControl::detect(device),
            torch_on: false,
        })
    }
}

/// Wait for the capture thread to report the negotiated format
///
/// Every failure path joins the thread before returning, so the device fd
/// is closed by the time the caller may open the node again. On timeout the
/// join waits for the pending open call to return; the thread then finds
/// the receiver gone and exits.
fn await_open<T>(
    device_path: &str,
    opened: &mpsc::Receiver<BackendResult<T>>,
    thread_handle: JoinHandle<()>,
    running: &AtomicBool,
    timeout: Duration,
) -> BackendResult<(T, JoinHandle<()>)> {
    match opened.recv_timeout(timeout) {
        Ok(Ok(value)) => Ok((value, thread_handle)),
        Ok(Err(e)) => {
            let _ = thread_handle.join();
            Err(e)
        }
        Err(_) => {
            running.store(false, Ordering::SeqCst);
            warn!(device_path, "Timed out opening V4L2 device, waiting for it to close");
            let _ = thread_handle.join();
            Err(BackendError::DeviceUnavailable(format!(
                "{} did not start streaming",
                device_path
            )))
        }
    }
}

impl CameraStream for V4l2Stream {
    fn format(&self) -> &CameraFormat {
        &self.format
    }

    fn is_ready(&self) -> bool {
        self.latest
            .lock()
            .map(|frame| frame.is_some())
            .unwrap_or(false)
    }

    fn torch_supported(&self) -> bool {
        !matches!(self.torch, TorchControl::None)
    }

    fn set_torch(&mut self, enabled: bool) -> BackendResult<()> {
        self.torch.apply(&self.path, enabled)?;
        self.torch_on = enabled;
        Ok(())
    }

    fn grab_frame(&mut self) -> BackendResult<CameraFrame> {
        let latest = self.latest.lock().unwrap_or_else(|e| e.into_inner());
        match latest.as_ref() {
            Some(frame) => Ok(frame.clone()),
            None if !self.running.load(Ordering::SeqCst) => {
                Err(BackendError::FrameUnavailable("capture stopped".to_string()))
            }
            None => Err(BackendError::FrameUnavailable(
                "no frame delivered yet".to_string(),
            )),
        }
    }

    fn stop(&mut self) {
        if self.torch_on {
            if let Err(e) = self.torch.apply(&self.path, false) {
                warn!(device_path = %self.path, error = %e, "Failed to switch torch off");
            }
            self.torch_on = false;
        }

        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            match handle.join() {
                Ok(_) => info!(device_path = %self.path, "V4L2 capture thread stopped"),
                Err(_) => warn!(device_path = %self.path, "V4L2 capture thread panicked"),
            }
        }
    }
}

impl Drop for V4l2Stream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Capture loop running on the stream's thread
///
/// Reports the negotiated format (or the open failure) through `opened`
/// before delivering frames.
fn capture_loop(
    device_path: &str,
    requested: &CameraFormat,
    opened: mpsc::Sender<BackendResult<CameraFormat>>,
    latest: Arc<Mutex<Option<CameraFrame>>>,
    running: Arc<AtomicBool>,
) {
    let mut dev = match Device::with_path(device_path) {
        Ok(dev) => dev,
        Err(e) => {
            let _ = opened.send(Err(BackendError::from(e)));
            return;
        }
    };

    let negotiated = match negotiate_format(&mut dev, requested) {
        Ok(n) => n,
        Err(e) => {
            let _ = opened.send(Err(e));
            return;
        }
    };

    let mut stream = match MmapStream::with_buffers(&mut dev, Type::VideoCapture, BUFFER_COUNT) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = opened.send(Err(BackendError::from(e)));
            return;
        }
    };

    let format = negotiated.format.clone();
    if opened.send(Ok(format.clone())).is_err() {
        // Caller gave up waiting
        return;
    }

    info!(device_path, %format, "V4L2 capture stream started");

    while running.load(Ordering::SeqCst) {
        match stream.next() {
            Ok((buf, meta)) => {
                let used = match meta.bytesused as usize {
                    0 => buf.len(),
                    n => n.min(buf.len()),
                };
                if used == 0 {
                    continue;
                }
                let frame = CameraFrame {
                    width: format.width,
                    height: format.height,
                    data: Arc::from(&buf[..used]),
                    format: format.pixel_format,
                    stride: negotiated.stride,
                    captured_at: Instant::now(),
                };
                if meta.sequence % 60 == 0 {
                    debug!(sequence = meta.sequence, size = used, "Frame captured");
                }
                *latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(frame);
            }
            Err(e) => {
                error!(device_path, error = %e, "Failed to dequeue frame");
                std::thread::sleep(Duration::from_millis(10));
            }
        }
    }

    info!(device_path, "V4L2 capture loop ended");
}

struct Negotiated {
    format: CameraFormat,
    stride: u32,
}

fn negotiate_format(dev: &mut Device, requested: &CameraFormat) -> BackendResult<Negotiated> {
    let mut format = dev.format().map_err(BackendError::from)?;
    format.width = requested.width;
    format.height = requested.height;
    format.fourcc = v4l::FourCC::new(requested.pixel_format.fourcc());

    let actual = match dev.set_format(&format) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "Could not set format, using current device format");
            dev.format().map_err(BackendError::from)?
        }
    };

    let pixel_format = PixelFormat::from_fourcc(&actual.fourcc.repr).ok_or_else(|| {
        BackendError::Other(format!(
            "device switched to unsupported pixel format {}",
            actual.fourcc
        ))
    })?;

    Ok(Negotiated {
        format: CameraFormat {
            width: actual.width,
            height: actual.height,
            pixel_format,
        },
        stride: actual.stride,
    })
}
