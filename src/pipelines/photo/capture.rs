// SPDX-License-Identifier: GPL-3.0-only

//! Capture controller
//!
//! Drives a [`MediaDeviceSession`] from user intents through the lifecycle
//!
//! ```text
//! Idle ──start──▶ Initializing ──▶ Streaming ──capture──▶ Capturing ──▶ Closed
//!                      ▲               │
//!                      └─switch_facing─┘        (any) ──import/close──▶ Closed
//! ```
//!
//! plus `Errored`, reachable from any state when an attempt fails. The
//! controller holds at most one [`StreamHandle`], and every path out of
//! `Streaming` releases it before anything else is acquired.

use crate::backends::camera::types::{BackendError, FacingMode, Resolution};
use crate::backends::camera::{MediaDeviceSession, StreamHandle};
use crate::constants::DEFAULT_IDEAL_RESOLUTION;
use crate::errors::{CaptureError, CaptureResult};
use crate::media::ImageArtifact;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info, warn};

/// Lifecycle state of a capture session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaptureState {
    Idle,
    Initializing,
    Streaming,
    Capturing,
    Closed,
    Errored,
}

impl fmt::Display for CaptureState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Where a capture session starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    pub facing: FacingMode,
    pub ideal_resolution: Resolution,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            facing: FacingMode::Back,
            ideal_resolution: DEFAULT_IDEAL_RESOLUTION,
        }
    }
}

/// Outcome of a flash toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashToggle {
    /// The torch is now in this state
    Applied(bool),
    /// The camera has no torch; nothing changed
    NoEffect,
}

/// Notifications for whoever presents the capture session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    StateChanged(CaptureState),
    FlashChanged(bool),
    Captured(ImageArtifact),
    Imported(ImageArtifact),
    Failed(String),
    Closed,
}

pub struct CaptureController {
    session: MediaDeviceSession,
    ideal_resolution: Resolution,
    facing: FacingMode,
    flash_enabled: bool,
    state: CaptureState,
    stream: Option<StreamHandle>,
    subscribers: Vec<UnboundedSender<CaptureEvent>>,
}

impl fmt::Debug for CaptureController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureController")
            .field("state", &self.state)
            .field("facing", &self.facing)
            .field("flash_enabled", &self.flash_enabled)
            .field("stream", &self.stream)
            .finish()
    }
}

impl CaptureController {
    pub fn new(session: MediaDeviceSession, options: CaptureOptions) -> Self {
        Self {
            session,
            ideal_resolution: options.ideal_resolution,
            facing: options.facing,
            flash_enabled: false,
            state: CaptureState::Idle,
            stream: None,
            subscribers: Vec::new(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn facing(&self) -> FacingMode {
        self.facing
    }

    pub fn flash_enabled(&self) -> bool {
        self.flash_enabled
    }

    pub fn has_active_stream(&self) -> bool {
        self.stream.as_ref().is_some_and(StreamHandle::is_active)
    }

    /// Whether the current camera can drive a torch
    pub fn torch_available(&self) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|handle| self.session.query_torch_capability(handle))
    }

    /// Receive every event from now on
    pub fn subscribe(&mut self) -> UnboundedReceiver<CaptureEvent> {
        let (tx, rx) = unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn emit(&mut self, event: CaptureEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn set_state(&mut self, state: CaptureState) {
        if self.state != state {
            debug!(from = %self.state, to = %state, "Capture state changed");
            self.state = state;
            self.emit(CaptureEvent::StateChanged(state));
        }
    }

    fn set_flash(&mut self, enabled: bool) {
        if self.flash_enabled != enabled {
            self.flash_enabled = enabled;
            self.emit(CaptureEvent::FlashChanged(enabled));
        }
    }

    fn release_stream(&mut self) {
        if let Some(mut handle) = self.stream.take() {
            self.session.release(&mut handle);
        }
        // Stopping a stream switches its torch off
        self.set_flash(false);
    }

    /// Record a failed attempt: release, go to `Errored`, notify
    fn fail(&mut self, err: CaptureError) -> CaptureError {
        warn!(state = %self.state, error = %err, "Capture attempt failed");
        self.release_stream();
        self.set_state(CaptureState::Errored);
        self.emit(CaptureEvent::Failed(err.to_string()));
        err
    }

    fn invalid_state(&self, operation: &'static str) -> CaptureError {
        CaptureError::InvalidState {
            operation,
            state: self.state.to_string(),
        }
    }

    fn require_streaming(&self, operation: &'static str) -> CaptureResult<()> {
        if self.state == CaptureState::Streaming && self.stream.is_some() {
            Ok(())
        } else {
            Err(self.invalid_state(operation))
        }
    }

    /// Acquire the camera for the current facing and start streaming
    ///
    /// A single attempt; after `Errored` or `Closed` the caller may call
    /// `start` again.
    pub async fn start(&mut self) -> CaptureResult<()> {
        if self.stream.is_some() {
            return Err(self.invalid_state("start"));
        }

        info!(facing = %self.facing, "Starting capture session");
        self.set_flash(false);
        self.set_state(CaptureState::Initializing);

        let session = self.session.clone();
        let (facing, ideal) = (self.facing, self.ideal_resolution);
        // If this future is dropped, the handle is dropped with the task
        // result and released there
        let acquired = tokio::task::spawn_blocking(move || session.acquire(facing, ideal)).await;

        match acquired {
            Ok(Ok(handle)) => {
                info!(device = %handle.device().name, format = %handle.format(), "Camera streaming");
                self.stream = Some(handle);
                self.set_state(CaptureState::Streaming);
                Ok(())
            }
            Ok(Err(e)) => Err(self.fail(e.into())),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Release the current camera, then acquire the opposite one
    ///
    /// Flash is reset to off. Returns the new facing.
    pub async fn switch_facing(&mut self) -> CaptureResult<FacingMode> {
        self.require_streaming("switch facing")?;

        let old = self.stream.take();
        self.set_flash(false);
        self.facing = self.facing.opposite();
        self.set_state(CaptureState::Initializing);
        info!(facing = %self.facing, "Switching camera");

        let session = self.session.clone();
        let (facing, ideal) = (self.facing, self.ideal_resolution);
        let acquired = tokio::task::spawn_blocking(move || {
            if let Some(mut old) = old {
                session.release(&mut old);
            }
            session.acquire(facing, ideal)
        })
        .await;

        match acquired {
            Ok(Ok(handle)) => {
                self.stream = Some(handle);
                self.set_state(CaptureState::Streaming);
                Ok(facing)
            }
            Ok(Err(e)) => Err(self.fail(e.into())),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Try to flip the torch
    ///
    /// A camera without torch yields [`FlashToggle::NoEffect`] and leaves
    /// the flash state untouched.
    pub async fn toggle_flash(&mut self) -> CaptureResult<FlashToggle> {
        self.require_streaming("toggle flash")?;
        let target = !self.flash_enabled;

        let Some(mut handle) = self.stream.take() else {
            return Err(self.invalid_state("toggle flash"));
        };
        let session = self.session.clone();
        let toggled = tokio::task::spawn_blocking(move || {
            let result = session.set_torch(&mut handle, target);
            (handle, result)
        })
        .await;

        let (handle, result) = match toggled {
            Ok(toggled) => toggled,
            Err(e) => return Err(self.fail(e.into())),
        };
        self.stream = Some(handle);

        match result {
            Ok(()) => {
                self.set_flash(target);
                Ok(FlashToggle::Applied(target))
            }
            Err(BackendError::CapabilityUnsupported(reason)) => {
                debug!(%reason, "Flash toggle had no effect");
                Ok(FlashToggle::NoEffect)
            }
            Err(e) => {
                warn!(error = %e, "Flash toggle failed");
                Err(e.into())
            }
        }
    }

    /// Take a still and end the session
    ///
    /// On `FrameUnavailable` the session stays in `Streaming` so the
    /// caller can retry once the camera is ready.
    pub async fn capture(&mut self) -> CaptureResult<ImageArtifact> {
        self.require_streaming("capture")?;
        let Some(handle) = self.stream.take() else {
            return Err(self.invalid_state("capture"));
        };
        self.set_state(CaptureState::Capturing);

        let session = self.session.clone();
        let outcome = tokio::task::spawn_blocking(move || {
            let mut handle = handle;
            match session.capture_frame(&mut handle) {
                Ok(artifact) => {
                    session.release(&mut handle);
                    (Ok(artifact), None)
                }
                Err(e @ BackendError::FrameUnavailable(_)) => (Err(e), Some(handle)),
                Err(e) => {
                    session.release(&mut handle);
                    (Err(e), None)
                }
            }
        })
        .await;

        match outcome {
            Ok((Ok(artifact), _)) => {
                self.set_flash(false);
                self.set_state(CaptureState::Closed);
                info!(size = artifact.len(), "Photo captured");
                self.emit(CaptureEvent::Captured(artifact.clone()));
                Ok(artifact)
            }
            Ok((Err(e), Some(handle))) => {
                debug!(error = %e, "Capture attempted before a frame was ready");
                self.stream = Some(handle);
                self.set_state(CaptureState::Streaming);
                let err = CaptureError::from(e);
                self.emit(CaptureEvent::Failed(err.to_string()));
                Err(err)
            }
            Ok((Err(e), None)) => Err(self.fail(e.into())),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Use an image file instead of the camera
    ///
    /// Valid in any state. A live stream is released first; the bytes are
    /// normalised to JPEG.
    pub async fn import_from_file(&mut self, bytes: Vec<u8>) -> CaptureResult<ImageArtifact> {
        info!(size = bytes.len(), state = %self.state, "Importing image file");

        let old = self.stream.take();
        self.set_flash(false);

        let session = self.session.clone();
        let normalized = tokio::task::spawn_blocking(move || {
            if let Some(mut old) = old {
                session.release(&mut old);
            }
            session.encoder().normalize(&bytes)
        })
        .await;

        match normalized {
            Ok(Ok(artifact)) => {
                self.set_state(CaptureState::Closed);
                self.emit(CaptureEvent::Imported(artifact.clone()));
                Ok(artifact)
            }
            Ok(Err(e)) => Err(self.fail(e.into())),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// Cancel the session, releasing any camera
    pub async fn close(&mut self) {
        if self.state == CaptureState::Closed && self.stream.is_none() {
            return;
        }
        info!(state = %self.state, "Closing capture session");
        if let Some(mut handle) = self.stream.take() {
            let session = self.session.clone();
            // A panicked task drops the handle, which releases it too
            if let Err(e) = tokio::task::spawn_blocking(move || session.release(&mut handle)).await {
                warn!(error = %e, "Release task failed");
            }
        }
        self.set_flash(false);
        self.set_state(CaptureState::Closed);
        self.emit(CaptureEvent::Closed);
    }
}

// Drop cannot await, so teardown on drop releases on the current thread
impl Drop for CaptureController {
    fn drop(&mut self) {
        if let Some(mut handle) = self.stream.take() {
            self.session.release(&mut handle);
        }
    }
}

/// Capture controller shared between UI callbacks
///
/// One intent runs at a time. An intent that arrives while another is in
/// flight is rejected with [`CaptureError::Busy`] rather than queued. Only
/// [`close`](Self::close) waits, so that a pending acquisition is released
/// as soon as it resolves.
#[derive(Clone)]
pub struct SharedCaptureController {
    inner: Arc<tokio::sync::Mutex<CaptureController>>,
}

impl SharedCaptureController {
    pub fn new(controller: CaptureController) -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(controller)),
        }
    }

    fn try_lock(&self) -> CaptureResult<tokio::sync::MutexGuard<'_, CaptureController>> {
        self.inner.try_lock().map_err(|_| CaptureError::Busy)
    }

    pub async fn start(&self) -> CaptureResult<()> {
        self.try_lock()?.start().await
    }

    pub async fn switch_facing(&self) -> CaptureResult<FacingMode> {
        self.try_lock()?.switch_facing().await
    }

    pub async fn toggle_flash(&self) -> CaptureResult<FlashToggle> {
        self.try_lock()?.toggle_flash().await
    }

    pub async fn capture(&self) -> CaptureResult<ImageArtifact> {
        self.try_lock()?.capture().await
    }

    pub async fn import_from_file(&self, bytes: Vec<u8>) -> CaptureResult<ImageArtifact> {
        self.try_lock()?.import_from_file(bytes).await
    }

    pub async fn close(&self) {
        self.inner.lock().await.close().await;
    }

    pub async fn state(&self) -> CaptureState {
        self.inner.lock().await.state()
    }

    pub async fn subscribe(&self) -> UnboundedReceiver<CaptureEvent> {
        self.inner.lock().await.subscribe()
    }
}
