// SPDX-License-Identifier: GPL-3.0-only

//! Still photo capture
//!
//! A capture session is one-shot: the controller streams until a frame is
//! taken, a file is imported or the user closes it, then releases the
//! camera.

pub mod capture;

pub use capture::{
    CaptureController, CaptureEvent, CaptureOptions, CaptureState, FlashToggle,
    SharedCaptureController,
};
