// SPDX-License-Identifier: GPL-3.0-only

//! Capture pipelines
//!
//! ```text
//! ┌────────────┐     ┌────────────────────┐     ┌───────────────┐
//! │ User intent│ ──▶ │ CaptureController  │ ──▶ │ ImageArtifact │
//! │ / file     │     │ - acquire/release  │     │   (JPEG)      │
//! │            │     │ - torch, facing    │     │               │
//! └────────────┘     └────────────────────┘     └───────────────┘
//! ```
//!
//! Hardware calls run on tokio's blocking pool so the caller's executor
//! never stalls on a device. The one exception is dropping a controller
//! that still holds a stream, which releases it on the dropping thread.

pub mod photo;
