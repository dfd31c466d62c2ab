// SPDX-License-Identifier: GPL-3.0-only

//! Still image artifacts and their encoding
//!
//! Every completed capture or import yields one [`ImageArtifact`]: an
//! immutable JPEG payload that the classifier and the nutrition store
//! consume. The [`encoders`] module turns raw camera frames and imported
//! files into artifacts.

pub mod encoders;

pub use encoders::{EncodingQuality, PhotoEncoder};

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Encoding of an artifact's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    /// Get file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
        }
    }
}

/// Where an artifact came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactSource {
    Camera,
    Import,
}

/// An immutable still image
///
/// Cloning shares the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArtifact {
    data: Arc<[u8]>,
    format: ImageFormat,
    width: u32,
    height: u32,
    source: ArtifactSource,
}

impl ImageArtifact {
    /// Wrap an already-encoded JPEG payload
    pub fn jpeg(data: impl Into<Arc<[u8]>>, width: u32, height: u32, source: ArtifactSource) -> Self {
        Self {
            data: data.into(),
            format: ImageFormat::Jpeg,
            width,
            height,
            source,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Shared handle to the payload
    pub fn data(&self) -> Arc<[u8]> {
        Arc::clone(&self.data)
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn source(&self) -> ArtifactSource {
        self.source
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// Payload size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_payload() {
        let artifact = ImageArtifact::jpeg(vec![0xFF, 0xD8, 0xFF], 1, 1, ArtifactSource::Camera);
        let copy = artifact.clone();
        assert!(Arc::ptr_eq(&artifact.data(), &copy.data()));
        assert_eq!(copy.mime_type(), "image/jpeg");
        assert_eq!(copy.extension(), "jpg");
        assert_eq!(copy.len(), 3);
    }
}
