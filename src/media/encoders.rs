// SPDX-License-Identifier: GPL-3.0-only

//! JPEG encoding of camera frames and imported files
//!
//! Camera frames are converted to RGB24 and encoded at their native size.
//! Imported files are normalised: JPEG input is kept as-is once its header
//! parses, everything else the `image` crate can decode is re-encoded.

use super::{ArtifactSource, ImageArtifact};
use crate::backends::camera::format_converters::frame_to_rgb;
use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::errors::MediaError;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::{debug, info};

/// JPEG quality presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingQuality {
    /// Small files, visible artifacts
    Low,
    Medium,
    /// Default for meal photos
    #[default]
    High,
    /// Near-lossless
    Maximum,
}

impl EncodingQuality {
    /// Quality factor passed to the JPEG encoder
    pub fn jpeg_quality(&self) -> u8 {
        match self {
            EncodingQuality::Low => 60,
            EncodingQuality::Medium => 80,
            EncodingQuality::High => 92,
            EncodingQuality::Maximum => 98,
        }
    }
}

impl std::str::FromStr for EncodingQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(EncodingQuality::Low),
            "medium" => Ok(EncodingQuality::Medium),
            "high" => Ok(EncodingQuality::High),
            "maximum" | "max" => Ok(EncodingQuality::Maximum),
            other => Err(format!("unknown quality: {}", other)),
        }
    }
}

/// Photo encoder
#[derive(Debug, Clone, Copy, Default)]
pub struct PhotoEncoder {
    quality: EncodingQuality,
}

impl PhotoEncoder {
    pub fn new(quality: EncodingQuality) -> Self {
        Self { quality }
    }

    pub fn quality(&self) -> EncodingQuality {
        self.quality
    }

    pub fn set_quality(&mut self, quality: EncodingQuality) {
        self.quality = quality;
    }

    /// Rasterize a raw camera frame into a JPEG artifact
    ///
    /// CPU-bound; call from a blocking context.
    pub fn encode_frame(&self, frame: &CameraFrame) -> Result<ImageArtifact, MediaError> {
        let (rgb, width, height) = if frame.format == PixelFormat::MJPEG {
            // Some webcams emit MJPEG without Huffman tables; decoding and
            // re-encoding yields a standalone JPEG.
            let decoded =
                image::load_from_memory_with_format(&frame.data, image::ImageFormat::Jpeg)
                    .map_err(|e| MediaError::Decode(format!("MJPEG frame: {}", e)))?
                    .to_rgb8();
            let (w, h) = decoded.dimensions();
            (decoded.into_raw(), w, h)
        } else {
            let rgb = frame_to_rgb(frame).ok_or_else(|| {
                MediaError::Decode(format!(
                    "{} frame of {} bytes is too short for {}x{}",
                    frame.format,
                    frame.data.len(),
                    frame.width,
                    frame.height
                ))
            })?;
            (rgb, frame.width, frame.height)
        };

        let data = encode_jpeg(&rgb, width, height, self.quality)?;
        debug!(width, height, size = data.len(), "Frame encoded");
        Ok(ImageArtifact::jpeg(data, width, height, ArtifactSource::Camera))
    }

    /// Turn imported file bytes into a JPEG artifact
    ///
    /// CPU-bound; call from a blocking context.
    pub fn normalize(&self, bytes: &[u8]) -> Result<ImageArtifact, MediaError> {
        let format = image::guess_format(bytes)
            .map_err(|e| MediaError::Decode(format!("unrecognised image data: {}", e)))?;

        if format == image::ImageFormat::Jpeg {
            let (width, height) =
                image::ImageReader::with_format(Cursor::new(bytes), image::ImageFormat::Jpeg)
                    .into_dimensions()
                    .map_err(|e| MediaError::Decode(e.to_string()))?;
            info!(width, height, size = bytes.len(), "Imported JPEG kept as-is");
            return Ok(ImageArtifact::jpeg(
                bytes.to_vec(),
                width,
                height,
                ArtifactSource::Import,
            ));
        }

        let decoded = image::load_from_memory_with_format(bytes, format)
            .map_err(|e| MediaError::Decode(e.to_string()))?
            .to_rgb8();
        let (width, height) = decoded.dimensions();
        let data = encode_jpeg(decoded.as_raw(), width, height, self.quality)?;

        info!(
            from = ?format,
            width,
            height,
            size = data.len(),
            "Imported image re-encoded to JPEG"
        );
        Ok(ImageArtifact::jpeg(data, width, height, ArtifactSource::Import))
    }
}

/// Encode packed RGB24 as JPEG
fn encode_jpeg(
    rgb: &[u8],
    width: u32,
    height: u32,
    quality: EncodingQuality,
) -> Result<Vec<u8>, MediaError> {
    let mut buffer = Vec::new();
    let mut cursor = Cursor::new(&mut buffer);

    let mut encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(&mut cursor, quality.jpeg_quality());

    encoder
        .encode(rgb, width, height, image::ExtendedColorType::Rgb8)
        .map_err(|e| MediaError::Encode(format!("JPEG encoding failed: {}", e)))?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 10, 128]));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    #[test]
    fn test_quality_values() {
        assert_eq!(EncodingQuality::Low.jpeg_quality(), 60);
        assert_eq!(EncodingQuality::default().jpeg_quality(), 92);
    }

    #[test]
    fn test_encode_yuyv_frame_native_size() {
        let frame = CameraFrame {
            width: 4,
            height: 2,
            data: Arc::from(vec![128u8; 4 * 2 * 2]),
            format: PixelFormat::YUYV,
            stride: 8,
            captured_at: Instant::now(),
        };
        let artifact = PhotoEncoder::default().encode_frame(&frame).unwrap();
        assert_eq!((artifact.width(), artifact.height()), (4, 2));
        assert_eq!(artifact.source(), ArtifactSource::Camera);
        assert_eq!(&artifact.as_bytes()[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_truncated_frame_is_decode_error() {
        let frame = CameraFrame {
            width: 64,
            height: 64,
            data: Arc::from(vec![0u8; 16]),
            format: PixelFormat::RGB24,
            stride: 0,
            captured_at: Instant::now(),
        };
        assert!(matches!(
            PhotoEncoder::default().encode_frame(&frame),
            Err(MediaError::Decode(_))
        ));
    }

    #[test]
    fn test_normalize_png_reencodes_to_jpeg() {
        let artifact = PhotoEncoder::default().normalize(&png_bytes(3, 5)).unwrap();
        assert_eq!((artifact.width(), artifact.height()), (3, 5));
        assert_eq!(artifact.source(), ArtifactSource::Import);
        assert_eq!(
            image::guess_format(artifact.as_bytes()).unwrap(),
            image::ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_normalize_keeps_jpeg_bytes() {
        let encoder = PhotoEncoder::new(EncodingQuality::Low);
        let jpeg = encoder.normalize(&png_bytes(8, 8)).unwrap();
        let again = encoder.normalize(jpeg.as_bytes()).unwrap();
        assert_eq!(again.as_bytes(), jpeg.as_bytes());
    }

    #[test]
    fn test_normalize_rejects_garbage() {
        assert!(matches!(
            PhotoEncoder::default().normalize(b"definitely not an image"),
            Err(MediaError::Decode(_))
        ));
    }
}
