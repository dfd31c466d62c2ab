// SPDX-License-Identifier: GPL-3.0-only
//! Pixel format conversion for still capture
//!
//! Raw frames are converted to packed RGB24 before JPEG encoding. All
//! converters honour the row stride and reject buffers that are too short.

use super::types::{CameraFrame, PixelFormat};

/// Convert one YUV sample to RGB (BT.601, full range)
#[inline]
fn yuv_to_rgb(y: f32, u: f32, v: f32) -> [u8; 3] {
    let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
    let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
    let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
    [r, g, b]
}

fn effective_stride(stride: u32, width: u32, bytes_per_pixel: u32) -> usize {
    let packed = (width * bytes_per_pixel) as usize;
    (stride as usize).max(packed)
}

fn check_len(data: &[u8], stride: usize, width_bytes: usize, height: u32) -> Option<()> {
    if height == 0 {
        return Some(());
    }
    let needed = stride * (height as usize - 1) + width_bytes;
    (data.len() >= needed).then_some(())
}

/// Convert packed 4:2:2 data to RGB24
///
/// `y_first` selects YUYV (Y0 U Y1 V) over UYVY (U Y0 V Y1).
fn packed_422_to_rgb(
    data: &[u8],
    width: u32,
    height: u32,
    stride: u32,
    y_first: bool,
) -> Option<Vec<u8>> {
    // Each 4-byte group holds two pixels, so odd widths round up
    let row_bytes = (width.div_ceil(2) * 4) as usize;
    let stride = (stride as usize).max(row_bytes);
    check_len(data, stride, row_bytes, height)?;

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for row in 0..height as usize {
        let line = &data[row * stride..row * stride + row_bytes];
        for chunk in line.chunks_exact(4) {
            let (y0, u, y1, v) = if y_first {
                (chunk[0], chunk[1], chunk[2], chunk[3])
            } else {
                (chunk[1], chunk[0], chunk[3], chunk[2])
            };
            let u = u as f32 - 128.0;
            let v = v as f32 - 128.0;
            rgb.extend_from_slice(&yuv_to_rgb(y0 as f32, u, v));
            rgb.extend_from_slice(&yuv_to_rgb(y1 as f32, u, v));
        }
        // Odd widths: the last chunk carries one pixel too many
        rgb.truncate((row + 1) * width as usize * 3);
    }
    Some(rgb)
}

/// Convert YUYV (Y0 U Y1 V) to RGB24
pub fn yuyv_to_rgb(data: &[u8], width: u32, height: u32, stride: u32) -> Option<Vec<u8>> {
    packed_422_to_rgb(data, width, height, stride, true)
}

/// Convert UYVY (U Y0 V Y1) to RGB24
pub fn uyvy_to_rgb(data: &[u8], width: u32, height: u32, stride: u32) -> Option<Vec<u8>> {
    packed_422_to_rgb(data, width, height, stride, false)
}

/// Drop the alpha channel of RGBA data
pub fn rgba_to_rgb(data: &[u8], width: u32, height: u32, stride: u32) -> Option<Vec<u8>> {
    let stride = effective_stride(stride, width, 4);
    let row_bytes = (width * 4) as usize;
    check_len(data, stride, row_bytes, height)?;

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for row in 0..height as usize {
        let line = &data[row * stride..row * stride + row_bytes];
        for px in line.chunks_exact(4) {
            rgb.extend_from_slice(&px[..3]);
        }
    }
    Some(rgb)
}

/// Remove row padding from RGB24 data
pub fn rgb_unpad(data: &[u8], width: u32, height: u32, stride: u32) -> Option<Vec<u8>> {
    let stride = effective_stride(stride, width, 3);
    let row_bytes = (width * 3) as usize;
    check_len(data, stride, row_bytes, height)?;

    if stride == row_bytes {
        return Some(data[..row_bytes * height as usize].to_vec());
    }
    let mut rgb = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        rgb.extend_from_slice(&data[row * stride..row * stride + row_bytes]);
    }
    Some(rgb)
}

/// Expand 8-bit grayscale to RGB24
pub fn gray_to_rgb(data: &[u8], width: u32, height: u32, stride: u32) -> Option<Vec<u8>> {
    let stride = effective_stride(stride, width, 1);
    let row_bytes = width as usize;
    check_len(data, stride, row_bytes, height)?;

    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    for row in 0..height as usize {
        for &g in &data[row * stride..row * stride + row_bytes] {
            rgb.extend_from_slice(&[g, g, g]);
        }
    }
    Some(rgb)
}

/// Convert any uncompressed frame to packed RGB24
///
/// Returns `None` for MJPEG (which must be decoded instead) and for
/// truncated buffers.
pub fn frame_to_rgb(frame: &CameraFrame) -> Option<Vec<u8>> {
    let (w, h, s) = (frame.width, frame.height, frame.stride);
    match frame.format {
        PixelFormat::YUYV => yuyv_to_rgb(&frame.data, w, h, s),
        PixelFormat::UYVY => uyvy_to_rgb(&frame.data, w, h, s),
        PixelFormat::RGBA => rgba_to_rgb(&frame.data, w, h, s),
        PixelFormat::RGB24 => rgb_unpad(&frame.data, w, h, s),
        PixelFormat::Gray8 => gray_to_rgb(&frame.data, w, h, s),
        PixelFormat::MJPEG => None,
    }
}
