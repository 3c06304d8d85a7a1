// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{driver::FrameHead, error::PipelineError};
use core::fmt;
use image::{ImageFormat, RgbImage};
use std::{io::Cursor, path::Path};
use turbojpeg::OwnedBuf;

/// Interleaved channels per pixel in a [`Frame`].
pub const CHANNELS: usize = 3;

/// Pixel layouts the driver can hand back.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// BGR 24-bit (the ISP output format the grabber requests)
    Bgr8,
    /// RGB 24-bit (display-ready layout used by frames and composites)
    Rgb8,
    /// 8-bit greyscale
    Mono8,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Bgr8 | PixelFormat::Rgb8 => 3,
            PixelFormat::Mono8 => 1,
        }
    }

    pub const fn row_stride(self, width: u32) -> usize {
        self.bytes_per_pixel() * width as usize
    }

    pub const fn image_size(self, width: u32, height: u32) -> usize {
        self.row_stride(width) * height as usize
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PixelFormat::Bgr8 => "BGR3",
            PixelFormat::Rgb8 => "RGB3",
            PixelFormat::Mono8 => "GREY",
        };
        f.write_str(name)
    }
}

/// Image mirroring applied while converting raw frames.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Mirror {
    None,
    Horizontal,
    #[default]
    Vertical,
    Both,
}

/// One captured image, converted to interleaved RGB.
///
/// A frame is immutable once built. The sequence number is assigned by the
/// acquirer at capture time, starting at 1.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    sequence: u64,
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl Frame {
    /// Wraps an RGB buffer, checking it matches the stated dimensions.
    pub fn new(sequence: u64, width: u32, height: u32, data: Vec<u8>) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::FrameDecode(format!(
                "empty frame {width}x{height}"
            )));
        }
        let expected = PixelFormat::Rgb8.image_size(width, height);
        if data.len() != expected {
            return Err(PipelineError::FrameDecode(format!(
                "{width}x{height} frame needs {expected} bytes but got {}",
                data.len()
            )));
        }
        Ok(Self {
            sequence,
            width,
            height,
            data,
        })
    }

    /// Copies a frame out of the driver's native buffer.
    ///
    /// The head is validated against the buffer before any byte is read, the
    /// pixels are converted to RGB and the requested mirroring is applied.
    pub fn from_raw(
        sequence: u64,
        head: &FrameHead,
        buffer: &[u8],
        mirror: Mirror,
    ) -> Result<Self, PipelineError> {
        let expected = head.format.image_size(head.width, head.height);
        if head.bytes != expected {
            return Err(PipelineError::FrameDecode(format!(
                "{}x{} {} frame reports {} bytes, expected {expected}",
                head.width, head.height, head.format, head.bytes
            )));
        }
        let raw = buffer.get(..head.bytes).ok_or_else(|| {
            PipelineError::FrameDecode(format!(
                "frame of {} bytes exceeds native buffer of {}",
                head.bytes,
                buffer.len()
            ))
        })?;

        let mut data = to_rgb(raw, head.format);
        mirror_in_place(&mut data, head.width, head.height, mirror);
        Self::new(sequence, head.width, head.height, data)
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn into_image(self) -> Result<RgbImage, PipelineError> {
        let (width, height) = (self.width, self.height);
        RgbImage::from_raw(width, height, self.data).ok_or_else(|| {
            PipelineError::FrameDecode(format!("buffer does not fit {width}x{height}"))
        })
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "#{} {}x{} {}",
            self.sequence,
            self.width,
            self.height,
            PixelFormat::Rgb8
        )
    }
}

fn to_rgb(raw: &[u8], format: PixelFormat) -> Vec<u8> {
    match format {
        PixelFormat::Rgb8 => raw.to_vec(),
        PixelFormat::Bgr8 => raw
            .chunks_exact(3)
            .flat_map(|px| [px[2], px[1], px[0]])
            .collect(),
        PixelFormat::Mono8 => raw.iter().flat_map(|&v| [v, v, v]).collect(),
    }
}

/// Flips an interleaved RGB buffer in place.
pub fn mirror_in_place(data: &mut [u8], width: u32, height: u32, mirror: Mirror) {
    let stride = PixelFormat::Rgb8.row_stride(width);
    if stride == 0 {
        return;
    }
    if matches!(mirror, Mirror::Horizontal | Mirror::Both) {
        for row in data.chunks_exact_mut(stride) {
            let pixels = width as usize;
            for x in 0..pixels / 2 {
                let (a, b) = (x * CHANNELS, (pixels - 1 - x) * CHANNELS);
                for c in 0..CHANNELS {
                    row.swap(a + c, b + c);
                }
            }
        }
    }
    if matches!(mirror, Mirror::Vertical | Mirror::Both) {
        let rows = height as usize;
        for y in 0..rows / 2 {
            let (top, bottom) = data.split_at_mut((rows - 1 - y) * stride);
            top[y * stride..(y + 1) * stride].swap_with_slice(&mut bottom[..stride]);
        }
    }
}

/// Encoded file format of the output image.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Png,
    Jpeg,
}

impl OutputFormat {
    /// Picks the format from a file extension.
    pub fn from_path(path: &Path) -> Result<Self, PipelineError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("png") => Ok(OutputFormat::Png),
            Some("jpg") | Some("jpeg") => Ok(OutputFormat::Jpeg),
            _ => Err(PipelineError::Config(format!(
                "unsupported output extension for {}, expected .png, .jpg or .jpeg",
                path.display()
            ))),
        }
    }
}

/// Encodes an RGB image as PNG.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, PipelineError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)
        .map_err(|e| PipelineError::Config(format!("png encode failed: {e}")))?;
    Ok(out.into_inner())
}

/// Encodes an RGB image to JPEG using turbojpeg.
///
/// # Example
///
/// ```no_run
/// use image::RgbImage;
/// use stitch_grabber::frame::encode_jpeg;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let img = RgbImage::new(640, 480);
/// let jpeg = encode_jpeg(&img, 95)?;
/// println!("Compressed to {} bytes", jpeg.len());
/// # Ok(())
/// # }
/// ```
pub fn encode_jpeg(img: &RgbImage, quality: i32) -> Result<OwnedBuf, PipelineError> {
    let image = turbojpeg::Image {
        width: img.width() as usize,
        height: img.height() as usize,
        format: turbojpeg::PixelFormat::RGB,
        pixels: img.as_raw().as_slice(),
        pitch: PixelFormat::Rgb8.row_stride(img.width()),
    };
    turbojpeg::compress(image, quality, turbojpeg::Subsamp::Sub2x2)
        .map_err(|e| PipelineError::Config(format!("jpeg encode failed: {e}")))
}
