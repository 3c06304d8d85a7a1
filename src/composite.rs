// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::PipelineError,
    frame::{Frame, PixelFormat},
};
use core::fmt;
use image::{imageops, imageops::FilterType, RgbImage};

/// Frames stacked top to bottom into one RGB image.
///
/// The first frame appended fixes the composite width. Later frames with a
/// different width are rescaled to it, keeping their aspect ratio, so the
/// composite height is the sum of every appended (possibly rescaled) frame
/// height. An optional vertical stretch is applied to each frame first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Composite {
    width: u32,
    height: u32,
    data: Vec<u8>,
    frames: u32,
    first_sequence: u64,
    last_sequence: u64,
}

impl Composite {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `frame` below the current contents.
    ///
    /// On error the composite is left untouched.
    pub fn append(&mut self, frame: Frame, stretch: f32) -> Result<(), PipelineError> {
        if !(stretch.is_finite() && stretch > 0.0) {
            return Err(PipelineError::Resize(format!("invalid stretch {stretch}")));
        }
        let sequence = frame.sequence();
        let (src_w, src_h) = (frame.width(), frame.height());
        let stretched_h = scale(src_h, stretch as f64)?;

        let (width, height) = if self.is_empty() {
            (src_w, stretched_h)
        } else if src_w == self.width {
            (self.width, stretched_h)
        } else {
            let ratio = self.width as f64 / src_w as f64;
            (self.width, scale(stretched_h, ratio)?)
        };

        let pixels = if (width, height) == (src_w, src_h) {
            frame.into_image()?
        } else {
            let img = frame.into_image()?;
            imageops::resize(&img, width, height, FilterType::Triangle)
        };

        self.data.extend_from_slice(pixels.as_raw());
        self.width = width;
        self.height += height;
        if self.frames == 0 {
            self.first_sequence = sequence;
        }
        self.frames += 1;
        self.last_sequence = sequence;
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.frames == 0
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> usize {
        PixelFormat::Rgb8.bytes_per_pixel()
    }

    /// Number of frames appended.
    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Sequence numbers of the first and last appended frame.
    pub fn sequence_range(&self) -> Option<(u64, u64)> {
        (!self.is_empty()).then_some((self.first_sequence, self.last_sequence))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn to_image(&self) -> Result<RgbImage, PipelineError> {
        self.clone().into_image()
    }

    pub fn into_image(self) -> Result<RgbImage, PipelineError> {
        if self.is_empty() {
            return Err(PipelineError::Resize("composite has no frames".to_string()));
        }
        let (width, height) = (self.width, self.height);
        RgbImage::from_raw(width, height, self.data).ok_or_else(|| {
            PipelineError::Resize(format!("composite buffer does not fit {width}x{height}"))
        })
    }
}

impl fmt::Display for Composite {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} from {} frames",
            self.width,
            self.height,
            self.channels(),
            self.frames
        )
    }
}

fn scale(length: u32, factor: f64) -> Result<u32, PipelineError> {
    let scaled = (length as f64 * factor).round();
    if scaled < 1.0 || scaled > u32::MAX as f64 {
        return Err(PipelineError::Resize(format!(
            "cannot scale {length} by {factor}"
        )));
    }
    Ok(scaled as u32)
}
