// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Contrast and brightness adjustments applied to a finished composite.

use crate::error::PipelineError;
use image::{imageops, RgbImage};

/// Optional adjustments, applied in field order: crop, brightness, equalize.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PostProcess {
    /// Keep only columns `start..end`; `end` is clamped to the image width
    pub crop_columns: Option<(u32, u32)>,
    /// Multiply every channel by this factor, saturating at 255
    pub brightness: Option<f32>,
    /// Histogram-equalize the luma channel
    pub equalize: bool,
}

impl PostProcess {
    pub fn is_noop(&self) -> bool {
        self.crop_columns.is_none() && self.brightness.is_none() && !self.equalize
    }

    pub fn apply(&self, img: RgbImage) -> Result<RgbImage, PipelineError> {
        let mut img = match self.crop_columns {
            Some((start, end)) => crop_columns(&img, start, end)?,
            None => img,
        };
        if let Some(alpha) = self.brightness {
            scale_brightness(&mut img, alpha);
        }
        if self.equalize {
            equalize_luma(&mut img);
        }
        Ok(img)
    }
}

pub fn crop_columns(img: &RgbImage, start: u32, end: u32) -> Result<RgbImage, PipelineError> {
    let end = end.min(img.width());
    if start >= end {
        return Err(PipelineError::Config(format!(
            "crop {start}..{end} is empty for an image {} wide",
            img.width()
        )));
    }
    Ok(imageops::crop_imm(img, start, 0, end - start, img.height()).to_image())
}

/// `dst = saturate(|alpha * src|)` on every channel.
pub fn scale_brightness(img: &mut RgbImage, alpha: f32) {
    for v in img.iter_mut() {
        *v = (*v as f32 * alpha).abs().round().min(255.0) as u8;
    }
}

/// Equalizes the Y channel of the image in YUV space and converts back.
pub fn equalize_luma(img: &mut RgbImage) {
    let mut yuv: Vec<[f32; 3]> = img
        .pixels()
        .map(|px| {
            let [r, g, b] = px.0.map(f32::from);
            let y = 0.299 * r + 0.587 * g + 0.114 * b;
            [y, 0.492 * (b - y) + 128.0, 0.877 * (r - y) + 128.0]
        })
        .collect();

    let mut hist = [0usize; 256];
    let luma: Vec<u8> = yuv.iter().map(|p| saturate(p[0])).collect();
    for &y in &luma {
        hist[y as usize] += 1;
    }
    let lut = equalize_lut(&hist, luma.len());

    for (p, &y) in yuv.iter_mut().zip(&luma) {
        p[0] = lut[y as usize] as f32;
    }

    for (px, [y, u, v]) in img.pixels_mut().zip(yuv) {
        let (u, v) = (u - 128.0, v - 128.0);
        px.0 = [
            saturate(y + 1.140 * v),
            saturate(y - 0.395 * u - 0.581 * v),
            saturate(y + 2.032 * u),
        ];
    }
}

fn equalize_lut(hist: &[usize; 256], total: usize) -> [u8; 256] {
    let mut lut = [0u8; 256];
    let Some(first) = hist.iter().position(|&n| n > 0) else {
        return lut;
    };
    if hist[first] == total {
        // single level image, nothing to spread
        for (i, v) in lut.iter_mut().enumerate() {
            *v = i as u8;
        }
        return lut;
    }

    let scale = 255.0 / (total - hist[first]) as f32;
    let mut sum = 0;
    for (i, &count) in hist.iter().enumerate().skip(first + 1) {
        sum += count;
        lut[i] = saturate(sum as f32 * scale);
    }
    lut
}

fn saturate(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
