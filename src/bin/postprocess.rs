// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use std::{error::Error, fs, path::PathBuf};
use stitch_grabber::{
    frame::{encode_jpeg, encode_png, OutputFormat},
    postprocess::PostProcess,
};
use tracing::info;

/// Adjusts a saved composite: column crop, brightness and luma equalization.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input image
    input: PathBuf,

    /// Output image (.png or .jpg)
    output: PathBuf,

    /// Keep only columns (start end)
    #[arg(long, value_delimiter = ' ', num_args = 2)]
    crop_columns: Option<Vec<u32>>,

    /// Scale brightness by this factor
    #[arg(long)]
    brightness: Option<f32>,

    /// Histogram-equalize luma
    #[arg(long)]
    equalize: bool,

    /// JPEG quality when writing .jpg output
    #[arg(long, default_value = "95")]
    jpeg_quality: i32,
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();

    let crop_columns = match args.crop_columns.as_deref() {
        Some(&[start, end]) => Some((start, end)),
        _ => None,
    };
    let post = PostProcess {
        crop_columns,
        brightness: args.brightness,
        equalize: args.equalize,
    };

    let format = OutputFormat::from_path(&args.output)?;
    let img = image::open(&args.input)?.into_rgb8();
    let img = post.apply(img)?;
    let encoded = match format {
        OutputFormat::Png => encode_png(&img)?,
        OutputFormat::Jpeg => encode_jpeg(&img, args.jpeg_quality)?.to_vec(),
    };
    fs::write(&args.output, &encoded)?;

    info!(
        "saved {} resolution: {}x{} size: {}KB",
        args.output.display(),
        img.width(),
        img.height(),
        encoded.len() / 1024
    );
    Ok(())
}
