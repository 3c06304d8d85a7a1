// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    acquirer::AcquirerConfig,
    assembler::AssemblerConfig,
    driver::{CameraParams, LoadMode, RgbGain, SyntheticConfig},
    error::PipelineError,
    frame::Mirror,
    persister::PersisterConfig,
    pipeline::PipelineConfig,
    postprocess::PostProcess,
};
use clap::Parser;
use std::{fs::File, io::BufReader, path::PathBuf, time::Duration};

/// Camera image mirroring options.
///
/// Determines how each frame is flipped before it is stitched. The default
/// flips vertically to undo the sensor's upside-down readout.
#[derive(clap::ValueEnum, Clone, Debug, PartialEq, Copy)]
pub enum MirrorSetting {
    /// No mirroring
    None,
    /// Flip horizontally (left-right)
    Horizontal,
    /// Flip vertically (top-bottom)
    Vertical,
    /// Flip both horizontally and vertically (180-degree rotation)
    Both,
}

impl From<MirrorSetting> for Mirror {
    fn from(value: MirrorSetting) -> Self {
        match value {
            MirrorSetting::None => Mirror::None,
            MirrorSetting::Horizontal => Mirror::Horizontal,
            MirrorSetting::Vertical => Mirror::Vertical,
            MirrorSetting::Both => Mirror::Both,
        }
    }
}

/// Command-line arguments for the stitch grabber.
///
/// Frames are captured until a stop trigger fires (Enter on the terminal,
/// Ctrl-C, `--max-frames` or `--duration-secs`), stacked top to bottom and
/// written once to `--output`. Every option can also be set through the
/// environment.
///
/// # Example
///
/// ```bash
/// # Via command line
/// stitch-grabber --max-frames 200 --stretch 2 --output strip.png
///
/// # Via environment variables
/// export DURATION_SECS=3
/// export OUTPUT=result.jpg
/// stitch-grabber
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Index of the camera to open among the enumerated devices
    #[arg(short, long, env = "DEVICE_INDEX", default_value = "0")]
    pub device_index: usize,

    /// Where the camera loads its startup parameters from
    #[arg(long, env = "LOAD_MODE", default_value = "last-saved", value_enum)]
    pub load_mode: LoadMode,

    /// Output image path (.png is lossless, .jpg/.jpeg uses turbojpeg)
    #[arg(short, long, env = "OUTPUT", default_value = "./result.png")]
    pub output: PathBuf,

    /// JPEG quality when writing .jpg output
    #[arg(long, env = "JPEG_QUALITY", default_value = "95")]
    pub jpeg_quality: i32,

    /// Capacity of the frame queue between capture and stitching
    #[arg(long, env = "QUEUE_SIZE", default_value = "30")]
    pub queue_size: usize,

    /// Bounded wait for each camera read in milliseconds
    #[arg(long, env = "READ_TIMEOUT_MS", default_value = "200")]
    pub read_timeout_ms: u64,

    /// Pause after each camera read in milliseconds
    #[arg(long, env = "GRAB_INTERVAL_MS", default_value = "0")]
    pub grab_interval_ms: u64,

    /// Camera image mirroring setting
    #[arg(long, env = "MIRROR", default_value = "vertical", value_enum)]
    pub mirror: MirrorSetting,

    /// Stop after this many frames
    #[arg(long, env = "MAX_FRAMES")]
    pub max_frames: Option<u64>,

    /// Stop after capturing for this many seconds
    #[arg(long, env = "DURATION_SECS")]
    pub duration_secs: Option<f64>,

    /// Vertical stretch factor applied to each frame before stitching
    #[arg(long, env = "STRETCH", default_value = "1.0")]
    pub stretch: f32,

    /// Enable camera auto exposure (ignores exposure time and analog gain)
    #[arg(long, env = "AUTO_EXPOSURE")]
    pub auto_exposure: bool,

    /// Exposure time in microseconds
    #[arg(long, env = "EXPOSURE_US", default_value = "50")]
    pub exposure_us: f64,

    /// Analog gain multiplier
    #[arg(long, env = "ANALOG_GAIN", default_value = "25")]
    pub analog_gain: f32,

    /// White balance gains (r g b)
    #[arg(long, env = "RGB_GAIN", value_delimiter = ' ', num_args = 3)]
    pub rgb_gain: Option<Vec<f32>>,

    /// ISP saturation
    #[arg(long, env = "SATURATION", default_value = "100")]
    pub saturation: i32,

    /// ISP contrast
    #[arg(long, env = "CONTRAST", default_value = "100")]
    pub contrast: i32,

    /// ISP sharpness
    #[arg(long, env = "SHARPNESS", default_value = "50")]
    pub sharpness: i32,

    /// JSON file with camera parameters, overrides the exposure options
    #[arg(long, env = "PARAMS_FILE")]
    pub params_file: Option<PathBuf>,

    /// Keep only output columns (start end) of the composite
    #[arg(long, env = "CROP_COLUMNS", value_delimiter = ' ', num_args = 2)]
    pub crop_columns: Option<Vec<u32>>,

    /// Scale output brightness by this factor
    #[arg(long, env = "BRIGHTNESS")]
    pub brightness: Option<f32>,

    /// Histogram-equalize output luma
    #[arg(long, env = "EQUALIZE")]
    pub equalize: bool,

    /// Simulated camera resolution in pixels (width height)
    #[arg(
        long,
        env = "SIM_SIZE",
        default_value = "1024 16",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub sim_size: Vec<u32>,

    /// Simulated camera frame rate
    #[arg(long, env = "SIM_FPS", default_value = "30")]
    pub sim_fps: u32,

    /// Do not stop when Enter is pressed
    #[arg(long, env = "NO_KEYBOARD")]
    pub no_keyboard: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Also log to the systemd journal
    #[arg(long, env = "JOURNALD")]
    pub journald: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

impl Args {
    /// Camera parameters from `--params-file` if given, else from the
    /// individual exposure options.
    pub fn camera_params(&self) -> Result<CameraParams, PipelineError> {
        if let Some(path) = &self.params_file {
            let file = File::open(path).map_err(|e| {
                PipelineError::Config(format!("cannot open {}: {e}", path.display()))
            })?;
            return serde_json::from_reader(BufReader::new(file)).map_err(|e| {
                PipelineError::Config(format!("invalid params file {}: {e}", path.display()))
            });
        }

        let rgb_gain = match self.rgb_gain.as_deref() {
            None => None,
            Some(&[r, g, b]) => Some(RgbGain { r, g, b }),
            Some(other) => {
                return Err(PipelineError::Config(format!(
                    "rgb gain needs 3 values, got {}",
                    other.len()
                )))
            }
        };

        Ok(CameraParams {
            auto_exposure: self.auto_exposure,
            exposure_us: self.exposure_us,
            analog_gain: self.analog_gain,
            rgb_gain,
            saturation: self.saturation,
            contrast: self.contrast,
            sharpness: self.sharpness,
        })
    }

    pub fn postprocess(&self) -> Result<PostProcess, PipelineError> {
        let crop_columns = match self.crop_columns.as_deref() {
            None => None,
            Some(&[start, end]) => Some((start, end)),
            Some(_) => {
                return Err(PipelineError::Config(
                    "crop needs start and end columns".to_string(),
                ))
            }
        };
        Ok(PostProcess {
            crop_columns,
            brightness: self.brightness,
            equalize: self.equalize,
        })
    }

    /// Configuration of the simulated camera the binary captures from.
    pub fn synthetic_config(&self) -> Result<SyntheticConfig, PipelineError> {
        let [width, height] = self.sim_size[..] else {
            return Err(PipelineError::Config(
                "simulated size needs width and height".to_string(),
            ));
        };
        if width == 0 || height == 0 || self.sim_fps == 0 {
            return Err(PipelineError::Config(
                "simulated size and frame rate must be non-zero".to_string(),
            ));
        }
        Ok(SyntheticConfig {
            width,
            height,
            max_width: width,
            max_height: height,
            frame_interval: Duration::from_secs(1) / self.sim_fps,
            ..Default::default()
        })
    }
}

impl TryFrom<&Args> for PipelineConfig {
    type Error = PipelineError;

    fn try_from(args: &Args) -> Result<Self, Self::Error> {
        let max_duration = args
            .duration_secs
            .map(|secs| {
                Duration::try_from_secs_f64(secs)
                    .map_err(|e| PipelineError::Config(format!("invalid duration {secs}: {e}")))
            })
            .transpose()?;

        Ok(PipelineConfig {
            queue_size: args.queue_size,
            acquirer: AcquirerConfig {
                device_index: args.device_index,
                load_mode: args.load_mode,
                params: args.camera_params()?,
                read_timeout: Duration::from_millis(args.read_timeout_ms),
                mirror: args.mirror.into(),
                grab_interval: Duration::from_millis(args.grab_interval_ms),
                max_frames: args.max_frames,
                max_duration,
            },
            assembler: AssemblerConfig {
                stretch: args.stretch,
                ..Default::default()
            },
            persister: PersisterConfig {
                path: args.output.clone(),
                jpeg_quality: args.jpeg_quality,
                postprocess: args.postprocess()?,
                ..Default::default()
            },
        })
    }
}
