// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Camera driver abstraction.
//!
//! The vendor SDK is treated as an opaque device driver: it enumerates
//! devices, opens one, accepts synchronous parameter writes that return a
//! [`Status`], and hands out processed frames through a blocking read with a
//! bounded wait. [`Driver`] and [`Device`] are the seams the acquirer talks
//! to; [`SyntheticDriver`] is an in-process implementation that produces
//! deterministic frames.

mod status;
mod synthetic;

pub use status::Status;
pub use synthetic::{Step, SyntheticConfig, SyntheticDriver, SyntheticProbe};

use crate::frame::PixelFormat;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identity of an enumerated camera.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Friendly name reported by the driver
    pub name: String,
    /// Port type (USB3, GigE, ...)
    pub port: String,
    /// Serial number
    pub serial: String,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.name, self.port)
    }
}

/// Where the device loads its startup parameters from when opened.
#[derive(clap::ValueEnum, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum LoadMode {
    /// Parameters saved on the device the last time it was closed
    #[default]
    LastSaved,
    /// Factory defaults
    Defaults,
}

/// Sensor limits reported once the device is open.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Capability {
    pub max_width: u32,
    pub max_height: u32,
}

impl Capability {
    /// Size of a native buffer large enough for any 3-channel frame.
    pub fn buffer_size(&self) -> usize {
        self.max_width as usize * self.max_height as usize * 3
    }
}

/// Frame trigger source. The grabber always free-runs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TriggerMode {
    Continuous,
}

/// Per-channel white balance gains.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RgbGain {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

/// A single configuration write.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Parameter {
    OutputFormat(PixelFormat),
    TriggerMode(TriggerMode),
    AutoExposure(bool),
    /// Exposure time in microseconds
    ExposureTime(f64),
    AnalogGain(f32),
    RgbGain(RgbGain),
    Saturation(i32),
    Contrast(i32),
    Sharpness(i32),
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Parameter::OutputFormat(format) => write!(f, "output_format={format}"),
            Parameter::TriggerMode(mode) => write!(f, "trigger_mode={mode:?}"),
            Parameter::AutoExposure(on) => write!(f, "auto_exposure={on}"),
            Parameter::ExposureTime(us) => write!(f, "exposure_time={us}us"),
            Parameter::AnalogGain(gain) => write!(f, "analog_gain={gain}"),
            Parameter::RgbGain(g) => write!(f, "rgb_gain={}/{}/{}", g.r, g.g, g.b),
            Parameter::Saturation(v) => write!(f, "saturation={v}"),
            Parameter::Contrast(v) => write!(f, "contrast={v}"),
            Parameter::Sharpness(v) => write!(f, "sharpness={v}"),
        }
    }
}

/// Exposure and ISP settings applied before streaming starts.
///
/// Can be loaded from a JSON file; missing fields keep their defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraParams {
    pub auto_exposure: bool,
    pub exposure_us: f64,
    pub analog_gain: f32,
    pub rgb_gain: Option<RgbGain>,
    pub saturation: i32,
    pub contrast: i32,
    pub sharpness: i32,
}

impl Default for CameraParams {
    fn default() -> Self {
        Self {
            auto_exposure: false,
            exposure_us: 50.0,
            analog_gain: 25.0,
            rgb_gain: None,
            saturation: 100,
            contrast: 100,
            sharpness: 50,
        }
    }
}

impl CameraParams {
    /// Ordered list of configuration writes. Output format and trigger mode
    /// come first so exposure settings apply to the final stream layout.
    pub fn parameters(&self) -> Vec<Parameter> {
        let mut params = vec![
            Parameter::OutputFormat(PixelFormat::Bgr8),
            Parameter::TriggerMode(TriggerMode::Continuous),
            Parameter::AutoExposure(self.auto_exposure),
        ];
        if !self.auto_exposure {
            params.push(Parameter::ExposureTime(self.exposure_us));
            params.push(Parameter::AnalogGain(self.analog_gain));
        }
        if let Some(gain) = self.rgb_gain {
            params.push(Parameter::RgbGain(gain));
        }
        params.push(Parameter::Saturation(self.saturation));
        params.push(Parameter::Contrast(self.contrast));
        params.push(Parameter::Sharpness(self.sharpness));
        params
    }
}

/// Metadata describing the bytes a read wrote into the native buffer.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameHead {
    pub width: u32,
    pub height: u32,
    /// Number of valid bytes at the start of the buffer
    pub bytes: usize,
    pub format: PixelFormat,
    /// Device timestamp in 0.1 ms ticks
    pub timestamp: u32,
    pub exposure_us: u32,
    pub analog_gain: f32,
}

/// An open camera.
///
/// Implementations must tolerate `close` being called more than once.
pub trait Device: Send {
    fn descriptor(&self) -> &DeviceDescriptor;

    fn capability(&self) -> Capability;

    fn configure(&mut self, param: &Parameter) -> Status;

    /// Starts streaming.
    fn start(&mut self) -> Status;

    /// Waits up to `timeout` for the next frame and writes its processed
    /// pixels into `buffer`. Returns [`Status::TIMEOUT`] when nothing arrived.
    fn read_frame(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<FrameHead, Status>;

    fn close(&mut self);
}

/// Entry point into a camera SDK.
pub trait Driver: Send {
    fn enumerate(&self) -> Vec<DeviceDescriptor>;

    fn open(
        &self,
        descriptor: &DeviceDescriptor,
        mode: LoadMode,
    ) -> Result<Box<dyn Device>, Status>;
}
