// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::driver::Status;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the grabber pipeline and its collaborators.
///
/// Only `DeviceUnavailable`, `DeviceInit`, `DeviceRead`, `WriteFailure` and
/// `UnitPanicked` are fatal. The remaining kinds are logged by the unit that
/// observes them and the pipeline keeps running.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("no camera device available: {0}")]
    DeviceUnavailable(String),

    #[error("camera init failed ({}): {}", .0.code(), .0.message())]
    DeviceInit(Status),

    #[error("camera read failed ({}): {}", .0.code(), .0.message())]
    DeviceRead(Status),

    #[error("frame read timed out")]
    Timeout,

    #[error("parameter {param} rejected ({}): {}", .status.code(), .status.message())]
    ParameterRejected { param: String, status: Status },

    #[error("malformed frame: {0}")]
    FrameDecode(String),

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("channel full, item dropped")]
    ChannelFull,

    #[error("channel closed")]
    ChannelClosed,

    #[error("failed to write {path}: {reason}")]
    WriteFailure { path: PathBuf, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("{0} unit panicked")]
    UnitPanicked(&'static str),
}

impl PipelineError {
    /// Fatal errors stop the whole pipeline.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PipelineError::DeviceUnavailable(_)
                | PipelineError::DeviceInit(_)
                | PipelineError::DeviceRead(_)
                | PipelineError::WriteFailure { .. }
                | PipelineError::UnitPanicked(_)
        )
    }
}
