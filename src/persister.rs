// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    channel::{Consumer, Take},
    composite::Composite,
    error::PipelineError,
    frame::{encode_jpeg, encode_png, OutputFormat},
    postprocess::PostProcess,
    state::{PipelineState, StopReason},
};
use std::{
    fs,
    path::PathBuf,
    time::{Duration, Instant},
};
use tracing::{debug, error, info, instrument};

#[derive(Clone, Debug)]
pub struct PersisterConfig {
    pub path: PathBuf,
    pub jpeg_quality: i32,
    pub postprocess: PostProcess,
    /// How often the wait for the composite wakes up to check whether the
    /// assembler is gone
    pub poll_interval: Duration,
}

impl Default for PersisterConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./result.png"),
            jpeg_quality: 95,
            postprocess: PostProcess::default(),
            poll_interval: Duration::from_millis(500),
        }
    }
}

/// Writes the single composite of a run to disk.
///
/// Waits without a deadline for the composite, so a run can last as long as
/// the capture does. It only gives up when the assembler has exited without
/// publishing anything.
pub struct Persister {
    composites: Consumer<Composite>,
    state: PipelineState,
    config: PersisterConfig,
}

impl Persister {
    pub fn new(composites: Consumer<Composite>, state: PipelineState, config: PersisterConfig) -> Self {
        Self {
            composites,
            state,
            config,
        }
    }

    /// Returns the written path, or `None` when no composite was produced.
    #[instrument(skip_all, name = "persister")]
    pub fn run(self) -> Result<Option<PathBuf>, PipelineError> {
        let composite = loop {
            match self.composites.take_timeout(self.config.poll_interval) {
                Take::Item(composite) => break composite,
                Take::Empty => continue,
                Take::Closed => {
                    info!("no composite received");
                    return Ok(None);
                }
            }
        };

        match self.write(composite) {
            Ok(()) => {
                self.state.request_stop(StopReason::Persisted);
                Ok(Some(self.config.path))
            }
            Err(e) => {
                error!("{e}");
                self.state.request_stop(StopReason::WriteFailure);
                Err(e)
            }
        }
    }

    fn write(&self, composite: Composite) -> Result<(), PipelineError> {
        let path = &self.config.path;
        let failure = |reason: String| PipelineError::WriteFailure {
            path: path.clone(),
            reason,
        };

        let now = Instant::now();
        let format = OutputFormat::from_path(path).map_err(|e| failure(e.to_string()))?;
        let img = composite.into_image().map_err(|e| failure(e.to_string()))?;
        let img = self
            .config
            .postprocess
            .apply(img)
            .map_err(|e| failure(e.to_string()))?;

        let encoded = match format {
            OutputFormat::Png => encode_png(&img),
            OutputFormat::Jpeg => encode_jpeg(&img, self.config.jpeg_quality).map(|buf| buf.to_vec()),
        }
        .map_err(|e| failure(e.to_string()))?;
        let encode_time = now.elapsed();

        fs::write(path, &encoded).map_err(|e| failure(e.to_string()))?;
        debug!(?encode_time, "encoded {} bytes", encoded.len());
        info!(
            "saved {} resolution: {}x{} size: {}KB",
            path.display(),
            img.width(),
            img.height(),
            encoded.len() / 1024
        );
        Ok(())
    }
}
