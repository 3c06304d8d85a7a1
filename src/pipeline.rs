// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Wires the acquirer, assembler and persister together.
//!
//! ```text
//! Acquirer --frames--> Assembler --composite--> Persister
//! ```
//!
//! Each unit runs on its own named thread and shares only the two channels
//! and the [`PipelineState`]. A run ends when all three threads have been
//! joined; a panicking unit moves the pipeline to stopping on its way out.

use crate::{
    acquirer::{Acquirer, AcquirerConfig, AcquisitionStats},
    assembler::{Assembler, AssemblerConfig, AssemblyReport},
    channel::{self, DEFAULT_CAPACITY},
    driver::Driver,
    error::PipelineError,
    frame::OutputFormat,
    persister::{Persister, PersisterConfig},
    state::{PipelineState, StopReason},
};
use std::{
    io::{self, BufRead},
    path::PathBuf,
    thread::{self, JoinHandle},
};
use tracing::{error, info, warn};

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Capacity of the frame channel
    pub queue_size: usize,
    pub acquirer: AcquirerConfig,
    pub assembler: AssemblerConfig,
    pub persister: PersisterConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_size: DEFAULT_CAPACITY,
            acquirer: AcquirerConfig::default(),
            assembler: AssemblerConfig::default(),
            persister: PersisterConfig::default(),
        }
    }
}

/// Outcome of a finished run.
#[derive(Debug, Default)]
pub struct PipelineReport {
    pub acquisition: Option<AcquisitionStats>,
    pub assembly: Option<AssemblyReport>,
    /// Where the composite was written, if it was
    pub output: Option<PathBuf>,
    pub stop_reason: Option<StopReason>,
    /// Fatal errors raised by the units
    pub errors: Vec<PipelineError>,
}

impl PipelineReport {
    /// A run succeeds when the composite reached disk.
    pub fn is_success(&self) -> bool {
        self.output.is_some()
    }
}

/// Single-use capture pipeline.
pub struct Pipeline {
    config: PipelineConfig,
    state: PipelineState,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            state: PipelineState::new(),
        }
    }

    /// Handle for external stop triggers (keypress, signals).
    pub fn state(&self) -> PipelineState {
        self.state.clone()
    }

    /// Runs the three units to completion.
    ///
    /// Configuration problems are returned before any thread starts. Errors
    /// raised while running are collected in the report.
    pub fn run(self, driver: Box<dyn Driver>) -> Result<PipelineReport, PipelineError> {
        OutputFormat::from_path(&self.config.persister.path)?;
        if !(self.config.assembler.stretch.is_finite() && self.config.assembler.stretch > 0.0) {
            return Err(PipelineError::Config(format!(
                "stretch must be positive, got {}",
                self.config.assembler.stretch
            )));
        }

        let (frame_tx, frame_rx) = channel::channel(self.config.queue_size);
        let (composite_tx, composite_rx) = channel::channel(1);
        let state = self.state;

        let persister = Persister::new(composite_rx, state.clone(), self.config.persister);
        let persister = spawn_unit("persister", &state, move || persister.run())?;

        let assembler = Assembler::new(
            frame_rx,
            composite_tx,
            state.clone(),
            self.config.assembler,
        );
        let assembler = match spawn_unit("assembler", &state, move || assembler.run()) {
            Ok(handle) => handle,
            Err(e) => {
                state.request_stop(StopReason::UnitPanicked);
                return Err(e);
            }
        };

        let acquirer = Acquirer::new(driver, frame_tx, state.clone(), self.config.acquirer);
        let acquirer = match spawn_unit("acquirer", &state, move || acquirer.run()) {
            Ok(handle) => handle,
            Err(e) => {
                state.request_stop(StopReason::UnitPanicked);
                return Err(e);
            }
        };

        let mut report = PipelineReport::default();

        match acquirer.join() {
            Ok(Ok(stats)) => report.acquisition = Some(stats),
            Ok(Err(e)) => report.errors.push(e),
            Err(_) => report.errors.push(panicked(&state, "acquirer")),
        }

        match assembler.join() {
            Ok(assembly) => report.assembly = Some(assembly),
            Err(_) => report.errors.push(panicked(&state, "assembler")),
        }

        match persister.join() {
            Ok(Ok(output)) => report.output = output,
            Ok(Err(e)) => report.errors.push(e),
            Err(_) => report.errors.push(panicked(&state, "persister")),
        }

        report.stop_reason = state.reason();
        match &report.output {
            Some(path) => info!("pipeline finished, composite saved to {}", path.display()),
            None => warn!(
                reason = ?report.stop_reason,
                "pipeline finished without a composite"
            ),
        }
        Ok(report)
    }
}

fn panicked(state: &PipelineState, unit: &'static str) -> PipelineError {
    state.request_stop(StopReason::UnitPanicked);
    let err = PipelineError::UnitPanicked(unit);
    error!("{err}");
    err
}

/// Requests a stop if the owning thread unwinds.
struct StopOnPanic(PipelineState);

impl Drop for StopOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.request_stop(StopReason::UnitPanicked);
        }
    }
}

/// Spawns a named unit thread that inherits the current tracing dispatcher.
fn spawn_unit<F, T>(name: &str, state: &PipelineState, f: F) -> Result<JoinHandle<T>, PipelineError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let dispatch = tracing::dispatcher::get_default(|current| current.clone());
    let guard = StopOnPanic(state.clone());
    thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            let _guard = guard;
            tracing::dispatcher::with_default(&dispatch, f)
        })
        .map_err(|e| PipelineError::Config(format!("failed to spawn {name} thread: {e}")))
}

/// Requests a stop when a line is read from stdin.
///
/// The thread is detached; it stays blocked on stdin after the pipeline ends.
pub fn watch_stdin(state: PipelineState) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("stdin-trigger".to_string())
        .spawn(move || {
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) => {}
                Ok(_) => {
                    if state.request_stop(StopReason::UserRequest) {
                        info!("stop requested from keyboard");
                    }
                }
                Err(e) => warn!("stdin trigger disabled: {e}"),
            }
        })
}
