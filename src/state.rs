// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use core::fmt;
use std::sync::{
    atomic::{AtomicU8, Ordering},
    Arc,
};

/// Why the pipeline left the running phase.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum StopReason {
    /// The camera could not be opened or failed while streaming
    DeviceError = 1,
    /// A keypress asked for the capture to end
    UserRequest,
    /// Ctrl-C
    Interrupted,
    FrameLimit,
    TimeLimit,
    /// The composite was written to disk
    Persisted,
    WriteFailure,
    UnitPanicked,
}

impl StopReason {
    fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            1 => StopReason::DeviceError,
            2 => StopReason::UserRequest,
            3 => StopReason::Interrupted,
            4 => StopReason::FrameLimit,
            5 => StopReason::TimeLimit,
            6 => StopReason::Persisted,
            7 => StopReason::WriteFailure,
            8 => StopReason::UnitPanicked,
            _ => return None,
        })
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let text = match self {
            StopReason::DeviceError => "device error",
            StopReason::UserRequest => "stop requested",
            StopReason::Interrupted => "interrupted",
            StopReason::FrameLimit => "frame limit reached",
            StopReason::TimeLimit => "time limit reached",
            StopReason::Persisted => "composite saved",
            StopReason::WriteFailure => "write failure",
            StopReason::UnitPanicked => "unit panicked",
        };
        f.write_str(text)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Phase {
    Running,
    Stopping,
}

const RUNNING: u8 = 0;

/// Shared run/stop flag handed to every pipeline unit.
///
/// Starts running and moves to stopping exactly once; the first caller of
/// [`PipelineState::request_stop`] records the reason. There is no way back
/// to running, a pipeline is single use.
#[derive(Clone, Debug, Default)]
pub struct PipelineState {
    inner: Arc<AtomicU8>,
}

impl PipelineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves to stopping. Returns `true` only for the call that performed the
    /// transition; later calls are no-ops.
    pub fn request_stop(&self, reason: StopReason) -> bool {
        self.inner
            .compare_exchange(RUNNING, reason as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn phase(&self) -> Phase {
        if self.inner.load(Ordering::Acquire) == RUNNING {
            Phase::Running
        } else {
            Phase::Stopping
        }
    }

    pub fn is_stopping(&self) -> bool {
        self.phase() == Phase::Stopping
    }

    pub fn reason(&self) -> Option<StopReason> {
        StopReason::from_u8(self.inner.load(Ordering::Acquire))
    }
}
