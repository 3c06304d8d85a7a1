// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    channel::{Consumer, Producer},
    composite::Composite,
    error::PipelineError,
    frame::Frame,
    state::PipelineState,
};
use std::{thread, time::Duration};
use tracing::{debug, info, instrument, warn};

#[derive(Clone, Debug)]
pub struct AssemblerConfig {
    /// Sleep between polls when the frame channel is empty
    pub poll_interval: Duration,
    /// Vertical stretch applied to every frame before it is appended
    pub stretch: f32,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(5),
            stretch: 1.0,
        }
    }
}

/// What the assembler did before it exited.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    pub appended: u64,
    /// Frames that failed to resize or append
    pub skipped: u64,
    /// Frames arriving with a lower sequence number than one already appended
    pub out_of_order: u64,
    /// Missing sequence numbers between consecutive frames
    pub gaps: u64,
    pub width: u32,
    pub height: u32,
    pub published: bool,
}

/// Stacks frames from the frame channel into a single composite.
///
/// The assembler never blocks: it drains whatever is queued, then sleeps for
/// the poll interval. Once the pipeline is stopping and the frame channel is
/// empty it publishes the composite (if any frame was received) and exits.
pub struct Assembler {
    frames: Consumer<Frame>,
    composites: Producer<Composite>,
    state: PipelineState,
    config: AssemblerConfig,
    composite: Composite,
    last_sequence: Option<u64>,
    report: AssemblyReport,
}

impl Assembler {
    pub fn new(
        frames: Consumer<Frame>,
        composites: Producer<Composite>,
        state: PipelineState,
        config: AssemblerConfig,
    ) -> Self {
        Self {
            frames,
            composites,
            state,
            config,
            composite: Composite::new(),
            last_sequence: None,
            report: AssemblyReport::default(),
        }
    }

    #[instrument(skip_all, name = "assembler")]
    pub fn run(mut self) -> AssemblyReport {
        loop {
            // Read before draining: anything queued before the stop request
            // is then guaranteed to show up in this drain.
            let stopping = self.state.is_stopping();
            let batch = self.frames.drain();
            if !batch.is_empty() {
                for frame in batch {
                    self.push(frame);
                }
                continue;
            }

            if stopping {
                break;
            }
            thread::sleep(self.config.poll_interval);
        }

        self.finalize()
    }

    fn push(&mut self, frame: Frame) {
        let sequence = frame.sequence();
        if let Some(last) = self.last_sequence {
            if sequence < last {
                warn!(sequence, last, "out of order frame skipped");
                self.report.out_of_order += 1;
                return;
            }
            let missing = sequence.saturating_sub(last + 1);
            if missing > 0 {
                debug!(sequence, missing, "sequence gap");
                self.report.gaps += missing;
            }
        }

        let (width, height) = (frame.width(), frame.height());
        match self.composite.append(frame, self.config.stretch) {
            Ok(()) => {
                self.last_sequence = Some(sequence);
                self.report.appended += 1;
                debug!(
                    sequence,
                    width,
                    height,
                    composite_height = self.composite.height(),
                    "frame appended"
                );
            }
            Err(e) => {
                warn!(sequence, "frame skipped: {e}");
                self.report.skipped += 1;
            }
        }
    }

    fn finalize(mut self) -> AssemblyReport {
        if self.composite.is_empty() {
            warn!("no data, nothing to publish");
            return self.report;
        }

        let composite = std::mem::take(&mut self.composite);
        self.report.width = composite.width();
        self.report.height = composite.height();
        info!(%composite, "composite finalized");

        match self.composites.offer(composite) {
            Ok(()) => self.report.published = true,
            Err(PipelineError::ChannelFull) => warn!("composite channel full, composite dropped"),
            Err(e) => warn!("composite not published: {e}"),
        }
        self.report
    }
}
