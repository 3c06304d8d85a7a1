// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    channel::Producer,
    driver::{CameraParams, Device, Driver, LoadMode, Status},
    error::PipelineError,
    frame::{Frame, Mirror},
    state::{PipelineState, StopReason},
};
use std::{
    ops::{Deref, DerefMut},
    thread,
    time::{Duration, Instant},
};
use tracing::{debug, error, info, instrument, trace, warn};

#[derive(Clone, Debug)]
pub struct AcquirerConfig {
    /// Index into the enumerated device list
    pub device_index: usize,
    pub load_mode: LoadMode,
    pub params: CameraParams,
    /// Bounded wait for each frame read, upper bound on shutdown latency
    pub read_timeout: Duration,
    pub mirror: Mirror,
    /// Pause after every read attempt
    pub grab_interval: Duration,
    /// Stop after this many frames were captured
    pub max_frames: Option<u64>,
    /// Stop once streaming has run this long
    pub max_duration: Option<Duration>,
}

impl Default for AcquirerConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            load_mode: LoadMode::LastSaved,
            params: CameraParams::default(),
            read_timeout: Duration::from_millis(200),
            mirror: Mirror::Vertical,
            grab_interval: Duration::ZERO,
            max_frames: None,
            max_duration: None,
        }
    }
}

/// Counters collected while streaming.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AcquisitionStats {
    /// Frames decoded and tagged with a sequence number
    pub captured: u64,
    pub enqueued: u64,
    /// Frames dropped because the frame channel was full
    pub dropped: u64,
    pub decode_errors: u64,
    pub timeouts: u64,
    pub rejected_params: u64,
    /// Rolling average at exit
    pub fps: i64,
}

/// Rolling frame rate over the last `history.len()` frames.
struct FpsCounter {
    prev: Instant,
    history: Vec<i64>,
    index: usize,
}

impl FpsCounter {
    fn new(window: usize) -> Self {
        Self {
            prev: Instant::now(),
            history: vec![0; window.max(1)],
            index: 0,
        }
    }

    fn update(&mut self) -> i64 {
        let now = Instant::now();
        let elapsed = now.duration_since(self.prev).as_nanos().max(1);
        self.prev = now;

        self.history[self.index] = (1e9 as u128 / elapsed) as i64;
        self.index = (self.index + 1) % self.history.len();

        (self.history.iter().sum::<i64>() as f64 / self.history.len() as f64).round() as i64
    }
}

/// A read timeout is transient, every other status ends the capture.
fn read_error(status: Status) -> PipelineError {
    if status.is_timeout() {
        PipelineError::Timeout
    } else {
        PipelineError::DeviceRead(status)
    }
}

/// Owns an open device and closes it on every exit path, unwinding included.
struct DeviceGuard(Box<dyn Device>);

impl Deref for DeviceGuard {
    type Target = dyn Device;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for DeviceGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for DeviceGuard {
    fn drop(&mut self) {
        self.0.close();
        debug!(device = %self.0.descriptor(), "camera released");
    }
}

/// Reads frames from the camera and publishes them on the frame channel.
///
/// The acquirer is the only owner of the device handle and its native frame
/// buffer. A full frame channel never blocks it: the new frame is dropped
/// and capture continues.
pub struct Acquirer {
    driver: Box<dyn Driver>,
    frames: Producer<Frame>,
    state: PipelineState,
    config: AcquirerConfig,
    stats: AcquisitionStats,
}

impl Acquirer {
    pub fn new(
        driver: Box<dyn Driver>,
        frames: Producer<Frame>,
        state: PipelineState,
        config: AcquirerConfig,
    ) -> Self {
        Self {
            driver,
            frames,
            state,
            config,
            stats: AcquisitionStats::default(),
        }
    }

    /// Runs until the pipeline is stopping.
    ///
    /// Fatal device errors move the pipeline to stopping before they are
    /// returned. The device is released before this returns.
    #[instrument(skip_all, name = "acquirer")]
    pub fn run(mut self) -> Result<AcquisitionStats, PipelineError> {
        let result = self.open().and_then(|device| self.stream(device));
        if let Err(e) = &result {
            error!("{e}");
            self.state.request_stop(StopReason::DeviceError);
        }
        result.map(|()| self.stats)
    }

    fn open(&mut self) -> Result<DeviceGuard, PipelineError> {
        let devices = self.driver.enumerate();
        if devices.is_empty() {
            return Err(PipelineError::DeviceUnavailable(
                "camera not found".to_string(),
            ));
        }
        for (i, desc) in devices.iter().enumerate() {
            info!("{i}: {desc}");
        }
        let desc = devices.get(self.config.device_index).ok_or_else(|| {
            PipelineError::DeviceUnavailable(format!(
                "device index {} out of range, {} found",
                self.config.device_index,
                devices.len()
            ))
        })?;

        let mut device = self
            .driver
            .open(desc, self.config.load_mode)
            .map(DeviceGuard)
            .map_err(PipelineError::DeviceInit)?;
        info!(device = %desc, "camera opened");

        for param in self.config.params.parameters() {
            let status = device.configure(&param);
            if !status.is_ok() {
                let err = PipelineError::ParameterRejected {
                    param: param.to_string(),
                    status,
                };
                warn!("{err}");
                self.stats.rejected_params += 1;
            }
        }

        device.start().ok().map_err(PipelineError::DeviceInit)?;
        Ok(device)
    }

    fn stream(&mut self, mut device: DeviceGuard) -> Result<(), PipelineError> {
        let cap = device.capability();
        let mut buffer = vec![0u8; cap.buffer_size()];
        let mut fps = FpsCounter::new(30);
        let started = Instant::now();
        let mut sequence = 0u64;

        info!(
            max_width = cap.max_width,
            max_height = cap.max_height,
            "streaming"
        );

        while !self.state.is_stopping() {
            if let Some(reason) = self.limit_reached(started) {
                if self.state.request_stop(reason) {
                    info!("{reason}, stopping capture");
                }
                break;
            }

            let now = Instant::now();
            let head = match device
                .read_frame(&mut buffer, self.config.read_timeout)
                .map_err(read_error)
            {
                Ok(head) => head,
                Err(e) if !e.is_fatal() => {
                    self.stats.timeouts += 1;
                    trace!("{e}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let capture_time = now.elapsed();

            match Frame::from_raw(sequence + 1, &head, &buffer, self.config.mirror) {
                Ok(frame) => {
                    sequence += 1;
                    self.stats.captured += 1;
                    self.stats.fps = fps.update();
                    debug!(
                        sequence,
                        ?capture_time,
                        fps = self.stats.fps,
                        "camera capture {}x{}",
                        head.width,
                        head.height
                    );
                    self.publish(frame);
                }
                Err(e) => {
                    warn!("{e}");
                    self.stats.decode_errors += 1;
                }
            }

            if !self.config.grab_interval.is_zero() {
                thread::sleep(self.config.grab_interval);
            }
        }

        info!(
            captured = self.stats.captured,
            enqueued = self.stats.enqueued,
            dropped = self.stats.dropped,
            timeouts = self.stats.timeouts,
            "capture finished"
        );
        Ok(())
    }

    fn publish(&mut self, frame: Frame) {
        if self.state.is_stopping() {
            return;
        }
        let sequence = frame.sequence();
        match self.frames.offer(frame) {
            Ok(()) => self.stats.enqueued += 1,
            Err(PipelineError::ChannelFull) => {
                self.stats.dropped += 1;
                debug!(sequence, "frame channel full, frame dropped");
            }
            Err(e) => {
                self.stats.dropped += 1;
                warn!(sequence, "{e}");
            }
        }
    }

    fn limit_reached(&self, started: Instant) -> Option<StopReason> {
        if let Some(max) = self.config.max_frames {
            if self.stats.captured >= max {
                return Some(StopReason::FrameLimit);
            }
        }
        if let Some(max) = self.config.max_duration {
            if started.elapsed() >= max {
                return Some(StopReason::TimeLimit);
            }
        }
        None
    }
}
