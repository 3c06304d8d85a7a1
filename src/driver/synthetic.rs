// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use super::{Capability, Device, DeviceDescriptor, Driver, FrameHead, LoadMode, Parameter, Status};
use crate::frame::PixelFormat;
use std::{
    collections::VecDeque,
    mem::discriminant,
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};
use tracing::{debug, info};

/// One scripted response of a synthetic device.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// A frame at the configured resolution
    Frame,
    /// A frame at a specific resolution (must fit the configured maximum)
    FrameSized { width: u32, height: u32 },
    /// A frame whose head claims one byte more than was written
    Corrupt,
    /// Nothing arrives before the read timeout elapses
    Timeout,
    /// The read fails with the given status
    Fail(Status),
}

/// Behaviour of a [`SyntheticDriver`].
#[derive(Clone, Debug)]
pub struct SyntheticConfig {
    /// Number of devices reported by `enumerate`
    pub devices: usize,
    pub width: u32,
    pub height: u32,
    /// Largest frame the device can produce, sizes the native buffer
    pub max_width: u32,
    pub max_height: u32,
    /// Delay before each frame is delivered
    pub frame_interval: Duration,
    /// Status returned by `open`
    pub open_status: Status,
    /// Parameters the device refuses, matched by kind
    pub rejected: Vec<Parameter>,
    /// Responses served in order before falling back to `tail`
    pub script: Vec<Step>,
    /// Response repeated once the script is exhausted
    pub tail: Step,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            devices: 1,
            width: 640,
            height: 480,
            max_width: 640,
            max_height: 480,
            frame_interval: Duration::from_millis(33),
            open_status: Status::SUCCESS,
            rejected: Vec::new(),
            script: Vec::new(),
            tail: Step::Frame,
        }
    }
}

#[derive(Default)]
struct ProbeInner {
    opened: AtomicUsize,
    closed: AtomicUsize,
    started: AtomicBool,
    frames: AtomicU64,
    configured: Mutex<Vec<Parameter>>,
}

/// Observes what the acquirer did with a synthetic device.
#[derive(Clone, Default)]
pub struct SyntheticProbe {
    inner: Arc<ProbeInner>,
}

impl SyntheticProbe {
    pub fn open_count(&self) -> usize {
        self.inner.opened.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn started(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
    }

    /// Frames delivered to the caller, corrupt ones included.
    pub fn frames_served(&self) -> u64 {
        self.inner.frames.load(Ordering::SeqCst)
    }

    /// Parameters the device accepted, in order.
    pub fn configured(&self) -> Vec<Parameter> {
        self.inner
            .configured
            .lock()
            .map(|params| params.clone())
            .unwrap_or_default()
    }
}

/// In-process driver producing deterministic BGR gradient frames.
///
/// Used by the grabber binary when no vendor SDK is linked, and by tests to
/// script timeouts, malformed frames and device failures.
pub struct SyntheticDriver {
    config: SyntheticConfig,
    probe: SyntheticProbe,
}

impl SyntheticDriver {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            probe: SyntheticProbe::default(),
        }
    }

    pub fn probe(&self) -> SyntheticProbe {
        self.probe.clone()
    }
}

impl Driver for SyntheticDriver {
    fn enumerate(&self) -> Vec<DeviceDescriptor> {
        (0..self.config.devices)
            .map(|i| DeviceDescriptor {
                name: format!("Synthetic Camera {i}"),
                port: "SIM".to_string(),
                serial: format!("SIM{i:06}"),
            })
            .collect()
    }

    fn open(
        &self,
        descriptor: &DeviceDescriptor,
        mode: LoadMode,
    ) -> Result<Box<dyn Device>, Status> {
        self.config.open_status.ok()?;
        if !self.enumerate().contains(descriptor) {
            return Err(Status::NO_DEVICE_FOUND);
        }
        self.probe.inner.opened.fetch_add(1, Ordering::SeqCst);
        info!(device = %descriptor, ?mode, "synthetic camera opened");
        Ok(Box::new(SyntheticDevice {
            descriptor: descriptor.clone(),
            config: self.config.clone(),
            script: self.config.script.iter().copied().collect(),
            probe: self.probe.clone(),
            counter: 0,
            started: false,
            closed: false,
        }))
    }
}

struct SyntheticDevice {
    descriptor: DeviceDescriptor,
    config: SyntheticConfig,
    script: VecDeque<Step>,
    probe: SyntheticProbe,
    counter: u64,
    started: bool,
    closed: bool,
}

impl SyntheticDevice {
    fn fill(&mut self, buffer: &mut [u8], width: u32, height: u32) -> Result<usize, Status> {
        let bytes = PixelFormat::Bgr8.image_size(width, height);
        let out = buffer.get_mut(..bytes).ok_or(Status::SIZE_MISMATCH)?;
        let n = self.counter;
        for (i, px) in out.chunks_exact_mut(3).enumerate() {
            let x = (i % width as usize) as u64;
            let y = (i / width as usize) as u64;
            px[0] = ((x + n) % 256) as u8;
            px[1] = ((y + n) % 256) as u8;
            px[2] = ((n * 7) % 256) as u8;
        }
        Ok(bytes)
    }

    fn head(&self, width: u32, height: u32, bytes: usize) -> FrameHead {
        let interval_ticks = self.config.frame_interval.as_micros() as u64 / 100;
        FrameHead {
            width,
            height,
            bytes,
            format: PixelFormat::Bgr8,
            timestamp: (self.counter * interval_ticks) as u32,
            exposure_us: 50,
            analog_gain: 25.0,
        }
    }
}

impl Device for SyntheticDevice {
    fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    fn capability(&self) -> Capability {
        Capability {
            max_width: self.config.max_width,
            max_height: self.config.max_height,
        }
    }

    fn configure(&mut self, param: &Parameter) -> Status {
        if self.closed {
            return Status::DEVICE_IS_CLOSED;
        }
        if self
            .config
            .rejected
            .iter()
            .any(|r| discriminant(r) == discriminant(param))
        {
            return Status::NOT_SUPPORTED;
        }
        if let Ok(mut configured) = self.probe.inner.configured.lock() {
            configured.push(*param);
        }
        Status::SUCCESS
    }

    fn start(&mut self) -> Status {
        if self.closed {
            return Status::DEVICE_IS_CLOSED;
        }
        self.started = true;
        self.probe.inner.started.store(true, Ordering::SeqCst);
        Status::SUCCESS
    }

    fn read_frame(&mut self, buffer: &mut [u8], timeout: Duration) -> Result<FrameHead, Status> {
        if self.closed {
            return Err(Status::DEVICE_IS_CLOSED);
        }
        if !self.started {
            return Err(Status::NOT_INITIALIZED);
        }

        let step = self.script.pop_front().unwrap_or(self.config.tail);
        let (width, height) = match step {
            Step::Timeout => {
                thread::sleep(timeout);
                return Err(Status::TIMEOUT);
            }
            Step::Fail(status) => return Err(status),
            Step::Frame | Step::Corrupt => (self.config.width, self.config.height),
            Step::FrameSized { width, height } => (width, height),
        };

        thread::sleep(self.config.frame_interval.min(timeout));
        self.counter += 1;
        let bytes = self.fill(buffer, width, height)?;
        self.probe.inner.frames.fetch_add(1, Ordering::SeqCst);

        let mut head = self.head(width, height, bytes);
        if step == Step::Corrupt {
            head.bytes += 1;
        }
        Ok(head)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.probe.inner.closed.fetch_add(1, Ordering::SeqCst);
        debug!(device = %self.descriptor, "synthetic camera closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_reads() {
        let driver = SyntheticDriver::new(SyntheticConfig {
            width: 4,
            height: 2,
            max_width: 4,
            max_height: 2,
            frame_interval: Duration::ZERO,
            script: vec![Step::Timeout, Step::Frame],
            tail: Step::Fail(Status::IO_ERROR),
            ..Default::default()
        });
        let probe = driver.probe();
        let desc = driver.enumerate().remove(0);
        let mut dev = driver.open(&desc, LoadMode::LastSaved).unwrap();
        let mut buf = vec![0; dev.capability().buffer_size()];
        let timeout = Duration::from_millis(1);

        assert!(dev.read_frame(&mut buf, timeout).is_err());
        assert!(dev.start().is_ok());
        assert_eq!(dev.read_frame(&mut buf, timeout), Err(Status::TIMEOUT));
        let head = dev.read_frame(&mut buf, timeout).unwrap();
        assert_eq!((head.width, head.height, head.bytes), (4, 2, 24));
        assert_eq!(dev.read_frame(&mut buf, timeout), Err(Status::IO_ERROR));

        dev.close();
        dev.close();
        assert_eq!(probe.close_count(), 1);
        assert_eq!(probe.frames_served(), 1);
    }

    #[test]
    fn rejected_parameters_are_not_recorded() {
        let driver = SyntheticDriver::new(SyntheticConfig {
            rejected: vec![Parameter::Contrast(0)],
            ..Default::default()
        });
        let probe = driver.probe();
        let desc = driver.enumerate().remove(0);
        let mut dev = driver.open(&desc, LoadMode::Defaults).unwrap();

        assert_eq!(dev.configure(&Parameter::Contrast(150)), Status::NOT_SUPPORTED);
        assert!(dev.configure(&Parameter::Sharpness(50)).is_ok());
        assert_eq!(probe.configured(), vec![Parameter::Sharpness(50)]);
    }

    #[test]
    fn corrupt_head_on_empty_frame() {
        let driver = SyntheticDriver::new(SyntheticConfig {
            width: 0,
            height: 0,
            frame_interval: Duration::ZERO,
            script: vec![Step::Corrupt],
            ..Default::default()
        });
        let probe = driver.probe();
        let desc = driver.enumerate().remove(0);
        let mut dev = driver.open(&desc, LoadMode::LastSaved).unwrap();
        let mut buf = vec![0; dev.capability().buffer_size()];

        assert!(dev.start().is_ok());
        assert!(probe.started());
        let head = dev.read_frame(&mut buf, Duration::from_millis(1)).unwrap();
        assert_eq!(head.bytes, 1);
    }

    #[test]
    fn open_failure_is_reported() {
        let driver = SyntheticDriver::new(SyntheticConfig {
            open_status: Status::DEVICE_IS_OPENED,
            ..Default::default()
        });
        let desc = driver.enumerate().remove(0);
        assert_eq!(
            driver.open(&desc, LoadMode::LastSaved).err(),
            Some(Status::DEVICE_IS_OPENED)
        );
    }
}
