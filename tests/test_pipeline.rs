// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use serial_test::serial;
use std::{
    error::Error,
    path::Path,
    thread,
    time::{Duration, Instant},
};
use stitch_grabber::{
    acquirer::{Acquirer, AcquirerConfig},
    assembler::{Assembler, AssemblerConfig},
    channel::{self, Take},
    composite::Composite,
    driver::{Parameter, Status, Step, SyntheticConfig, SyntheticDriver},
    error::PipelineError,
    frame::{Frame, Mirror},
    persister::{Persister, PersisterConfig},
    pipeline::{Pipeline, PipelineConfig},
    state::{PipelineState, StopReason},
};
use tempfile::TempDir;

fn camera(width: u32, height: u32) -> SyntheticConfig {
    SyntheticConfig {
        width,
        height,
        max_width: width,
        max_height: height,
        frame_interval: Duration::ZERO,
        ..Default::default()
    }
}

fn pipeline_config(output: &Path, max_frames: Option<u64>) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.acquirer.mirror = Mirror::None;
    config.acquirer.read_timeout = Duration::from_millis(10);
    config.acquirer.max_frames = max_frames;
    config.persister.path = output.to_path_buf();
    config.persister.poll_interval = Duration::from_millis(20);
    config
}

fn gradient_frame(sequence: u64, width: u32, height: u32) -> Frame {
    let data = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
    Frame::new(sequence, width, height, data).unwrap()
}

#[test]
#[serial]
fn test_five_frames_stack_vertically() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("result.png");
    let driver = SyntheticDriver::new(camera(100, 50));
    let probe = driver.probe();

    let report = Pipeline::new(pipeline_config(&output, Some(5))).run(Box::new(driver))?;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.output.as_deref(), Some(output.as_path()));
    assert_eq!(report.stop_reason, Some(StopReason::FrameLimit));
    assert!(report.errors.is_empty());

    let stats = report.acquisition.unwrap();
    assert_eq!(stats.captured, 5);
    assert_eq!(stats.enqueued, 5);
    assert_eq!(stats.dropped, 0);

    let assembly = report.assembly.unwrap();
    assert_eq!(assembly.appended, 5);
    assert_eq!((assembly.width, assembly.height), (100, 250));
    assert!(assembly.published);

    let img = image::open(&output)?.into_rgb8();
    assert_eq!((img.width(), img.height()), (100, 250));

    assert!(probe.started());
    assert_eq!(probe.open_count(), 1);
    assert_eq!(probe.close_count(), 1);
    Ok(())
}

#[test]
#[serial]
fn test_jpeg_output() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("result.jpg");
    let driver = SyntheticDriver::new(camera(64, 8));

    let report = Pipeline::new(pipeline_config(&output, Some(4))).run(Box::new(driver))?;

    assert!(report.is_success(), "{report:?}");
    let img = image::open(&output)?;
    assert_eq!((img.width(), img.height()), (64, 32));
    Ok(())
}

#[test]
#[serial]
fn test_external_stop() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("result.png");
    let driver = SyntheticDriver::new(SyntheticConfig {
        frame_interval: Duration::from_millis(5),
        ..camera(32, 4)
    });

    let pipeline = Pipeline::new(pipeline_config(&output, None));
    let state = pipeline.state();
    let handle = thread::spawn(move || pipeline.run(Box::new(driver)));

    thread::sleep(Duration::from_millis(100));
    assert!(state.request_stop(StopReason::UserRequest));
    assert!(!state.request_stop(StopReason::Interrupted));

    let report = handle.join().unwrap()?;
    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.stop_reason, Some(StopReason::UserRequest));

    let frames = report.assembly.unwrap().appended as u32;
    assert!(frames > 0);
    let img = image::open(&output)?.into_rgb8();
    assert_eq!((img.width(), img.height()), (32, 4 * frames));
    Ok(())
}

#[test]
#[serial]
fn test_fatal_read_after_timeouts() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("result.png");
    // 300 reads of 10 ms each: three seconds without a frame
    let driver = SyntheticDriver::new(SyntheticConfig {
        script: vec![Step::Timeout; 300],
        tail: Step::Fail(Status::IO_ERROR),
        ..camera(16, 4)
    });
    let probe = driver.probe();

    let pipeline = Pipeline::new(pipeline_config(&output, None));
    let state = pipeline.state();
    let now = Instant::now();
    let report = pipeline.run(Box::new(driver))?;
    assert!(now.elapsed() >= Duration::from_secs(3));

    assert!(!report.is_success());
    assert_eq!(report.stop_reason, Some(StopReason::DeviceError));
    assert!(matches!(
        report.errors.as_slice(),
        [PipelineError::DeviceRead(Status::IO_ERROR)]
    ));
    assert!(!report.assembly.unwrap().published);
    assert!(!output.exists());
    assert_eq!(probe.frames_served(), 0);
    assert_eq!(probe.close_count(), 1);

    // the device error was the one and only transition
    assert_eq!(state.reason(), Some(StopReason::DeviceError));
    assert!(!state.request_stop(StopReason::UserRequest));
    assert_eq!(state.reason(), Some(StopReason::DeviceError));
    Ok(())
}

#[test]
#[serial]
fn test_no_device() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("result.png");
    let driver = SyntheticDriver::new(SyntheticConfig {
        devices: 0,
        ..camera(16, 4)
    });
    let probe = driver.probe();

    let report = Pipeline::new(pipeline_config(&output, Some(3))).run(Box::new(driver))?;

    assert!(!report.is_success());
    assert_eq!(report.stop_reason, Some(StopReason::DeviceError));
    assert!(matches!(
        report.errors.as_slice(),
        [PipelineError::DeviceUnavailable(_)]
    ));
    assert_eq!(probe.open_count(), 0);
    Ok(())
}

#[test]
#[serial]
fn test_device_index_out_of_range() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let mut config = pipeline_config(&dir.path().join("result.png"), Some(3));
    config.acquirer.device_index = 2;
    let driver = SyntheticDriver::new(SyntheticConfig {
        devices: 2,
        ..camera(16, 4)
    });

    let report = Pipeline::new(config).run(Box::new(driver))?;
    assert!(matches!(
        report.errors.as_slice(),
        [PipelineError::DeviceUnavailable(_)]
    ));
    Ok(())
}

#[test]
#[serial]
fn test_open_failure() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let driver = SyntheticDriver::new(SyntheticConfig {
        open_status: Status::DEVICE_IS_OPENED,
        ..camera(16, 4)
    });

    let report =
        Pipeline::new(pipeline_config(&dir.path().join("result.png"), Some(3))).run(Box::new(driver))?;
    assert!(matches!(
        report.errors.as_slice(),
        [PipelineError::DeviceInit(Status::DEVICE_IS_OPENED)]
    ));
    assert_eq!(report.stop_reason, Some(StopReason::DeviceError));
    Ok(())
}

#[test]
#[serial]
fn test_rejected_parameter_is_not_fatal() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("result.png");
    let driver = SyntheticDriver::new(SyntheticConfig {
        rejected: vec![Parameter::Contrast(0)],
        ..camera(16, 4)
    });
    let probe = driver.probe();

    let report = Pipeline::new(pipeline_config(&output, Some(3))).run(Box::new(driver))?;

    assert!(report.is_success(), "{report:?}");
    assert_eq!(report.acquisition.unwrap().rejected_params, 1);
    let configured = probe.configured();
    assert!(configured.contains(&Parameter::ExposureTime(50.0)));
    assert!(!configured.iter().any(|p| matches!(p, Parameter::Contrast(_))));
    Ok(())
}

#[test]
#[serial]
fn test_corrupt_frame_is_skipped() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("result.png");
    let driver = SyntheticDriver::new(SyntheticConfig {
        script: vec![Step::Frame, Step::Corrupt, Step::Timeout, Step::Frame],
        ..camera(16, 4)
    });

    let report = Pipeline::new(pipeline_config(&output, Some(2))).run(Box::new(driver))?;

    assert!(report.is_success(), "{report:?}");
    let stats = report.acquisition.unwrap();
    assert_eq!(stats.captured, 2);
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.timeouts, 1);
    let img = image::open(&output)?.into_rgb8();
    assert_eq!((img.width(), img.height()), (16, 8));
    Ok(())
}

#[test]
#[serial]
fn test_write_failure() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("missing").join("result.png");
    let driver = SyntheticDriver::new(camera(16, 4));

    let report = Pipeline::new(pipeline_config(&output, Some(2))).run(Box::new(driver))?;

    assert!(!report.is_success());
    assert!(matches!(
        report.errors.as_slice(),
        [PipelineError::WriteFailure { .. }]
    ));
    assert!(report.assembly.unwrap().published);
    Ok(())
}

#[test]
#[serial]
fn test_bad_output_extension_fails_before_capture() {
    let driver = SyntheticDriver::new(camera(16, 4));
    let probe = driver.probe();

    let result = Pipeline::new(pipeline_config(Path::new("result.bmp"), Some(2))).run(Box::new(driver));

    assert!(matches!(result, Err(PipelineError::Config(_))));
    assert_eq!(probe.open_count(), 0);
}

#[test]
#[serial]
fn test_stretch_doubles_height() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("result.png");
    let mut config = pipeline_config(&output, Some(3));
    config.assembler.stretch = 2.0;
    let driver = SyntheticDriver::new(camera(20, 5));

    let report = Pipeline::new(config).run(Box::new(driver))?;

    assert!(report.is_success(), "{report:?}");
    let img = image::open(&output)?.into_rgb8();
    assert_eq!((img.width(), img.height()), (20, 30));
    Ok(())
}

#[test]
#[serial]
fn test_full_channel_does_not_block_acquirer() {
    let (tx, rx) = channel::channel(2);
    let state = PipelineState::new();
    let driver = SyntheticDriver::new(camera(8, 2));
    let config = AcquirerConfig {
        mirror: Mirror::None,
        max_frames: Some(10),
        read_timeout: Duration::from_millis(10),
        ..Default::default()
    };

    let now = Instant::now();
    let stats = Acquirer::new(Box::new(driver), tx, state.clone(), config)
        .run()
        .unwrap();
    assert!(now.elapsed() < Duration::from_secs(2));

    assert_eq!(stats.captured, 10);
    assert_eq!(stats.enqueued, 2);
    assert_eq!(stats.dropped, 8);
    assert_eq!(state.reason(), Some(StopReason::FrameLimit));

    // the oldest frames are kept
    let kept: Vec<u64> = rx.drain().iter().map(Frame::sequence).collect();
    assert_eq!(kept, vec![1, 2]);
}

#[test]
#[serial]
fn test_assembler_finalizes_promptly_after_stop() {
    let (frame_tx, frame_rx) = channel::channel(30);
    let (composite_tx, composite_rx) = channel::channel(1);
    let state = PipelineState::new();
    let config = AssemblerConfig {
        poll_interval: Duration::from_millis(5),
        ..Default::default()
    };
    let assembler = Assembler::new(frame_rx, composite_tx, state.clone(), config);
    let handle = thread::spawn(move || assembler.run());

    frame_tx.offer(gradient_frame(1, 10, 3)).unwrap();
    frame_tx.offer(gradient_frame(2, 10, 3)).unwrap();
    thread::sleep(Duration::from_millis(50));

    let now = Instant::now();
    state.request_stop(StopReason::UserRequest);
    let report = handle.join().unwrap();
    assert!(now.elapsed() < Duration::from_millis(200));

    assert_eq!(report.appended, 2);
    assert!(report.published);
    match composite_rx.take_timeout(Duration::from_millis(100)) {
        Take::Item(composite) => {
            assert_eq!((composite.width(), composite.height()), (10, 6));
            assert_eq!(composite.sequence_range(), Some((1, 2)));
        }
        _ => panic!("composite not published"),
    }
}

#[test]
#[serial]
fn test_assembler_keeps_frame_published_right_before_stop() {
    for run in 0..1000u32 {
        let (frame_tx, frame_rx) = channel::channel(30);
        let (composite_tx, composite_rx) = channel::channel(1);
        let state = PipelineState::new();
        let config = AssemblerConfig {
            poll_interval: Duration::ZERO,
            ..Default::default()
        };
        let assembler = Assembler::new(frame_rx, composite_tx, state.clone(), config);
        let handle = thread::spawn(move || assembler.run());

        frame_tx.offer(gradient_frame(1, 4, 1)).unwrap();
        for _ in 0..run % 64 {
            std::hint::spin_loop();
        }
        frame_tx.offer(gradient_frame(2, 4, 1)).unwrap();
        state.request_stop(StopReason::FrameLimit);

        let report = handle.join().unwrap();
        assert_eq!(report.appended, 2, "run {run}");
        assert!(matches!(composite_rx.try_take(), Some(c) if c.height() == 2));
    }
}

#[test]
#[serial]
fn test_assembler_skips_out_of_order_frames() {
    let (frame_tx, frame_rx) = channel::channel(30);
    let (composite_tx, composite_rx) = channel::channel(1);
    let state = PipelineState::new();
    let assembler = Assembler::new(frame_rx, composite_tx, state.clone(), AssemblerConfig::default());

    frame_tx.offer(gradient_frame(1, 4, 2)).unwrap();
    frame_tx.offer(gradient_frame(4, 4, 2)).unwrap();
    frame_tx.offer(gradient_frame(3, 4, 2)).unwrap();
    state.request_stop(StopReason::FrameLimit);

    let report = assembler.run();
    assert_eq!(report.appended, 2);
    assert_eq!(report.out_of_order, 1);
    assert_eq!(report.gaps, 2);
    assert!(matches!(composite_rx.try_take(), Some(c) if c.height() == 4));
}

#[test]
#[serial]
fn test_assembler_without_frames_publishes_nothing() {
    let (frame_tx, frame_rx) = channel::channel::<Frame>(30);
    let (composite_tx, composite_rx) = channel::channel(1);
    let state = PipelineState::new();
    let assembler = Assembler::new(frame_rx, composite_tx, state.clone(), AssemblerConfig::default());

    state.request_stop(StopReason::DeviceError);
    let report = assembler.run();
    drop(frame_tx);

    assert!(!report.published);
    assert!(composite_rx.try_take().is_none());
    assert!(composite_rx.is_closed());
}

#[test]
#[serial]
fn test_png_is_lossless() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let output = dir.path().join("result.png");
    let mut composite = Composite::new();
    composite.append(gradient_frame(1, 37, 5), 1.0)?;
    composite.append(gradient_frame(2, 37, 7), 1.0)?;
    let expected = composite.to_image()?;

    let (tx, rx) = channel::channel(1);
    let state = PipelineState::new();
    let persister = Persister::new(
        rx,
        state.clone(),
        PersisterConfig {
            path: output.clone(),
            ..Default::default()
        },
    );
    tx.offer(composite)?;

    assert_eq!(persister.run()?, Some(output.clone()));
    assert_eq!(state.reason(), Some(StopReason::Persisted));

    let written = image::open(&output)?.into_rgb8();
    assert_eq!(written, expected);
    Ok(())
}

#[test]
#[serial]
fn test_persister_exits_when_assembler_is_gone() -> Result<(), Box<dyn Error>> {
    let dir = TempDir::new()?;
    let (tx, rx) = channel::channel::<Composite>(1);
    let state = PipelineState::new();
    let persister = Persister::new(
        rx,
        state.clone(),
        PersisterConfig {
            path: dir.path().join("result.png"),
            poll_interval: Duration::from_millis(10),
            ..Default::default()
        },
    );

    drop(tx);
    assert_eq!(persister.run()?, None);
    assert_eq!(state.reason(), None);
    Ok(())
}
