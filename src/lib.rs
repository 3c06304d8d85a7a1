// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # Stitch Grabber Library
//!
//! Captures frames from a camera and stacks them top to bottom into a single
//! composite image, written once to disk when capture stops.
//!
//! ## Architecture
//!
//! Three units run concurrently and share nothing but two bounded channels
//! and a [`state::PipelineState`]:
//!
//! - **Acquirer**: owns the camera, reads frames with a bounded timeout and
//!   offers them on the frame channel. A full channel drops the new frame.
//! - **Assembler**: appends frames in sequence order to a growing
//!   [`composite::Composite`] and publishes it once the pipeline stops.
//! - **Persister**: waits for the composite, applies optional
//!   [`postprocess::PostProcess`] adjustments and encodes PNG or JPEG.
//!
//! ## Example
//!
//! ```no_run
//! use stitch_grabber::{
//!     driver::{SyntheticConfig, SyntheticDriver},
//!     pipeline::{Pipeline, PipelineConfig},
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut config = PipelineConfig::default();
//! config.acquirer.max_frames = Some(100);
//!
//! let driver = SyntheticDriver::new(SyntheticConfig::default());
//! let report = Pipeline::new(config).run(Box::new(driver))?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod acquirer;
pub mod args;
pub mod assembler;
pub mod channel;
pub mod composite;
pub mod driver;
pub mod error;
pub mod frame;
pub mod persister;
pub mod pipeline;
pub mod postprocess;
pub mod state;
