// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use std::{error::Error, process};
use stitch_grabber::{
    args::Args,
    driver::SyntheticDriver,
    pipeline::{watch_stdin, Pipeline, PipelineConfig},
    state::StopReason,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

fn init_tracing(args: &Args) -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if args.verbose { "debug" } else { "info" }));

    let journald = if args.journald {
        match tracing_journald::layer() {
            Ok(layer) => Some(layer),
            Err(e) => {
                eprintln!("journald logging unavailable: {e}");
                None
            }
        }
    } else {
        None
    };

    let tracy = args.tracy.then(|| {
        tracy_client::Client::start();
        tracing_tracy::TracyLayer::default()
    });

    let subscriber = Registry::default()
        .with(filter)
        .with(fmt::layer().with_thread_names(true))
        .with(journald)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(&args)?;

    let config = PipelineConfig::try_from(&args)?;
    let driver = SyntheticDriver::new(args.synthetic_config()?);

    let pipeline = Pipeline::new(config);
    let state = pipeline.state();

    let ctrlc_state = state.clone();
    ctrlc::set_handler(move || {
        if ctrlc_state.request_stop(StopReason::Interrupted) {
            info!("interrupted, stopping capture");
        }
    })?;

    if !args.no_keyboard {
        watch_stdin(state)?;
        info!("press Enter to stop capturing");
    }

    let report = pipeline.run(Box::new(driver))?;
    if let Some(stats) = &report.acquisition {
        info!(
            captured = stats.captured,
            dropped = stats.dropped,
            decode_errors = stats.decode_errors,
            timeouts = stats.timeouts,
            fps = stats.fps,
            "acquisition summary"
        );
    }
    if !report.is_success() {
        error!(
            reason = ?report.stop_reason,
            errors = report.errors.len(),
            "no image written"
        );
        process::exit(1);
    }
    Ok(())
}
