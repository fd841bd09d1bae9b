// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use args::Args;
use clap::Parser;
use edgefirst_depth::{
    image::{Image, MappedImage},
    AxMemory, AxRuntime, DepthPipeline, PixelFormat,
};
use std::{error::Error, fs, path::Path, sync::Arc, time::Instant};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Layer};

mod args;

/// NV12 black in video range.
const BLACK_LUMA: u8 = 16;
const BLACK_CHROMA: u8 = 128;

fn init_tracing(args: &Args) -> Result<(), Box<dyn Error>> {
    let level = if args.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    };
    let filter = EnvFilter::builder()
        .with_default_directive(level.into())
        .from_env_lossy();

    let stdout = tracing_subscriber::fmt::layer().with_target(false);
    let journald = match tracing_journald::layer() {
        Ok(layer) => Some(layer),
        Err(e) => {
            eprintln!("journald unavailable: {e}");
            None
        }
    };
    let tracy = if args.tracy {
        tracy_client::Client::start();
        Some(tracing_tracy::TracyLayer::default().with_filter(LevelFilter::TRACE))
    } else {
        None
    };

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(stdout)
        .with(journald)
        .with(tracy);
    tracing::subscriber::set_global_default(subscriber)?;
    tracing_log::LogTracer::init()?;
    Ok(())
}

/// Fills `mapped` from `path`, or with `fill` when no file is given. Short
/// files only fill the start of the frame.
fn load_frame(
    mapped: &mut MappedImage,
    path: Option<&Path>,
    fill: impl FnOnce(&mut [u8]),
) -> Result<(), Box<dyn Error>> {
    let buf = mapped.as_slice_mut();
    match path {
        Some(path) => {
            let data = fs::read(path)?;
            let len = data.len().min(buf.len());
            if len < buf.len() {
                warn!(
                    "{} holds {} bytes, frame needs {}",
                    path.display(),
                    data.len(),
                    buf.len()
                );
            }
            buf[..len].copy_from_slice(&data[..len]);
        }
        None => fill(buf),
    }
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(&args)?;

    let runtime = Arc::new(AxRuntime::new(&args.engine_lib)?);
    let memory = Arc::new(AxMemory::new(&args.sys_lib)?);
    if !args.no_init {
        memory.init()?;
        runtime.init()?;
    }

    let mut pipeline = DepthPipeline::new(runtime, memory, (&args).into());
    pipeline.load(&args.model)?;

    if args.info {
        let io_info = pipeline.io_info().ok_or("model not loaded")?;
        println!("{}", serde_json::to_string_pretty(&io_info.to_json())?);
        return Ok(());
    }

    let params = pipeline.params().ok_or("model not loaded")?;
    let mut src = Image::new(params.width, params.height, params.format)?;
    let mut dst = Image::new(args.output_size[0], args.output_size[1], PixelFormat::Nv12)?;
    info!("source {} output {}", src, dst);

    let mut src_map = src.mmap()?;
    if args.input.is_none() {
        warn!("no input frame given, running on a blank frame");
    }
    load_frame(&mut src_map, args.input.as_deref(), |buf| buf.fill(0))?;

    let mut dst_map = dst.mmap()?;
    let luma_len = args.output_size[0] as usize * args.output_size[1] as usize;
    load_frame(&mut dst_map, args.background.as_deref(), |buf| {
        let (luma, chroma) = buf.split_at_mut(luma_len);
        luma.fill(BLACK_LUMA);
        chroma.fill(BLACK_CHROMA);
    })?;

    let start = Instant::now();
    for _ in 0..args.frames {
        let frame = src_map.frame()?;
        let mut out = dst_map.frame_mut()?;
        pipeline.inference(&frame, &mut out)?;
        info!(
            "frame {} latency {:?}",
            pipeline.frames(),
            pipeline.last_latency()
        );
    }
    if args.frames > 0 {
        info!(
            "{} frames, average {:?}",
            args.frames,
            start.elapsed() / args.frames
        );
    }

    if let Some(output) = &args.output {
        fs::write(output, dst_map.as_slice())?;
        info!("wrote {}", output.display());
    }

    drop(dst_map);
    drop(src_map);
    pipeline.release();
    Ok(())
}
