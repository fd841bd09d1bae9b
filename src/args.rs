// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use clap::Parser;
use edgefirst_depth::OverlayConfig;
use std::path::PathBuf;

/// Command-line arguments for the EdgeFirst depth overlay demo.
///
/// Loads a depth estimation model on the NPU, runs it on a raw frame read
/// from disk and writes the composited NV12 output frame. Arguments can be
/// specified via command line or environment variables.
///
/// # Example
///
/// ```bash
/// # Via command line
/// edgefirst-depth --model depth_anything.axmodel --input frame.nv12 --output out.nv12
///
/// # Via environment variables
/// export MODEL=depth_anything.axmodel
/// export OUTPUT_SIZE="1280 720"
/// edgefirst-depth --input frame.nv12 --output out.nv12
/// ```
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Compiled depth estimation model (.axmodel)
    #[arg(short, long, env = "MODEL", default_value = "depth_anything.axmodel")]
    pub model: PathBuf,

    /// NPU engine runtime library
    #[arg(long, env = "ENGINE_LIB", default_value = "libax_engine.so")]
    pub engine_lib: String,

    /// System library providing the CMM allocator
    #[arg(long, env = "SYS_LIB", default_value = "libax_sys.so")]
    pub sys_lib: String,

    /// Raw source frame in the model's input format, sized to the model input
    #[arg(short, long, env = "INPUT")]
    pub input: Option<PathBuf>,

    /// Output frame resolution in pixels (width height)
    #[arg(
        long,
        env = "OUTPUT_SIZE",
        default_value = "1920 1080",
        value_delimiter = ' ',
        num_args = 2
    )]
    pub output_size: Vec<u32>,

    /// Raw NV12 frame at the output resolution drawn under the overlay,
    /// black when omitted
    #[arg(short, long, env = "BACKGROUND")]
    pub background: Option<PathBuf>,

    /// Destination for the composited NV12 frame
    #[arg(short, long, env = "OUTPUT")]
    pub output: Option<PathBuf>,

    /// Number of frames to run, for latency measurements
    #[arg(short = 'n', long, env = "FRAMES", default_value = "1")]
    pub frames: u32,

    /// Overlay width as a fraction of the output width
    #[arg(long, env = "OVERLAY_RATIO", default_value = "0.3")]
    pub ratio: f32,

    /// Overlay width alignment in pixels
    #[arg(long, env = "OVERLAY_ALIGN", default_value = "16")]
    pub align: u32,

    /// Print the model input and output tensors as JSON and exit
    #[arg(long)]
    pub info: bool,

    /// Skip NPU and CMM initialization when another process already owns them
    #[arg(long, env = "NO_INIT")]
    pub no_init: bool,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Enable Tracy profiler for performance analysis
    #[arg(long, env = "TRACY")]
    pub tracy: bool,
}

impl From<&Args> for OverlayConfig {
    fn from(args: &Args) -> Self {
        OverlayConfig {
            ratio: args.ratio,
            align: args.align,
        }
    }
}
