// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! # EdgeFirst Depth Estimation Library
//!
//! This library runs a monocular depth estimation model on the Axera NPU and
//! draws the resulting depth map as a false-colour picture-in-picture overlay
//! into NV12 video frames.
//!
//! ## Features
//!
//! - **Model Lifecycle**: Load a compiled model through `libax_engine.so`,
//!   query its tensor metadata and release it again, with every partially
//!   acquired resource cleaned up on failure.
//! - **NPU I/O Buffers**: Physically contiguous input and output buffers from
//!   the CMM allocator in `libax_sys.so`, uncached for inputs and cached with
//!   explicit invalidation for outputs.
//! - **Depth Overlay**: Min/max normalisation, a magma colour palette,
//!   bilinear resize and NV12 conversion, composited into the top-left
//!   corner of the output frame.
//! - **DMA Images**: CMA heap backed frame buffers for the demo pipeline.
//!
//! ## Example
//!
//! ```no_run
//! use edgefirst_depth::{
//!     image::Image, AxMemory, AxRuntime, DepthPipeline, OverlayConfig, PixelFormat,
//! };
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let runtime = Arc::new(AxRuntime::new("libax_engine.so")?);
//! runtime.init()?;
//! let memory = Arc::new(AxMemory::new("libax_sys.so")?);
//! memory.init()?;
//!
//! let mut pipeline = DepthPipeline::new(runtime, memory, OverlayConfig::default());
//! pipeline.load("depth_anything.axmodel")?;
//! let params = pipeline.params().ok_or("model not loaded")?;
//!
//! let mut src = Image::new(params.width, params.height, params.format)?;
//! let mut dst = Image::new(1920, 1080, PixelFormat::Nv12)?;
//! let src = src.mmap()?;
//! let mut dst = dst.mmap()?;
//! pipeline.inference(&src.frame()?, &mut dst.frame_mut()?)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Platform Requirements
//!
//! - **Linux**: Kernel 5.10+ with DMA heap support
//! - **NPU**: Axera AX650 / AX630C class SoC with the vendor runtime libraries
//!   installed; the pure post-processing path runs anywhere.
//!
//! ## Safety
//!
//! This library uses `unsafe` code for FFI calls into the vendor runtime and
//! for mapping physically contiguous memory. All unsafe operations are
//! isolated to the `runtime`, `memory` and `image` modules and wrapped with
//! safe APIs.

pub mod colormap;
pub mod error;
pub mod frame;
pub mod image;
pub mod io;
pub mod memory;
pub mod pipeline;
pub mod postprocess;
pub mod runtime;
pub mod session;
pub mod tensor;

pub use error::{Error, Result};
pub use frame::{PixelFormat, VideoFrame, VideoFrameMut};
pub use io::{Direction, IoBufferSet};
pub use memory::{AxMemory, BufferStrategy, IoBuffer, PhysicalMemory, StrategyPair};
pub use pipeline::DepthPipeline;
pub use postprocess::{DepthRenderer, OverlayConfig};
pub use runtime::{AxRuntime, EngineHandle, RawHandle, Runtime};
pub use session::{AlgoParams, EngineSession};
pub use tensor::{ColorSpace, DepthView, IoInfo, TensorMeta};
