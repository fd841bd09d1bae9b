// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{frame::PixelFormat, io::Direction, tensor::ColorSpace};
use std::{io, path::PathBuf};

/// Status reported for failures that do not originate from the vendor
/// runtime.
pub const STATUS_FAILED: i32 = -1;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while loading a model, running it or rendering its output.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read model {path:?}: {source}")]
    ModelRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("AX_ENGINE_CreateHandle failed: {0:#x}")]
    EngineCreate(i32),

    #[error("AX_ENGINE_CreateContext failed: {0:#x}")]
    ContextCreate(i32),

    #[error("AX_ENGINE_GetIOInfo failed: {0:#x}")]
    IoInfo(i32),

    #[error(
        "allocate {direction}{{{index}}} {{ phy: {phys:#x}, vir: {virt:#x}, size: {size} Bytes }} failed: {code:#x}"
    )]
    Allocation {
        direction: Direction,
        index: usize,
        size: u32,
        phys: u64,
        virt: usize,
        code: i32,
    },

    #[error("unsupported model input color space {0}, only NV12/RGB/BGR are supported")]
    UnsupportedColorFormat(ColorSpace),

    #[error("AX_ENGINE_RunSync failed: {0:#x}")]
    Inference(i32),

    #[error("invalid tensor shape: {0}")]
    InvalidShape(String),

    #[error("frame size mismatch: need {need} bytes, have {have}")]
    FrameSize { need: usize, have: usize },

    #[error("unsupported frame format {0}")]
    FrameFormat(PixelFormat),

    #[error("overlay image buffer: {0}")]
    ImageBuffer(#[from] fast_image_resize::ImageBufferError),

    #[error("overlay resize failed: {0}")]
    Resize(#[from] fast_image_resize::ResizeError),

    #[error("overlay color conversion failed: {0:?}")]
    ColorConvert(dcv_color_primitives::ErrorKind),

    #[error("no model loaded")]
    NotLoaded,

    #[error("failed to load library {path}: {source}")]
    Library {
        path: String,
        #[source]
        source: libloading::Error,
    },

    #[error("AX_ENGINE_Init failed: {0:#x}")]
    EngineInit(i32),

    #[error("AX_SYS_Init failed: {0:#x}")]
    SysInit(i32),
}

impl Error {
    /// Status code reported at the `load`/`inference` boundary.
    ///
    /// Runtime and allocator failures propagate the vendor status, execution
    /// failures and locally detected errors report [`STATUS_FAILED`].
    pub fn status(&self) -> i32 {
        match self {
            Error::EngineCreate(code)
            | Error::ContextCreate(code)
            | Error::IoInfo(code)
            | Error::EngineInit(code)
            | Error::SysInit(code)
            | Error::Allocation { code, .. } => *code,
            _ => STATUS_FAILED,
        }
    }
}
