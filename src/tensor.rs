// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::{Error, Result};
use ax_engine_sys::{
    AX_ENGINE_CS_BGR, AX_ENGINE_CS_NV12, AX_ENGINE_CS_RGB, AX_ENGINE_IOMETA_T, AX_ENGINE_IO_INFO_T,
};
use core::fmt;
use serde_json::{json, Value};

/// Color-space tag attached to a model input by the compiler.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    /// NV12 4:2:0 semi-planar.
    Nv12,
    Rgb,
    Bgr,
    /// Any other tag, including plain feature maps, with the raw value.
    Unspecified(u32),
}

impl From<u32> for ColorSpace {
    fn from(value: u32) -> Self {
        match value {
            AX_ENGINE_CS_NV12 => ColorSpace::Nv12,
            AX_ENGINE_CS_RGB => ColorSpace::Rgb,
            AX_ENGINE_CS_BGR => ColorSpace::Bgr,
            other => ColorSpace::Unspecified(other),
        }
    }
}

impl fmt::Display for ColorSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ColorSpace::Nv12 => write!(f, "NV12"),
            ColorSpace::Rgb => write!(f, "RGB"),
            ColorSpace::Bgr => write!(f, "BGR"),
            ColorSpace::Unspecified(raw) => write!(f, "unspecified({raw})"),
        }
    }
}

/// Metadata for one model input or output, copied out of the engine when the
/// model is loaded.
#[derive(Clone, Debug, PartialEq)]
pub struct TensorMeta {
    pub name: String,
    pub shape: Vec<i32>,
    /// Size in bytes, used to size the I/O buffer.
    pub size: u32,
    pub color_space: ColorSpace,
}

impl TensorMeta {
    pub fn new(name: &str, shape: &[i32], size: u32, color_space: ColorSpace) -> Self {
        Self {
            name: name.to_string(),
            shape: shape.to_vec(),
            size,
            color_space,
        }
    }

    /// Dimension `index` of the shape, rejecting missing or negative
    /// dimensions.
    pub fn dim(&self, index: usize) -> Result<usize> {
        match self.shape.get(index) {
            Some(&d) if d >= 0 => Ok(d as usize),
            _ => Err(Error::InvalidShape(format!(
                "tensor {} has shape {:?}, dimension {} is missing or negative",
                self.name, self.shape, index
            ))),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "name": self.name,
            "shape": self.shape,
            "size": self.size,
            "color_space": self.color_space.to_string(),
        })
    }
}

impl From<&AX_ENGINE_IOMETA_T> for TensorMeta {
    fn from(meta: &AX_ENGINE_IOMETA_T) -> Self {
        unsafe {
            Self {
                name: meta.name(),
                shape: meta.shape().to_vec(),
                size: meta.nSize,
                color_space: meta
                    .color_space()
                    .map(ColorSpace::from)
                    .unwrap_or(ColorSpace::Unspecified(0)),
            }
        }
    }
}

/// Declared inputs and outputs of a loaded model.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IoInfo {
    pub inputs: Vec<TensorMeta>,
    pub outputs: Vec<TensorMeta>,
}

impl IoInfo {
    pub fn to_json(&self) -> Value {
        json!({
            "inputs": self.inputs.iter().map(TensorMeta::to_json).collect::<Vec<_>>(),
            "outputs": self.outputs.iter().map(TensorMeta::to_json).collect::<Vec<_>>(),
        })
    }
}

impl From<&AX_ENGINE_IO_INFO_T> for IoInfo {
    fn from(info: &AX_ENGINE_IO_INFO_T) -> Self {
        unsafe {
            Self {
                inputs: info.inputs().iter().map(TensorMeta::from).collect(),
                outputs: info.outputs().iter().map(TensorMeta::from).collect(),
            }
        }
    }
}

/// Borrowed single-channel `f32` grid over a model output buffer.
///
/// The view never copies the output; it is valid until the next run
/// overwrites the buffer.
#[derive(Copy, Clone, Debug)]
pub struct DepthView<'a> {
    data: &'a [f32],
    height: usize,
    width: usize,
}

impl<'a> DepthView<'a> {
    pub fn new(data: &'a [f32], height: usize, width: usize) -> Result<Self> {
        let need = height * width;
        if data.len() < need {
            return Err(Error::FrameSize {
                need: need * 4,
                have: data.len() * 4,
            });
        }
        Ok(Self {
            data: &data[..need],
            height,
            width,
        })
    }

    /// Interprets `bytes` as the `[N, C, H, W]` float output described by
    /// `meta`, using dimensions 2 and 3 as height and width.
    pub fn from_bytes(bytes: &'a [u8], meta: &TensorMeta) -> Result<Self> {
        let height = meta.dim(2)?;
        let width = meta.dim(3)?;
        // SAFETY: every bit pattern is a valid f32, alignment is checked below.
        let (head, floats, _) = unsafe { bytes.align_to::<f32>() };
        if !head.is_empty() {
            return Err(Error::InvalidShape(format!(
                "output {} buffer is not aligned for f32",
                meta.name
            )));
        }
        Self::new(floats, height, width)
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn as_slice(&self) -> &'a [f32] {
        self.data
    }
}
