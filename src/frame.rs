// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::{Error, Result},
    tensor::ColorSpace,
};
use core::fmt;

/// Pixel formats accepted by the model input and carried by video frames.
///
/// Each format knows its own byte size and how the model's second input
/// dimension maps back to an image height.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// NV12 4:2:0 YUV semi-planar: a full resolution luma plane followed by an
    /// interleaved half resolution UV plane.
    Nv12,
    /// Packed 24-bit RGB.
    Rgb888,
    /// Packed 24-bit BGR.
    Bgr888,
}

impl PixelFormat {
    /// Bytes needed for a `width` x `height` frame.
    pub const fn frame_size(self, width: u32, height: u32) -> usize {
        let pixels = width as usize * height as usize;
        match self {
            PixelFormat::Nv12 => pixels + pixels / 2,
            PixelFormat::Rgb888 | PixelFormat::Bgr888 => pixels * 3,
        }
    }

    /// Image height for a model input whose dimension 1 is `dim`.
    ///
    /// NV12 models stack the chroma plane under the luma plane, so the tensor
    /// is 1.5 times taller than the image.
    pub fn algo_height(self, dim: u32) -> u32 {
        match self {
            PixelFormat::Nv12 => (dim as f64 / 1.5) as u32,
            PixelFormat::Rgb888 | PixelFormat::Bgr888 => dim,
        }
    }
}

impl TryFrom<ColorSpace> for PixelFormat {
    type Error = Error;

    fn try_from(cs: ColorSpace) -> Result<Self> {
        match cs {
            ColorSpace::Nv12 => Ok(PixelFormat::Nv12),
            ColorSpace::Rgb => Ok(PixelFormat::Rgb888),
            ColorSpace::Bgr => Ok(PixelFormat::Bgr888),
            other => Err(Error::UnsupportedColorFormat(other)),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PixelFormat::Nv12 => write!(f, "NV12"),
            PixelFormat::Rgb888 => write!(f, "RGB3"),
            PixelFormat::Bgr888 => write!(f, "BGR3"),
        }
    }
}

/// Read-only video frame.
#[derive(Debug)]
pub struct VideoFrame<'a> {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: &'a [u8],
}

impl<'a> VideoFrame<'a> {
    /// Wraps `data`, which must hold at least a full frame.
    pub fn new(width: u32, height: u32, format: PixelFormat, data: &'a [u8]) -> Result<Self> {
        let need = format.frame_size(width, height);
        if data.len() < need {
            return Err(Error::FrameSize {
                need,
                have: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// Wraps a frame owned by another hardware block, such as the
    /// `u64VirAddr[0]` plane of an IVPS frame.
    ///
    /// # Safety
    ///
    /// `vaddr` must be valid for reads of `size` bytes for `'a` and must not
    /// be written to while the frame is alive.
    pub unsafe fn from_raw_parts(
        width: u32,
        height: u32,
        format: PixelFormat,
        vaddr: *const u8,
        size: usize,
    ) -> Result<Self> {
        Self::new(
            width,
            height,
            format,
            std::slice::from_raw_parts(vaddr, size),
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Full frame bytes, starting with the primary plane.
    pub fn data(&self) -> &[u8] {
        self.data
    }
}

/// Writable video frame, used as the overlay destination.
#[derive(Debug)]
pub struct VideoFrameMut<'a> {
    width: u32,
    height: u32,
    format: PixelFormat,
    data: &'a mut [u8],
}

impl<'a> VideoFrameMut<'a> {
    pub fn new(width: u32, height: u32, format: PixelFormat, data: &'a mut [u8]) -> Result<Self> {
        let need = format.frame_size(width, height);
        if data.len() < need {
            return Err(Error::FrameSize {
                need,
                have: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            data,
        })
    }

    /// # Safety
    ///
    /// `vaddr` must be valid for reads and writes of `size` bytes for `'a`
    /// and must not be accessed through any other pointer meanwhile.
    pub unsafe fn from_raw_parts(
        width: u32,
        height: u32,
        format: PixelFormat,
        vaddr: *mut u8,
        size: usize,
    ) -> Result<Self> {
        Self::new(
            width,
            height,
            format,
            std::slice::from_raw_parts_mut(vaddr, size),
        )
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Splits an NV12 frame into its luma and interleaved chroma planes.
    pub fn nv12_planes_mut(&mut self) -> Result<(&mut [u8], &mut [u8])> {
        if self.format != PixelFormat::Nv12 {
            return Err(Error::FrameFormat(self.format));
        }
        let luma = self.width as usize * self.height as usize;
        let need = self.format.frame_size(self.width, self.height);
        let (y, uv) = self.data[..need].split_at_mut(luma);
        Ok((y, uv))
    }
}
