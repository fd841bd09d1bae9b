// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::Result as FrameResult,
    frame::{PixelFormat, VideoFrame, VideoFrameMut},
};
use core::fmt;
use dma_heap::{Heap, HeapKind};
use libc::{mmap, munmap, MAP_FAILED, MAP_SHARED, PROT_READ, PROT_WRITE};
use std::{
    error::Error,
    ffi::c_void,
    io,
    os::{fd::AsRawFd, unix::io::OwnedFd},
    ptr::null_mut,
    slice::{from_raw_parts, from_raw_parts_mut},
};
use tracing::{debug, warn};

/// DMA-backed video frame buffer.
///
/// Images live in CMA (Contiguous Memory Allocator) memory so the same buffer
/// can be handed to the video pipeline without copying. Use
/// [`mmap`](Image::mmap) to access the pixels from the CPU.
///
/// # Example
///
/// ```no_run
/// use edgefirst_depth::{image::Image, PixelFormat};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut img = Image::new(1920, 1080, PixelFormat::Nv12)?;
/// assert_eq!(img.size(), 1920 * 1080 * 3 / 2);
/// let mut mapped = img.mmap()?;
/// mapped.as_slice_mut().fill(16);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Image {
    fd: OwnedFd,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Image {
    /// Allocates a new image in the CMA heap.
    ///
    /// # Errors
    ///
    /// Returns an error if `/dev/dma_heap` is not accessible or the heap is
    /// out of memory.
    pub fn new(width: u32, height: u32, format: PixelFormat) -> Result<Self, Box<dyn Error>> {
        let heap = Heap::new(HeapKind::Cma)?;
        let fd = heap.allocate(format.frame_size(width, height))?;
        debug!("allocated {}x{} {} image", width, height, format);
        Ok(Self {
            fd,
            width,
            height,
            format,
        })
    }

    pub fn raw_fd(&self) -> i32 {
        self.fd.as_raw_fd()
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

    pub fn size(&self) -> usize {
        self.format.frame_size(self.width, self.height)
    }

    /// Maps the buffer into the process for CPU access.
    pub fn mmap(&mut self) -> io::Result<MappedImage> {
        let len = self.size();
        let ptr = unsafe {
            mmap(
                null_mut(),
                len,
                PROT_READ | PROT_WRITE,
                MAP_SHARED,
                self.raw_fd(),
                0,
            )
        };
        if ptr == MAP_FAILED {
            return Err(io::Error::last_os_error());
        }
        Ok(MappedImage {
            mmap: ptr.cast::<u8>(),
            len,
            width: self.width,
            height: self.height,
            format: self.format,
        })
    }
}

impl fmt::Display for Image {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}x{} {} fd:{:?}",
            self.width, self.height, self.format, self.fd
        )
    }
}

/// Memory-mapped view of an [`Image`], unmapped when dropped.
///
/// The mapping is shared with any hardware block holding the same buffer;
/// make sure such work has completed before touching the pixels.
pub struct MappedImage {
    mmap: *mut u8,
    len: usize,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl MappedImage {
    pub fn as_slice(&self) -> &[u8] {
        unsafe { from_raw_parts(self.mmap, self.len) }
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        unsafe { from_raw_parts_mut(self.mmap, self.len) }
    }

    /// Borrows the mapping as a source frame for inference.
    pub fn frame(&self) -> FrameResult<VideoFrame<'_>> {
        VideoFrame::new(self.width, self.height, self.format, self.as_slice())
    }

    /// Borrows the mapping as an overlay destination.
    pub fn frame_mut(&mut self) -> FrameResult<VideoFrameMut<'_>> {
        let (width, height, format) = (self.width, self.height, self.format);
        VideoFrameMut::new(width, height, format, self.as_slice_mut())
    }
}

impl Drop for MappedImage {
    fn drop(&mut self) {
        if unsafe { munmap(self.mmap.cast::<c_void>(), self.len) } != 0 {
            warn!("unmap failed: {}", io::Error::last_os_error());
        }
    }
}
