// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::error::{Error, Result};
use ax_engine_sys::ax_sys;
use core::fmt;
use std::{
    cell::Cell,
    ffi::{c_void, CString},
    ptr::{null_mut, NonNull},
    slice::{from_raw_parts, from_raw_parts_mut},
    sync::Arc,
};
use tracing::{debug, warn};

/// Alignment of every NPU I/O buffer in bytes.
pub const CMM_ALIGN_SIZE: u32 = 128;

/// CMM session tag attached to NPU I/O allocations.
pub const CMM_SESSION_NAME: &str = "npu";

/// CPU caching policy of a physically contiguous buffer.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BufferStrategy {
    /// Uncached: CPU writes reach memory directly, no maintenance required.
    #[default]
    Default,
    /// Cached: faster repeated CPU reads, requires cache invalidation after
    /// the NPU writes to it.
    Cached,
}

impl fmt::Display for BufferStrategy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BufferStrategy::Default => write!(f, "default"),
            BufferStrategy::Cached => write!(f, "cached"),
        }
    }
}

/// Allocation strategy for the input and output sets of a model.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StrategyPair {
    pub input: BufferStrategy,
    pub output: BufferStrategy,
}

impl Default for StrategyPair {
    /// Inputs are written once per frame and handed to the NPU, outputs are
    /// read back by the CPU during post-processing.
    fn default() -> Self {
        Self {
            input: BufferStrategy::Default,
            output: BufferStrategy::Cached,
        }
    }
}

/// Status and partially known addresses of a failed allocation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AllocFailure {
    pub code: i32,
    pub phys: u64,
    pub virt: usize,
}

/// Physically contiguous memory shared between the CPU and the NPU.
pub trait PhysicalMemory {
    /// Allocates `size` bytes aligned to `align` and returns the physical and
    /// virtual address of the allocation.
    fn allocate(
        &self,
        size: u32,
        align: u32,
        strategy: BufferStrategy,
        tag: &str,
    ) -> Result<(u64, *mut c_void), AllocFailure>;

    /// Releases an allocation returned by [`allocate`](Self::allocate).
    fn free(&self, phys: u64, virt: *mut c_void);

    /// Drops CPU cache lines covering the buffer so the CPU observes what the
    /// NPU wrote.
    fn invalidate(&self, phys: u64, virt: *mut c_void, size: u32) -> Result<(), i32> {
        let _ = (phys, virt, size);
        Ok(())
    }
}

/// One physically contiguous buffer bound to a model input or output.
///
/// Owns both addresses; dropping the buffer frees the allocation exactly once.
pub struct IoBuffer {
    phys: u64,
    virt: NonNull<u8>,
    size: u32,
    strategy: BufferStrategy,
    memory: Arc<dyn PhysicalMemory>,
}

impl IoBuffer {
    /// Allocates a buffer of `size` bytes with the given caching strategy.
    pub fn allocate(
        memory: &Arc<dyn PhysicalMemory>,
        size: u32,
        strategy: BufferStrategy,
    ) -> Result<Self, AllocFailure> {
        if size == 0 {
            return Err(AllocFailure {
                code: crate::error::STATUS_FAILED,
                phys: 0,
                virt: 0,
            });
        }

        let (phys, virt) = memory.allocate(size, CMM_ALIGN_SIZE, strategy, CMM_SESSION_NAME)?;
        let Some(virt) = NonNull::new(virt.cast::<u8>()) else {
            memory.free(phys, null_mut());
            return Err(AllocFailure {
                code: crate::error::STATUS_FAILED,
                phys,
                virt: 0,
            });
        };

        Ok(Self {
            phys,
            virt,
            size,
            strategy,
            memory: memory.clone(),
        })
    }

    pub fn phys_addr(&self) -> u64 {
        self.phys
    }

    pub fn virt_addr(&self) -> *mut c_void {
        self.virt.as_ptr().cast()
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn strategy(&self) -> BufferStrategy {
        self.strategy
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { from_raw_parts(self.virt.as_ptr(), self.size as usize) }
    }

    pub fn as_slice_mut(&mut self) -> &mut [u8] {
        unsafe { from_raw_parts_mut(self.virt.as_ptr(), self.size as usize) }
    }

    /// Makes NPU writes visible to the CPU. Uncached buffers need nothing.
    pub fn invalidate(&self) -> Result<(), i32> {
        match self.strategy {
            BufferStrategy::Cached => {
                self.memory.invalidate(self.phys, self.virt_addr(), self.size)
            }
            BufferStrategy::Default => Ok(()),
        }
    }
}

impl fmt::Debug for IoBuffer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("IoBuffer")
            .field("phys", &format_args!("{:#x}", self.phys))
            .field("virt", &self.virt)
            .field("size", &self.size)
            .field("strategy", &self.strategy)
            .finish()
    }
}

impl Drop for IoBuffer {
    fn drop(&mut self) {
        self.memory.free(self.phys, self.virt_addr());
    }
}

/// CMM allocator from `libax_sys.so`.
pub struct AxMemory {
    lib: ax_sys,
    initialized: Cell<bool>,
}

impl AxMemory {
    /// Loads the system library. Does not initialize the platform, see
    /// [`init`](Self::init).
    pub fn new(lib_path: &str) -> Result<Self> {
        let lib = unsafe { ax_sys::new(lib_path) }.map_err(|source| Error::Library {
            path: lib_path.to_string(),
            source,
        })?;
        Ok(Self {
            lib,
            initialized: Cell::new(false),
        })
    }

    /// Initializes the system layer for standalone use. The platform is
    /// de-initialized when `self` is dropped.
    pub fn init(&self) -> Result<()> {
        if self.initialized.get() {
            return Ok(());
        }
        let ret = unsafe { self.lib.AX_SYS_Init() };
        if ret != 0 {
            return Err(Error::SysInit(ret));
        }
        self.initialized.set(true);
        debug!("AX_SYS initialized");
        Ok(())
    }
}

impl PhysicalMemory for AxMemory {
    fn allocate(
        &self,
        size: u32,
        align: u32,
        strategy: BufferStrategy,
        tag: &str,
    ) -> Result<(u64, *mut c_void), AllocFailure> {
        let token = CString::new(tag).unwrap_or_default();
        let mut phys: u64 = 0;
        let mut virt: *mut c_void = null_mut();
        let ret = unsafe {
            match strategy {
                BufferStrategy::Cached => self.lib.AX_SYS_MemAllocCached(
                    &mut phys,
                    &mut virt,
                    size,
                    align,
                    token.as_ptr().cast(),
                ),
                BufferStrategy::Default => self.lib.AX_SYS_MemAlloc(
                    &mut phys,
                    &mut virt,
                    size,
                    align,
                    token.as_ptr().cast(),
                ),
            }
        };
        if ret != 0 {
            return Err(AllocFailure {
                code: ret,
                phys,
                virt: virt as usize,
            });
        }
        Ok((phys, virt))
    }

    fn free(&self, phys: u64, virt: *mut c_void) {
        let ret = unsafe { self.lib.AX_SYS_MemFree(phys, virt) };
        if ret != 0 {
            warn!("AX_SYS_MemFree phy: {:#x} vir: {:?} failed: {:#x}", phys, virt, ret);
        }
    }

    fn invalidate(&self, phys: u64, virt: *mut c_void, size: u32) -> Result<(), i32> {
        let ret = unsafe { self.lib.AX_SYS_MinvalidateCache(phys, virt, size) };
        if ret != 0 {
            return Err(ret);
        }
        Ok(())
    }
}

impl Drop for AxMemory {
    fn drop(&mut self) {
        if self.initialized.get() {
            _ = unsafe { self.lib.AX_SYS_Deinit() };
            debug!("AX_SYS deinitialized");
        }
    }
}
