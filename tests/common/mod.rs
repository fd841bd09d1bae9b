// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! In-process stand-ins for the NPU runtime and the CMM allocator.

#![allow(dead_code)]

use edgefirst_depth::{
    memory::AllocFailure, BufferStrategy, ColorSpace, IoBufferSet, IoInfo, PhysicalMemory,
    RawHandle, Runtime, TensorMeta,
};
use std::{
    alloc::{alloc_zeroed, dealloc, Layout},
    cell::{Cell, RefCell},
    collections::HashMap,
    ffi::c_void,
    path::PathBuf,
};

pub const ALLOC_ERROR: i32 = 0x800b_0004u32 as i32;
pub const RUN_ERROR: i32 = 0x8006_0010u32 as i32;

pub const DEPTH_WIDTH: usize = 384;
pub const DEPTH_HEIGHT: usize = 256;

/// NV12 model with a 384x256 tensor input and a 1x1x256x384 float output.
pub fn depth_model_info() -> IoInfo {
    IoInfo {
        inputs: vec![TensorMeta::new(
            "image",
            &[1, DEPTH_HEIGHT as i32, DEPTH_WIDTH as i32, 1],
            (DEPTH_WIDTH * DEPTH_HEIGHT) as u32,
            ColorSpace::Nv12,
        )],
        outputs: vec![TensorMeta::new(
            "depth",
            &[1, 1, DEPTH_HEIGHT as i32, DEPTH_WIDTH as i32],
            (DEPTH_WIDTH * DEPTH_HEIGHT * 4) as u32,
            ColorSpace::Unspecified(0),
        )],
    }
}

/// Writes a placeholder model blob and returns its path.
pub fn model_file(name: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!(
        "edgefirst-depth-{}-{}.axmodel",
        name,
        std::process::id()
    ));
    std::fs::write(&path, b"axmodel").expect("write model file");
    path
}

pub struct MockRuntime {
    pub info: RefCell<IoInfo>,
    pub create_error: Cell<Option<i32>>,
    pub context_error: Cell<Option<i32>>,
    pub io_info_error: Cell<Option<i32>>,
    pub run_error: Cell<Option<i32>>,
    pub created: Cell<usize>,
    pub destroyed: Cell<usize>,
    pub runs: Cell<usize>,
    pub last_input: RefCell<Vec<u8>>,
}

impl MockRuntime {
    pub fn new(info: IoInfo) -> Self {
        Self {
            info: RefCell::new(info),
            create_error: Cell::new(None),
            context_error: Cell::new(None),
            io_info_error: Cell::new(None),
            run_error: Cell::new(None),
            created: Cell::new(0),
            destroyed: Cell::new(0),
            runs: Cell::new(0),
            last_input: RefCell::new(Vec::new()),
        }
    }

    /// Handles created and not yet destroyed.
    pub fn live_handles(&self) -> usize {
        self.created.get() - self.destroyed.get()
    }
}

impl Runtime for MockRuntime {
    fn create_handle(&self, model: &[u8]) -> Result<RawHandle, i32> {
        assert!(!model.is_empty());
        if let Some(code) = self.create_error.get() {
            return Err(code);
        }
        self.created.set(self.created.get() + 1);
        Ok(RawHandle(0x1000 + self.created.get()))
    }

    fn create_context(&self, _handle: RawHandle) -> Result<(), i32> {
        match self.context_error.get() {
            Some(code) => Err(code),
            None => Ok(()),
        }
    }

    fn io_info(&self, _handle: RawHandle) -> Result<IoInfo, i32> {
        match self.io_info_error.get() {
            Some(code) => Err(code),
            None => Ok(self.info.borrow().clone()),
        }
    }

    /// Records input 0 and writes a left to right depth ramp into output 0.
    fn run_sync(&self, _handle: RawHandle, io: &mut IoBufferSet) -> Result<(), i32> {
        if let Some(code) = self.run_error.get() {
            return Err(code);
        }
        self.runs.set(self.runs.get() + 1);
        if let Some(input) = io.inputs().first() {
            *self.last_input.borrow_mut() = input.as_slice().to_vec();
        }

        let width = self.info.borrow().outputs[0].shape[3] as usize;
        if let Some(output) = io.output_mut(0) {
            for (i, px) in output.as_slice_mut().chunks_exact_mut(4).enumerate() {
                px.copy_from_slice(&((i % width) as f32).to_ne_bytes());
            }
        }
        Ok(())
    }

    fn destroy_handle(&self, _handle: RawHandle) {
        self.destroyed.set(self.destroyed.get() + 1);
    }
}

/// Heap-backed allocator that can fail on a chosen allocation.
pub struct MockMemory {
    pub fail_at: Cell<Option<usize>>,
    pub requests: RefCell<Vec<(u32, u32, BufferStrategy)>>,
    pub freed: RefCell<Vec<u64>>,
    pub invalidated: Cell<usize>,
    live: RefCell<HashMap<u64, (*mut u8, Layout)>>,
    next_phys: Cell<u64>,
}

impl MockMemory {
    pub fn new() -> Self {
        Self {
            fail_at: Cell::new(None),
            requests: RefCell::new(Vec::new()),
            freed: RefCell::new(Vec::new()),
            invalidated: Cell::new(0),
            live: RefCell::new(HashMap::new()),
            next_phys: Cell::new(0x4000_0000),
        }
    }

    /// Fails the `n`th allocation request, counting from zero.
    pub fn failing_at(n: usize) -> Self {
        let memory = Self::new();
        memory.fail_at.set(Some(n));
        memory
    }

    pub fn live(&self) -> usize {
        self.live.borrow().len()
    }

    pub fn strategies(&self) -> Vec<BufferStrategy> {
        self.requests.borrow().iter().map(|r| r.2).collect()
    }
}

impl PhysicalMemory for MockMemory {
    fn allocate(
        &self,
        size: u32,
        align: u32,
        strategy: BufferStrategy,
        tag: &str,
    ) -> Result<(u64, *mut c_void), AllocFailure> {
        assert_eq!(tag, "npu");
        let n = self.requests.borrow().len();
        self.requests.borrow_mut().push((size, align, strategy));
        if self.fail_at.get() == Some(n) {
            return Err(AllocFailure {
                code: ALLOC_ERROR,
                phys: 0,
                virt: 0,
            });
        }

        let layout = Layout::from_size_align(size as usize, align as usize).map_err(|_| {
            AllocFailure {
                code: ALLOC_ERROR,
                phys: 0,
                virt: 0,
            }
        })?;
        let ptr = unsafe { alloc_zeroed(layout) };
        if ptr.is_null() {
            return Err(AllocFailure {
                code: ALLOC_ERROR,
                phys: 0,
                virt: 0,
            });
        }
        let phys = self.next_phys.get();
        self.next_phys.set(phys + 0x10_0000);
        self.live.borrow_mut().insert(phys, (ptr, layout));
        Ok((phys, ptr.cast()))
    }

    fn free(&self, phys: u64, virt: *mut c_void) {
        let (ptr, layout) = self
            .live
            .borrow_mut()
            .remove(&phys)
            .expect("free of unknown buffer");
        assert_eq!(ptr.cast::<c_void>(), virt);
        unsafe { dealloc(ptr, layout) };
        self.freed.borrow_mut().push(phys);
    }

    fn invalidate(&self, _phys: u64, _virt: *mut c_void, _size: u32) -> Result<(), i32> {
        self.invalidated.set(self.invalidated.get() + 1);
        Ok(())
    }
}

impl Drop for MockMemory {
    fn drop(&mut self) {
        for (_, (ptr, layout)) in self.live.borrow_mut().drain() {
            unsafe { dealloc(ptr, layout) };
        }
    }
}
