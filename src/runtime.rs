// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::{Error, Result},
    io::IoBufferSet,
    tensor::IoInfo,
};
use ax_engine_sys::{
    ax_engine, engine_version, AX_ENGINE_HANDLE, AX_ENGINE_IO_INFO_T, AX_ENGINE_NPU_ATTR_T,
    AX_ENGINE_VIRTUAL_NPU_DISABLE,
};
use std::{cell::Cell, ffi::c_void, ptr::null_mut, sync::Arc};
use tracing::{debug, info};

/// Opaque engine handle value as returned by the runtime.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RawHandle(pub usize);

/// Accelerator runtime able to load and execute one compiled model.
///
/// Every fallible call reports the runtime's nonzero status on failure.
pub trait Runtime {
    fn create_handle(&self, model: &[u8]) -> Result<RawHandle, i32>;

    fn create_context(&self, handle: RawHandle) -> Result<(), i32>;

    fn io_info(&self, handle: RawHandle) -> Result<IoInfo, i32>;

    /// Executes the model synchronously, reading the input buffers and
    /// writing the output buffers of `io`.
    fn run_sync(&self, handle: RawHandle, io: &mut IoBufferSet) -> Result<(), i32>;

    fn destroy_handle(&self, handle: RawHandle);
}

/// Owned runtime handle, destroyed on drop.
pub struct EngineHandle {
    raw: RawHandle,
    runtime: Arc<dyn Runtime>,
}

impl EngineHandle {
    /// Creates a handle from the serialized model.
    pub fn create(runtime: &Arc<dyn Runtime>, model: &[u8]) -> Result<Self> {
        let raw = runtime.create_handle(model).map_err(Error::EngineCreate)?;
        Ok(Self {
            raw,
            runtime: runtime.clone(),
        })
    }

    pub fn raw(&self) -> RawHandle {
        self.raw
    }

    pub fn create_context(&self) -> Result<()> {
        self.runtime
            .create_context(self.raw)
            .map_err(Error::ContextCreate)
    }

    pub fn io_info(&self) -> Result<IoInfo> {
        self.runtime.io_info(self.raw).map_err(Error::IoInfo)
    }

    pub fn run_sync(&self, io: &mut IoBufferSet) -> Result<()> {
        self.runtime.run_sync(self.raw, io).map_err(Error::Inference)
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.runtime.destroy_handle(self.raw);
        debug!("engine handle {:#x} destroyed", self.raw.0);
    }
}

/// NPU runtime from `libax_engine.so`.
pub struct AxRuntime {
    lib: ax_engine,
    initialized: Cell<bool>,
}

impl AxRuntime {
    /// Loads the engine library. Does not initialize the NPU, see
    /// [`init`](Self::init).
    pub fn new(lib_path: &str) -> Result<Self> {
        let lib = unsafe { ax_engine::new(lib_path) }.map_err(|source| Error::Library {
            path: lib_path.to_string(),
            source,
        })?;
        if let Some(version) = engine_version(&lib) {
            info!("AX_ENGINE version {}", version);
        }
        Ok(Self {
            lib,
            initialized: Cell::new(false),
        })
    }

    /// Initializes the NPU with the virtual NPU disabled. Applications whose
    /// video pipeline already initialized the engine must skip this. The NPU
    /// is de-initialized when `self` is dropped.
    pub fn init(&self) -> Result<()> {
        if self.initialized.get() {
            return Ok(());
        }
        let mut attr = AX_ENGINE_NPU_ATTR_T {
            eHardMode: AX_ENGINE_VIRTUAL_NPU_DISABLE,
            ..Default::default()
        };
        let ret = unsafe { self.lib.AX_ENGINE_Init(&mut attr) };
        if ret != 0 {
            return Err(Error::EngineInit(ret));
        }
        self.initialized.set(true);
        debug!("AX_ENGINE initialized");
        Ok(())
    }
}

fn handle_ptr(handle: RawHandle) -> AX_ENGINE_HANDLE {
    handle.0 as *mut c_void
}

impl Runtime for AxRuntime {
    fn create_handle(&self, model: &[u8]) -> Result<RawHandle, i32> {
        let mut handle: AX_ENGINE_HANDLE = null_mut();
        let ret = unsafe {
            self.lib.AX_ENGINE_CreateHandle(
                &mut handle,
                model.as_ptr().cast(),
                model.len() as u32,
            )
        };
        if ret != 0 {
            return Err(ret);
        }
        Ok(RawHandle(handle as usize))
    }

    fn create_context(&self, handle: RawHandle) -> Result<(), i32> {
        let ret = unsafe { self.lib.AX_ENGINE_CreateContext(handle_ptr(handle)) };
        if ret != 0 {
            return Err(ret);
        }
        Ok(())
    }

    fn io_info(&self, handle: RawHandle) -> Result<IoInfo, i32> {
        let mut info: *mut AX_ENGINE_IO_INFO_T = null_mut();
        let ret = unsafe { self.lib.AX_ENGINE_GetIOInfo(handle_ptr(handle), &mut info) };
        if ret != 0 {
            return Err(ret);
        }
        // The engine owns the metadata, copy it out while the handle is alive.
        match unsafe { info.as_ref() } {
            Some(info) => Ok(IoInfo::from(info)),
            None => Err(crate::error::STATUS_FAILED),
        }
    }

    fn run_sync(&self, handle: RawHandle, io: &mut IoBufferSet) -> Result<(), i32> {
        let (mut inputs, mut outputs) = io.descriptors();
        let mut engine_io = IoBufferSet::engine_io(&mut inputs, &mut outputs);
        let ret = unsafe { self.lib.AX_ENGINE_RunSync(handle_ptr(handle), &mut engine_io) };
        if ret != 0 {
            return Err(ret);
        }
        Ok(())
    }

    fn destroy_handle(&self, handle: RawHandle) {
        _ = unsafe { self.lib.AX_ENGINE_DestroyHandle(handle_ptr(handle)) };
    }
}

impl Drop for AxRuntime {
    fn drop(&mut self) {
        if self.initialized.get() {
            _ = unsafe { self.lib.AX_ENGINE_Deinit() };
            debug!("AX_ENGINE deinitialized");
        }
    }
}
