// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Low-level bindings for the Axera NPU runtime (`libax_engine.so`) and the
//! system CMM allocator (`libax_sys.so`).
//!
//! Both libraries are loaded at runtime with `libloading` so the crate builds
//! on hosts without the vendor SDK. Only the subset of the API needed to load
//! a model, allocate its I/O buffers and run it synchronously is bound.

#![allow(non_camel_case_types, non_snake_case, non_upper_case_globals)]
#![allow(clippy::missing_safety_doc)]

use libc::{c_char, c_void};
use std::{ffi::CStr, ffi::OsStr};

pub type AX_S8 = i8;
pub type AX_U8 = u8;
pub type AX_S32 = i32;
pub type AX_U32 = u32;
pub type AX_U64 = u64;
pub type AX_BOOL = i32;
pub type AX_VOID = c_void;
pub type AX_CHAR = c_char;

pub type AX_ENGINE_HANDLE = *mut c_void;

pub type AX_ENGINE_NPU_MODE_T = u32;
pub const AX_ENGINE_VIRTUAL_NPU_DISABLE: AX_ENGINE_NPU_MODE_T = 0;

pub type AX_ENGINE_COLOR_SPACE_T = u32;
pub const AX_ENGINE_CS_FEATUREMAP: AX_ENGINE_COLOR_SPACE_T = 0;
pub const AX_ENGINE_CS_NV12: AX_ENGINE_COLOR_SPACE_T = 20;
pub const AX_ENGINE_CS_NV21: AX_ENGINE_COLOR_SPACE_T = 21;
pub const AX_ENGINE_CS_RGB: AX_ENGINE_COLOR_SPACE_T = 30;
pub const AX_ENGINE_CS_BGR: AX_ENGINE_COLOR_SPACE_T = 31;
pub const AX_ENGINE_CS_RGBA: AX_ENGINE_COLOR_SPACE_T = 32;
pub const AX_ENGINE_CS_GRAY: AX_ENGINE_COLOR_SPACE_T = 33;

pub type AX_ENGINE_TENSOR_LAYOUT_T = u32;
pub type AX_ENGINE_MEMORY_TYPE_T = u32;
pub type AX_ENGINE_DATA_TYPE_T = u32;

#[repr(C)]
#[derive(Debug, Default, Copy, Clone)]
pub struct AX_ENGINE_NPU_ATTR_T {
    pub eHardMode: AX_ENGINE_NPU_MODE_T,
    pub reserve: [AX_U32; 8],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct AX_ENGINE_IOMETA_EX_T {
    pub eColorSpace: AX_ENGINE_COLOR_SPACE_T,
    pub u64Reserved: [AX_U64; 18],
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct AX_ENGINE_IOMETA_T {
    pub pName: *mut AX_CHAR,
    pub pShape: *mut AX_S32,
    pub nShapeSize: AX_U8,
    pub eLayout: AX_ENGINE_TENSOR_LAYOUT_T,
    pub eMemoryType: AX_ENGINE_MEMORY_TYPE_T,
    pub eDataType: AX_ENGINE_DATA_TYPE_T,
    pub pExtraMeta: *mut AX_ENGINE_IOMETA_EX_T,
    pub nSize: AX_U32,
    pub nQuantizationValue: AX_U32,
    pub pStride: *mut AX_S32,
    pub u64Reserved: [AX_U64; 9],
}

impl AX_ENGINE_IOMETA_T {
    /// Tensor dimensions.
    ///
    /// # Safety
    ///
    /// `pShape` must point at `nShapeSize` valid elements owned by the
    /// engine handle the metadata was obtained from.
    pub unsafe fn shape(&self) -> &[AX_S32] {
        if self.pShape.is_null() {
            return &[];
        }
        std::slice::from_raw_parts(self.pShape, self.nShapeSize as usize)
    }

    /// Tensor name, empty when the model does not carry one.
    ///
    /// # Safety
    ///
    /// `pName` must be null or a valid NUL-terminated string.
    pub unsafe fn name(&self) -> String {
        if self.pName.is_null() {
            return String::new();
        }
        CStr::from_ptr(self.pName).to_string_lossy().into_owned()
    }

    /// Color-space tag from the extra metadata, if present.
    ///
    /// # Safety
    ///
    /// `pExtraMeta` must be null or point at valid extra metadata.
    pub unsafe fn color_space(&self) -> Option<AX_ENGINE_COLOR_SPACE_T> {
        self.pExtraMeta.as_ref().map(|meta| meta.eColorSpace)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct AX_ENGINE_IO_INFO_T {
    pub pInputs: *mut AX_ENGINE_IOMETA_T,
    pub nInputSize: AX_U32,
    pub pOutputs: *mut AX_ENGINE_IOMETA_T,
    pub nOutputSize: AX_U32,
    pub nMaxBatchSize: AX_U32,
    pub bDynamicBatchSize: AX_BOOL,
    pub u64Reserved: [AX_U64; 11],
}

impl AX_ENGINE_IO_INFO_T {
    /// # Safety
    ///
    /// `pInputs` must point at `nInputSize` valid entries.
    pub unsafe fn inputs(&self) -> &[AX_ENGINE_IOMETA_T] {
        if self.pInputs.is_null() {
            return &[];
        }
        std::slice::from_raw_parts(self.pInputs, self.nInputSize as usize)
    }

    /// # Safety
    ///
    /// `pOutputs` must point at `nOutputSize` valid entries.
    pub unsafe fn outputs(&self) -> &[AX_ENGINE_IOMETA_T] {
        if self.pOutputs.is_null() {
            return &[];
        }
        std::slice::from_raw_parts(self.pOutputs, self.nOutputSize as usize)
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct AX_ENGINE_IO_BUFFER_T {
    pub phyAddr: AX_U64,
    pub pVirAddr: *mut AX_VOID,
    pub nSize: AX_U32,
    pub pStride: *mut AX_S32,
    pub nStrideSize: AX_U8,
    pub u64Reserved: [AX_U64; 11],
}

impl AX_ENGINE_IO_BUFFER_T {
    pub fn new(phy_addr: AX_U64, vir_addr: *mut AX_VOID, size: AX_U32) -> Self {
        Self {
            phyAddr: phy_addr,
            pVirAddr: vir_addr,
            nSize: size,
            pStride: std::ptr::null_mut(),
            nStrideSize: 0,
            u64Reserved: [0; 11],
        }
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct AX_ENGINE_IO_T {
    pub pInputs: *mut AX_ENGINE_IO_BUFFER_T,
    pub nInputSize: AX_U32,
    pub pOutputs: *mut AX_ENGINE_IO_BUFFER_T,
    pub nOutputSize: AX_U32,
    pub nBatchSize: AX_U32,
    pub bParallelRun: AX_BOOL,
    pub pIoSetting: *mut c_void,
    pub u64Reserved: [AX_U64; 10],
}

impl Default for AX_ENGINE_IO_T {
    fn default() -> Self {
        Self {
            pInputs: std::ptr::null_mut(),
            nInputSize: 0,
            pOutputs: std::ptr::null_mut(),
            nOutputSize: 0,
            nBatchSize: 0,
            bParallelRun: 0,
            pIoSetting: std::ptr::null_mut(),
            u64Reserved: [0; 10],
        }
    }
}

/// Dynamically loaded `libax_engine.so`.
pub struct ax_engine {
    __library: libloading::Library,
    pub AX_ENGINE_Init: unsafe extern "C" fn(pNpuAttr: *mut AX_ENGINE_NPU_ATTR_T) -> AX_S32,
    pub AX_ENGINE_Deinit: unsafe extern "C" fn() -> AX_S32,
    pub AX_ENGINE_GetVersion: unsafe extern "C" fn() -> *const AX_CHAR,
    pub AX_ENGINE_CreateHandle: unsafe extern "C" fn(
        pHandle: *mut AX_ENGINE_HANDLE,
        pData: *const AX_VOID,
        nDataSize: AX_U32,
    ) -> AX_S32,
    pub AX_ENGINE_CreateContext: unsafe extern "C" fn(handle: AX_ENGINE_HANDLE) -> AX_S32,
    pub AX_ENGINE_GetIOInfo: unsafe extern "C" fn(
        handle: AX_ENGINE_HANDLE,
        pIO: *mut *mut AX_ENGINE_IO_INFO_T,
    ) -> AX_S32,
    pub AX_ENGINE_RunSync:
        unsafe extern "C" fn(handle: AX_ENGINE_HANDLE, pIO: *mut AX_ENGINE_IO_T) -> AX_S32,
    pub AX_ENGINE_DestroyHandle: unsafe extern "C" fn(handle: AX_ENGINE_HANDLE) -> AX_S32,
}

impl ax_engine {
    pub unsafe fn new<P: AsRef<OsStr>>(path: P) -> Result<Self, libloading::Error> {
        let library = libloading::Library::new(path)?;
        Self::from_library(library)
    }

    pub unsafe fn from_library<L>(library: L) -> Result<Self, libloading::Error>
    where
        L: Into<libloading::Library>,
    {
        let __library = library.into();
        let AX_ENGINE_Init = __library.get(b"AX_ENGINE_Init\0").map(|sym| *sym)?;
        let AX_ENGINE_Deinit = __library.get(b"AX_ENGINE_Deinit\0").map(|sym| *sym)?;
        let AX_ENGINE_GetVersion = __library.get(b"AX_ENGINE_GetVersion\0").map(|sym| *sym)?;
        let AX_ENGINE_CreateHandle = __library
            .get(b"AX_ENGINE_CreateHandle\0")
            .map(|sym| *sym)?;
        let AX_ENGINE_CreateContext = __library
            .get(b"AX_ENGINE_CreateContext\0")
            .map(|sym| *sym)?;
        let AX_ENGINE_GetIOInfo = __library.get(b"AX_ENGINE_GetIOInfo\0").map(|sym| *sym)?;
        let AX_ENGINE_RunSync = __library.get(b"AX_ENGINE_RunSync\0").map(|sym| *sym)?;
        let AX_ENGINE_DestroyHandle = __library
            .get(b"AX_ENGINE_DestroyHandle\0")
            .map(|sym| *sym)?;
        Ok(ax_engine {
            __library,
            AX_ENGINE_Init,
            AX_ENGINE_Deinit,
            AX_ENGINE_GetVersion,
            AX_ENGINE_CreateHandle,
            AX_ENGINE_CreateContext,
            AX_ENGINE_GetIOInfo,
            AX_ENGINE_RunSync,
            AX_ENGINE_DestroyHandle,
        })
    }

    pub unsafe fn AX_ENGINE_Init(&self, pNpuAttr: *mut AX_ENGINE_NPU_ATTR_T) -> AX_S32 {
        (self.AX_ENGINE_Init)(pNpuAttr)
    }

    pub unsafe fn AX_ENGINE_Deinit(&self) -> AX_S32 {
        (self.AX_ENGINE_Deinit)()
    }

    pub unsafe fn AX_ENGINE_GetVersion(&self) -> *const AX_CHAR {
        (self.AX_ENGINE_GetVersion)()
    }

    pub unsafe fn AX_ENGINE_CreateHandle(
        &self,
        pHandle: *mut AX_ENGINE_HANDLE,
        pData: *const AX_VOID,
        nDataSize: AX_U32,
    ) -> AX_S32 {
        (self.AX_ENGINE_CreateHandle)(pHandle, pData, nDataSize)
    }

    pub unsafe fn AX_ENGINE_CreateContext(&self, handle: AX_ENGINE_HANDLE) -> AX_S32 {
        (self.AX_ENGINE_CreateContext)(handle)
    }

    pub unsafe fn AX_ENGINE_GetIOInfo(
        &self,
        handle: AX_ENGINE_HANDLE,
        pIO: *mut *mut AX_ENGINE_IO_INFO_T,
    ) -> AX_S32 {
        (self.AX_ENGINE_GetIOInfo)(handle, pIO)
    }

    pub unsafe fn AX_ENGINE_RunSync(
        &self,
        handle: AX_ENGINE_HANDLE,
        pIO: *mut AX_ENGINE_IO_T,
    ) -> AX_S32 {
        (self.AX_ENGINE_RunSync)(handle, pIO)
    }

    pub unsafe fn AX_ENGINE_DestroyHandle(&self, handle: AX_ENGINE_HANDLE) -> AX_S32 {
        (self.AX_ENGINE_DestroyHandle)(handle)
    }
}

/// Dynamically loaded `libax_sys.so`.
pub struct ax_sys {
    __library: libloading::Library,
    pub AX_SYS_Init: unsafe extern "C" fn() -> AX_S32,
    pub AX_SYS_Deinit: unsafe extern "C" fn() -> AX_S32,
    pub AX_SYS_MemAlloc: unsafe extern "C" fn(
        phyaddr: *mut AX_U64,
        pviraddr: *mut *mut AX_VOID,
        size: AX_U32,
        align: AX_U32,
        token: *const AX_S8,
    ) -> AX_S32,
    pub AX_SYS_MemAllocCached: unsafe extern "C" fn(
        phyaddr: *mut AX_U64,
        pviraddr: *mut *mut AX_VOID,
        size: AX_U32,
        align: AX_U32,
        token: *const AX_S8,
    ) -> AX_S32,
    pub AX_SYS_MemFree: unsafe extern "C" fn(phyaddr: AX_U64, pviraddr: *mut AX_VOID) -> AX_S32,
    pub AX_SYS_MinvalidateCache:
        unsafe extern "C" fn(phyaddr: AX_U64, pviraddr: *mut AX_VOID, size: AX_U32) -> AX_S32,
}

impl ax_sys {
    pub unsafe fn new<P: AsRef<OsStr>>(path: P) -> Result<Self, libloading::Error> {
        let library = libloading::Library::new(path)?;
        Self::from_library(library)
    }

    pub unsafe fn from_library<L>(library: L) -> Result<Self, libloading::Error>
    where
        L: Into<libloading::Library>,
    {
        let __library = library.into();
        let AX_SYS_Init = __library.get(b"AX_SYS_Init\0").map(|sym| *sym)?;
        let AX_SYS_Deinit = __library.get(b"AX_SYS_Deinit\0").map(|sym| *sym)?;
        let AX_SYS_MemAlloc = __library.get(b"AX_SYS_MemAlloc\0").map(|sym| *sym)?;
        let AX_SYS_MemAllocCached = __library.get(b"AX_SYS_MemAllocCached\0").map(|sym| *sym)?;
        let AX_SYS_MemFree = __library.get(b"AX_SYS_MemFree\0").map(|sym| *sym)?;
        let AX_SYS_MinvalidateCache = __library
            .get(b"AX_SYS_MinvalidateCache\0")
            .map(|sym| *sym)?;
        Ok(ax_sys {
            __library,
            AX_SYS_Init,
            AX_SYS_Deinit,
            AX_SYS_MemAlloc,
            AX_SYS_MemAllocCached,
            AX_SYS_MemFree,
            AX_SYS_MinvalidateCache,
        })
    }

    pub unsafe fn AX_SYS_Init(&self) -> AX_S32 {
        (self.AX_SYS_Init)()
    }

    pub unsafe fn AX_SYS_Deinit(&self) -> AX_S32 {
        (self.AX_SYS_Deinit)()
    }

    pub unsafe fn AX_SYS_MemAlloc(
        &self,
        phyaddr: *mut AX_U64,
        pviraddr: *mut *mut AX_VOID,
        size: AX_U32,
        align: AX_U32,
        token: *const AX_S8,
    ) -> AX_S32 {
        (self.AX_SYS_MemAlloc)(phyaddr, pviraddr, size, align, token)
    }

    pub unsafe fn AX_SYS_MemAllocCached(
        &self,
        phyaddr: *mut AX_U64,
        pviraddr: *mut *mut AX_VOID,
        size: AX_U32,
        align: AX_U32,
        token: *const AX_S8,
    ) -> AX_S32 {
        (self.AX_SYS_MemAllocCached)(phyaddr, pviraddr, size, align, token)
    }

    pub unsafe fn AX_SYS_MemFree(&self, phyaddr: AX_U64, pviraddr: *mut AX_VOID) -> AX_S32 {
        (self.AX_SYS_MemFree)(phyaddr, pviraddr)
    }

    pub unsafe fn AX_SYS_MinvalidateCache(
        &self,
        phyaddr: AX_U64,
        pviraddr: *mut AX_VOID,
        size: AX_U32,
    ) -> AX_S32 {
        (self.AX_SYS_MinvalidateCache)(phyaddr, pviraddr, size)
    }
}

/// Reads the engine version string, if the library reports one.
pub fn engine_version(lib: &ax_engine) -> Option<String> {
    let version = unsafe { lib.AX_ENGINE_GetVersion() };
    if version.is_null() {
        return None;
    }
    Some(
        unsafe { CStr::from_ptr(version) }
            .to_string_lossy()
            .into_owned(),
    )
}
