// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::{Error, Result},
    frame::{PixelFormat, VideoFrame, VideoFrameMut},
    io::IoBufferSet,
    memory::{PhysicalMemory, StrategyPair},
    postprocess::DepthRenderer,
    runtime::{EngineHandle, Runtime},
    tensor::{DepthView, IoInfo},
};
use std::{path::Path, sync::Arc};
use tracing::{debug, info, instrument, warn};

/// Image geometry the loaded model expects on its first input.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AlgoParams {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

impl AlgoParams {
    /// Derives the input geometry from input 0: width from dimension 2, the
    /// format from the color-space tag and the height from dimension 1
    /// according to the format.
    pub fn from_io_info(info: &IoInfo) -> Result<Self> {
        let input = info
            .inputs
            .first()
            .ok_or_else(|| Error::InvalidShape("model has no inputs".to_string()))?;
        let format = PixelFormat::try_from(input.color_space)?;
        let width = input.dim(2)? as u32;
        let height = format.algo_height(input.dim(1)? as u32);
        Ok(Self {
            width,
            height,
            format,
        })
    }
}

/// Resources of a loaded model. Fields drop in declaration order, so the
/// buffers are freed before the engine handle is destroyed.
struct Loaded {
    io: IoBufferSet,
    info: IoInfo,
    params: AlgoParams,
    short_frame_logged: bool,
    handle: EngineHandle,
}

/// Lifecycle of a single model on the NPU.
///
/// A session starts unloaded. [`load`](Self::load) creates the engine handle
/// and allocates every I/O buffer, [`infer`](Self::infer) runs one frame and
/// [`release`](Self::release) returns to the unloaded state. Only one model
/// is held at a time; callers serialize access through `&mut self`.
pub struct EngineSession {
    runtime: Arc<dyn Runtime>,
    memory: Arc<dyn PhysicalMemory>,
    strategy: StrategyPair,
    renderer: DepthRenderer,
    loaded: Option<Loaded>,
}

impl EngineSession {
    pub fn new(
        runtime: Arc<dyn Runtime>,
        memory: Arc<dyn PhysicalMemory>,
        renderer: DepthRenderer,
    ) -> Self {
        Self {
            runtime,
            memory,
            strategy: StrategyPair::default(),
            renderer,
            loaded: None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    /// Model metadata, once loaded.
    pub fn io_info(&self) -> Option<&IoInfo> {
        self.loaded.as_ref().map(|l| &l.info)
    }

    /// Input geometry, once loaded.
    pub fn params(&self) -> Option<AlgoParams> {
        self.loaded.as_ref().map(|l| l.params)
    }

    /// The I/O buffers, once loaded.
    pub fn buffers(&self) -> Option<&IoBufferSet> {
        self.loaded.as_ref().map(|l| &l.io)
    }

    pub fn renderer(&self) -> &DepthRenderer {
        &self.renderer
    }

    /// Loads the model at `path`. Does nothing if a model is already loaded.
    ///
    /// On failure every resource acquired so far is released and the session
    /// stays unloaded.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        if self.loaded.is_some() {
            debug!("model already loaded");
            return Ok(());
        }

        let path = path.as_ref();
        let model = std::fs::read(path).map_err(|source| Error::ModelRead {
            path: path.to_path_buf(),
            source,
        })?;

        let handle = EngineHandle::create(&self.runtime, &model)?;
        handle.create_context()?;

        let info = handle.io_info()?;
        if info.inputs.is_empty() || info.outputs.is_empty() {
            return Err(Error::InvalidShape(format!(
                "model declares {} inputs and {} outputs",
                info.inputs.len(),
                info.outputs.len()
            )));
        }

        let io = IoBufferSet::prepare(&self.memory, &info, self.strategy)?;
        let params = AlgoParams::from_io_info(&info)?;

        info!(
            "loaded {} model {}x{} with {} inputs and {} outputs",
            params.format,
            params.width,
            params.height,
            info.inputs.len(),
            info.outputs.len()
        );

        self.loaded = Some(Loaded {
            io,
            info,
            params,
            short_frame_logged: false,
            handle,
        });
        Ok(())
    }

    /// Frees the I/O buffers, then destroys the engine handle. Safe to call
    /// when nothing is loaded.
    pub fn release(&mut self) {
        if let Some(loaded) = self.loaded.take() {
            drop(loaded);
            debug!("model released");
        }
    }

    /// Runs one frame: copies `src` into input 0, executes the model and
    /// renders output 0 into `dst`.
    #[instrument(skip_all)]
    pub fn infer(&mut self, src: &VideoFrame, dst: &mut VideoFrameMut) -> Result<()> {
        let loaded = self.loaded.as_mut().ok_or(Error::NotLoaded)?;

        let input = loaded.io.input_mut(0).ok_or(Error::NotLoaded)?;
        let data = src.data();
        let capacity = input.size() as usize;
        if data.len() > capacity {
            return Err(Error::FrameSize {
                need: capacity,
                have: data.len(),
            });
        }
        // NV12 models take fewer frame rows than the tensor holds, so this is
        // reported once per model.
        if data.len() < capacity && !loaded.short_frame_logged {
            warn!(
                "source frame is {} bytes, input buffer holds {}",
                data.len(),
                capacity
            );
            loaded.short_frame_logged = true;
        }
        input.as_slice_mut()[..data.len()].copy_from_slice(data);

        loaded.handle.run_sync(&mut loaded.io)?;

        let output = loaded.io.outputs().first().ok_or(Error::NotLoaded)?;
        if let Err(code) = output.invalidate() {
            warn!("output cache invalidate failed: {:#x}", code);
        }
        let view = DepthView::from_bytes(output.as_slice(), &loaded.info.outputs[0])?;
        self.renderer.render(view, dst)
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        self.release();
    }
}
