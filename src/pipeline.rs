// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

use crate::{
    error::Result,
    frame::{VideoFrame, VideoFrameMut},
    memory::PhysicalMemory,
    postprocess::{DepthRenderer, OverlayConfig},
    runtime::Runtime,
    session::{AlgoParams, EngineSession},
    tensor::IoInfo,
};
use std::{
    path::Path,
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{error, trace};

/// Depth estimation entry point: load a model, run it on video frames and
/// draw the depth overlay into the output frames.
///
/// The `*_status` variants report integer status codes for callers bridging
/// to C: `0` on success, otherwise [`Error::status`](crate::Error::status).
///
/// # Example
///
/// ```no_run
/// use edgefirst_depth::{AxMemory, AxRuntime, DepthPipeline, OverlayConfig};
/// use std::sync::Arc;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let runtime = Arc::new(AxRuntime::new("libax_engine.so")?);
/// let memory = Arc::new(AxMemory::new("libax_sys.so")?);
/// let mut pipeline = DepthPipeline::new(runtime, memory, OverlayConfig::default());
/// pipeline.load("./models/depth_anything.axmodel")?;
/// # Ok(())
/// # }
/// ```
pub struct DepthPipeline {
    session: EngineSession,
    frames: u64,
    last_latency: Duration,
}

impl DepthPipeline {
    pub fn new(
        runtime: Arc<dyn Runtime>,
        memory: Arc<dyn PhysicalMemory>,
        config: OverlayConfig,
    ) -> Self {
        Self {
            session: EngineSession::new(runtime, memory, DepthRenderer::new(config)),
            frames: 0,
            last_latency: Duration::ZERO,
        }
    }

    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.session.load(path).inspect_err(|e| error!("load failed: {}", e))
    }

    pub fn release(&mut self) {
        self.session.release();
    }

    /// Runs the model on `src` and composites the depth overlay into `dst`.
    pub fn inference(&mut self, src: &VideoFrame, dst: &mut VideoFrameMut) -> Result<()> {
        let now = Instant::now();
        self.session
            .infer(src, dst)
            .inspect_err(|e| error!("inference failed: {}", e))?;
        self.last_latency = now.elapsed();
        self.frames += 1;
        trace!("frame {} took {:?}", self.frames, self.last_latency);
        Ok(())
    }

    pub fn load_status<P: AsRef<Path>>(&mut self, path: P) -> i32 {
        match self.load(path) {
            Ok(()) => 0,
            Err(e) => e.status(),
        }
    }

    /// Always succeeds.
    pub fn release_status(&mut self) -> i32 {
        self.release();
        0
    }

    pub fn inference_status(&mut self, src: &VideoFrame, dst: &mut VideoFrameMut) -> i32 {
        match self.inference(src, dst) {
            Ok(()) => 0,
            Err(e) => e.status(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.session.is_loaded()
    }

    pub fn params(&self) -> Option<AlgoParams> {
        self.session.params()
    }

    pub fn io_info(&self) -> Option<&IoInfo> {
        self.session.io_info()
    }

    pub fn session(&self) -> &EngineSession {
        &self.session
    }

    /// Frames successfully processed since creation.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Wall time of the most recent successful inference, including
    /// post-processing.
    pub fn last_latency(&self) -> Duration {
        self.last_latency
    }
}
