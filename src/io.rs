// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Input and output buffer sets for a loaded model.

use crate::{
    error::{Error, Result},
    memory::{BufferStrategy, IoBuffer, PhysicalMemory, StrategyPair},
    tensor::{IoInfo, TensorMeta},
};
use ax_engine_sys::{AX_ENGINE_IO_BUFFER_T, AX_ENGINE_IO_T};
use core::fmt;
use std::sync::Arc;
use tracing::{debug, error};

/// Which side of the model a buffer belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

/// One buffer per declared model input and output.
///
/// Buffers are released newest first: outputs, then inputs. This also holds
/// when [`prepare`](Self::prepare) fails part way, since the partially built
/// set is dropped on the error path.
#[derive(Debug, Default)]
pub struct IoBufferSet {
    inputs: Vec<IoBuffer>,
    outputs: Vec<IoBuffer>,
}

impl IoBufferSet {
    /// Allocates every input, then every output, in declared order.
    ///
    /// A failure on input `i` releases inputs `[0, i)`. A failure on output
    /// `j` releases the complete input set and outputs `[0, j)`.
    pub fn prepare(
        memory: &Arc<dyn PhysicalMemory>,
        info: &IoInfo,
        strategy: StrategyPair,
    ) -> Result<Self> {
        let mut set = IoBufferSet {
            inputs: Vec::with_capacity(info.inputs.len()),
            outputs: Vec::with_capacity(info.outputs.len()),
        };

        for (index, meta) in info.inputs.iter().enumerate() {
            let buf = allocate(memory, meta, Direction::Input, index, strategy.input)?;
            set.inputs.push(buf);
        }

        for (index, meta) in info.outputs.iter().enumerate() {
            let buf = allocate(memory, meta, Direction::Output, index, strategy.output)?;
            set.outputs.push(buf);
        }

        debug!(
            "allocated {} input and {} output buffers",
            set.inputs.len(),
            set.outputs.len()
        );
        Ok(set)
    }

    /// Frees every buffer. Calling it on an empty set does nothing.
    pub fn release(&mut self) {
        while let Some(buf) = self.outputs.pop() {
            drop(buf);
        }
        while let Some(buf) = self.inputs.pop() {
            drop(buf);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    pub fn inputs(&self) -> &[IoBuffer] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[IoBuffer] {
        &self.outputs
    }

    pub fn input_mut(&mut self, index: usize) -> Option<&mut IoBuffer> {
        self.inputs.get_mut(index)
    }

    pub fn output_mut(&mut self, index: usize) -> Option<&mut IoBuffer> {
        self.outputs.get_mut(index)
    }

    /// Buffer descriptors in the layout expected by `AX_ENGINE_RunSync`.
    pub fn descriptors(&self) -> (Vec<AX_ENGINE_IO_BUFFER_T>, Vec<AX_ENGINE_IO_BUFFER_T>) {
        let describe = |buf: &IoBuffer| {
            AX_ENGINE_IO_BUFFER_T::new(buf.phys_addr(), buf.virt_addr(), buf.size())
        };
        (
            self.inputs.iter().map(describe).collect(),
            self.outputs.iter().map(describe).collect(),
        )
    }

    /// Builds the engine I/O descriptor over `inputs` and `outputs`, which
    /// must outlive every use of the returned value.
    pub fn engine_io(
        inputs: &mut [AX_ENGINE_IO_BUFFER_T],
        outputs: &mut [AX_ENGINE_IO_BUFFER_T],
    ) -> AX_ENGINE_IO_T {
        AX_ENGINE_IO_T {
            pInputs: inputs.as_mut_ptr(),
            nInputSize: inputs.len() as u32,
            pOutputs: outputs.as_mut_ptr(),
            nOutputSize: outputs.len() as u32,
            ..Default::default()
        }
    }
}

impl Drop for IoBufferSet {
    fn drop(&mut self) {
        self.release();
    }
}

fn allocate(
    memory: &Arc<dyn PhysicalMemory>,
    meta: &TensorMeta,
    direction: Direction,
    index: usize,
    strategy: BufferStrategy,
) -> Result<IoBuffer> {
    IoBuffer::allocate(memory, meta.size, strategy).map_err(|fail| {
        let err = Error::Allocation {
            direction,
            index,
            size: meta.size,
            phys: fail.phys,
            virt: fail.virt,
            code: fail.code,
        };
        error!("{}", err);
        err
    })
}
