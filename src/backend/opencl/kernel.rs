//! OpenCL program and kernel launch

use std::any::Any;

use log::trace;
use ocl::{Kernel as OclKernel, Program as OclProgram, Queue};

use super::buffer::OpenCLBuffer;
use crate::backend::{KernelArg, Program};
use crate::error::{Error, Result};
use crate::renderer::KernelSignature;

/// A built OpenCL program holding one rendered kernel.
pub struct OpenCLProgram {
    program: OclProgram,
    signature: KernelSignature,
    entry: String,
}

impl OpenCLProgram {
    pub(crate) fn new(program: OclProgram, signature: KernelSignature, entry: String) -> Self {
        Self {
            program,
            signature,
            entry,
        }
    }

    /// Builds a kernel from the program, binds `args` and runs it to completion.
    pub(crate) fn enqueue(&self, queue: &Queue, args: &[KernelArg<'_>], global_size: usize) -> Result<()> {
        let launch_error = |message: String| Error::Launch {
            entry: self.entry.clone(),
            message,
        };

        let mut kernel_builder = OclKernel::builder();
        kernel_builder
            .program(&self.program)
            .name(self.entry.as_str())
            .queue(queue.clone())
            .global_work_size(global_size);

        for (index, arg) in args.iter().enumerate() {
            match arg {
                KernelArg::Buffer(buffer) => {
                    let buffer = buffer
                        .as_any()
                        .downcast_ref::<OpenCLBuffer>()
                        .ok_or_else(|| launch_error(format!("argument {index} is not an OpenCL buffer")))?;
                    kernel_builder.arg(buffer.ocl_buffer());
                }
                KernelArg::Ulong(value) => {
                    kernel_builder.arg(*value);
                }
            }
        }

        let kernel = kernel_builder
            .build()
            .map_err(|e| launch_error(e.to_string()))?;
        trace!("enqueueing {} over {global_size} work items", self.entry);
        unsafe {
            kernel.enq().map_err(|e| launch_error(e.to_string()))?;
        }
        queue.finish().map_err(|e| launch_error(e.to_string()))
    }
}

impl Program for OpenCLProgram {
    fn entry(&self) -> &str {
        &self.entry
    }

    fn signature(&self) -> &KernelSignature {
        &self.signature
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// Safety: OpenCL programs are thread-safe
unsafe impl Send for OpenCLProgram {}
unsafe impl Sync for OpenCLProgram {}
