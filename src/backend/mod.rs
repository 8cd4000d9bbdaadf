//! Compute backends.
//!
//! A backend provides byte-addressed device buffers, builds rendered kernel
//! source into programs and launches them over a one-dimensional index
//! space. Every call blocks until the device has finished.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::config::DeviceClass;
use crate::error::{Error, Result};
use crate::renderer::{KernelSignature, KernelSource};

pub mod host;
#[cfg(feature = "opencl")]
pub mod opencl;

pub use host::HostDevice;
#[cfg(feature = "opencl")]
pub use opencl::OpenCLDevice;

/// A block of device memory.
///
/// Writes go through `&self`: device memory is shared state that kernels
/// mutate through plain handles.
pub trait Buffer: Send + Sync {
    /// Returns the size in bytes.
    fn byte_len(&self) -> usize;

    /// Copies `dst.len()` bytes starting at `offset` into host memory.
    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<()>;

    /// Copies `src` into the buffer starting at `offset`.
    fn write(&self, offset: usize, src: &[u8]) -> Result<()>;

    /// Returns self as Any for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// A built kernel program with one entry point.
pub trait Program: Send + Sync {
    fn entry(&self) -> &str;

    fn signature(&self) -> &KernelSignature;

    fn as_any(&self) -> &dyn Any;
}

/// Positional kernel argument.
#[derive(Clone, Copy)]
pub enum KernelArg<'a> {
    Buffer(&'a dyn Buffer),
    Ulong(u64),
}

impl fmt::Debug for KernelArg<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelArg::Buffer(buffer) => write!(f, "Buffer({} bytes)", buffer.byte_len()),
            KernelArg::Ulong(value) => write!(f, "Ulong({value})"),
        }
    }
}

pub trait Device: Send + Sync {
    fn class(&self) -> DeviceClass;

    /// Human-readable device name.
    fn name(&self) -> String;

    /// Largest single allocation the device accepts, in bytes.
    fn max_alloc_bytes(&self) -> usize;

    /// Allocates `bytes` of uninitialized memory. Zero-sized requests fail.
    fn alloc(&self, bytes: usize) -> Result<Box<dyn Buffer>>;

    /// Allocates a buffer holding a copy of `data`.
    fn alloc_from(&self, data: &[u8]) -> Result<Box<dyn Buffer>>;

    /// Allocates `bytes` filled with repetitions of `pattern`.
    fn alloc_filled(&self, bytes: usize, pattern: &[u8]) -> Result<Box<dyn Buffer>> {
        if pattern.is_empty() || bytes % pattern.len() != 0 {
            return Err(Error::BufferFill(format!(
                "pattern of {} bytes does not tile {bytes} bytes",
                pattern.len()
            )));
        }
        let data = pattern.repeat(bytes / pattern.len());
        self.alloc_from(&data).map_err(|e| match e {
            Error::Transfer(message) => Error::BufferFill(message),
            other => other,
        })
    }

    /// Builds rendered source into a program. Build failures carry the
    /// compiler log in [`Error::Compilation`].
    fn build(&self, kernel: &KernelSource, options: &str) -> Result<Arc<dyn Program>>;

    /// Runs `program` over `global_size` work items and waits for it.
    /// A zero global size does nothing.
    fn launch(&self, program: &dyn Program, args: &[KernelArg<'_>], global_size: usize)
    -> Result<()>;
}
