//! OpenCL device buffer

use std::any::Any;

use ocl::{Buffer as OclBuffer, Queue, flags};

use crate::backend::Buffer;
use crate::error::{Error, Result};

/// Byte-addressed OpenCL buffer.
pub struct OpenCLBuffer {
    buffer: OclBuffer<u8>,
    queue: Queue,
}

impl OpenCLBuffer {
    pub(crate) fn allocate(queue: &Queue, byte_len: usize) -> Result<Self> {
        let buffer = OclBuffer::<u8>::builder()
            .queue(queue.clone())
            .flags(flags::MEM_READ_WRITE)
            .len(byte_len)
            .build()
            .map_err(|e| Error::BufferAllocation(e.to_string()))?;

        Ok(Self {
            buffer,
            queue: queue.clone(),
        })
    }

    /// Get the underlying OpenCL buffer
    pub fn ocl_buffer(&self) -> &OclBuffer<u8> {
        &self.buffer
    }

    fn check_range(&self, offset: usize, len: usize, what: &str) -> Result<()> {
        match offset.checked_add(len) {
            Some(end) if end <= self.buffer.len() => Ok(()),
            _ => Err(Error::Transfer(format!(
                "{what} of {len} bytes at offset {offset} exceeds buffer of {} bytes",
                self.buffer.len()
            ))),
        }
    }
}

impl Buffer for OpenCLBuffer {
    fn byte_len(&self) -> usize {
        self.buffer.len()
    }

    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        self.check_range(offset, dst.len(), "read")?;
        if dst.is_empty() {
            return Ok(());
        }
        self.buffer
            .read(dst)
            .offset(offset)
            .enq()
            .and_then(|_| self.queue.finish())
            .map_err(|e| Error::Transfer(e.to_string()))
    }

    fn write(&self, offset: usize, src: &[u8]) -> Result<()> {
        self.check_range(offset, src.len(), "write")?;
        if src.is_empty() {
            return Ok(());
        }
        self.buffer
            .write(src)
            .offset(offset)
            .enq()
            .and_then(|_| self.queue.finish())
            .map_err(|e| Error::Transfer(e.to_string()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

// OpenCL buffers are safe to send between threads
unsafe impl Send for OpenCLBuffer {}
unsafe impl Sync for OpenCLBuffer {}
