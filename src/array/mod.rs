//! Growable device-resident arrays.
//!
//! A [`DeviceArray`] owns one device buffer of `capacity` elements, of
//! which the first `len` are live. Arrays start uninitialized (no buffer);
//! growth operations allocate lazily, every other operation on an
//! uninitialized array fails with [`Error::UninitializedArray`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use log::trace;

use crate::backend::{Buffer, KernelArg};
use crate::dtype::{Element, decode_slice, encode_slice};
use crate::error::{Error, Result};
use crate::renderer::KernelSignature;
use crate::runtime::Runtime;

mod algorithms;
mod ops;

pub use algorithms::{indices, indices_in};

pub struct DeviceArray<T: Element> {
    buffer: Option<Box<dyn Buffer>>,
    len: usize,
    capacity: usize,
    runtime: Arc<Runtime>,
    _marker: PhantomData<T>,
}

impl<T: Element> DeviceArray<T> {
    const SIZE: usize = T::SCALAR_TYPE.size_bytes();

    /// Uninitialized array on the process-wide runtime.
    pub fn new() -> Self {
        Self::new_in(&Runtime::global())
    }

    /// Uninitialized array on `runtime`.
    pub fn new_in(runtime: &Arc<Runtime>) -> Self {
        Self {
            buffer: None,
            len: 0,
            capacity: 0,
            runtime: Arc::clone(runtime),
            _marker: PhantomData,
        }
    }

    /// `len` zero-valued elements.
    pub fn with_len(len: usize) -> Result<Self> {
        Self::with_len_in(&Runtime::global(), len)
    }

    pub fn with_len_in(runtime: &Arc<Runtime>, len: usize) -> Result<Self> {
        Self::from_elem_in(runtime, len, T::default())
    }

    /// `len` copies of `value`.
    pub fn from_elem(len: usize, value: T) -> Result<Self> {
        Self::from_elem_in(&Runtime::global(), len, value)
    }

    pub fn from_elem_in(runtime: &Arc<Runtime>, len: usize, value: T) -> Result<Self> {
        let mut pattern = vec![0u8; Self::SIZE];
        value.encode(&mut pattern);
        let bytes = Self::physical_bytes(len)?;
        let buffer = runtime.device().alloc_filled(bytes, &pattern)?;
        Ok(Self::from_parts(runtime, buffer, len))
    }

    pub fn from_slice(values: &[T]) -> Result<Self> {
        Self::from_slice_in(&Runtime::global(), values)
    }

    pub fn from_slice_in(runtime: &Arc<Runtime>, values: &[T]) -> Result<Self> {
        if values.is_empty() {
            return Self::with_len_in(runtime, 0);
        }
        let buffer = runtime.device().alloc_from(&encode_slice(values))?;
        Ok(Self::from_parts(runtime, buffer, values.len()))
    }

    pub fn try_from_iter<I: IntoIterator<Item = T>>(iter: I) -> Result<Self> {
        Self::from_iter_in(&Runtime::global(), iter)
    }

    pub fn from_iter_in<I: IntoIterator<Item = T>>(runtime: &Arc<Runtime>, iter: I) -> Result<Self> {
        let values: Vec<T> = iter.into_iter().collect();
        Self::from_slice_in(runtime, &values)
    }

    /// Wraps a freshly allocated buffer holding `len` live elements.
    pub(crate) fn from_parts(runtime: &Arc<Runtime>, buffer: Box<dyn Buffer>, len: usize) -> Self {
        let capacity = buffer.byte_len() / Self::SIZE;
        Self {
            buffer: Some(buffer),
            len,
            capacity,
            runtime: Arc::clone(runtime),
            _marker: PhantomData,
        }
    }

    /// Device copy of the live elements. Cloning an uninitialized array
    /// yields another uninitialized array.
    pub fn try_clone(&self) -> Result<Self> {
        let Some(buffer) = self.buffer.as_deref() else {
            return Ok(Self::new_in(&self.runtime));
        };
        let copy = self.alloc_elems(self.len)?;
        self.copy_elems(buffer, copy.as_ref(), self.len)?;
        Ok(Self::from_parts(&self.runtime, copy, self.len))
    }

    /// Moves the contents out, leaving `self` uninitialized.
    pub fn take(&mut self) -> Self {
        let empty = Self::new_in(&self.runtime);
        std::mem::replace(self, empty)
    }

    /// Replaces the contents with a device copy of `other`, reusing the
    /// existing buffer when it is large enough.
    pub fn copy_from(&mut self, other: &Self) -> Result<()> {
        const OP: &str = "copy_from";
        let src = other.buffer_for(OP)?;
        self.check_runtime(other, OP)?;

        match self.buffer.as_deref() {
            Some(buffer) if self.capacity >= other.len => {
                self.copy_elems(src, buffer, other.len)?;
            }
            _ => {
                let fresh = self.alloc_elems(other.len)?;
                self.copy_elems(src, fresh.as_ref(), other.len)?;
                self.capacity = fresh.byte_len() / Self::SIZE;
                self.buffer = Some(fresh);
            }
        }
        self.len = other.len;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Allocated elements. Zero while uninitialized.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_initialized(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// Largest element count a single allocation can hold on this device.
    pub fn max_size(&self) -> usize {
        self.runtime.device().max_alloc_bytes() / Self::SIZE
    }

    pub fn get(&self, index: usize) -> Result<T> {
        let buffer = self.buffer_for("get")?;
        self.check_index(index)?;
        let mut bytes = vec![0u8; Self::SIZE];
        buffer.read(index * Self::SIZE, &mut bytes)?;
        Ok(T::decode(&bytes))
    }

    pub fn set(&mut self, index: usize, value: T) -> Result<()> {
        let buffer = self.buffer_for("set")?;
        self.check_index(index)?;
        let mut bytes = vec![0u8; Self::SIZE];
        value.encode(&mut bytes);
        buffer.write(index * Self::SIZE, &bytes)
    }

    pub fn front(&self) -> Result<T> {
        self.get(0)
    }

    pub fn back(&self) -> Result<T> {
        self.buffer_for("back")?;
        let last = self
            .len
            .checked_sub(1)
            .ok_or(Error::IndexOutOfRange { index: 0, len: 0 })?;
        self.get(last)
    }

    /// Reads `dst.len()` elements starting at `start`.
    pub fn read_range(&self, start: usize, dst: &mut [T]) -> Result<()> {
        let buffer = self.buffer_for("read_range")?;
        self.check_range(start, dst.len())?;
        let mut bytes = vec![0u8; dst.len() * Self::SIZE];
        buffer.read(start * Self::SIZE, &mut bytes)?;
        for (slot, chunk) in dst.iter_mut().zip(bytes.chunks_exact(Self::SIZE)) {
            *slot = T::decode(chunk);
        }
        Ok(())
    }

    /// Overwrites elements starting at `start` with `src`.
    pub fn write_range(&mut self, start: usize, src: &[T]) -> Result<()> {
        let buffer = self.buffer_for("write_range")?;
        self.check_range(start, src.len())?;
        buffer.write(start * Self::SIZE, &encode_slice(src))
    }

    /// Copies the live elements to the host.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let buffer = self.buffer_for("to_vec")?;
        let mut bytes = vec![0u8; self.len * Self::SIZE];
        buffer.read(0, &mut bytes)?;
        Ok(decode_slice(&bytes))
    }

    /// Grows the allocation to exactly `capacity` elements if it is smaller.
    pub fn reserve(&mut self, capacity: usize) -> Result<()> {
        if capacity > self.capacity {
            self.reallocate(capacity)?;
        }
        Ok(())
    }

    /// Sets the length to `len`. New elements are zero. Shrinking keeps the
    /// allocation; growing past the capacity reallocates to exactly `len`.
    pub fn resize(&mut self, len: usize) -> Result<()> {
        if self.buffer.is_none() || len > self.capacity {
            self.reallocate(len)?;
        }
        if len > self.len {
            let zeros = vec![0u8; (len - self.len) * Self::SIZE];
            self.buffer_for("resize")?.write(self.len * Self::SIZE, &zeros)?;
        }
        self.len = len;
        Ok(())
    }

    /// Appends `value`, doubling the allocation when it is full.
    pub fn push_back(&mut self, value: T) -> Result<()> {
        if self.buffer.is_none() || self.len == self.capacity {
            let grown = (self.capacity * 2).max(self.runtime.config().initial_capacity);
            trace!("push_back grows capacity {} -> {grown}", self.capacity);
            self.reallocate(grown)?;
        }
        let mut bytes = vec![0u8; Self::SIZE];
        value.encode(&mut bytes);
        self.buffer_for("push_back")?.write(self.len * Self::SIZE, &bytes)?;
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the last element.
    pub fn pop_back(&mut self) -> Result<T> {
        self.buffer_for("pop_back")?;
        let value = self.back()?;
        self.len -= 1;
        Ok(value)
    }

    /// Drops every element, keeping the allocation.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Moves the live prefix into a new buffer of `capacity` elements.
    fn reallocate(&mut self, capacity: usize) -> Result<()> {
        let fresh = self.alloc_elems(capacity)?;
        let keep = self.len.min(capacity);
        if let Some(old) = self.buffer.as_deref() {
            self.copy_elems(old, fresh.as_ref(), keep)?;
        }
        self.capacity = fresh.byte_len() / Self::SIZE;
        self.len = keep;
        self.buffer = Some(fresh);
        Ok(())
    }

    fn physical_bytes(elems: usize) -> Result<usize> {
        elems
            .max(1)
            .checked_mul(Self::SIZE)
            .ok_or_else(|| Error::BufferAllocation(format!("{elems} elements overflow usize")))
    }

    /// Uninitialized device memory for `elems` elements (at least one).
    pub(crate) fn alloc_elems(&self, elems: usize) -> Result<Box<dyn Buffer>> {
        self.runtime.device().alloc(Self::physical_bytes(elems)?)
    }

    pub(crate) fn copy_elems(&self, src: &dyn Buffer, dst: &dyn Buffer, elems: usize) -> Result<()> {
        self.runtime.launch(
            &KernelSignature::copy(T::SCALAR_TYPE),
            &[
                KernelArg::Buffer(src),
                KernelArg::Buffer(dst),
                KernelArg::Ulong(elems as u64),
            ],
            elems,
        )
    }

    pub(crate) fn buffer_for(&self, op: &'static str) -> Result<&dyn Buffer> {
        self.buffer
            .as_deref()
            .ok_or(Error::UninitializedArray { op })
    }

    pub(crate) fn check_runtime<U: Element>(&self, other: &DeviceArray<U>, op: &'static str) -> Result<()> {
        if Arc::ptr_eq(&self.runtime, &other.runtime) {
            Ok(())
        } else {
            Err(Error::RuntimeMismatch { op })
        }
    }

    /// Both operands initialized, on the same runtime and of equal length.
    pub(crate) fn check_operand<U: Element>(&self, other: &DeviceArray<U>, op: &'static str) -> Result<()> {
        self.buffer_for(op)?;
        other.buffer_for(op)?;
        self.check_runtime(other, op)?;
        if self.len != other.len {
            return Err(Error::SizeMismatch {
                op,
                expected: self.len,
                actual: other.len,
            });
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index < self.len {
            Ok(())
        } else {
            Err(Error::IndexOutOfRange {
                index,
                len: self.len,
            })
        }
    }

    fn check_range(&self, start: usize, count: usize) -> Result<()> {
        match start.checked_add(count) {
            Some(end) if end <= self.len => Ok(()),
            _ => Err(Error::IndexOutOfRange {
                index: start.saturating_add(count).saturating_sub(1),
                len: self.len,
            }),
        }
    }
}

impl<T: Element> Default for DeviceArray<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> fmt::Debug for DeviceArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceArray")
            .field("type", &T::SCALAR_TYPE)
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("initialized", &self.buffer.is_some())
            .field("device", &self.runtime.class())
            .finish()
    }
}
