//! Reduction, stream compaction, rotation and index generation.

use std::sync::Arc;

use log::trace;

use super::DeviceArray;
use crate::backend::KernelArg;
use crate::dtype::{Element, NumericElement, decode_slice};
use crate::error::Result;
use crate::ops::Operation;
use crate::renderer::KernelSignature;
use crate::runtime::Runtime;

impl<T: Element> DeviceArray<T> {
    /// Tree reduction with `op`.
    ///
    /// Each pass folds `reduction_factor` elements per work item into the
    /// front of a scratch copy until fewer than `reduction_threshold`
    /// remain; the rest is folded on the host.
    fn reduce(&self, op: Operation, identity: T, fold: impl Fn(T, T) -> T) -> Result<T> {
        let source = self.buffer_for(op.name())?;
        if self.len == 0 {
            return Ok(identity);
        }

        let config = self.runtime.config();
        let factor = config.reduction_factor.max(2);
        let threshold = config.reduction_threshold.max(1);

        let scratch = self.alloc_elems(self.len)?;
        self.copy_elems(source, scratch.as_ref(), self.len)?;

        let sig = KernelSignature::reduce(op, T::SCALAR_TYPE);
        let mut remaining = self.len;
        while remaining >= threshold && remaining > 1 {
            let stride = remaining.div_ceil(factor);
            trace!("{op} pass: {remaining} -> {stride}");
            self.runtime.launch(
                &sig,
                &[
                    KernelArg::Buffer(scratch.as_ref()),
                    KernelArg::Ulong(remaining as u64),
                    KernelArg::Ulong(stride as u64),
                ],
                stride,
            )?;
            remaining = stride;
        }

        let mut bytes = vec![0u8; remaining * T::SCALAR_TYPE.size_bytes()];
        scratch.read(0, &mut bytes)?;
        Ok(decode_slice::<T>(&bytes)
            .into_iter()
            .reduce(fold)
            .unwrap_or(identity))
    }

    /// Keeps the elements whose predicate is `true`.
    ///
    /// The result holds exactly as many elements as there are `true`
    /// predicates, in unspecified order; its capacity equals this array's
    /// length.
    pub fn filter_by(&self, predicate: &DeviceArray<bool>) -> Result<Self> {
        const OP: &str = "filter_by";
        self.check_operand(predicate, OP)?;

        let out = self.alloc_elems(self.len)?;
        let counter = self.runtime.device().alloc_filled(4, &[0])?;
        self.runtime.launch(
            &KernelSignature::compact(T::SCALAR_TYPE),
            &[
                KernelArg::Buffer(self.buffer_for(OP)?),
                KernelArg::Buffer(predicate.buffer_for(OP)?),
                KernelArg::Buffer(out.as_ref()),
                KernelArg::Buffer(counter.as_ref()),
                KernelArg::Ulong(self.len as u64),
            ],
            self.len,
        )?;

        let mut count = [0u8; 4];
        counter.read(0, &mut count)?;
        let kept = u32::decode(&count) as usize;
        Ok(Self::from_parts(&self.runtime, out, kept))
    }

    /// Cyclic shift: element `i` moves to `(i + k) mod len`. Negative `k`
    /// shifts towards the front.
    pub fn rotate_by(&self, k: i64) -> Result<Self> {
        let source = self.buffer_for("rotate_by")?;
        let out = self.alloc_elems(self.len)?;
        if self.len == 0 {
            return Ok(Self::from_parts(&self.runtime, out, 0));
        }

        let shift = k.rem_euclid(self.len as i64) as u64;
        self.runtime.launch(
            &KernelSignature::rotate(T::SCALAR_TYPE),
            &[
                KernelArg::Buffer(source),
                KernelArg::Buffer(out.as_ref()),
                KernelArg::Ulong(shift),
                KernelArg::Ulong(self.len as u64),
            ],
            self.len,
        )?;
        Ok(Self::from_parts(&self.runtime, out, self.len))
    }
}

impl<T: NumericElement> DeviceArray<T> {
    /// Sum of the live elements. Integer sums wrap; float sums may differ
    /// from a sequential sum in the last bits.
    pub fn sum(&self) -> Result<T> {
        self.reduce(Operation::Plus, T::ZERO, T::device_add)
    }

    pub fn product(&self) -> Result<T> {
        self.reduce(Operation::Times, T::ONE, T::device_mul)
    }

    /// `[0, 1, ..., len - 1]` on the process-wide runtime.
    pub fn indices(len: usize) -> Result<Self> {
        indices_in(&Runtime::global(), len)
    }
}

impl DeviceArray<bool> {
    /// Whether every element is `true`. Empty arrays yield `true`.
    pub fn all(&self) -> Result<bool> {
        self.reduce(Operation::LogicalAnd, true, |a, b| a && b)
    }

    /// Whether any element is `true`.
    pub fn any(&self) -> Result<bool> {
        self.reduce(Operation::LogicalOr, false, |a, b| a || b)
    }
}

/// `[0, 1, ..., len - 1]` on the process-wide runtime.
pub fn indices<T: NumericElement>(len: usize) -> Result<DeviceArray<T>> {
    indices_in(&Runtime::global(), len)
}

/// `[0, 1, ..., len - 1]`, each index converted as a C cast to `T` would.
pub fn indices_in<T: NumericElement>(runtime: &Arc<Runtime>, len: usize) -> Result<DeviceArray<T>> {
    let out = DeviceArray::<T>::new_in(runtime).alloc_elems(len)?;
    runtime.launch(
        &KernelSignature::iota(T::SCALAR_TYPE),
        &[KernelArg::Buffer(out.as_ref()), KernelArg::Ulong(len as u64)],
        len,
    )?;
    Ok(DeviceArray::from_parts(runtime, out, len))
}
