//! Elementwise operators.
//!
//! Every operator funnels into one of four dispatch cores: unary and binary
//! maps into a fresh array, and their in-place variants that write back
//! into the left operand. Operator traits return `Result` because each call
//! compiles (on first use) and launches a device kernel.

use std::ops::{Add, BitAnd, BitOr, BitXor, Div, Mul, Neg, Not, Rem, Shl, Shr, Sub};

use super::DeviceArray;
use crate::backend::KernelArg;
use crate::dtype::{BitwiseElement, Element, IntegerElement, NotElement, NumericElement};
use crate::error::Result;
use crate::ops::Operation;
use crate::renderer::KernelSignature;

impl<T: Element> DeviceArray<T> {
    /// `out[i] = op(self[i])` into a new array.
    pub(crate) fn map_unary<R: Element>(&self, op: Operation) -> Result<DeviceArray<R>> {
        let input = self.buffer_for(op.name())?;
        let out = DeviceArray::<R>::new_in(&self.runtime).alloc_elems(self.len)?;
        self.runtime.launch(
            &KernelSignature::unary(op, T::SCALAR_TYPE, R::SCALAR_TYPE),
            &[
                KernelArg::Buffer(input),
                KernelArg::Buffer(out.as_ref()),
                KernelArg::Ulong(self.len as u64),
            ],
            self.len,
        )?;
        Ok(DeviceArray::from_parts(&self.runtime, out, self.len))
    }

    /// `out[i] = op(self[i], other[i])` into a new array.
    pub(crate) fn map_binary<R: Element>(&self, other: &Self, op: Operation) -> Result<DeviceArray<R>> {
        self.check_operand(other, op.name())?;
        let out = DeviceArray::<R>::new_in(&self.runtime).alloc_elems(self.len)?;
        self.runtime.launch(
            &KernelSignature::binary(op, T::SCALAR_TYPE, T::SCALAR_TYPE, R::SCALAR_TYPE),
            &[
                KernelArg::Buffer(self.buffer_for(op.name())?),
                KernelArg::Buffer(other.buffer_for(op.name())?),
                KernelArg::Buffer(out.as_ref()),
                KernelArg::Ulong(self.len as u64),
            ],
            self.len,
        )?;
        Ok(DeviceArray::from_parts(&self.runtime, out, self.len))
    }

    /// `self[i] = op(self[i])`
    pub(crate) fn apply_unary(&mut self, op: Operation) -> Result<()> {
        let buffer = self.buffer_for(op.name())?;
        self.runtime.launch(
            &KernelSignature::unary(op, T::SCALAR_TYPE, T::SCALAR_TYPE),
            &[
                KernelArg::Buffer(buffer),
                KernelArg::Buffer(buffer),
                KernelArg::Ulong(self.len as u64),
            ],
            self.len,
        )
    }

    /// `self[i] = op(self[i], other[i])`
    pub(crate) fn apply_binary(&mut self, other: &Self, op: Operation) -> Result<()> {
        self.check_operand(other, op.name())?;
        let buffer = self.buffer_for(op.name())?;
        self.runtime.launch(
            &KernelSignature::binary(op, T::SCALAR_TYPE, T::SCALAR_TYPE, T::SCALAR_TYPE),
            &[
                KernelArg::Buffer(buffer),
                KernelArg::Buffer(other.buffer_for(op.name())?),
                KernelArg::Buffer(buffer),
                KernelArg::Ulong(self.len as u64),
            ],
            self.len,
        )
    }

    /// Elementwise `==`.
    pub fn equal(&self, other: &Self) -> Result<DeviceArray<bool>> {
        self.map_binary(other, Operation::Equals)
    }

    /// Elementwise `!=`.
    pub fn not_equal(&self, other: &Self) -> Result<DeviceArray<bool>> {
        self.map_binary(other, Operation::NotEquals)
    }

    /// Elementwise `&&` with C truthiness.
    pub fn logical_and(&self, other: &Self) -> Result<DeviceArray<bool>> {
        self.map_binary(other, Operation::LogicalAnd)
    }

    /// Elementwise `||` with C truthiness.
    pub fn logical_or(&self, other: &Self) -> Result<DeviceArray<bool>> {
        self.map_binary(other, Operation::LogicalOr)
    }

    /// `true` where the element is zero.
    pub fn logical_not(&self) -> Result<DeviceArray<bool>> {
        self.map_unary(Operation::LogicalNot)
    }
}

impl<T: NumericElement> DeviceArray<T> {
    pub fn greater(&self, other: &Self) -> Result<DeviceArray<bool>> {
        self.map_binary(other, Operation::Greater)
    }

    pub fn less(&self, other: &Self) -> Result<DeviceArray<bool>> {
        self.map_binary(other, Operation::Lesser)
    }

    pub fn greater_equal(&self, other: &Self) -> Result<DeviceArray<bool>> {
        self.map_binary(other, Operation::GreaterEqual)
    }

    pub fn less_equal(&self, other: &Self) -> Result<DeviceArray<bool>> {
        self.map_binary(other, Operation::LesserEqual)
    }

    pub fn add_assign(&mut self, other: &Self) -> Result<()> {
        self.apply_binary(other, Operation::Plus)
    }

    pub fn sub_assign(&mut self, other: &Self) -> Result<()> {
        self.apply_binary(other, Operation::Minus)
    }

    pub fn mul_assign(&mut self, other: &Self) -> Result<()> {
        self.apply_binary(other, Operation::Times)
    }

    pub fn div_assign(&mut self, other: &Self) -> Result<()> {
        self.apply_binary(other, Operation::Divide)
    }

    /// Adds one to every element in place.
    pub fn increment(&mut self) -> Result<()> {
        self.apply_unary(Operation::Increment)
    }

    pub fn decrement(&mut self) -> Result<()> {
        self.apply_unary(Operation::Decrement)
    }

    /// Increments in place and returns the previous contents.
    pub fn post_increment(&mut self) -> Result<Self> {
        let previous = self.try_clone()?;
        self.increment()?;
        Ok(previous)
    }

    /// Decrements in place and returns the previous contents.
    pub fn post_decrement(&mut self) -> Result<Self> {
        let previous = self.try_clone()?;
        self.decrement()?;
        Ok(previous)
    }
}

impl<T: IntegerElement> DeviceArray<T> {
    pub fn rem_assign(&mut self, other: &Self) -> Result<()> {
        self.apply_binary(other, Operation::Mod)
    }

    pub fn shl_assign(&mut self, other: &Self) -> Result<()> {
        self.apply_binary(other, Operation::LeftShift)
    }

    pub fn shr_assign(&mut self, other: &Self) -> Result<()> {
        self.apply_binary(other, Operation::RightShift)
    }
}

impl<T: BitwiseElement> DeviceArray<T> {
    pub fn bitand_assign(&mut self, other: &Self) -> Result<()> {
        self.apply_binary(other, Operation::BitwiseAnd)
    }

    pub fn bitor_assign(&mut self, other: &Self) -> Result<()> {
        self.apply_binary(other, Operation::BitwiseOr)
    }

    pub fn bitxor_assign(&mut self, other: &Self) -> Result<()> {
        self.apply_binary(other, Operation::BitwiseXor)
    }
}

impl DeviceArray<bool> {
    /// Ternary select: `out[i] = self[i] ? if_true[i] : if_false[i]`.
    pub fn choose<T: Element>(&self, if_true: &DeviceArray<T>, if_false: &DeviceArray<T>) -> Result<DeviceArray<T>> {
        const OP: &str = "choose";
        self.check_operand(if_true, OP)?;
        self.check_operand(if_false, OP)?;
        let out = if_true.alloc_elems(self.len)?;
        self.runtime.launch(
            &KernelSignature::select(T::SCALAR_TYPE),
            &[
                KernelArg::Buffer(self.buffer_for(OP)?),
                KernelArg::Buffer(if_true.buffer_for(OP)?),
                KernelArg::Buffer(if_false.buffer_for(OP)?),
                KernelArg::Buffer(out.as_ref()),
                KernelArg::Ulong(self.len as u64),
            ],
            self.len,
        )?;
        Ok(DeviceArray::from_parts(&self.runtime, out, self.len))
    }
}

/// Implements a binary operator for every combination of owned and borrowed
/// operands. An owned left operand is updated in place and returned.
macro_rules! impl_binary_operator {
    ($Trait:ident, $method:ident, $bound:ident, $op:expr) => {
        impl<T: $bound> $Trait<&DeviceArray<T>> for &DeviceArray<T> {
            type Output = Result<DeviceArray<T>>;

            fn $method(self, rhs: &DeviceArray<T>) -> Self::Output {
                self.map_binary(rhs, $op)
            }
        }

        impl<T: $bound> $Trait<DeviceArray<T>> for &DeviceArray<T> {
            type Output = Result<DeviceArray<T>>;

            fn $method(self, rhs: DeviceArray<T>) -> Self::Output {
                self.map_binary(&rhs, $op)
            }
        }

        impl<T: $bound> $Trait<&DeviceArray<T>> for DeviceArray<T> {
            type Output = Result<DeviceArray<T>>;

            fn $method(mut self, rhs: &DeviceArray<T>) -> Self::Output {
                self.apply_binary(rhs, $op)?;
                Ok(self)
            }
        }

        impl<T: $bound> $Trait<DeviceArray<T>> for DeviceArray<T> {
            type Output = Result<DeviceArray<T>>;

            fn $method(mut self, rhs: DeviceArray<T>) -> Self::Output {
                self.apply_binary(&rhs, $op)?;
                Ok(self)
            }
        }
    };
}

impl_binary_operator!(Add, add, NumericElement, Operation::Plus);
impl_binary_operator!(Sub, sub, NumericElement, Operation::Minus);
impl_binary_operator!(Mul, mul, NumericElement, Operation::Times);
impl_binary_operator!(Div, div, NumericElement, Operation::Divide);
impl_binary_operator!(Rem, rem, IntegerElement, Operation::Mod);
impl_binary_operator!(Shl, shl, IntegerElement, Operation::LeftShift);
impl_binary_operator!(Shr, shr, IntegerElement, Operation::RightShift);
impl_binary_operator!(BitAnd, bitand, BitwiseElement, Operation::BitwiseAnd);
impl_binary_operator!(BitOr, bitor, BitwiseElement, Operation::BitwiseOr);
impl_binary_operator!(BitXor, bitxor, BitwiseElement, Operation::BitwiseXor);

impl<T: NumericElement> Neg for &DeviceArray<T> {
    type Output = Result<DeviceArray<T>>;

    fn neg(self) -> Self::Output {
        self.map_unary(Operation::Negate)
    }
}

impl<T: NumericElement> Neg for DeviceArray<T> {
    type Output = Result<DeviceArray<T>>;

    fn neg(mut self) -> Self::Output {
        self.apply_unary(Operation::Negate)?;
        Ok(self)
    }
}

impl<T: NotElement> Not for &DeviceArray<T> {
    type Output = Result<DeviceArray<T>>;

    fn not(self) -> Self::Output {
        self.map_unary(T::NOT_OP)
    }
}

impl<T: NotElement> Not for DeviceArray<T> {
    type Output = Result<DeviceArray<T>>;

    fn not(mut self) -> Self::Output {
        self.apply_unary(T::NOT_OP)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::runtime::Runtime;

    #[test]
    fn test_add_then_subtract() {
        let runtime = Runtime::host();
        let a = DeviceArray::from_slice_in(&runtime, &[1i32, -2, 3]).unwrap();
        let b = DeviceArray::from_slice_in(&runtime, &[10i32, 20, 30]).unwrap();
        let sum = (&a + &b).unwrap();
        assert_eq!(sum.to_vec().unwrap(), [11, 18, 33]);
        let back = (sum - &b).unwrap();
        assert_eq!(back.to_vec().unwrap(), a.to_vec().unwrap());
    }

    #[test]
    fn test_size_mismatch_launches_nothing() {
        let runtime = Runtime::host();
        let a = DeviceArray::from_slice_in(&runtime, &[1u8, 2, 3, 4]).unwrap();
        let b = DeviceArray::from_slice_in(&runtime, &[1u8, 2, 3]).unwrap();
        let result = &a * &b;
        assert!(matches!(
            result,
            Err(Error::SizeMismatch {
                op: "times",
                expected: 4,
                actual: 3
            })
        ));
        assert_eq!(runtime.cached_kernels(), 0);
    }

    #[test]
    fn test_uninitialized_operand() {
        let runtime = Runtime::host();
        let a = DeviceArray::from_slice_in(&runtime, &[1.0f32]).unwrap();
        let b = DeviceArray::<f32>::new_in(&runtime);
        assert!(matches!(
            &a + &b,
            Err(Error::UninitializedArray { op: "plus" })
        ));
        assert!(matches!(-&b, Err(Error::UninitializedArray { op: "negate" })));
    }

    #[test]
    fn test_not_dispatches_by_type() {
        let runtime = Runtime::host();
        let flags = DeviceArray::from_slice_in(&runtime, &[true, false]).unwrap();
        assert_eq!((!&flags).unwrap().to_vec().unwrap(), [false, true]);

        let bits = DeviceArray::from_slice_in(&runtime, &[0u8, 0x0f]).unwrap();
        assert_eq!((!bits).unwrap().to_vec().unwrap(), [0xff, 0xf0]);
    }

    #[test]
    fn test_post_increment_returns_previous() {
        let runtime = Runtime::host();
        let mut counters = DeviceArray::from_slice_in(&runtime, &[0i16, 41]).unwrap();
        let previous = counters.post_increment().unwrap();
        assert_eq!(previous.to_vec().unwrap(), [0, 41]);
        assert_eq!(counters.to_vec().unwrap(), [1, 42]);

        counters.decrement().unwrap();
        assert_eq!(counters.to_vec().unwrap(), [0, 41]);
    }

    #[test]
    fn test_choose() {
        let runtime = Runtime::host();
        let pred = DeviceArray::from_slice_in(&runtime, &[true, false]).unwrap();
        let a = DeviceArray::from_slice_in(&runtime, &[1i32, 2]).unwrap();
        let b = DeviceArray::from_slice_in(&runtime, &[3i32, 4]).unwrap();
        assert_eq!(pred.choose(&a, &b).unwrap().to_vec().unwrap(), [1, 4]);
    }

    #[test]
    fn test_same_signature_compiles_once() {
        let runtime = Runtime::host();
        let a = DeviceArray::from_slice_in(&runtime, &[1u32, 2]).unwrap();
        let b = DeviceArray::from_slice_in(&runtime, &[3u32, 4]).unwrap();
        let _ = (&a + &b).unwrap();
        let _ = (&b + &a).unwrap();
        assert_eq!(runtime.cached_kernels(), 1);

        let _ = a.greater(&b).unwrap();
        assert_eq!(runtime.cached_kernels(), 2);
    }
}
