//! In-process reference device.
//!
//! Executes kernel signatures directly on the host instead of compiling
//! their source. Scalar semantics follow the generated OpenCL C: integer
//! arithmetic wraps and comparisons produce 0/1. Shifts promote 8- and 16-bit
//! operands to `int` first, so the count is masked to the width of the
//! promoted type and the result is truncated back. Integer division by zero
//! yields 0.
//!
//! Every launch snapshots its inputs before writing outputs, so an output
//! buffer may alias an input.

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, trace};

use super::{Buffer, Device, KernelArg, Program};
use crate::config::DeviceClass;
use crate::dtype::{Element, ScalarType};
use crate::error::{Error, Result};
use crate::ops::{Operation, ResultKind};
use crate::renderer::{KernelKind, KernelSignature, KernelSource};

/// Default allocation ceiling (1 GiB).
const DEFAULT_MAX_ALLOC: usize = 1 << 30;

/// Host-memory buffer.
pub struct HostBuffer {
    data: RwLock<Vec<u8>>,
}

impl HostBuffer {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }
}

impl Buffer for HostBuffer {
    fn byte_len(&self) -> usize {
        self.data.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn read(&self, offset: usize, dst: &mut [u8]) -> Result<()> {
        let data = self.data.read().unwrap_or_else(PoisonError::into_inner);
        let src = offset
            .checked_add(dst.len())
            .and_then(|end| data.get(offset..end))
            .ok_or_else(|| {
                Error::Transfer(format!(
                    "read of {} bytes at offset {offset} exceeds buffer of {} bytes",
                    dst.len(),
                    data.len()
                ))
            })?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn write(&self, offset: usize, src: &[u8]) -> Result<()> {
        let mut data = self.data.write().unwrap_or_else(PoisonError::into_inner);
        let len = data.len();
        let dst = offset
            .checked_add(src.len())
            .and_then(|end| data.get_mut(offset..end))
            .ok_or_else(|| {
                Error::Transfer(format!(
                    "write of {} bytes at offset {offset} exceeds buffer of {len} bytes",
                    src.len()
                ))
            })?;
        dst.copy_from_slice(src);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A signature accepted by the host device.
pub struct HostProgram {
    signature: KernelSignature,
    entry: String,
}

impl Program for HostProgram {
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

pub struct HostDevice {
    max_alloc: usize,
    launches: AtomicUsize,
}

impl HostDevice {
    pub fn new() -> Self {
        Self::with_max_alloc(DEFAULT_MAX_ALLOC)
    }

    /// Creates a device whose allocations are capped at `max_alloc` bytes.
    pub fn with_max_alloc(max_alloc: usize) -> Self {
        Self {
            max_alloc,
            launches: AtomicUsize::new(0),
        }
    }

    /// Number of non-empty launches executed so far.
    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::Relaxed)
    }

    fn check_alloc(&self, bytes: usize) -> Result<()> {
        if bytes == 0 {
            return Err(Error::BufferAllocation(
                "zero-sized buffers are not supported".to_string(),
            ));
        }
        if bytes > self.max_alloc {
            return Err(Error::BufferAllocation(format!(
                "{bytes} bytes exceeds the device limit of {} bytes",
                self.max_alloc
            )));
        }
        Ok(())
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for HostDevice {
    fn class(&self) -> DeviceClass {
        DeviceClass::Host
    }

    fn name(&self) -> String {
        "host".to_string()
    }

    fn max_alloc_bytes(&self) -> usize {
        self.max_alloc
    }

    fn alloc(&self, bytes: usize) -> Result<Box<dyn Buffer>> {
        self.check_alloc(bytes)?;
        Ok(Box::new(HostBuffer::new(vec![0; bytes])))
    }

    fn alloc_from(&self, data: &[u8]) -> Result<Box<dyn Buffer>> {
        self.check_alloc(data.len())?;
        Ok(Box::new(HostBuffer::new(data.to_vec())))
    }

    fn build(&self, kernel: &KernelSource, _options: &str) -> Result<Arc<dyn Program>> {
        check_supported(&kernel.signature).map_err(|log| Error::Compilation {
            entry: kernel.entry.clone(),
            log,
        })?;
        debug!("prepared host kernel {}", kernel.entry);
        Ok(Arc::new(HostProgram {
            signature: kernel.signature.clone(),
            entry: kernel.entry.clone(),
        }))
    }

    fn launch(
        &self,
        program: &dyn Program,
        args: &[KernelArg<'_>],
        global_size: usize,
    ) -> Result<()> {
        if global_size == 0 {
            return Ok(());
        }
        let program = program
            .as_any()
            .downcast_ref::<HostProgram>()
            .ok_or_else(|| Error::Launch {
                entry: program.entry().to_string(),
                message: "program was not built for the host device".to_string(),
            })?;
        trace!("launching {} over {global_size} work items", program.entry);

        let launch = Launch {
            entry: &program.entry,
            args,
        };
        execute(&program.signature, &launch, global_size)?;
        self.launches.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Expands `$body` once per element type with `$T` bound to the Rust type.
macro_rules! with_scalar {
    ($ty:expr, $T:ident => $body:expr) => {
        match $ty {
            ScalarType::Bool => {
                type $T = bool;
                $body
            }
            ScalarType::I8 => {
                type $T = i8;
                $body
            }
            ScalarType::U8 => {
                type $T = u8;
                $body
            }
            ScalarType::I16 => {
                type $T = i16;
                $body
            }
            ScalarType::U16 => {
                type $T = u16;
                $body
            }
            ScalarType::I32 => {
                type $T = i32;
                $body
            }
            ScalarType::U32 => {
                type $T = u32;
                $body
            }
            ScalarType::I64 => {
                type $T = i64;
                $body
            }
            ScalarType::U64 => {
                type $T = u64;
                $body
            }
            ScalarType::F32 => {
                type $T = f32;
                $body
            }
        }
    };
}

fn check_supported(sig: &KernelSignature) -> std::result::Result<(), String> {
    let op = match sig.kind {
        KernelKind::Unary(op) | KernelKind::Binary(op) | KernelKind::Reduce(op) => op,
        _ => return Ok(()),
    };
    let ty = sig.types[0];
    if with_scalar!(ty, T => T::supports(op)) {
        Ok(())
    } else {
        Err(format!("operator {op} is not defined for {}", ty.cl_name()))
    }
}

/// Argument accessor for one launch.
struct Launch<'l, 'a> {
    entry: &'l str,
    args: &'l [KernelArg<'a>],
}

impl<'a> Launch<'_, 'a> {
    fn error(&self, message: String) -> Error {
        Error::Launch {
            entry: self.entry.to_string(),
            message,
        }
    }

    fn buffer(&self, index: usize) -> Result<&'a dyn Buffer> {
        match self.args.get(index) {
            Some(KernelArg::Buffer(buffer)) => Ok(*buffer),
            other => Err(self.error(format!("argument {index}: expected a buffer, got {other:?}"))),
        }
    }

    fn ulong(&self, index: usize) -> Result<u64> {
        match self.args.get(index) {
            Some(KernelArg::Ulong(value)) => Ok(*value),
            other => Err(self.error(format!("argument {index}: expected a ulong, got {other:?}"))),
        }
    }

    fn len(&self, index: usize) -> Result<usize> {
        let value = self.ulong(index)?;
        usize::try_from(value).map_err(|_| self.error(format!("argument {index}: {value} overflows usize")))
    }

    /// Reads the first `count` elements of `size` bytes from argument `index`.
    fn snapshot(&self, index: usize, count: usize, size: usize) -> Result<Vec<u8>> {
        let buffer = self.buffer(index)?;
        let bytes = count * size;
        if buffer.byte_len() < bytes {
            return Err(self.error(format!(
                "argument {index}: buffer of {} bytes is smaller than {bytes} bytes",
                buffer.byte_len()
            )));
        }
        let mut data = vec![0u8; bytes];
        buffer.read(0, &mut data)?;
        Ok(data)
    }

    fn store(&self, index: usize, offset: usize, data: &[u8]) -> Result<()> {
        self.buffer(index)?
            .write(offset, data)
            .map_err(|e| self.error(e.to_string()))
    }
}

fn execute(sig: &KernelSignature, launch: &Launch<'_, '_>, global_size: usize) -> Result<()> {
    match sig.kind {
        KernelKind::Unary(op) => {
            let n = launch.len(2)?.min(global_size);
            let (input, output) = (sig.types[0], sig.types[1]);
            let a = launch.snapshot(0, n, input.size_bytes())?;
            let out = with_scalar!(input, T => map_unary::<T>(op, &a, output))?;
            launch.store(1, 0, &out)
        }
        KernelKind::Binary(op) => {
            let n = launch.len(3)?.min(global_size);
            let (input, output) = (sig.types[0], sig.types[2]);
            let a = launch.snapshot(0, n, input.size_bytes())?;
            let b = launch.snapshot(1, n, input.size_bytes())?;
            let out = with_scalar!(input, T => map_binary::<T>(op, &a, &b, output))?;
            launch.store(2, 0, &out)
        }
        KernelKind::Select => {
            let n = launch.len(4)?.min(global_size);
            let size = sig.types[1].size_bytes();
            let pred = launch.snapshot(0, n, 1)?;
            let a = launch.snapshot(1, n, size)?;
            let b = launch.snapshot(2, n, size)?;
            let mut out = vec![0u8; n * size];
            for (i, chunk) in out.chunks_exact_mut(size).enumerate() {
                let src = if pred[i] != 0 { &a } else { &b };
                chunk.copy_from_slice(&src[i * size..(i + 1) * size]);
            }
            launch.store(3, 0, &out)
        }
        KernelKind::Copy => {
            let n = launch.len(2)?.min(global_size);
            let src = launch.snapshot(0, n, sig.types[0].size_bytes())?;
            launch.store(1, 0, &src)
        }
        KernelKind::Reduce(op) => {
            let remaining = launch.len(1)?;
            let stride = launch.len(2)?.min(global_size);
            let ty = sig.types[0];
            let data = launch.snapshot(0, remaining, ty.size_bytes())?;
            let folded = with_scalar!(ty, T => fold_strided::<T>(op, &data, remaining, stride))?;
            launch.store(0, 0, &folded)
        }
        KernelKind::Compact => {
            let n = launch.len(4)?.min(global_size);
            let size = sig.types[0].size_bytes();
            let src = launch.snapshot(0, n, size)?;
            let pred = launch.snapshot(1, n, 1)?;
            let counter_bytes = launch.snapshot(3, 1, 4)?;
            let mut counter = u32::decode(&counter_bytes);
            for i in (0..n).filter(|&i| pred[i] != 0) {
                let slot = counter as usize;
                launch.store(2, slot * size, &src[i * size..(i + 1) * size])?;
                counter += 1;
            }
            let mut encoded = [0u8; 4];
            counter.encode(&mut encoded);
            launch.store(3, 0, &encoded)
        }
        KernelKind::Rotate => {
            let n = launch.len(3)?.min(global_size);
            let shift = launch.ulong(2)?;
            let size = sig.types[0].size_bytes();
            let src = launch.snapshot(0, n, size)?;
            let mut out = vec![0u8; n * size];
            for i in 0..n {
                let j = ((i as u64 + shift) % n as u64) as usize;
                out[j * size..(j + 1) * size].copy_from_slice(&src[i * size..(i + 1) * size]);
            }
            launch.store(1, 0, &out)
        }
        KernelKind::Iota => {
            let n = launch.len(1)?.min(global_size);
            let ty = sig.types[0];
            let out = with_scalar!(ty, T => iota::<T>(n))?;
            launch.store(0, 0, &out)
        }
    }
}

/// Result of one scalar operation before it is stored.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Value<T> {
    Elem(T),
    Flag(bool),
}

impl<T: HostScalar> Value<T> {
    fn into_elem(self) -> T {
        match self {
            Value::Elem(v) => v,
            Value::Flag(f) => T::from_flag(f),
        }
    }

    fn into_flag(self) -> bool {
        match self {
            Value::Elem(v) => v.is_truthy(),
            Value::Flag(f) => f,
        }
    }

    fn encode_as(self, ty: ScalarType, out: &mut [u8]) {
        if ty == ScalarType::Bool {
            self.into_flag().encode(out);
        } else {
            self.into_elem().encode(out);
        }
    }
}

/// Scalar semantics of the generated kernels, evaluated on the host.
trait HostScalar: Element {
    fn supports(op: Operation) -> bool;

    fn from_flag(flag: bool) -> Self;

    fn from_index(i: u64) -> Self;

    fn unary(op: Operation, a: Self) -> Option<Value<Self>>;

    fn binary(op: Operation, a: Self, b: Self) -> Option<Value<Self>>;
}

/// `$promoted` is the type C integer promotion widens `$ty` to.
macro_rules! impl_host_integer {
    ($($ty:ty => $promoted:ty),* $(,)?) => {
        $(
            impl HostScalar for $ty {
                fn supports(_op: Operation) -> bool {
                    true
                }

                fn from_flag(flag: bool) -> Self {
                    flag as $ty
                }

                fn from_index(i: u64) -> Self {
                    i as $ty
                }

                fn unary(op: Operation, a: Self) -> Option<Value<Self>> {
                    Some(match op {
                        Operation::Negate => Value::Elem(a.wrapping_neg()),
                        Operation::Increment => Value::Elem(a.wrapping_add(1)),
                        Operation::Decrement => Value::Elem(a.wrapping_sub(1)),
                        Operation::LogicalNot => Value::Flag(a == 0),
                        Operation::BitwiseNot => Value::Elem(!a),
                        _ => return None,
                    })
                }

                fn binary(op: Operation, a: Self, b: Self) -> Option<Value<Self>> {
                    Some(match op {
                        Operation::Plus => Value::Elem(a.wrapping_add(b)),
                        Operation::Minus => Value::Elem(a.wrapping_sub(b)),
                        Operation::Times => Value::Elem(a.wrapping_mul(b)),
                        Operation::Divide => Value::Elem(if b == 0 { 0 } else { a.wrapping_div(b) }),
                        Operation::Mod => Value::Elem(if b == 0 { 0 } else { a.wrapping_rem(b) }),
                        Operation::BitwiseAnd => Value::Elem(a & b),
                        Operation::BitwiseOr => Value::Elem(a | b),
                        Operation::BitwiseXor => Value::Elem(a ^ b),
                        Operation::LeftShift => {
                            Value::Elem((a as $promoted).wrapping_shl(b as u32) as $ty)
                        }
                        Operation::RightShift => {
                            Value::Elem((a as $promoted).wrapping_shr(b as u32) as $ty)
                        }
                        _ => return compare(op, a, b),
                    })
                }
            }
        )*
    };
}

impl_host_integer!(
    i8 => i32,
    u8 => i32,
    i16 => i32,
    u16 => i32,
    i32 => i32,
    u32 => u32,
    i64 => i64,
    u64 => u64,
);

impl HostScalar for f32 {
    fn supports(op: Operation) -> bool {
        !matches!(
            op,
            Operation::Mod
                | Operation::BitwiseAnd
                | Operation::BitwiseOr
                | Operation::BitwiseXor
                | Operation::BitwiseNot
                | Operation::LeftShift
                | Operation::RightShift
        )
    }

    fn from_flag(flag: bool) -> Self {
        if flag { 1.0 } else { 0.0 }
    }

    fn from_index(i: u64) -> Self {
        i as f32
    }

    fn unary(op: Operation, a: Self) -> Option<Value<Self>> {
        Some(match op {
            Operation::Negate => Value::Elem(-a),
            Operation::Increment => Value::Elem(a + 1.0),
            Operation::Decrement => Value::Elem(a - 1.0),
            Operation::LogicalNot => Value::Flag(a == 0.0),
            _ => return None,
        })
    }

    fn binary(op: Operation, a: Self, b: Self) -> Option<Value<Self>> {
        Some(match op {
            Operation::Plus => Value::Elem(a + b),
            Operation::Minus => Value::Elem(a - b),
            Operation::Times => Value::Elem(a * b),
            Operation::Divide => Value::Elem(a / b),
            _ => return compare(op, a, b),
        })
    }
}

impl HostScalar for bool {
    fn supports(op: Operation) -> bool {
        match op.result_kind() {
            ResultKind::Bool => true,
            ResultKind::SameAsInput => matches!(
                op,
                Operation::BitwiseAnd | Operation::BitwiseOr | Operation::BitwiseXor
            ),
        }
    }

    fn from_flag(flag: bool) -> Self {
        flag
    }

    fn from_index(i: u64) -> Self {
        i != 0
    }

    fn unary(op: Operation, a: Self) -> Option<Value<Self>> {
        match op {
            Operation::LogicalNot => Some(Value::Flag(!a)),
            _ => None,
        }
    }

    fn binary(op: Operation, a: Self, b: Self) -> Option<Value<Self>> {
        Some(match op {
            Operation::BitwiseAnd => Value::Elem(a & b),
            Operation::BitwiseOr => Value::Elem(a | b),
            Operation::BitwiseXor => Value::Elem(a ^ b),
            _ => return compare(op, a, b),
        })
    }
}

/// Comparison and logical operators shared by every element type.
fn compare<T: Element + PartialOrd>(op: Operation, a: T, b: T) -> Option<Value<T>> {
    let flag = match op {
        Operation::Equals => a == b,
        Operation::NotEquals => a != b,
        Operation::Greater => a > b,
        Operation::Lesser => a < b,
        Operation::GreaterEqual => a >= b,
        Operation::LesserEqual => a <= b,
        Operation::LogicalAnd => a.is_truthy() && b.is_truthy(),
        Operation::LogicalOr => a.is_truthy() || b.is_truthy(),
        _ => return None,
    };
    Some(Value::Flag(flag))
}

fn undefined(op: Operation) -> Error {
    Error::Launch {
        entry: op.name().to_string(),
        message: format!("operator {op} has no host definition for this element type"),
    }
}

fn map_unary<T: HostScalar>(op: Operation, a: &[u8], output: ScalarType) -> Result<Vec<u8>> {
    let size = T::SCALAR_TYPE.size_bytes();
    let out_size = output.size_bytes();
    let mut out = vec![0u8; a.len() / size * out_size];
    for (src, dst) in a.chunks_exact(size).zip(out.chunks_exact_mut(out_size)) {
        let value = T::unary(op, T::decode(src)).ok_or_else(|| undefined(op))?;
        value.encode_as(output, dst);
    }
    Ok(out)
}

fn map_binary<T: HostScalar>(op: Operation, a: &[u8], b: &[u8], output: ScalarType) -> Result<Vec<u8>> {
    let size = T::SCALAR_TYPE.size_bytes();
    let out_size = output.size_bytes();
    let mut out = vec![0u8; a.len() / size * out_size];
    let pairs = a.chunks_exact(size).zip(b.chunks_exact(size));
    for ((lhs, rhs), dst) in pairs.zip(out.chunks_exact_mut(out_size)) {
        let value = T::binary(op, T::decode(lhs), T::decode(rhs)).ok_or_else(|| undefined(op))?;
        value.encode_as(output, dst);
    }
    Ok(out)
}

/// One reduction pass: slot `i < stride` absorbs `i + stride, i + 2*stride, ...`.
fn fold_strided<T: HostScalar>(op: Operation, data: &[u8], remaining: usize, stride: usize) -> Result<Vec<u8>> {
    let mut values: Vec<T> = crate::dtype::decode_slice(data);
    for i in 0..stride.min(remaining) {
        let mut acc = values[i];
        for j in (i + stride..remaining).step_by(stride) {
            acc = T::binary(op, acc, values[j]).ok_or_else(|| undefined(op))?.into_elem();
        }
        values[i] = acc;
    }
    Ok(crate::dtype::encode_slice(&values))
}

fn iota<T: HostScalar>(n: usize) -> Result<Vec<u8>> {
    let values: Vec<T> = (0..n as u64).map(T::from_index).collect();
    Ok(crate::dtype::encode_slice(&values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::{decode_slice, encode_slice};
    use crate::renderer::render;
    use rstest::rstest;

    fn build(device: &HostDevice, sig: KernelSignature) -> Arc<dyn Program> {
        device.build(&render(&sig), "").unwrap()
    }

    fn read_all<T: Element>(buffer: &dyn Buffer, n: usize) -> Vec<T> {
        let mut bytes = vec![0u8; n * T::SCALAR_TYPE.size_bytes()];
        buffer.read(0, &mut bytes).unwrap();
        decode_slice(&bytes)
    }

    #[test]
    fn test_buffer_bounds() {
        let device = HostDevice::new();
        let buffer = device.alloc(8).unwrap();
        buffer.write(4, &[1, 2, 3, 4]).unwrap();
        assert!(matches!(buffer.write(6, &[0; 4]), Err(Error::Transfer(_))));
        let mut out = [0u8; 2];
        buffer.read(5, &mut out).unwrap();
        assert_eq!(out, [2, 3]);
        assert!(matches!(device.alloc(0), Err(Error::BufferAllocation(_))));
    }

    #[test]
    fn test_allocation_limit() {
        let device = HostDevice::with_max_alloc(16);
        assert_eq!(device.max_alloc_bytes(), 16);
        assert!(device.alloc(16).is_ok());
        assert!(matches!(device.alloc(17), Err(Error::BufferAllocation(_))));
    }

    #[rstest]
    #[case(Operation::Plus, [i32::MAX, 5, -3], [1, 7, -4], [i32::MIN, 12, -7])]
    #[case(Operation::Divide, [7, -7, 5], [2, 2, 0], [3, -3, 0])]
    #[case(Operation::Mod, [7, -7, 5], [3, 3, 0], [1, -1, 0])]
    #[case(Operation::LeftShift, [1, 1, 3], [4, 33, 0], [16, 2, 3])]
    #[case(Operation::BitwiseXor, [0b1100, -1, 0], [0b1010, 0, 0], [0b0110, -1, 0])]
    fn test_binary_int(
        #[case] op: Operation,
        #[case] a: [i32; 3],
        #[case] b: [i32; 3],
        #[case] expected: [i32; 3],
    ) {
        let device = HostDevice::new();
        let program = build(&device, KernelSignature::binary(op, ScalarType::I32, ScalarType::I32, ScalarType::I32));
        let a = device.alloc_from(&encode_slice(&a)).unwrap();
        let b = device.alloc_from(&encode_slice(&b)).unwrap();
        let c = device.alloc(12).unwrap();
        device
            .launch(
                program.as_ref(),
                &[
                    KernelArg::Buffer(a.as_ref()),
                    KernelArg::Buffer(b.as_ref()),
                    KernelArg::Buffer(c.as_ref()),
                    KernelArg::Ulong(3),
                ],
                3,
            )
            .unwrap();
        assert_eq!(read_all::<i32>(c.as_ref(), 3), expected);
    }

    fn shift<T: Element>(op: Operation, a: &[T], b: &[T]) -> Vec<T> {
        let ty = T::SCALAR_TYPE;
        let device = HostDevice::new();
        let program = build(&device, KernelSignature::binary(op, ty, ty, ty));
        let lhs = device.alloc_from(&encode_slice(a)).unwrap();
        let rhs = device.alloc_from(&encode_slice(b)).unwrap();
        let out = device.alloc(a.len() * ty.size_bytes()).unwrap();
        let args = [
            KernelArg::Buffer(lhs.as_ref()),
            KernelArg::Buffer(rhs.as_ref()),
            KernelArg::Buffer(out.as_ref()),
            KernelArg::Ulong(a.len() as u64),
        ];
        device.launch(program.as_ref(), &args, a.len()).unwrap();
        read_all(out.as_ref(), a.len())
    }

    #[test]
    fn test_narrow_shifts_promote_to_int() {
        assert_eq!(shift::<u8>(Operation::LeftShift, &[1, 0x80, 3], &[9, 9, 2]), [0, 0, 12]);
        assert_eq!(shift::<u8>(Operation::RightShift, &[0x80, 0xff], &[9, 33]), [0, 0x7f]);
        assert_eq!(shift::<i8>(Operation::RightShift, &[-128, -128], &[9, 1]), [-1, -64]);
        assert_eq!(shift::<i16>(Operation::LeftShift, &[1, 1], &[16, 33]), [0, 2]);
        assert_eq!(shift::<u16>(Operation::RightShift, &[0x8000], &[15]), [1]);
        assert_eq!(shift::<i64>(Operation::LeftShift, &[1], &[33]), [1 << 33]);
    }

    #[test]
    fn test_comparison_writes_flags() {
        let device = HostDevice::new();
        let program = build(
            &device,
            KernelSignature::binary(Operation::GreaterEqual, ScalarType::F32, ScalarType::F32, ScalarType::Bool),
        );
        let a = device.alloc_from(&encode_slice(&[1.0f32, 2.0, 3.0])).unwrap();
        let b = device.alloc_from(&encode_slice(&[2.0f32, 2.0, 2.0])).unwrap();
        let c = device.alloc(3).unwrap();
        let args = [
            KernelArg::Buffer(a.as_ref()),
            KernelArg::Buffer(b.as_ref()),
            KernelArg::Buffer(c.as_ref()),
            KernelArg::Ulong(3),
        ];
        device.launch(program.as_ref(), &args, 3).unwrap();
        assert_eq!(read_all::<bool>(c.as_ref(), 3), [false, true, true]);
    }

    #[test]
    fn test_in_place_unary() {
        let device = HostDevice::new();
        let program = build(&device, KernelSignature::unary(Operation::Increment, ScalarType::U8, ScalarType::U8));
        let a = device.alloc_from(&[0, 254, 255]).unwrap();
        let args = [
            KernelArg::Buffer(a.as_ref()),
            KernelArg::Buffer(a.as_ref()),
            KernelArg::Ulong(3),
        ];
        device.launch(program.as_ref(), &args, 3).unwrap();
        assert_eq!(read_all::<u8>(a.as_ref(), 3), [1, 255, 0]);
    }

    #[test]
    fn test_float_bitwise_fails_to_build() {
        let device = HostDevice::new();
        let sig = KernelSignature::binary(Operation::BitwiseAnd, ScalarType::F32, ScalarType::F32, ScalarType::F32);
        let result = device.build(&render(&sig), "");
        assert!(matches!(result, Err(Error::Compilation { entry, .. }) if entry == sig.entry_name()));
    }

    #[test]
    fn test_reduce_pass() {
        let device = HostDevice::new();
        let program = build(&device, KernelSignature::reduce(Operation::Plus, ScalarType::I64));
        let values: Vec<i64> = (1..=10).collect();
        let data = device.alloc_from(&encode_slice(&values)).unwrap();
        let args = [
            KernelArg::Buffer(data.as_ref()),
            KernelArg::Ulong(10),
            KernelArg::Ulong(4),
        ];
        device.launch(program.as_ref(), &args, 4).unwrap();
        // slot 0: 1+5+9, slot 1: 2+6+10, slot 2: 3+7, slot 3: 4+8
        assert_eq!(read_all::<i64>(data.as_ref(), 4), [15, 18, 10, 12]);
    }

    #[test]
    fn test_compact_counts_predicates() {
        let device = HostDevice::new();
        let program = build(&device, KernelSignature::compact(ScalarType::U16));
        let src = device.alloc_from(&encode_slice(&[10u16, 11, 12, 13])).unwrap();
        let pred = device.alloc_from(&encode_slice(&[true, false, true, true])).unwrap();
        let dst = device.alloc(8).unwrap();
        let counter = device.alloc_filled(4, &[0]).unwrap();
        let args = [
            KernelArg::Buffer(src.as_ref()),
            KernelArg::Buffer(pred.as_ref()),
            KernelArg::Buffer(dst.as_ref()),
            KernelArg::Buffer(counter.as_ref()),
            KernelArg::Ulong(4),
        ];
        device.launch(program.as_ref(), &args, 4).unwrap();
        assert_eq!(read_all::<u32>(counter.as_ref(), 1), [3]);
        assert_eq!(read_all::<u16>(dst.as_ref(), 3), [10, 12, 13]);
    }

    #[test]
    fn test_zero_global_size_is_noop() {
        let device = HostDevice::new();
        let program = build(&device, KernelSignature::iota(ScalarType::I32));
        device.launch(program.as_ref(), &[], 0).unwrap();
        assert_eq!(device.launch_count(), 0);
    }

    #[test]
    fn test_bad_arguments_fail_launch() {
        let device = HostDevice::new();
        let program = build(&device, KernelSignature::iota(ScalarType::I32));
        let result = device.launch(program.as_ref(), &[KernelArg::Ulong(3)], 3);
        assert!(matches!(result, Err(Error::Launch { .. })));
    }
}
