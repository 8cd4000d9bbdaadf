//! Element types and their OpenCL C descriptors.
//!
//! The set of element types is closed: [`Element`] is sealed and implemented
//! for `bool`, the signed and unsigned integers of width 8/16/32/64 and `f32`.
//! Capability sub-traits gate which operators an element type supports.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ops::Operation;

/// Scalar type descriptor used when rendering kernel source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ScalarType {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
}

impl ScalarType {
    pub const ALL: [ScalarType; 10] = [
        ScalarType::Bool,
        ScalarType::I8,
        ScalarType::U8,
        ScalarType::I16,
        ScalarType::U16,
        ScalarType::I32,
        ScalarType::U32,
        ScalarType::I64,
        ScalarType::U64,
        ScalarType::F32,
    ];

    /// Size of one element in device memory.
    pub const fn size_bytes(self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::I8 | ScalarType::U8 => 1,
            ScalarType::I16 | ScalarType::U16 => 2,
            ScalarType::I32 | ScalarType::U32 | ScalarType::F32 => 4,
            ScalarType::I64 | ScalarType::U64 => 8,
        }
    }

    /// OpenCL C spelling of the type.
    ///
    /// `bool` is stored as `uchar`: OpenCL does not allow `bool` in kernel
    /// argument pointers, and comparison results are written as 0/1.
    pub const fn cl_name(self) -> &'static str {
        match self {
            ScalarType::Bool => "uchar",
            ScalarType::I8 => "char",
            ScalarType::U8 => "uchar",
            ScalarType::I16 => "short",
            ScalarType::U16 => "ushort",
            ScalarType::I32 => "int",
            ScalarType::U32 => "uint",
            ScalarType::I64 => "long",
            ScalarType::U64 => "ulong",
            ScalarType::F32 => "float",
        }
    }

    /// Short tag used in kernel entry names. Unlike [`cl_name`](Self::cl_name)
    /// it distinguishes `bool` from `u8`.
    pub fn tag(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::I8 => "i8",
            ScalarType::U8 => "u8",
            ScalarType::I16 => "i16",
            ScalarType::U16 => "u16",
            ScalarType::I32 => "i32",
            ScalarType::U32 => "u32",
            ScalarType::I64 => "i64",
            ScalarType::U64 => "u64",
            ScalarType::F32 => "f32",
        }
    }

    /// Resolves an OpenCL C type name. `uchar` resolves to `U8`.
    pub fn from_cl_name(name: &str) -> Result<Self> {
        match name.trim() {
            "char" => Ok(ScalarType::I8),
            "uchar" | "unsigned char" => Ok(ScalarType::U8),
            "short" => Ok(ScalarType::I16),
            "ushort" | "unsigned short" => Ok(ScalarType::U16),
            "int" => Ok(ScalarType::I32),
            "uint" | "unsigned int" => Ok(ScalarType::U32),
            "long" => Ok(ScalarType::I64),
            "ulong" | "unsigned long" => Ok(ScalarType::U64),
            "float" => Ok(ScalarType::F32),
            other => Err(Error::UnsupportedType(other.to_string())),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ScalarType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ScalarType::ALL
            .into_iter()
            .find(|ty| ty.tag() == s)
            .ok_or_else(|| Error::UnsupportedType(s.to_string()))
    }
}

mod sealed {
    pub trait Sealed {}
}

/// A type that can be stored in a [`DeviceArray`](crate::DeviceArray).
pub trait Element:
    Copy + Default + PartialEq + fmt::Debug + Send + Sync + sealed::Sealed + 'static
{
    const SCALAR_TYPE: ScalarType;

    /// Writes the device representation into `out` (`out.len() == size`).
    fn encode(self, out: &mut [u8]);

    /// Reads the device representation from the first `size` bytes.
    fn decode(bytes: &[u8]) -> Self;

    /// C truthiness: non-zero is true.
    fn is_truthy(self) -> bool;
}

/// Element types with arithmetic, ordering and reductions.
pub trait NumericElement: Element + PartialOrd {
    const ZERO: Self;
    const ONE: Self;

    /// Addition with device semantics (wraps for integers).
    fn device_add(self, rhs: Self) -> Self;

    /// Multiplication with device semantics (wraps for integers).
    fn device_mul(self, rhs: Self) -> Self;
}

/// Integer element types: remainder, shifts and bitwise complement.
pub trait IntegerElement: NumericElement + BitwiseElement {}

/// Element types supporting `&`, `|` and `^`.
pub trait BitwiseElement: Element {}

/// Element types with a `!` operator: logical not for `bool`, bitwise
/// complement for integers.
pub trait NotElement: Element {
    const NOT_OP: Operation;
}

impl sealed::Sealed for bool {}

impl Element for bool {
    const SCALAR_TYPE: ScalarType = ScalarType::Bool;

    fn encode(self, out: &mut [u8]) {
        out[0] = self as u8;
    }

    fn decode(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    fn is_truthy(self) -> bool {
        self
    }
}

impl BitwiseElement for bool {}

impl NotElement for bool {
    const NOT_OP: Operation = Operation::LogicalNot;
}

macro_rules! impl_integer_element {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Element for $ty {
                const SCALAR_TYPE: ScalarType = ScalarType::$variant;

                fn encode(self, out: &mut [u8]) {
                    out[..size_of::<$ty>()].copy_from_slice(&self.to_ne_bytes());
                }

                fn decode(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..size_of::<$ty>()]);
                    <$ty>::from_ne_bytes(raw)
                }

                fn is_truthy(self) -> bool {
                    self != 0
                }
            }

            impl NumericElement for $ty {
                const ZERO: Self = 0;
                const ONE: Self = 1;

                fn device_add(self, rhs: Self) -> Self {
                    self.wrapping_add(rhs)
                }

                fn device_mul(self, rhs: Self) -> Self {
                    self.wrapping_mul(rhs)
                }
            }

            impl BitwiseElement for $ty {}
            impl IntegerElement for $ty {}

            impl NotElement for $ty {
                const NOT_OP: Operation = Operation::BitwiseNot;
            }
        )*
    };
}

impl_integer_element!(
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
);

impl sealed::Sealed for f32 {}

impl Element for f32 {
    const SCALAR_TYPE: ScalarType = ScalarType::F32;

    fn encode(self, out: &mut [u8]) {
        out[..4].copy_from_slice(&self.to_ne_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&bytes[..4]);
        f32::from_ne_bytes(raw)
    }

    fn is_truthy(self) -> bool {
        self != 0.0
    }
}

impl NumericElement for f32 {
    const ZERO: Self = 0.0;
    const ONE: Self = 1.0;

    fn device_add(self, rhs: Self) -> Self {
        self + rhs
    }

    fn device_mul(self, rhs: Self) -> Self {
        self * rhs
    }
}

/// Encodes host values into their device byte representation.
pub fn encode_slice<T: Element>(values: &[T]) -> Vec<u8> {
    let size = T::SCALAR_TYPE.size_bytes();
    let mut bytes = vec![0u8; values.len() * size];
    for (value, chunk) in values.iter().zip(bytes.chunks_exact_mut(size)) {
        value.encode(chunk);
    }
    bytes
}

/// Decodes device bytes into host values. Trailing partial elements are ignored.
pub fn decode_slice<T: Element>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(T::SCALAR_TYPE.size_bytes())
        .map(T::decode)
        .collect()
}
