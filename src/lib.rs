//! parvec: growable arrays that live in accelerator memory
//!
//! Operators on [`DeviceArray`] render an OpenCL C kernel for the operation
//! and element types involved, compile it once per [`Runtime`] and launch it
//! over one work item per element. Every call blocks until the device is
//! done.
//!
//! # Architecture
//!
//! - **dtype**: element types and their OpenCL C descriptors
//! - **ops**: elementwise operation table
//! - **renderer**: kernel source generation
//! - **cache**: compiled-kernel cache
//! - **backend**: device traits with `host` and `opencl` implementations
//! - **runtime**: device + kernel cache + configuration
//! - **array**: the device array, its operators and algorithms
//!
//! # Feature Flags
//!
//! - `opencl`: OpenCL devices via the `ocl` crate. Without it every runtime
//!   runs on the in-process host device.
//!
//! # Example
//!
//! ```
//! use parvec::prelude::*;
//!
//! let runtime = Runtime::host();
//! let a = DeviceArray::from_slice_in(&runtime, &[1i32, 2, 3])?;
//! let b = DeviceArray::from_elem_in(&runtime, 3, 10)?;
//! let c = (&a + &b)?;
//! assert_eq!(c.to_vec()?, [11, 12, 13]);
//! assert_eq!(c.sum()?, 36);
//! # Ok::<(), parvec::Error>(())
//! ```

pub mod array;
pub mod backend;
pub mod cache;
pub mod config;
pub mod dtype;
pub mod error;
pub mod ops;
pub mod renderer;
pub mod runtime;

pub use array::{DeviceArray, indices, indices_in};
pub use config::{DeviceClass, RuntimeConfig};
pub use dtype::{BitwiseElement, Element, IntegerElement, NotElement, NumericElement, ScalarType};
pub use error::{Error, Result};
pub use ops::Operation;
pub use runtime::Runtime;

/// Prelude module with commonly used types and traits
pub mod prelude {
    pub use crate::array::{DeviceArray, indices, indices_in};
    pub use crate::config::{DeviceClass, RuntimeConfig};
    pub use crate::dtype::{BitwiseElement, Element, IntegerElement, NotElement, NumericElement};
    pub use crate::error::{Error, Result};
    pub use crate::runtime::Runtime;
}
