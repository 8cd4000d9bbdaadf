//! OpenCL backend built on the `ocl` crate.

mod buffer;
mod device;
mod kernel;

pub use buffer::OpenCLBuffer;
pub use device::OpenCLDevice;
pub use kernel::OpenCLProgram;
