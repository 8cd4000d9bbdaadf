//! Error types for device array operations.

use thiserror::Error;

/// Failure kinds surfaced by arrays, kernels and backends.
#[derive(Debug, Error)]
pub enum Error {
    /// An operation touched an array that owns no device buffer
    #[error("{op}: array is not initialized")]
    UninitializedArray { op: &'static str },

    /// Operand lengths differ
    #[error("{op}: size mismatch, expected {expected} elements, got {actual}")]
    SizeMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Operands live on different runtimes
    #[error("{op}: operands belong to different runtimes")]
    RuntimeMismatch { op: &'static str },

    /// Checked access beyond the logical length
    #[error("index {index} out of range for array of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    /// Element type outside the supported set
    #[error("unsupported element type: {0}")]
    UnsupportedType(String),

    /// Kernel source failed to build
    #[error("failed to compile kernel '{entry}': {log}")]
    Compilation { entry: String, log: String },

    #[error("buffer allocation failed: {0}")]
    BufferAllocation(String),

    #[error("buffer fill failed: {0}")]
    BufferFill(String),

    /// Host <-> device copy failed
    #[error("buffer transfer failed: {0}")]
    Transfer(String),

    #[error("failed to launch kernel '{entry}': {message}")]
    Launch { entry: String, message: String },

    /// No device of the requested class could be opened
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
