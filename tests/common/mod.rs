//! Common test utilities for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use parvec::Runtime;

pub const EPSILON: f32 = 1e-4;

/// Initializes test logging and returns a fresh host runtime.
pub fn host_runtime() -> Arc<Runtime> {
    let _ = env_logger::builder().is_test(true).try_init();
    Runtime::host()
}

pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON * a.abs().max(1.0)
}

pub fn vec_approx_eq(a: &[f32], b: &[f32]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(x, y)| approx_eq(*x, *y))
}
