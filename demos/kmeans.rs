//! Two-centroid k-means over random points in the unit square.
//!
//! Run with: `cargo run --example kmeans [--features opencl]`

use parvec::prelude::*;
use rand::Rng;

const NUM_POINTS: usize = 100_000;
const NUM_ITERATIONS: usize = 10;

/// Squared distance from every point to `(cx, cy)`.
fn squared_distance(
    xs: &DeviceArray<f32>,
    ys: &DeviceArray<f32>,
    cx: f32,
    cy: f32,
) -> Result<DeviceArray<f32>> {
    let cx = DeviceArray::from_elem_in(xs.runtime(), xs.len(), cx)?;
    let cy = DeviceArray::from_elem_in(ys.runtime(), ys.len(), cy)?;
    let dx = (xs - &cx)?;
    let dy = (ys - &cy)?;
    (&dx * &dx)? + (&dy * &dy)?
}

/// Mean of the points selected by `mask`, or `None` when nothing is selected.
fn centroid_of(
    xs: &DeviceArray<f32>,
    ys: &DeviceArray<f32>,
    mask: &DeviceArray<bool>,
) -> Result<Option<(f32, f32)>> {
    let xs = xs.filter_by(mask)?;
    let ys = ys.filter_by(mask)?;
    if xs.is_empty() {
        return Ok(None);
    }
    let n = xs.len() as f32;
    Ok(Some((xs.sum()? / n, ys.sum()? / n)))
}

fn main() -> Result<()> {
    env_logger::init();

    let runtime = Runtime::global();
    println!("Running on {:?}", runtime);

    let mut rng = rand::thread_rng();
    let host_xs: Vec<f32> = (0..NUM_POINTS).map(|_| rng.r#gen()).collect();
    let host_ys: Vec<f32> = (0..NUM_POINTS).map(|_| rng.r#gen()).collect();

    let mut c1 = (host_xs[0], host_ys[0]);
    let mut c2 = (host_xs[1], host_ys[1]);

    let xs = DeviceArray::from_slice_in(&runtime, &host_xs)?;
    let ys = DeviceArray::from_slice_in(&runtime, &host_ys)?;

    for iteration in 0..NUM_ITERATIONS {
        println!("iteration {}", iteration + 1);
        println!("  centroid 1 start: ({}, {})", c1.0, c1.1);
        println!("  centroid 2 start: ({}, {})", c2.0, c2.1);

        let d1 = squared_distance(&xs, &ys, c1.0, c1.1)?;
        let d2 = squared_distance(&xs, &ys, c2.0, c2.1)?;
        let closer_to_first = d1.less(&d2)?;
        let closer_to_second = d1.greater_equal(&d2)?;

        if let Some(c) = centroid_of(&xs, &ys, &closer_to_first)? {
            c1 = c;
        }
        if let Some(c) = centroid_of(&xs, &ys, &closer_to_second)? {
            c2 = c;
        }
    }

    println!("centroid 1 final: ({}, {})", c1.0, c1.1);
    println!("centroid 2 final: ({}, {})", c2.0, c2.1);
    println!("kernels compiled: {}", runtime.cached_kernels());
    Ok(())
}
