//! Brute-force factoring of a semiprime by trial division on the device.
//!
//! Run with: `cargo run --example factor [--features opencl]`

use parvec::prelude::*;

const PRIME_1: u64 = 32_452_841;
const PRIME_2: u64 = 32_452_843;

fn main() -> Result<()> {
    env_logger::init();

    let runtime = Runtime::global();
    let key = PRIME_1 * PRIME_2;
    let bound = key.isqrt() as usize + 1;
    let count = bound - 1;

    // Candidates 2..=bound
    let twos = DeviceArray::from_elem_in(&runtime, count, 2u64)?;
    let candidates = (indices_in::<u64>(&runtime, count)? + &twos)?;

    let keys = DeviceArray::from_elem_in(&runtime, count, key)?;
    let zeros = DeviceArray::from_elem_in(&runtime, count, 0u64)?;
    let divides = (&keys % &candidates)?.equal(&zeros)?;
    let divisors = candidates.filter_by(&divides)?;

    println!("Original primes: {PRIME_1}, {PRIME_2}");
    match divisors.to_vec()?.into_iter().min() {
        Some(found) => println!("Found primes: {found}, {}", key / found),
        None => println!("No divisor below {bound}"),
    }
    Ok(())
}
