use std::env;
use std::sync::Arc;

use parvec::prelude::*;
use serial_test::serial;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
#[serial]
fn test_process_runtimes_are_shared() {
    init_logger();
    assert!(Arc::ptr_eq(&Runtime::gpu(), &Runtime::gpu()));
    assert!(Arc::ptr_eq(&Runtime::cpu(), &Runtime::cpu()));
}

#[cfg(not(feature = "opencl"))]
#[test]
#[serial]
fn test_fallback_to_host_without_opencl() {
    init_logger();
    assert_eq!(Runtime::gpu().class(), DeviceClass::Host);
    assert_eq!(Runtime::cpu().class(), DeviceClass::Host);
    assert_eq!(Runtime::open(DeviceClass::Gpu, RuntimeConfig::default()).class(), DeviceClass::Host);
}

#[test]
#[serial]
fn test_default_constructors_use_global_runtime() {
    init_logger();
    let a = DeviceArray::from_slice(&[1i32, 2, 3]).unwrap();
    let b = DeviceArray::<i32>::indices(3).unwrap();
    let c = indices::<i32>(3).unwrap();

    assert!(Arc::ptr_eq(a.runtime(), &Runtime::global()));
    assert_eq!((&a - &b).unwrap().to_vec().unwrap(), [1, 1, 1]);
    assert_eq!(b.to_vec().unwrap(), c.to_vec().unwrap());
}

#[test]
#[serial]
fn test_operands_from_different_runtimes_rejected() {
    init_logger();
    let shared = DeviceArray::from_elem(4, 1u32).unwrap();
    let private = DeviceArray::from_elem_in(&Runtime::host(), 4, 1u32).unwrap();

    assert!(matches!(&shared + &private, Err(Error::RuntimeMismatch { op: "plus" })));
}

#[test]
#[serial]
fn test_uninitialized_default_array() {
    init_logger();
    let empty = DeviceArray::<f32>::default();
    assert!(!empty.is_initialized());
    assert!(empty.sum().is_err());
}

#[test]
#[serial]
fn test_global_runtime_resolved_once() {
    init_logger();
    let first = Runtime::global();
    let before = env::var("PARVEC_DEVICE").ok();

    for value in ["host", "cpu", "not-a-device"] {
        // SAFETY: every test in this binary is serialised
        unsafe { env::set_var("PARVEC_DEVICE", value) };
        assert!(Arc::ptr_eq(&Runtime::global(), &first));
        let array = DeviceArray::from_elem(2, 1i32).unwrap();
        assert!(Arc::ptr_eq(array.runtime(), &first));
    }

    unsafe {
        match before {
            Some(value) => env::set_var("PARVEC_DEVICE", value),
            None => env::remove_var("PARVEC_DEVICE"),
        }
    }
}
