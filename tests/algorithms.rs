mod common;

use parvec::prelude::*;
use rstest::rstest;

use common::{approx_eq, host_runtime};

#[test]
fn test_sum_of_ones() {
    let runtime = host_runtime();
    let ones = DeviceArray::from_elem_in(&runtime, 10, 1i32).unwrap();
    assert_eq!(ones.sum().unwrap(), 10);
}

#[rstest]
#[case(1, 7)]
#[case(63, 3)]
#[case(64, 3)]
#[case(4097, 2)]
fn test_sum_of_copies(#[case] n: usize, #[case] value: i64) {
    let runtime = host_runtime();
    let array = DeviceArray::from_elem_in(&runtime, n, value).unwrap();
    assert_eq!(array.sum().unwrap(), n as i64 * value);
}

#[rstest]
#[case(2, 1)]
#[case(3, 5)]
#[case(16, 64)]
fn test_sum_independent_of_tuning(#[case] factor: usize, #[case] threshold: usize) {
    let _ = env_logger::builder().is_test(true).try_init();
    let config = RuntimeConfig::default()
        .with_reduction_factor(factor)
        .with_reduction_threshold(threshold);
    let runtime = Runtime::host_with_config(config);

    let values = indices_in::<u32>(&runtime, 777).unwrap();
    assert_eq!(values.sum().unwrap(), 776 * 777 / 2);
}

#[test]
fn test_float_sum() {
    let runtime = host_runtime();
    let values = DeviceArray::from_elem_in(&runtime, 1000, 0.5f32).unwrap();
    assert!(approx_eq(values.sum().unwrap(), 500.0));
}

#[test]
fn test_product_wraps() {
    let runtime = host_runtime();
    let values = DeviceArray::from_elem_in(&runtime, 9, 2u8).unwrap();
    assert_eq!(values.product().unwrap(), 0);

    let small = DeviceArray::from_slice_in(&runtime, &[1u8, 2, 3, 4, 5]).unwrap();
    assert_eq!(small.product().unwrap(), 120);
}

#[test]
fn test_rotate_moves_last_to_front() {
    let runtime = host_runtime();
    let values = indices_in::<i32>(&runtime, 10).unwrap();
    let rotated = values.rotate_by(1).unwrap();

    assert_eq!(rotated.get(0).unwrap(), 9);
    assert_eq!(rotated.get(1).unwrap(), 0);
    assert_eq!(rotated.len(), values.len());
}

#[rstest]
#[case(0)]
#[case(3)]
#[case(-4)]
#[case(25)]
fn test_rotate_is_periodic(#[case] k: i64) {
    let runtime = host_runtime();
    let values = indices_in::<i16>(&runtime, 7).unwrap();
    let len = values.len() as i64;

    let a = values.rotate_by(k).unwrap().to_vec().unwrap();
    let b = values.rotate_by(k + len).unwrap().to_vec().unwrap();
    assert_eq!(a, b);

    let back = values.rotate_by(k).unwrap().rotate_by(-k).unwrap();
    assert_eq!(back.to_vec().unwrap(), values.to_vec().unwrap());
}

#[test]
fn test_rotate_zero_is_identity() {
    let runtime = host_runtime();
    let values = DeviceArray::from_slice_in(&runtime, &[3.0f32, 1.0, 2.0]).unwrap();
    assert_eq!(values.rotate_by(0).unwrap().to_vec().unwrap(), [3.0, 1.0, 2.0]);
}

#[test]
fn test_filter_count_matches_predicate() {
    let runtime = host_runtime();
    let values = indices_in::<i32>(&runtime, 100).unwrap();
    let threshold = DeviceArray::from_elem_in(&runtime, 100, 37).unwrap();
    let keep = values.less(&threshold).unwrap();

    let kept = values.filter_by(&keep).unwrap();
    assert_eq!(kept.len(), 37);

    let mut kept = kept.to_vec().unwrap();
    kept.sort_unstable();
    assert_eq!(kept, (0..37).collect::<Vec<_>>());
}

#[test]
fn test_filter_evens() {
    let runtime = host_runtime();
    let values = indices_in::<u16>(&runtime, 10).unwrap();
    let twos = DeviceArray::from_elem_in(&runtime, 10, 2u16).unwrap();
    let zeros = DeviceArray::from_elem_in(&runtime, 10, 0u16).unwrap();
    let even = (&values % &twos).unwrap().equal(&zeros).unwrap();

    let mut kept = values.filter_by(&even).unwrap().to_vec().unwrap();
    kept.sort_unstable();
    assert_eq!(kept, [0, 2, 4, 6, 8]);
}

#[test]
fn test_filter_nothing_and_everything() {
    let runtime = host_runtime();
    let values = DeviceArray::from_slice_in(&runtime, &[5i8, 6, 7]).unwrap();

    let none = DeviceArray::from_elem_in(&runtime, 3, false).unwrap();
    assert!(values.filter_by(&none).unwrap().is_empty());

    let all = DeviceArray::from_elem_in(&runtime, 3, true).unwrap();
    let mut kept = values.filter_by(&all).unwrap().to_vec().unwrap();
    kept.sort_unstable();
    assert_eq!(kept, [5, 6, 7]);
}

#[test]
fn test_filter_size_mismatch() {
    let runtime = host_runtime();
    let values = DeviceArray::from_slice_in(&runtime, &[1i32, 2, 3]).unwrap();
    let keep = DeviceArray::from_elem_in(&runtime, 2, true).unwrap();
    assert!(matches!(values.filter_by(&keep), Err(Error::SizeMismatch { op: "filter_by", .. })));
}

#[test]
fn test_filtered_array_grows() {
    let runtime = host_runtime();
    let values = indices_in::<i32>(&runtime, 4).unwrap();
    let keep = DeviceArray::from_slice_in(&runtime, &[true, false, false, false]).unwrap();

    let mut kept = values.filter_by(&keep).unwrap();
    kept.push_back(42).unwrap();
    assert_eq!(kept.to_vec().unwrap(), [0, 42]);
}

#[test]
fn test_indices_and_all_any() {
    let runtime = host_runtime();
    let idx = indices_in::<i64>(&runtime, 5).unwrap();
    let zeros = DeviceArray::from_elem_in(&runtime, 5, 0i64).unwrap();

    let nonnegative = idx.greater_equal(&zeros).unwrap();
    assert!(nonnegative.all().unwrap());
    let positive = idx.greater(&zeros).unwrap();
    assert!(!positive.all().unwrap());
    assert!(positive.any().unwrap());
}
