use dcnn_kmax_lib::backend::cpu::CpuBackend;
use dcnn_kmax_lib::test_utils::{
    check_kmax_pool_gradient, compare_gradients, compute_numerical_gradient,
};
use dcnn_kmax_lib::{Backend, Error};

/// Distinct, well-separated values so a small perturbation never changes
/// which rows are kept.
fn spaced_input(shape: &[usize]) -> Result<<CpuBackend as Backend>::Storage, Error> {
    let size: usize = shape.iter().product();
    // 31 is prime, so along a slice (stride W < 31, at most 31 rows) the
    // values (7 * i) % 31 are distinct and at least 0.5 apart once scaled.
    let data = (0..size).map(|i| ((7 * i) % 31) as f32 * 0.5 - 7.0).collect();
    CpuBackend::from_vec(data, shape)
}

#[test]
fn test_kmax_pool_gradient_single_slice() -> Result<(), Error> {
    let x = CpuBackend::from_vec(vec![0.3, -1.2, 2.5, 0.9, -0.4, 1.7], &[1, 1, 6, 1])?;
    let seed = CpuBackend::from_vec(vec![1.0, -2.0, 0.5], &[1, 1, 3, 1])?;
    check_kmax_pool_gradient::<CpuBackend>(&x, 3, &seed, 1e-2, 1e-2)
}

#[test]
fn test_kmax_pool_gradient_batched() -> Result<(), Error> {
    let shape = [2, 2, 7, 3];
    let x = spaced_input(&shape)?;
    let seed = CpuBackend::random_uniform(&[2, 2, 4, 3], 0.5, 1.5)?;
    check_kmax_pool_gradient::<CpuBackend>(&x, 4, &seed, 1e-1, 1e-2)
}

#[test]
fn test_kmax_pool_gradient_k_equals_h() -> Result<(), Error> {
    let shape = [1, 2, 4, 2];
    let x = spaced_input(&shape)?;
    let seed = CpuBackend::random_uniform(&shape, 0.5, 1.5)?;
    check_kmax_pool_gradient::<CpuBackend>(&x, 4, &seed, 1e-1, 1e-2)
}

#[test]
fn test_numerical_gradient_of_sum_of_squares() -> Result<(), Error> {
    let x = CpuBackend::from_vec(vec![1.0, -2.0, 3.0], &[3])?;
    let loss = |s: &<CpuBackend as Backend>::Storage| -> Result<f32, Error> {
        Ok(CpuBackend::copy_to_host(s)?.iter().map(|v| v * v).sum())
    };
    let numerical = compute_numerical_gradient::<CpuBackend, _>(&loss, &x, 1e-2)?;
    compare_gradients(&[2.0, -4.0, 6.0], &numerical, 1e-2)
}

#[test]
fn test_compare_gradients_reports_mismatch() {
    let result = compare_gradients(&[1.0, 2.0, 3.0], &[1.0, 2.5, 3.0], 1e-3);
    match result {
        Err(Error::GradientCheckError { at_index, .. }) => assert_eq!(at_index, 1),
        other => panic!("expected GradientCheckError, got {:?}", other),
    }
    assert!(matches!(
        compare_gradients(&[1.0], &[1.0, 2.0], 1e-3),
        Err(Error::InternalLogicError(_))
    ));
}
