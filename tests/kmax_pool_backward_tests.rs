use approx::assert_abs_diff_eq;
use dcnn_kmax_lib::backend::cpu::CpuBackend;
use dcnn_kmax_lib::ops::{self, OpReq};
use dcnn_kmax_lib::test_utils::{assert_storage_close, assert_storage_eq};
use dcnn_kmax_lib::{Backend, Error, Selection};

#[test]
fn test_kmax_pool_backward_routes_to_selected_rows() -> Result<(), Error> {
    let x = CpuBackend::from_vec(vec![2.0, 5.0, 1.0, 3.0], &[1, 1, 4, 1])?;
    let (_, selection) = ops::kmax_pool::<CpuBackend>(&x, 2)?;

    let grad_output = CpuBackend::from_vec(vec![10.0, 20.0], &[1, 1, 2, 1])?;
    let grad_input = ops::kmax_pool_backward::<CpuBackend>(&grad_output, &selection)?;

    let expected = CpuBackend::from_vec(vec![0.0, 10.0, 0.0, 20.0], &[1, 1, 4, 1])?;
    assert_storage_eq::<CpuBackend>(&grad_input, &expected);
    Ok(())
}

#[test]
fn test_kmax_pool_backward_adjacent_rows() -> Result<(), Error> {
    let x = CpuBackend::from_vec(vec![1.0, 5.0, 3.0, 2.0], &[1, 1, 4, 1])?;
    let (y, selection) = ops::kmax_pool::<CpuBackend>(&x, 2)?;
    assert_eq!(CpuBackend::copy_to_host(&y)?, vec![5.0, 3.0]);

    let grad_output = CpuBackend::from_vec(vec![10.0, 20.0], &[1, 1, 2, 1])?;
    let grad_input = ops::kmax_pool_backward::<CpuBackend>(&grad_output, &selection)?;
    assert_eq!(
        CpuBackend::copy_to_host(&grad_input)?,
        vec![0.0, 10.0, 20.0, 0.0]
    );
    Ok(())
}

#[test]
fn test_kmax_pool_backward_zero_outside_selection() -> Result<(), Error> {
    let shape = [2, 3, 8, 4];
    let k = 3;
    let x = CpuBackend::random_normal(&shape, 0.0, 1.0)?;
    let (_, selection) = ops::kmax_pool::<CpuBackend>(&x, k)?;

    let grad_output = CpuBackend::random_uniform(&[2, 3, k, 4], 1.0, 2.0)?;
    let grad_input = ops::kmax_pool_backward::<CpuBackend>(&grad_output, &selection)?;
    assert_eq!(CpuBackend::shape(&grad_input), &shape);

    let g_in = grad_input.get_data();
    let g_out = grad_output.get_data();
    for n in 0..2 {
        for c in 0..3 {
            for w in 0..4 {
                let kept: Vec<usize> = (0..k).map(|j| selection.row(n, c, j, w)).collect();
                for row in 0..8 {
                    let value = g_in[[n, c, row, w].as_slice()];
                    match kept.iter().position(|&r| r == row) {
                        Some(j) => assert_eq!(value, g_out[[n, c, j, w].as_slice()]),
                        None => assert_eq!(value, 0.0),
                    }
                }
            }
        }
    }

    // Nothing lost, nothing accumulated.
    let sum_in: f32 = g_in.iter().sum();
    let sum_out: f32 = g_out.iter().sum();
    assert_abs_diff_eq!(sum_in, sum_out, epsilon = 1e-3);
    Ok(())
}

#[test]
fn test_kmax_pool_backward_shape_mismatch() -> Result<(), Error> {
    let x = CpuBackend::from_vec(vec![2.0, 5.0, 1.0, 3.0], &[1, 1, 4, 1])?;
    let (_, selection) = ops::kmax_pool::<CpuBackend>(&x, 2)?;

    let wrong_k = CpuBackend::from_vec(vec![1.0, 2.0, 3.0], &[1, 1, 3, 1])?;
    assert!(matches!(
        ops::kmax_pool_backward::<CpuBackend>(&wrong_k, &selection),
        Err(Error::ShapeMismatch { .. })
    ));

    let wrong_rank = CpuBackend::from_vec(vec![1.0, 2.0], &[1, 2, 1])?;
    assert!(matches!(
        ops::kmax_pool_backward::<CpuBackend>(&wrong_rank, &selection),
        Err(Error::ShapeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_kmax_pool_backward_with_hand_built_selection() -> Result<(), Error> {
    let selection = Selection::from_parts(&[1, 1, 5, 1], 2, vec![0, 4])?;
    let grad_output = CpuBackend::from_vec(vec![-1.5, 2.5], &[1, 1, 2, 1])?;
    let grad_input = ops::kmax_pool_backward::<CpuBackend>(&grad_output, &selection)?;
    let expected = CpuBackend::from_vec(vec![-1.5, 0.0, 0.0, 0.0, 2.5], &[1, 1, 5, 1])?;
    assert_storage_close::<CpuBackend>(&grad_input, &expected, 1e-6);
    Ok(())
}

#[test]
fn test_kmax_pool_into_write_modes() -> Result<(), Error> {
    let x = CpuBackend::from_vec(vec![2.0, 5.0, 1.0, 3.0], &[1, 1, 4, 1])?;

    let mut out = CpuBackend::from_vec(vec![1.0, 1.0], &[1, 1, 2, 1])?;
    ops::kmax_pool_into::<CpuBackend>(&x, 2, &mut out, OpReq::WriteTo)?;
    assert_eq!(CpuBackend::copy_to_host(&out)?, vec![5.0, 3.0]);

    ops::kmax_pool_into::<CpuBackend>(&x, 2, &mut out, OpReq::AddTo)?;
    assert_eq!(CpuBackend::copy_to_host(&out)?, vec![10.0, 6.0]);

    let selection = ops::kmax_pool_into::<CpuBackend>(&x, 2, &mut out, OpReq::Null)?;
    assert_eq!(CpuBackend::copy_to_host(&out)?, vec![10.0, 6.0]);
    assert_eq!(selection.rows(), &[1, 3]);

    let mut wrong = CpuBackend::zeros(&[1, 1, 3, 1])?;
    assert!(matches!(
        ops::kmax_pool_into::<CpuBackend>(&x, 2, &mut wrong, OpReq::WriteTo),
        Err(Error::ShapeMismatch { .. })
    ));
    Ok(())
}

#[test]
fn test_kmax_pool_backward_into_accumulates() -> Result<(), Error> {
    let x = CpuBackend::from_vec(vec![2.0, 5.0, 1.0, 3.0], &[1, 1, 4, 1])?;
    let (_, selection) = ops::kmax_pool::<CpuBackend>(&x, 2)?;
    let grad_output = CpuBackend::from_vec(vec![10.0, 20.0], &[1, 1, 2, 1])?;

    let mut grad_input = CpuBackend::ones(&[1, 1, 4, 1])?;
    ops::kmax_pool_backward_into::<CpuBackend>(
        &grad_output,
        &selection,
        &mut grad_input,
        OpReq::AddTo,
    )?;
    assert_eq!(
        CpuBackend::copy_to_host(&grad_input)?,
        vec![1.0, 11.0, 1.0, 21.0]
    );

    ops::kmax_pool_backward_into::<CpuBackend>(
        &grad_output,
        &selection,
        &mut grad_input,
        OpReq::WriteInplace,
    )?;
    assert_eq!(
        CpuBackend::copy_to_host(&grad_input)?,
        vec![0.0, 10.0, 0.0, 20.0]
    );

    // Null skips the work entirely, even with a mismatched buffer.
    let mut untouched = CpuBackend::zeros(&[3])?;
    ops::kmax_pool_backward_into::<CpuBackend>(
        &grad_output,
        &selection,
        &mut untouched,
        OpReq::Null,
    )?;
    assert_eq!(CpuBackend::copy_to_host(&untouched)?, vec![0.0, 0.0, 0.0]);
    Ok(())
}
