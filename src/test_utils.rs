use crate::{ops, Backend, Error};

/// Checks the analytical k-max pooling gradient against central differences.
///
/// The scalar loss is `sum(kmax_pool(x, k) * grad_seed)`, whose gradient with
/// respect to `x` is exactly `kmax_pool_backward(grad_seed, selection)`.
///
/// # Arguments
/// * `input`: The `[N, C, H, W]` point at which to check the gradient.
/// * `k`: Pooling size.
/// * `grad_seed`: Upstream gradient of shape `[N, C, k, W]`.
/// * `epsilon`: A small value for finite difference perturbation (e.g., 1e-3).
/// * `tolerance`: The maximum allowed relative or absolute difference between
///   analytical and numerical gradients.
///
/// Inputs whose slices contain near-ties closer than `epsilon` can flip the
/// selection under perturbation; keep test values well separated.
pub fn check_kmax_pool_gradient<B: Backend>(
    input: &B::Storage,
    k: usize,
    grad_seed: &B::Storage,
    epsilon: f32,
    tolerance: f32,
) -> Result<(), Error> {
    // --- Analytical Gradient ---
    let (_, selection) = ops::kmax_pool::<B>(input, k)?;
    let analytical = B::copy_to_host(&ops::kmax_pool_backward::<B>(grad_seed, &selection)?)?;

    // --- Numerical Gradient ---
    let seed = B::copy_to_host(grad_seed)?;
    let loss = |x: &B::Storage| -> Result<f32, Error> {
        let (pooled, _) = ops::kmax_pool::<B>(x, k)?;
        let pooled = B::copy_to_host(&pooled)?;
        if pooled.len() != seed.len() {
            return Err(Error::ShapeMismatch {
                expected: vec![seed.len()],
                actual: vec![pooled.len()],
            });
        }
        Ok(pooled.iter().zip(seed.iter()).map(|(y, g)| y * g).sum())
    };
    let numerical = compute_numerical_gradient::<B, _>(&loss, input, epsilon)?;

    compare_gradients(&analytical, &numerical, tolerance)
}

/// Central-difference gradient of a scalar function of one storage.
pub fn compute_numerical_gradient<B, F>(
    func: &F,
    input: &B::Storage,
    epsilon: f32,
) -> Result<Vec<f32>, Error>
where
    B: Backend,
    F: Fn(&B::Storage) -> Result<f32, Error>,
{
    let shape = B::shape(input).to_vec();
    let original_data = B::copy_to_host(input)?;
    let mut numerical_grad_vec = vec![0.0; original_data.len()];

    for i in 0..original_data.len() {
        // --- Perturb +epsilon ---
        let mut data_plus = original_data.clone();
        data_plus[i] += epsilon;
        let loss_plus = func(&B::from_vec(data_plus, &shape)?)?;

        // --- Perturb -epsilon ---
        let mut data_minus = original_data.clone();
        data_minus[i] -= epsilon;
        let loss_minus = func(&B::from_vec(data_minus, &shape)?)?;

        // Central difference formula
        numerical_grad_vec[i] = (loss_plus - loss_minus) / (2.0 * epsilon);
    }

    Ok(numerical_grad_vec)
}

pub fn compare_gradients(
    analytical: &[f32],
    numerical: &[f32],
    tolerance: f32,
) -> Result<(), Error> {
    if analytical.len() != numerical.len() {
        return Err(Error::InternalLogicError(format!(
            "Gradient size mismatch: analytical size={}, numerical size={}",
            analytical.len(),
            numerical.len()
        )));
    }

    let mut max_rel_err = 0.0;
    let mut max_abs_err = 0.0;
    let mut max_err_idx = 0;

    for (i, (a, n)) in analytical.iter().zip(numerical.iter()).enumerate() {
        let abs_err = (a - n).abs();
        let rel_err = if a.abs() > 1e-8 && n.abs() > 1e-8 {
            abs_err / a.abs().max(n.abs())
        } else {
            abs_err
        };

        if rel_err > max_rel_err {
            max_rel_err = rel_err;
            max_abs_err = abs_err;
            max_err_idx = i;
        }
    }

    if max_rel_err <= tolerance {
        Ok(())
    } else {
        Err(Error::GradientCheckError {
            analytical: analytical.to_vec(),
            numerical: numerical.to_vec(),
            max_rel_error: max_rel_err,
            max_abs_error: max_abs_err,
            at_index: max_err_idx,
        })
    }
}

pub fn assert_storage_eq<B: Backend>(a: &B::Storage, b: &B::Storage) {
    let a_data = B::copy_to_host(a).unwrap();
    let b_data = B::copy_to_host(b).unwrap();
    assert_eq!(B::shape(a), B::shape(b), "Storage shapes don't match");
    for (i, (a_val, b_val)) in a_data.iter().zip(b_data.iter()).enumerate() {
        assert_eq!(
            *a_val, *b_val,
            "Values at index {i} don't match: a={a_val}, b={b_val}"
        );
    }
}

pub fn assert_storage_close<B: Backend>(a: &B::Storage, b: &B::Storage, tol: f32) {
    let a_data = B::copy_to_host(a).unwrap();
    let b_data = B::copy_to_host(b).unwrap();
    assert_eq!(B::shape(a), B::shape(b), "Storage shapes don't match");
    for (i, (a_val, b_val)) in a_data.iter().zip(b_data.iter()).enumerate() {
        assert!(
            (a_val - b_val).abs() < tol,
            "Values at index {i} aren't close enough: a={a_val}, b={b_val}, diff={}, tol={tol}",
            (a_val - b_val).abs()
        );
    }
}
