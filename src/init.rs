use crate::array::Array;
use crate::error::Error;
use rand_distr::{Distribution, Normal, Uniform};

/// Number of elements described by `shape`, guarding against overflow.
fn checked_size(shape: &[usize]) -> Result<usize, Error> {
    shape
        .iter()
        .try_fold(1usize, |acc, &x| acc.checked_mul(x))
        .ok_or_else(|| {
            Error::InvalidOperation("Shape dimensions multiply to overflow usize".to_string())
        })
}

fn sample_array<D: Distribution<f32>>(shape: &[usize], dist: D) -> Result<Array, Error> {
    let size = checked_size(shape)?;
    if size == 0 {
        return Ok(Array::zeros(shape));
    }
    let mut rng = rand::rng();
    let data: Vec<f32> = dist.sample_iter(&mut rng).take(size).collect();
    Array::from_vec(data, shape)
}

/// Fills an array of `shape` with samples from U(low, high).
pub fn random_uniform(shape: &[usize], low: f32, high: f32) -> Result<Array, Error> {
    let dist = Uniform::new(low, high).map_err(|_| Error::InitializationError)?;
    sample_array(shape, dist)
}

/// Fills an array of `shape` with samples from N(mean, std_dev^2).
pub fn random_normal(shape: &[usize], mean: f32, std_dev: f32) -> Result<Array, Error> {
    // Normal::new accepts a negative std_dev (it mirrors the distribution)
    if std_dev < 0.0 {
        return Err(Error::InitializationError);
    }
    let dist = Normal::new(mean, std_dev).map_err(|_| Error::InitializationError)?;
    sample_array(shape, dist)
}
