//! Backend trait definition and module structure.

use crate::error::Error;
use crate::ops::OpReq;
use crate::selection::Selection;
use std::fmt::{Debug, Display};

pub mod cpu;

pub trait Backend: Sized + Debug + Clone {
    type Storage: Clone + Debug + Display;

    // --- Factory Methods (Creating Storage) ---

    /// Creates new storage filled with zeros.
    fn zeros(shape: &[usize]) -> Result<Self::Storage, Error>;
    /// Creates new storage filled with ones.
    fn ones(shape: &[usize]) -> Result<Self::Storage, Error>;
    /// Creates new storage from a flat vector and a shape.
    fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self::Storage, Error>;

    // --- Random Generation Methods ---
    /// Creates new storage filled with values from a uniform distribution U(low, high).
    fn random_uniform(shape: &[usize], low: f32, high: f32) -> Result<Self::Storage, Error>;

    /// Creates new storage filled with values from a normal distribution N(mean, std_dev^2).
    fn random_normal(shape: &[usize], mean: f32, std_dev: f32) -> Result<Self::Storage, Error>;

    // --- Shape/Data Access ---

    /// Returns the shape of the storage.
    fn shape(storage: &Self::Storage) -> &[usize];
    /// Returns the total number of elements in the storage.
    fn size(storage: &Self::Storage) -> usize;
    /// Consumes the storage and returns its data as a flat `Vec<f32>`.
    fn into_raw_vec(storage: Self::Storage) -> Result<Vec<f32>, Error>;
    /// Copies the storage contents into a host `Vec<f32>` (row-major).
    fn copy_to_host(storage: &Self::Storage) -> Result<Vec<f32>, Error>;

    /// Writes `src` into the caller-provided `dst` according to `req`.
    /// `Null` leaves `dst` untouched, `WriteTo`/`WriteInplace` overwrite and
    /// `AddTo` accumulates. Shapes must match unless `req` is `Null`.
    fn assign(dst: &mut Self::Storage, src: &Self::Storage, req: OpReq) -> Result<(), Error>;

    // --- K-Max Pooling ---

    /// Order-preserving k-max pooling along axis 2 of an `[N, C, H, W]` input.
    /// Returns the pooled `[N, C, k, W]` output and the rows it kept.
    fn kmax_pool(input: &Self::Storage, k: usize) -> Result<(Self::Storage, Selection), Error>;

    /// Routes `grad_output` (`[N, C, k, W]`) back to the rows recorded in
    /// `selection`, producing a gradient of the original input shape that is
    /// zero everywhere else.
    fn kmax_pool_backward(
        grad_output: &Self::Storage,
        selection: &Selection,
    ) -> Result<Self::Storage, Error>;
}
