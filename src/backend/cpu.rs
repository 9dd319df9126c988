//! CPU backend implementation using `ndarray`.

use crate::array::Array; // The storage type for this backend
use crate::backend::Backend;
use crate::error::Error;
use crate::init;
use crate::ops::{cpu_backward, cpu_ops, OpReq};
use crate::selection::Selection;
use std::fmt::{self, Debug, Display};

/// Marker struct for the CPU backend.
/// Implements the `Backend` trait using `ndarray` operations via the `Array` wrapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuBackend;

impl Backend for CpuBackend {
    type Storage = Array;

    // --- Factory Methods ---
    fn zeros(shape: &[usize]) -> Result<Self::Storage, Error> {
        Ok(Array::zeros(shape))
    }

    fn ones(shape: &[usize]) -> Result<Self::Storage, Error> {
        Ok(Array::ones(shape))
    }

    fn from_vec(data: Vec<f32>, shape: &[usize]) -> Result<Self::Storage, Error> {
        Array::from_vec(data, shape)
    }

    fn random_uniform(shape: &[usize], low: f32, high: f32) -> Result<Self::Storage, Error> {
        init::random_uniform(shape, low, high)
    }

    fn random_normal(shape: &[usize], mean: f32, std_dev: f32) -> Result<Self::Storage, Error> {
        init::random_normal(shape, mean, std_dev)
    }

    // --- Shape/Data Access ---
    fn shape(storage: &Self::Storage) -> &[usize] {
        storage.shape()
    }

    fn size(storage: &Self::Storage) -> usize {
        storage.size()
    }

    fn into_raw_vec(storage: Self::Storage) -> Result<Vec<f32>, Error> {
        // CPU operation doesn't really fail, but match trait signature
        Ok(storage.into_raw_vec())
    }

    fn copy_to_host(storage: &Self::Storage) -> Result<Vec<f32>, Error> {
        Ok(storage.to_vec())
    }

    fn assign(dst: &mut Self::Storage, src: &Self::Storage, req: OpReq) -> Result<(), Error> {
        if req == OpReq::Null {
            return Ok(());
        }
        if dst.shape() != src.shape() {
            return Err(Error::ShapeMismatch {
                expected: dst.shape().to_vec(),
                actual: src.shape().to_vec(),
            });
        }
        match req {
            OpReq::WriteTo | OpReq::WriteInplace => dst.get_data_mut().assign(src.get_data()),
            OpReq::AddTo => *dst.get_data_mut() += src.get_data(),
            OpReq::Null => {}
        }
        Ok(())
    }

    // --- K-Max Pooling ---

    /// Order-preserving k-max pooling (NCHW). Returns (output, selection)
    fn kmax_pool(input: &Self::Storage, k: usize) -> Result<(Self::Storage, Selection), Error> {
        cpu_ops::kmax_pool(input, k)
    }

    fn kmax_pool_backward(
        grad_output: &Self::Storage,
        selection: &Selection,
    ) -> Result<Self::Storage, Error> {
        cpu_backward::kmax_pool_backward(grad_output, selection)
    }
}

// --- Implement Debug, Display, AsRef, AsMut for Array ---
// These are needed to satisfy the Backend::Storage trait bounds for Array.

impl Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Delegate to ndarray's Display implementation for ArrayD
        write!(f, "{}", self.get_data())
    }
}

impl Debug for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Array(shape={:?}, data={:?})",
            self.shape(),
            self.get_data()
        )
    }
}

impl AsRef<[f32]> for Array {
    fn as_ref(&self) -> &[f32] {
        // Use ndarray's as_slice() which panics if not contiguous C-order.
        self.get_data()
            .as_slice()
            .expect("CPU Array data is expected to be sliceable")
    }
}

impl AsMut<[f32]> for Array {
    fn as_mut(&mut self) -> &mut [f32] {
        self.get_data_mut()
            .as_slice_mut()
            .expect("CPU Array data is expected to be mutably sliceable")
    }
}
