//! Backend-generic entry points for the k-max pooling operator.
//!
//! `kmax_pool` / `kmax_pool_backward` form a pure function pair: the
//! selection produced by the forward call is handed back explicitly to the
//! backward call, so no state lives between the two. The `_into` variants
//! write into caller-allocated buffers under an [`OpReq`] write mode.

use crate::backend::Backend;
use crate::error::Error;
use crate::selection::Selection;
use std::fmt;

pub mod cpu_backward;
pub mod cpu_ops;

/// How a computed result is written into a caller-provided buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpReq {
    /// The buffer is not needed; leave it untouched.
    Null,
    /// Overwrite the buffer.
    WriteTo,
    /// Overwrite a buffer that may alias an input.
    WriteInplace,
    /// Accumulate into the buffer.
    AddTo,
}

impl fmt::Display for OpReq {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OpReq::Null => write!(f, "null"),
            OpReq::WriteTo => write!(f, "write"),
            OpReq::WriteInplace => write!(f, "inplace"),
            OpReq::AddTo => write!(f, "add"),
        }
    }
}

/// Order-preserving k-max pooling along axis 2 of an `[N, C, H, W]` input.
///
/// Every `(n, c, w)` slice keeps its `k` largest values (equal values prefer
/// the earlier row) in their original sequence order. Returns the pooled
/// `[N, C, k, W]` output together with the [`Selection`] needed by
/// [`kmax_pool_backward`].
///
/// # Errors
/// * [`Error::RankMismatch`] if `input` is not rank 4.
/// * [`Error::InvalidParameter`] if `k == 0` or `k > H`.
pub fn kmax_pool<B: Backend>(
    input: &B::Storage,
    k: usize,
) -> Result<(B::Storage, Selection), Error> {
    debug_println!("kmax_pool: input shape {:?}, k = {}", B::shape(input), k);
    B::kmax_pool(input, k)
}

/// Gradient of [`kmax_pool`] with respect to its input.
///
/// # Errors
/// * [`Error::ShapeMismatch`] if `grad_output` is not `[N, C, k, W]` for the
///   given selection, or the selection is inconsistent.
pub fn kmax_pool_backward<B: Backend>(
    grad_output: &B::Storage,
    selection: &Selection,
) -> Result<B::Storage, Error> {
    debug_println!(
        "kmax_pool_backward: grad shape {:?} -> input shape {:?}",
        B::shape(grad_output),
        selection.input_shape()
    );
    B::kmax_pool_backward(grad_output, selection)
}

/// Runs [`kmax_pool`] and writes the result into `output` under `req`.
pub fn kmax_pool_into<B: Backend>(
    input: &B::Storage,
    k: usize,
    output: &mut B::Storage,
    req: OpReq,
) -> Result<Selection, Error> {
    let (pooled, selection) = kmax_pool::<B>(input, k)?;
    debug_println!("kmax_pool_into: req = {}", req);
    B::assign(output, &pooled, req)?;
    Ok(selection)
}

/// Runs [`kmax_pool_backward`] and writes the result into `grad_input`
/// under `req`. A `Null` request skips the computation entirely.
pub fn kmax_pool_backward_into<B: Backend>(
    grad_output: &B::Storage,
    selection: &Selection,
    grad_input: &mut B::Storage,
    req: OpReq,
) -> Result<(), Error> {
    if req == OpReq::Null {
        return Ok(());
    }
    let grad = kmax_pool_backward::<B>(grad_output, selection)?;
    debug_println!("kmax_pool_backward_into: req = {}", req);
    B::assign(grad_input, &grad, req)
}
