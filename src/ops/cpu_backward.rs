// src/ops/cpu_backward.rs
//! CPU implementations for backward operations.

use crate::array::Array;
use crate::error::Error;
use crate::selection::Selection;
use ndarray::{Array4, Ix4, Zip};

/// K-max pooling backward (NCHW).
///
/// Each pooled gradient is written to the single input row it came from.
/// Rows within a slice are distinct, so writes never collide and nothing is
/// accumulated; every row that was not selected keeps a zero gradient.
pub fn kmax_pool_backward(grad_output: &Array, selection: &Selection) -> Result<Array, Error> {
    let expected = selection.output_shape();
    if grad_output.shape() != expected.as_slice() {
        return Err(Error::ShapeMismatch {
            expected: expected.to_vec(),
            actual: grad_output.shape().to_vec(),
        });
    }
    selection.validate()?;

    let grad_output_nd = grad_output
        .get_data()
        .view()
        .into_dimensionality::<Ix4>()
        .map_err(|e| {
            Error::InternalLogicError(format!("kmax_pool grad_output is not 4D: {}", e))
        })?;

    let [n, c, h, w] = selection.input_shape();
    let mut grad_input = Array4::<f32>::zeros((n, c, h, w));
    Zip::indexed(&grad_output_nd).for_each(|(b, ch, j, col), &g_out| {
        let row = selection.row(b, ch, j, col);
        grad_input[[b, ch, row, col]] = g_out;
    });
    Ok(Array::new(grad_input.into_dyn()))
}
