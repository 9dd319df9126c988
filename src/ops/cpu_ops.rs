use crate::array::Array;
use crate::error::Error;
use crate::selection::Selection;
use crate::util;
use ndarray::{s, Array4, ArrayView1, Ix4};
use std::cmp::Ordering;

/// Descending rank of two values: larger first, NaN above everything.
fn rank_descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}

/// Fills `rows` with the positions of the `k` largest entries of `values`,
/// sorted by position. Equal values prefer the earlier position.
///
/// `rows` is scratch space reused across slices; `k` must lie in `1..=len`.
pub(crate) fn ordered_top_k(values: ArrayView1<'_, f32>, k: usize, rows: &mut Vec<usize>) {
    rows.clear();
    rows.extend(0..values.len());
    if k < rows.len() {
        rows.select_nth_unstable_by(k - 1, |&a, &b| {
            rank_descending(values[a], values[b]).then(a.cmp(&b))
        });
        rows.truncate(k);
    }
    rows.sort_unstable();
}

/// Order-preserving k-max pooling along axis 2 (NCHW). Returns (output, selection)
pub fn kmax_pool(input: &Array, k: usize) -> Result<(Array, Selection), Error> {
    let [n, c, h, w] = util::nchw(input.shape())?;
    if k == 0 {
        return Err(Error::InvalidParameter(
            "k must be a positive integer".to_string(),
        ));
    }
    if k > h {
        return Err(Error::InvalidParameter(format!(
            "k ({}) exceeds the pooled axis length H ({})",
            k, h
        )));
    }

    let input_nd = input
        .get_data()
        .view()
        .into_dimensionality::<Ix4>()
        .map_err(|e| Error::InternalLogicError(format!("kmax_pool input is not 4D: {}", e)))?;

    let mut output = Array4::<f32>::zeros((n, c, k, w));
    let mut selected = vec![0usize; n * c * k * w];
    let mut rows = Vec::with_capacity(h);
    for b in 0..n {
        for ch in 0..c {
            for col in 0..w {
                let column = input_nd.slice(s![b, ch, .., col]);
                ordered_top_k(column, k, &mut rows);
                for (j, &row) in rows.iter().enumerate() {
                    output[[b, ch, j, col]] = column[row];
                    selected[((b * c + ch) * k + j) * w + col] = row;
                }
            }
        }
    }

    let selection = Selection::from_kernel([n, c, h, w], k, selected);
    Ok((Array::new(output.into_dyn()), selection))
}
