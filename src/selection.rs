//! Record of the rows retained by a k-max pooling forward pass.

use crate::error::Error;
use crate::util;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// Row positions kept by one k-max pooling forward call.
///
/// For an input of shape `[N, C, H, W]` the selection stores `N * C * k * W`
/// row indices into axis 2, laid out in the row-major order of the pooled
/// output `[N, C, k, W]`. Within every `(n, c, w)` slice the rows are strictly
/// increasing, which is what keeps the pooled values in sequence order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct Selection {
    input_shape: [usize; 4],
    k: usize,
    rows: Vec<usize>,
}

impl Selection {
    /// Builds a selection from raw parts, checking that it describes a valid
    /// forward pass.
    pub fn from_parts(input_shape: &[usize], k: usize, rows: Vec<usize>) -> Result<Self, Error> {
        let selection = Self {
            input_shape: util::nchw(input_shape)?,
            k,
            rows,
        };
        selection.validate()?;
        Ok(selection)
    }

    /// Assembles a selection produced by a forward kernel, which upholds the
    /// layout invariants itself.
    pub(crate) fn from_kernel(input_shape: [usize; 4], k: usize, rows: Vec<usize>) -> Self {
        Self {
            input_shape,
            k,
            rows,
        }
    }

    /// Shape of the tensor the forward pass consumed.
    pub fn input_shape(&self) -> [usize; 4] {
        self.input_shape
    }

    /// Shape of the pooled output, `[N, C, k, W]`.
    pub fn output_shape(&self) -> [usize; 4] {
        let [n, c, _, w] = self.input_shape;
        [n, c, self.k, w]
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn rows(&self) -> &[usize] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Input row that fed pooled element `[n, c, j, w]`.
    pub fn row(&self, n: usize, c: usize, j: usize, w: usize) -> usize {
        self.rows[self.offset(n, c, j, w)]
    }

    pub(crate) fn offset(&self, n: usize, c: usize, j: usize, w: usize) -> usize {
        let [_, channels, _, width] = self.input_shape;
        ((n * channels + c) * self.k + j) * width + w
    }

    /// Checks the layout invariants: `k` in `1..=H`, one row per pooled
    /// element, every row inside `0..H`, and rows strictly increasing per
    /// slice.
    pub fn validate(&self) -> Result<(), Error> {
        let [n, c, h, w] = self.input_shape;
        if self.k == 0 || self.k > h {
            return Err(Error::InvalidParameter(format!(
                "selection k ({}) must lie in 1..={} for input shape {:?}",
                self.k, h, self.input_shape
            )));
        }
        let expected_len = [n, c, self.k, w]
            .iter()
            .try_fold(1usize, |acc, &x| acc.checked_mul(x))
            .ok_or_else(|| Error::ShapeMismatch {
                expected: self.input_shape.to_vec(),
                actual: vec![self.rows.len()],
            })?;
        if self.rows.len() != expected_len {
            return Err(Error::ShapeMismatch {
                expected: vec![expected_len],
                actual: vec![self.rows.len()],
            });
        }
        for b in 0..n {
            for ch in 0..c {
                for col in 0..w {
                    let mut previous: Option<usize> = None;
                    for j in 0..self.k {
                        let row = self.row(b, ch, j, col);
                        if row >= h || previous.is_some_and(|p| p >= row) {
                            return Err(Error::ShapeMismatch {
                                expected: self.input_shape.to_vec(),
                                actual: vec![b, ch, row, col],
                            });
                        }
                        previous = Some(row);
                    }
                }
            }
        }
        Ok(())
    }

    #[cfg(feature = "serialization")]
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::SerializationError(e.to_string()))
    }

    /// Parses a selection and re-checks its invariants.
    #[cfg(feature = "serialization")]
    pub fn from_json(json: &str) -> Result<Self, Error> {
        let selection: Self =
            serde_json::from_str(json).map_err(|e| Error::DeserializationError(e.to_string()))?;
        selection.validate()?;
        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_valid() {
        // [1, 1, 4, 2] input, k = 2: column 0 keeps rows {1, 3}, column 1 keeps {0, 2}
        let selection = Selection::from_parts(&[1, 1, 4, 2], 2, vec![1, 0, 3, 2]).unwrap();
        assert_eq!(selection.output_shape(), [1, 1, 2, 2]);
        assert_eq!(selection.row(0, 0, 0, 0), 1);
        assert_eq!(selection.row(0, 0, 1, 0), 3);
        assert_eq!(selection.row(0, 0, 0, 1), 0);
        assert_eq!(selection.row(0, 0, 1, 1), 2);
        assert_eq!(selection.len(), 4);
    }

    #[test]
    fn test_from_parts_rejects_wrong_length() {
        let result = Selection::from_parts(&[1, 1, 4, 1], 2, vec![0, 1, 2]);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_from_parts_rejects_unordered_rows() {
        let result = Selection::from_parts(&[1, 1, 4, 1], 2, vec![3, 1]);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
        let duplicate = Selection::from_parts(&[1, 1, 4, 1], 2, vec![1, 1]);
        assert!(matches!(duplicate, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_from_parts_rejects_out_of_range_row() {
        let result = Selection::from_parts(&[1, 1, 4, 1], 2, vec![1, 4]);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_from_parts_rejects_bad_k_and_rank() {
        assert!(matches!(
            Selection::from_parts(&[1, 1, 2, 1], 3, vec![0, 1, 2]),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            Selection::from_parts(&[1, 4, 1], 1, vec![0]),
            Err(Error::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_overflowing_shape() {
        let result = Selection::from_parts(&[usize::MAX, 2, 1, 1], 1, vec![0]);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }
}
