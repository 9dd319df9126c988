use crate::error::Error;

/// Splits a rank-4 `[N, C, H, W]` shape into its four extents.
pub fn nchw(shape: &[usize]) -> Result<[usize; 4], Error> {
    match *shape {
        [n, c, h, w] => Ok([n, c, h, w]),
        _ => Err(Error::RankMismatch {
            expected: 4,
            actual: shape.len(),
        }),
    }
}

/// Layer-dependent pooling size for a stack of `num_layers` conv/fold/pool
/// blocks.
///
/// The last block always keeps `ktop` rows. Earlier blocks keep
/// `max(ktop, ceil((L - l - 1) / L * seq_len))`, where `seq_len` is the
/// sequence extent reaching block `l` (after its wide convolution).
pub fn dynamic_k(
    ktop: usize,
    layer: usize,
    num_layers: usize,
    seq_len: usize,
) -> Result<usize, Error> {
    if ktop == 0 {
        return Err(Error::InvalidParameter(
            "ktop must be a positive integer".to_string(),
        ));
    }
    if layer >= num_layers {
        return Err(Error::InvalidParameter(format!(
            "layer index {} out of range for {} layers",
            layer, num_layers
        )));
    }
    if layer == num_layers - 1 {
        return Ok(ktop);
    }
    let remaining = num_layers - layer - 1;
    let scaled = (remaining * seq_len).div_ceil(num_layers);
    Ok(ktop.max(scaled))
}
