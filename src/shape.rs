// src/shape.rs
// Output-shape inference for max pooling with index recording.

use crate::config::PoolConfig;

/// Pooled extent of one spatial axis:
/// `(input - ksize + 2 * padding) / stride + 1`, rounded down.
///
/// Callers must have validated the configuration first (see
/// [`PoolConfig::resolve`]); in particular `input + 2 * padding >= ksize`
/// and `stride > 0`.
pub fn pooled_output_size(input: usize, ksize: usize, padding: usize, stride: usize) -> usize {
    (input + 2 * padding - ksize) / stride + 1
}

/// Infer the shapes of the pooled output and its mask.
///
/// The leading batch and channel dimensions are copied from the input; each
/// spatial dimension follows [`pooled_output_size`] after the configuration
/// has been resolved (so global pooling yields 1 on every spatial axis).
/// Output and mask always share one shape.
///
/// Fails on any configuration violation reported by
/// [`PoolConfig::resolve`]; no partial shape is produced.
pub fn infer_pool_with_index_shape(
    input_shape: &[usize],
    config: &PoolConfig,
) -> Result<(Vec<usize>, Vec<usize>), String> {
    let resolved = config.resolve(input_shape)?;

    let mut out_shape = vec![input_shape[0], input_shape[1]];
    for axis in 0..resolved.spatial_rank() {
        out_shape.push(pooled_output_size(
            input_shape[axis + 2],
            resolved.ksize()[axis],
            resolved.paddings()[axis],
            resolved.strides()[axis],
        ));
    }

    let mask_shape = out_shape.clone();
    Ok((out_shape, mask_shape))
}

/// Shape of the gradient the backward pass produces: the original input
/// shape, copied verbatim.
pub fn infer_pool_grad_shape(input_shape: &[usize]) -> Result<Vec<usize>, String> {
    if input_shape.len() != 4 && input_shape.len() != 5 {
        return Err(format!(
            "Pooling input must be a 4D or 5D tensor, got {}D",
            input_shape.len()
        ));
    }
    Ok(input_shape.to_vec())
}
