// src/backend/kernels/forward.rs
// Forward kernels: per output window, the maximum value and the flat offset
// of the input element that produced it.

use ndarray::{ArrayD, IxDyn};
use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::{ParallelSlice, ParallelSliceMut};

use super::{POOL_PARALLEL_THRESHOLD, clipped_range};
use crate::backend::number::{MaskIndex, PoolNum};
use crate::config::ResolvedPoolConfig;
use crate::shape::pooled_output_size;

/// 2D max pooling with index recording over an NCHW tensor.
///
/// Returns the pooled values and the mask. Each mask entry is the flat
/// offset, row-major within the (N, C) feature map, of the first input
/// element attaining the window maximum; ties break to the lowest offset.
pub fn max_pool2d_with_index<T>(
    input: &ArrayD<T>,
    config: &ResolvedPoolConfig,
) -> Result<(ArrayD<T>, ArrayD<MaskIndex>), String>
where
    T: PoolNum,
{
    let input_shape = input.shape();
    if input_shape.len() != 4 {
        return Err("Max pooling with index requires a 4D input tensor [N, C, H, W]".to_string());
    }
    if config.spatial_rank() != 2 {
        return Err(format!(
            "2D pooling kernel got a {}-axis window",
            config.spatial_rank()
        ));
    }

    let (n, c, h, w) = (
        input_shape[0],
        input_shape[1],
        input_shape[2],
        input_shape[3],
    );
    let (kh, kw) = (config.ksize()[0], config.ksize()[1]);
    let (sh, sw) = (config.strides()[0], config.strides()[1]);
    let (ph, pw) = (config.paddings()[0], config.paddings()[1]);

    let h_out = pooled_output_size(h, kh, ph, sh);
    let w_out = pooled_output_size(w, kw, pw, sw);

    let input_data = input.as_slice().ok_or("Input data not contiguous")?;

    let in_slice_len = h * w;
    let out_slice_len = h_out * w_out;
    let mut output_data = vec![<T as PoolNum>::zero(); n * c * out_slice_len];
    let mut mask_data: Vec<MaskIndex> = vec![0; n * c * out_slice_len];

    // One (batch, channel) feature map: scan each clipped window, keeping
    // the running maximum and its flat offset.
    let pool_slice = |input_slice: &[T], out_slice: &mut [T], mask_slice: &mut [MaskIndex]| {
        for out_h in 0..h_out {
            let (h_start, h_end) = clipped_range(out_h, sh, ph, kh, h);

            for out_w in 0..w_out {
                let (w_start, w_end) = clipped_range(out_w, sw, pw, kw, w);

                let mut max_val = <T as PoolNum>::min_value();
                let mut max_idx: MaskIndex = -1;

                for h_pos in h_start..h_end {
                    for w_pos in w_start..w_end {
                        let flat = h_pos * w + w_pos;
                        let val = input_slice[flat];
                        if max_idx < 0 || val > max_val {
                            max_val = val;
                            max_idx = flat as MaskIndex;
                        }
                    }
                }

                let out_idx = out_h * w_out + out_w;
                out_slice[out_idx] = max_val;
                mask_slice[out_idx] = max_idx;
            }
        }
    };

    if n * c >= POOL_PARALLEL_THRESHOLD {
        output_data
            .par_chunks_mut(out_slice_len)
            .zip(mask_data.par_chunks_mut(out_slice_len))
            .zip(input_data.par_chunks(in_slice_len))
            .for_each(|((out_slice, mask_slice), input_slice)| {
                pool_slice(input_slice, out_slice, mask_slice)
            });
    } else {
        for bc in 0..n * c {
            let in_off = bc * in_slice_len;
            let out_off = bc * out_slice_len;
            pool_slice(
                &input_data[in_off..in_off + in_slice_len],
                &mut output_data[out_off..out_off + out_slice_len],
                &mut mask_data[out_off..out_off + out_slice_len],
            );
        }
    }

    let out_dims = IxDyn(&[n, c, h_out, w_out]);
    let output = ArrayD::from_shape_vec(out_dims.clone(), output_data)
        .map_err(|e| format!("Failed to create output tensor: {e}"))?;
    let mask = ArrayD::from_shape_vec(out_dims, mask_data)
        .map_err(|e| format!("Failed to create mask tensor: {e}"))?;

    Ok((output, mask))
}

/// 3D max pooling with index recording over an NCDHW tensor.
///
/// Same contract as [`max_pool2d_with_index`] with a (depth, height, width)
/// window; mask offsets are row-major over the three spatial axes.
pub fn max_pool3d_with_index<T>(
    input: &ArrayD<T>,
    config: &ResolvedPoolConfig,
) -> Result<(ArrayD<T>, ArrayD<MaskIndex>), String>
where
    T: PoolNum,
{
    let input_shape = input.shape();
    if input_shape.len() != 5 {
        return Err(
            "Max pooling with index requires a 5D input tensor [N, C, D, H, W]".to_string(),
        );
    }
    if config.spatial_rank() != 3 {
        return Err(format!(
            "3D pooling kernel got a {}-axis window",
            config.spatial_rank()
        ));
    }

    let (n, c, d, h, w) = (
        input_shape[0],
        input_shape[1],
        input_shape[2],
        input_shape[3],
        input_shape[4],
    );
    let (kd, kh, kw) = (config.ksize()[0], config.ksize()[1], config.ksize()[2]);
    let (sd, sh, sw) = (
        config.strides()[0],
        config.strides()[1],
        config.strides()[2],
    );
    let (pd, ph, pw) = (
        config.paddings()[0],
        config.paddings()[1],
        config.paddings()[2],
    );

    let d_out = pooled_output_size(d, kd, pd, sd);
    let h_out = pooled_output_size(h, kh, ph, sh);
    let w_out = pooled_output_size(w, kw, pw, sw);

    let input_data = input.as_slice().ok_or("Input data not contiguous")?;

    let in_slice_len = d * h * w;
    let out_slice_len = d_out * h_out * w_out;
    let mut output_data = vec![<T as PoolNum>::zero(); n * c * out_slice_len];
    let mut mask_data: Vec<MaskIndex> = vec![0; n * c * out_slice_len];

    let pool_slice = |input_slice: &[T], out_slice: &mut [T], mask_slice: &mut [MaskIndex]| {
        for out_d in 0..d_out {
            let (d_start, d_end) = clipped_range(out_d, sd, pd, kd, d);

            for out_h in 0..h_out {
                let (h_start, h_end) = clipped_range(out_h, sh, ph, kh, h);

                for out_w in 0..w_out {
                    let (w_start, w_end) = clipped_range(out_w, sw, pw, kw, w);

                    let mut max_val = <T as PoolNum>::min_value();
                    let mut max_idx: MaskIndex = -1;

                    for d_pos in d_start..d_end {
                        for h_pos in h_start..h_end {
                            for w_pos in w_start..w_end {
                                let flat = (d_pos * h + h_pos) * w + w_pos;
                                let val = input_slice[flat];
                                if max_idx < 0 || val > max_val {
                                    max_val = val;
                                    max_idx = flat as MaskIndex;
                                }
                            }
                        }
                    }

                    let out_idx = (out_d * h_out + out_h) * w_out + out_w;
                    out_slice[out_idx] = max_val;
                    mask_slice[out_idx] = max_idx;
                }
            }
        }
    };

    if n * c >= POOL_PARALLEL_THRESHOLD {
        output_data
            .par_chunks_mut(out_slice_len)
            .zip(mask_data.par_chunks_mut(out_slice_len))
            .zip(input_data.par_chunks(in_slice_len))
            .for_each(|((out_slice, mask_slice), input_slice)| {
                pool_slice(input_slice, out_slice, mask_slice)
            });
    } else {
        for bc in 0..n * c {
            let in_off = bc * in_slice_len;
            let out_off = bc * out_slice_len;
            pool_slice(
                &input_data[in_off..in_off + in_slice_len],
                &mut output_data[out_off..out_off + out_slice_len],
                &mut mask_data[out_off..out_off + out_slice_len],
            );
        }
    }

    let out_dims = IxDyn(&[n, c, d_out, h_out, w_out]);
    let output = ArrayD::from_shape_vec(out_dims.clone(), output_data)
        .map_err(|e| format!("Failed to create output tensor: {e}"))?;
    let mask = ArrayD::from_shape_vec(out_dims, mask_data)
        .map_err(|e| format!("Failed to create mask tensor: {e}"))?;

    Ok((output, mask))
}
