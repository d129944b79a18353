// src/backend/kernels/backward.rs
// Backward kernels: scatter the upstream gradient to the input positions
// recorded in the mask.

use ndarray::{ArrayD, IxDyn};
use rayon::iter::{IndexedParallelIterator, ParallelIterator};
use rayon::slice::{ParallelSlice, ParallelSliceMut};

use super::POOL_PARALLEL_THRESHOLD;
use crate::backend::number::{MaskIndex, PoolNum};

/// Shared scatter for the 2D and 3D gradients. The spatial layout only
/// matters through the per-slice element counts, so both ranks reduce to
/// the same accumulation over flat offsets.
fn pool_grad_impl<T>(
    mask: &ArrayD<MaskIndex>,
    grad_output: &ArrayD<T>,
    input_shape: &[usize],
    rank: usize,
) -> Result<ArrayD<T>, String>
where
    T: PoolNum,
{
    if input_shape.len() != rank {
        return Err(format!(
            "Pooling gradient requires a {}D input shape, got {}D",
            rank,
            input_shape.len()
        ));
    }
    if mask.shape() != grad_output.shape() {
        return Err(format!(
            "Mask shape {:?} and output gradient shape {:?} must match",
            mask.shape(),
            grad_output.shape()
        ));
    }
    if mask.ndim() != rank {
        return Err(format!(
            "Mask must be a {}D tensor, got {}D",
            rank,
            mask.ndim()
        ));
    }
    if mask.shape()[0] != input_shape[0] || mask.shape()[1] != input_shape[1] {
        return Err(format!(
            "Mask batch/channel dims {:?} do not match the input shape {:?}",
            &mask.shape()[..2],
            &input_shape[..2]
        ));
    }

    let (n, c) = (input_shape[0], input_shape[1]);
    let in_slice_len: usize = input_shape[2..].iter().product();
    let out_slice_len: usize = mask.shape()[2..].iter().product();

    let mut grad_input_data = vec![<T as PoolNum>::zero(); n * c * in_slice_len];

    // Empty batch or spatial extent: nothing to scatter
    if in_slice_len == 0 || out_slice_len == 0 || n * c == 0 {
        return ArrayD::from_shape_vec(IxDyn(input_shape), grad_input_data)
            .map_err(|e| format!("Failed to create gradient tensor: {e}"));
    }

    let mask_data = mask.as_slice().ok_or("Mask data not contiguous")?;
    let grad_data = grad_output.as_slice().ok_or("Gradient data not contiguous")?;

    // Accumulating scatter over one (batch, channel) slice. Overlapping
    // windows route several output positions to one input element, so this
    // adds, never overwrites.
    let scatter_slice =
        |mask_slice: &[MaskIndex], grad_slice: &[T], grad_in: &mut [T]| -> Result<(), String> {
            for (&idx, &grad) in mask_slice.iter().zip(grad_slice) {
                if idx < 0 || idx as usize >= in_slice_len {
                    return Err(format!(
                        "Mask entry {idx} is outside the input slice of {in_slice_len} elements"
                    ));
                }
                grad_in[idx as usize] += grad;
            }
            Ok(())
        };

    if n * c >= POOL_PARALLEL_THRESHOLD {
        grad_input_data
            .par_chunks_mut(in_slice_len)
            .zip(mask_data.par_chunks(out_slice_len))
            .zip(grad_data.par_chunks(out_slice_len))
            .try_for_each(|((grad_in, mask_slice), grad_slice)| {
                scatter_slice(mask_slice, grad_slice, grad_in)
            })?;
    } else {
        for bc in 0..n * c {
            let in_off = bc * in_slice_len;
            let out_off = bc * out_slice_len;
            scatter_slice(
                &mask_data[out_off..out_off + out_slice_len],
                &grad_data[out_off..out_off + out_slice_len],
                &mut grad_input_data[in_off..in_off + in_slice_len],
            )?;
        }
    }

    ArrayD::from_shape_vec(IxDyn(input_shape), grad_input_data)
        .map_err(|e| format!("Failed to create gradient tensor: {e}"))
}

/// Gradient of 2D max pooling with index recording.
///
/// Zero-fills the input gradient, then adds each upstream gradient entry to
/// the (N, C)-slice offset its mask entry names.
pub fn max_pool2d_with_index_grad<T>(
    mask: &ArrayD<MaskIndex>,
    grad_output: &ArrayD<T>,
    input_shape: &[usize],
) -> Result<ArrayD<T>, String>
where
    T: PoolNum,
{
    pool_grad_impl(mask, grad_output, input_shape, 4)
}

/// Gradient of 3D max pooling with index recording.
pub fn max_pool3d_with_index_grad<T>(
    mask: &ArrayD<MaskIndex>,
    grad_output: &ArrayD<T>,
    input_shape: &[usize],
) -> Result<ArrayD<T>, String>
where
    T: PoolNum,
{
    pool_grad_impl(mask, grad_output, input_shape, 5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::kernels::{max_pool2d_with_index, max_pool3d_with_index};
    use crate::config::PoolConfig;

    fn mask_4d(data: &[MaskIndex], n: usize, c: usize, h: usize, w: usize) -> ArrayD<MaskIndex> {
        ArrayD::from_shape_vec(IxDyn(&[n, c, h, w]), data.to_vec()).unwrap()
    }

    #[test]
    fn test_scatter_to_recorded_positions() {
        let mask = mask_4d(&[5, 7, 13, 15], 1, 1, 2, 2);
        let grad_output = ArrayD::<f32>::ones(IxDyn(&[1, 1, 2, 2]));

        let grad_input = max_pool2d_with_index_grad(&mask, &grad_output, &[1, 1, 4, 4]).unwrap();

        let expected: Vec<f32> = (0..16)
            .map(|i| if [5, 7, 13, 15].contains(&i) { 1.0 } else { 0.0 })
            .collect();
        assert_eq!(grad_input.as_slice().unwrap(), expected.as_slice());
    }

    #[test]
    fn test_overlapping_windows_accumulate() {
        // Four output positions all recorded the same input element
        let mask = mask_4d(&[4, 4, 4, 4], 1, 1, 2, 2);
        let grad_output = ArrayD::<f32>::ones(IxDyn(&[1, 1, 2, 2]));

        let grad_input = max_pool2d_with_index_grad(&mask, &grad_output, &[1, 1, 3, 3]).unwrap();

        let grad = grad_input.as_slice().unwrap();
        assert_eq!(grad[4], 4.0);
        assert_eq!(grad.iter().sum::<f32>(), 4.0);
    }

    #[test]
    fn test_gradient_values_pass_through() {
        let mask = mask_4d(&[0, 3], 1, 1, 1, 2);
        let grad_output =
            ArrayD::from_shape_vec(IxDyn(&[1, 1, 1, 2]), vec![0.25f32, -1.5]).unwrap();

        let grad_input = max_pool2d_with_index_grad(&mask, &grad_output, &[1, 1, 2, 2]).unwrap();

        assert_eq!(grad_input.as_slice().unwrap(), &[0.25, 0.0, 0.0, -1.5]);
    }

    #[test]
    fn test_3d_round_trip() {
        let data: Vec<f32> = (0..32).map(|v| v as f32).collect();
        let input = ArrayD::from_shape_vec(IxDyn(&[1, 1, 2, 4, 4]), data).unwrap();
        let config = PoolConfig::new(vec![1, 2, 2])
            .with_strides(vec![1, 2, 2])
            .resolve(input.shape())
            .unwrap();
        let (_, mask) = max_pool3d_with_index(&input, &config).unwrap();

        let grad_output = ArrayD::<f32>::ones(IxDyn(&[1, 1, 2, 2, 2]));
        let grad_input = max_pool3d_with_index_grad(&mask, &grad_output, input.shape()).unwrap();

        let grad = grad_input.as_slice().unwrap();
        for &offset in &[5, 7, 13, 15, 21, 23, 29, 31] {
            assert_eq!(grad[offset], 1.0);
        }
        assert_eq!(grad.iter().sum::<f32>(), 8.0);
    }

    #[test]
    fn test_non_overlapping_windows_have_no_collisions() {
        // stride == ksize, no padding: pure scatter, every input position
        // receives from at most one output position
        let data: Vec<f32> = (0..36).map(|v| (v * 7 % 11) as f32).collect();
        let input = ArrayD::from_shape_vec(IxDyn(&[1, 1, 6, 6]), data).unwrap();
        let config = PoolConfig::new(vec![2, 2]).with_strides(vec![2, 2]);
        let resolved = config.resolve(input.shape()).unwrap();
        let (_, mask) = max_pool2d_with_index(&input, &resolved).unwrap();

        let grad_output = ArrayD::<f32>::ones(IxDyn(&[1, 1, 3, 3]));
        let grad_input = max_pool2d_with_index_grad(&mask, &grad_output, input.shape()).unwrap();

        assert!(
            grad_input
                .as_slice()
                .unwrap()
                .iter()
                .all(|&g| g == 0.0 || g == 1.0)
        );
        assert_eq!(grad_input.as_slice().unwrap().iter().sum::<f32>(), 9.0);
    }

    #[test]
    fn test_parallel_path_keeps_slices_apart() {
        // 64 slices, above the threshold; each slice scatters into its own
        // offset so cross-slice writes would corrupt neighbours.
        let (n, c) = (8, 8);
        let mask_data: Vec<MaskIndex> = (0..n * c).map(|bc| (bc % 4) as MaskIndex).collect();
        let mask = mask_4d(&mask_data, n, c, 1, 1);
        let grad_output = ArrayD::<f32>::ones(IxDyn(&[n, c, 1, 1]));

        let grad_input =
            max_pool2d_with_index_grad(&mask, &grad_output, &[n, c, 2, 2]).unwrap();

        let grad = grad_input.as_slice().unwrap();
        for bc in 0..n * c {
            let slice = &grad[bc * 4..(bc + 1) * 4];
            assert_eq!(slice.iter().sum::<f32>(), 1.0);
            assert_eq!(slice[bc % 4], 1.0);
        }
    }

    #[test]
    fn test_rejects_out_of_range_mask() {
        let mask = mask_4d(&[16], 1, 1, 1, 1);
        let grad_output = ArrayD::<f32>::ones(IxDyn(&[1, 1, 1, 1]));
        assert!(max_pool2d_with_index_grad(&mask, &grad_output, &[1, 1, 4, 4]).is_err());

        let mask = mask_4d(&[-1], 1, 1, 1, 1);
        assert!(max_pool2d_with_index_grad(&mask, &grad_output, &[1, 1, 4, 4]).is_err());
    }

    #[test]
    fn test_rejects_shape_mismatches() {
        let mask = mask_4d(&[0, 1], 1, 1, 1, 2);
        let grad_output = ArrayD::<f32>::ones(IxDyn(&[1, 1, 1, 3]));
        // mask and gradient disagree
        assert!(max_pool2d_with_index_grad(&mask, &grad_output, &[1, 1, 2, 2]).is_err());

        // wrong input rank for the 2D gradient
        let grad_output = ArrayD::<f32>::ones(IxDyn(&[1, 1, 1, 2]));
        assert!(max_pool2d_with_index_grad(&mask, &grad_output, &[1, 1, 1, 2, 2]).is_err());

        // batch dim of the mask disagrees with the input shape
        assert!(max_pool2d_with_index_grad(&mask, &grad_output, &[2, 1, 2, 2]).is_err());
    }
}
