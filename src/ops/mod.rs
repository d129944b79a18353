// src/ops/mod.rs
// Operator-level interface over the pooling kernels.
//
// The host framework talks to one trait with shape inference, forward and
// backward as capability methods; the 2D and 3D variants are picked once at
// configuration time instead of being re-dispatched per call.

use std::any::type_name;
use std::fmt::Debug;

use ndarray::ArrayD;

use crate::backend::number::{MaskIndex, PoolNum};
use crate::config::PoolConfig;

mod pooling;

pub use pooling::{MaxPool2dWithIndex, MaxPool3dWithIndex};

/// A max-pooling-with-index operator of a fixed input rank.
///
/// Implementations hold their [`PoolConfig`] and expose the three entry
/// points the host framework needs: shape inference for allocating the
/// output and mask, the forward kernel, and the backward kernel.
pub trait PoolOperator<T>: Debug
where
    T: PoolNum,
{
    /// Shapes of the pooled output and the mask for the given input shape.
    /// Fails on malformed rank or inconsistent configuration; no partial
    /// shape is produced.
    fn infer_shape(&self, input_shape: &[usize]) -> Result<(Vec<usize>, Vec<usize>), String>;

    /// Pooled values and the mask of max-producing flat offsets.
    fn forward(&self, input: &ArrayD<T>) -> Result<(ArrayD<T>, ArrayD<MaskIndex>), String>;

    /// Input gradient: the upstream gradient scattered to the positions the
    /// mask recorded. `input_shape` is the shape of the original input.
    fn backward(
        &self,
        mask: &ArrayD<MaskIndex>,
        grad_output: &ArrayD<T>,
        input_shape: &[usize],
    ) -> Result<ArrayD<T>, String>;

    fn name(&self) -> String {
        let full_name = type_name::<Self>();
        full_name
            .rsplit("::")
            .next()
            .unwrap_or(full_name)
            .to_string()
    }

    fn clone_op(&self) -> Box<dyn PoolOperator<T>>;
}

impl<T> PoolOperator<T> for Box<dyn PoolOperator<T>>
where
    T: PoolNum,
{
    fn infer_shape(&self, input_shape: &[usize]) -> Result<(Vec<usize>, Vec<usize>), String> {
        self.as_ref().infer_shape(input_shape)
    }

    fn forward(&self, input: &ArrayD<T>) -> Result<(ArrayD<T>, ArrayD<MaskIndex>), String> {
        self.as_ref().forward(input)
    }

    fn backward(
        &self,
        mask: &ArrayD<MaskIndex>,
        grad_output: &ArrayD<T>,
        input_shape: &[usize],
    ) -> Result<ArrayD<T>, String> {
        self.as_ref().backward(mask, grad_output, input_shape)
    }

    fn name(&self) -> String {
        self.as_ref().name()
    }

    fn clone_op(&self) -> Box<dyn PoolOperator<T>> {
        self.as_ref().clone_op()
    }
}

/// Pick the pooling operator for an input rank at configuration time.
/// Rank 4 inputs get the 2D operator, rank 5 the 3D one.
pub fn max_pool_with_index_op<T>(
    input_rank: usize,
    config: PoolConfig,
) -> Result<Box<dyn PoolOperator<T>>, String>
where
    T: PoolNum,
{
    match input_rank {
        4 => Ok(Box::new(MaxPool2dWithIndex::new(config))),
        5 => Ok(Box::new(MaxPool3dWithIndex::new(config))),
        rank => Err(format!(
            "No max pooling with index operator for {rank}D inputs; expected 4D or 5D"
        )),
    }
}

#[cfg(test)]
mod ops_tests {
    use super::*;
    use ndarray::IxDyn;

    fn tensor_4d(data: &[f32], n: usize, c: usize, h: usize, w: usize) -> ArrayD<f32> {
        ArrayD::from_shape_vec(IxDyn(&[n, c, h, w]), data.to_vec()).unwrap()
    }

    #[test]
    fn test_forward_backward_through_operator() {
        let input = tensor_4d(&(0..16).map(|v| v as f32).collect::<Vec<_>>(), 1, 1, 4, 4);
        let op = MaxPool2dWithIndex::new_2x2();

        let (out_shape, mask_shape) = PoolOperator::<f32>::infer_shape(&op, input.shape()).unwrap();
        assert_eq!(out_shape, vec![1, 1, 2, 2]);
        assert_eq!(out_shape, mask_shape);

        let (output, mask) = PoolOperator::<f32>::forward(&op, &input).unwrap();
        assert_eq!(output.shape(), out_shape.as_slice());
        assert_eq!(mask.as_slice().unwrap(), &[5, 7, 13, 15]);

        let grad_output = ArrayD::<f32>::ones(IxDyn(&out_shape));
        let grad_input = op.backward(&mask, &grad_output, input.shape()).unwrap();
        assert_eq!(grad_input.shape(), input.shape());
        assert_eq!(grad_input.as_slice().unwrap().iter().sum::<f32>(), 4.0);
    }

    #[test]
    fn test_operator_rejects_wrong_rank() {
        let input = ArrayD::<f32>::zeros(IxDyn(&[1, 1, 2, 4, 4]));
        let op = MaxPool2dWithIndex::new_2x2();
        assert!(PoolOperator::<f32>::forward(&op, &input).is_err());
        assert!(PoolOperator::<f32>::infer_shape(&op, input.shape()).is_err());

        let input = ArrayD::<f32>::zeros(IxDyn(&[1, 1, 4, 4]));
        let op = MaxPool3dWithIndex::new(PoolConfig::new(vec![2, 2, 2]));
        assert!(PoolOperator::<f32>::forward(&op, &input).is_err());
    }

    #[test]
    fn test_factory_selects_by_rank() {
        let op = max_pool_with_index_op::<f32>(4, PoolConfig::new(vec![2, 2])).unwrap();
        assert_eq!(op.name(), "MaxPool2dWithIndex");

        let op = max_pool_with_index_op::<f32>(5, PoolConfig::new(vec![2, 2, 2])).unwrap();
        assert_eq!(op.name(), "MaxPool3dWithIndex");

        assert!(max_pool_with_index_op::<f32>(3, PoolConfig::new(vec![2])).is_err());
    }

    #[test]
    fn test_boxed_operator_delegates() {
        let input = tensor_4d(&(0..16).map(|v| v as f32).collect::<Vec<_>>(), 1, 1, 4, 4);
        let op = max_pool_with_index_op::<f32>(
            4,
            PoolConfig::new(vec![2, 2]).with_strides(vec![2, 2]),
        )
        .unwrap();

        let (output, _) = op.forward(&input).unwrap();
        assert_eq!(output.as_slice().unwrap(), &[5.0, 7.0, 13.0, 15.0]);

        let cloned = op.clone_op();
        assert_eq!(cloned.name(), "MaxPool2dWithIndex");
    }
}
