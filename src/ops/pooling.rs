// src/ops/pooling.rs
// The 2D and 3D max-pooling-with-index operators.

use ndarray::ArrayD;

use crate::backend::kernels::{
    max_pool2d_with_index, max_pool2d_with_index_grad, max_pool3d_with_index,
    max_pool3d_with_index_grad,
};
use crate::backend::number::{MaskIndex, PoolNum};
use crate::config::PoolConfig;
use crate::ops::PoolOperator;
use crate::shape::infer_pool_with_index_shape;

/// 2D max pooling with index recording.
///
/// Input is NCHW: N is the batch size, C the number of channels, H and W
/// the height and width of the feature map. Output and mask share the
/// pooled NCHW shape; each mask entry is the flat offset, within the
/// (N, C) feature map, of the element that produced the pooled maximum.
/// The backward pass scatters the upstream gradient straight to those
/// offsets instead of recomputing the argmax.
#[derive(Debug, Clone)]
pub struct MaxPool2dWithIndex {
    config: PoolConfig,
}

impl MaxPool2dWithIndex {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    /// Window of (height, width) with matching stride and padding on both
    /// axes.
    pub fn with_window(ksize: usize, stride: usize, padding: usize) -> Self {
        Self::new(
            PoolConfig::new(vec![ksize, ksize])
                .with_strides(vec![stride, stride])
                .with_paddings(vec![padding, padding]),
        )
    }

    /// Common 2x2 pooling with stride 2 (halves the spatial size)
    pub fn new_2x2() -> Self {
        Self::with_window(2, 2, 0)
    }

    /// Pool each full feature map to a single element
    pub fn global() -> Self {
        Self::new(PoolConfig::new(vec![1, 1]).global())
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl<T> PoolOperator<T> for MaxPool2dWithIndex
where
    T: PoolNum,
{
    fn infer_shape(&self, input_shape: &[usize]) -> Result<(Vec<usize>, Vec<usize>), String> {
        if input_shape.len() != 4 {
            return Err(format!(
                "MaxPool2dWithIndex requires a 4D input tensor [N, C, H, W], got {}D",
                input_shape.len()
            ));
        }
        infer_pool_with_index_shape(input_shape, &self.config)
    }

    fn forward(&self, input: &ArrayD<T>) -> Result<(ArrayD<T>, ArrayD<MaskIndex>), String> {
        if input.ndim() != 4 {
            return Err(format!(
                "MaxPool2dWithIndex requires a 4D input tensor [N, C, H, W], got {}D",
                input.ndim()
            ));
        }
        let resolved = self.config.resolve(input.shape())?;
        max_pool2d_with_index(input, &resolved)
    }

    fn backward(
        &self,
        mask: &ArrayD<MaskIndex>,
        grad_output: &ArrayD<T>,
        input_shape: &[usize],
    ) -> Result<ArrayD<T>, String> {
        max_pool2d_with_index_grad(mask, grad_output, input_shape)
    }

    fn clone_op(&self) -> Box<dyn PoolOperator<T>> {
        Box::new(self.clone())
    }
}

/// 3D max pooling with index recording.
///
/// Input is NCDHW: N is the batch size, C the number of channels, D, H and
/// W the depth, height and width of the feature volume. Mask offsets are
/// row-major over the three spatial axes of one (N, C) volume.
#[derive(Debug, Clone)]
pub struct MaxPool3dWithIndex {
    config: PoolConfig,
}

impl MaxPool3dWithIndex {
    pub fn new(config: PoolConfig) -> Self {
        Self { config }
    }

    /// Cubic window with matching stride and padding on all three axes.
    pub fn with_window(ksize: usize, stride: usize, padding: usize) -> Self {
        Self::new(
            PoolConfig::new(vec![ksize, ksize, ksize])
                .with_strides(vec![stride, stride, stride])
                .with_paddings(vec![padding, padding, padding]),
        )
    }

    /// Common 2x2x2 pooling with stride 2 (halves each spatial axis)
    pub fn new_2x2x2() -> Self {
        Self::with_window(2, 2, 0)
    }

    /// Pool each full feature volume to a single element
    pub fn global() -> Self {
        Self::new(PoolConfig::new(vec![1, 1, 1]).global())
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }
}

impl<T> PoolOperator<T> for MaxPool3dWithIndex
where
    T: PoolNum,
{
    fn infer_shape(&self, input_shape: &[usize]) -> Result<(Vec<usize>, Vec<usize>), String> {
        if input_shape.len() != 5 {
            return Err(format!(
                "MaxPool3dWithIndex requires a 5D input tensor [N, C, D, H, W], got {}D",
                input_shape.len()
            ));
        }
        infer_pool_with_index_shape(input_shape, &self.config)
    }

    fn forward(&self, input: &ArrayD<T>) -> Result<(ArrayD<T>, ArrayD<MaskIndex>), String> {
        if input.ndim() != 5 {
            return Err(format!(
                "MaxPool3dWithIndex requires a 5D input tensor [N, C, D, H, W], got {}D",
                input.ndim()
            ));
        }
        let resolved = self.config.resolve(input.shape())?;
        max_pool3d_with_index(input, &resolved)
    }

    fn backward(
        &self,
        mask: &ArrayD<MaskIndex>,
        grad_output: &ArrayD<T>,
        input_shape: &[usize],
    ) -> Result<ArrayD<T>, String> {
        max_pool3d_with_index_grad(mask, grad_output, input_shape)
    }

    fn clone_op(&self) -> Box<dyn PoolOperator<T>> {
        Box::new(self.clone())
    }
}
