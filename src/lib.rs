//! # Maskpool
//!
//! CPU max-pooling kernels that record, for every pooled output element,
//! the flat index of the input element that produced the maximum. The
//! recorded index ("mask") turns the backward pass into an exact scatter:
//! the upstream gradient is added at the recorded positions instead of the
//! argmax being recomputed.
//!
//! ## Features
//!
//! - 2D (NCHW) and 3D (NCDHW) max pooling with index recording
//! - Output-shape inference for allocating the output and mask tensors
//! - Accumulating backward scatter that handles overlapping windows
//! - Global pooling resolved into the configuration up front
//! - Per-(batch, channel) slice parallelism via `rayon`
//! - Dense tensors via `ndarray`; written 100% in safe Rust
//!
//! ## Example
//!
//! ```
//! use maskpool::{MaxPool2dWithIndex, PoolOperator};
//! use ndarray::{ArrayD, IxDyn};
//!
//! let input = ArrayD::from_shape_vec(
//!     IxDyn(&[1, 1, 4, 4]),
//!     (0..16).map(|v| v as f32).collect(),
//! )
//! .unwrap();
//!
//! let op = MaxPool2dWithIndex::new_2x2();
//! let (output, mask) = op.forward(&input).unwrap();
//! assert_eq!(output.shape(), &[1, 1, 2, 2]);
//! assert_eq!(mask.as_slice().unwrap(), &[5, 7, 13, 15]);
//!
//! let grad_output = ArrayD::<f32>::ones(IxDyn(&[1, 1, 2, 2]));
//! let grad_input = op.backward(&mask, &grad_output, input.shape()).unwrap();
//! assert_eq!(grad_input[[0, 0, 1, 1]], 1.0);
//! ```

pub mod backend;
pub mod config;
pub mod ops;
pub mod shape;

// Re-export commonly used types for convenience
pub use backend::kernels::{
    max_pool2d_with_index, max_pool2d_with_index_grad, max_pool3d_with_index,
    max_pool3d_with_index_grad,
};
pub use backend::number::{MaskIndex, PoolNum};
pub use config::{PoolConfig, ResolvedPoolConfig};
pub use ops::{MaxPool2dWithIndex, MaxPool3dWithIndex, PoolOperator, max_pool_with_index_op};
pub use shape::{infer_pool_grad_shape, infer_pool_with_index_shape, pooled_output_size};
