pub mod kernels;
pub mod number;

pub use kernels::{
    max_pool2d_with_index, max_pool2d_with_index_grad, max_pool3d_with_index,
    max_pool3d_with_index_grad,
};
pub use number::{MaskIndex, PoolNum};
