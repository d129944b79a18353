// src/backend/number.rs

use std::cmp::{PartialEq, PartialOrd};
use std::default::Default;
use std::fmt::{Debug, Display};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Sub, SubAssign};

/// Element type of the mask tensor.
///
/// Each mask entry is the flat offset, within one (N, C) feature map, of the
/// input element that produced the pooled maximum. `i64` addresses any
/// per-slice element count a dense CPU tensor can reach, and leaves negative
/// values available as "not yet written" sentinels inside the kernels.
pub type MaskIndex = i64;

/// Base trait for the numeric types the pooling kernels operate on.
/// Provides the common interface for arithmetic, comparisons, and the
/// conversions the kernels and their tests need.
pub trait PoolNum:
    // Basic arithmetic operations
    Add<Output = Self> + Sub<Output = Self> + Mul<Output = Self> + Div<Output = Self>
    + Sum<Self> + for<'a> Sum<&'a Self> +
    // Assignment operations
    AddAssign + SubAssign + MulAssign + DivAssign +
    // Comparisons
    PartialOrd + PartialEq +
    // Essential traits
    Clone + Copy + Debug + Display + Default +
    Send + Sync + Sized + 'static
{
    /// Neutral element for addition (zero)
    fn zero() -> Self;

    /// Neutral element for multiplication (one)
    fn one() -> Self;

    /// Checks if the value is zero
    fn is_zero(&self) -> bool {
        *self == <Self as PoolNum>::zero()
    }

    /// Minimum value representable by this type
    fn min_value() -> Self;

    /// Maximum value representable by this type
    fn max_value() -> Self;

    fn max(self, other: Self) -> Self {
        if self >= other {
            return self;
        }
        other
    }

    fn min(self, other: Self) -> Self {
        if self <= other {
            return self;
        }
        other
    }

    /// Converts to f64 for operations that require floating point
    fn to_f64(self) -> f64;

    /// Converts to f32 for operations that require floating point
    fn to_f32(self) -> f32;

    /// Converts from f32 (may fail if there's precision loss)
    fn from_f32(value: f32) -> Option<Self>;

    /// Converts from f64 (may fail if there's precision loss)
    fn from_f64(value: f64) -> Option<Self>;
}

// ============= POOLNUM IMPLEMENTATIONS =============

impl PoolNum for f64 {
    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    fn min_value() -> Self {
        f64::MIN
    }

    fn max_value() -> Self {
        f64::MAX
    }

    fn to_f64(self) -> f64 {
        self
    }

    fn to_f32(self) -> f32 {
        self as f32
    }

    fn from_f32(value: f32) -> Option<Self> {
        Some(value as f64)
    }

    fn from_f64(value: f64) -> Option<Self> {
        Some(value)
    }
}

impl PoolNum for f32 {
    fn zero() -> Self {
        0.0
    }

    fn one() -> Self {
        1.0
    }

    fn min_value() -> Self {
        f32::MIN
    }

    fn max_value() -> Self {
        f32::MAX
    }

    fn to_f64(self) -> f64 {
        self as f64
    }

    fn to_f32(self) -> f32 {
        self
    }

    fn from_f32(value: f32) -> Option<Self> {
        Some(value)
    }

    fn from_f64(value: f64) -> Option<Self> {
        Some(value as f32)
    }
}
