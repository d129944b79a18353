// src/config.rs
// Pooling configuration: the per-operator attribute set and its validated,
// input-specific form consumed by the kernels.

/// Attribute set of a max-pooling-with-index operator.
///
/// `ksize`, `strides` and `paddings` are ordered per spatial axis: (height,
/// width) for 2D pooling, (depth, height, width) for 3D. Strides default to
/// all ones and paddings to all zeros. When `global_pooling` is set, `ksize`
/// and `paddings` are ignored and the full spatial extent of the input is
/// pooled instead.
///
/// A `PoolConfig` is built once per operator instance and never mutated;
/// [`PoolConfig::resolve`] turns it into the [`ResolvedPoolConfig`] the
/// kernels run against.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Pooling window extent per spatial axis
    pub ksize: Vec<usize>,
    /// Step of the pooling window per spatial axis
    pub strides: Vec<usize>,
    /// Zero-padding added to both ends of each spatial axis
    pub paddings: Vec<usize>,
    /// Pool the entire spatial extent into a single element per channel
    pub global_pooling: bool,
}

impl PoolConfig {
    /// Create a configuration with the given window, unit strides and no
    /// padding.
    pub fn new(ksize: Vec<usize>) -> Self {
        let strides = vec![1; ksize.len()];
        let paddings = vec![0; ksize.len()];
        Self {
            ksize,
            strides,
            paddings,
            global_pooling: false,
        }
    }

    pub fn with_strides(mut self, strides: Vec<usize>) -> Self {
        self.strides = strides;
        self
    }

    pub fn with_paddings(mut self, paddings: Vec<usize>) -> Self {
        self.paddings = paddings;
        self
    }

    /// Switch to global pooling. `ksize` and `paddings` stop mattering; the
    /// window is replaced by the full spatial extent during resolution.
    pub fn global(mut self) -> Self {
        self.global_pooling = true;
        self
    }

    /// Validate this configuration against a concrete input shape and
    /// produce the form the kernels consume.
    ///
    /// The global-pooling substitution happens here, so downstream code
    /// never re-checks the flag: the resolved window already spans the full
    /// spatial extent with zero padding.
    ///
    /// # Errors
    ///
    /// All violations are configuration bugs and fatal to the operator
    /// instantiation; no partial result is produced:
    /// - input rank is not 4 (NCHW) or 5 (NCDHW)
    /// - `ksize` length differs from input rank minus 2
    /// - `strides` or `paddings` length differs from `ksize` length
    /// - a window or stride entry is zero
    /// - a padded axis is shorter than its window (empty output)
    /// - padding reaches the window extent, leaving a window that clips to
    ///   nothing (degenerate window)
    pub fn resolve(&self, input_shape: &[usize]) -> Result<ResolvedPoolConfig, String> {
        if input_shape.len() != 4 && input_shape.len() != 5 {
            return Err(format!(
                "Pooling input must be a 4D or 5D tensor, got {}D",
                input_shape.len()
            ));
        }

        let spatial_rank = input_shape.len() - 2;

        let (ksize, paddings) = if self.global_pooling {
            (input_shape[2..].to_vec(), vec![0; spatial_rank])
        } else {
            (self.ksize.clone(), self.paddings.clone())
        };

        if ksize.len() != spatial_rank {
            return Err(format!(
                "Input rank and pooling size are inconsistent: {}D input needs {} window extents, got {}",
                input_shape.len(),
                spatial_rank,
                ksize.len()
            ));
        }
        if self.strides.len() != ksize.len() {
            return Err(format!(
                "Strides length and pooling size must match: {} vs {}",
                self.strides.len(),
                ksize.len()
            ));
        }
        if paddings.len() != ksize.len() {
            return Err(format!(
                "Paddings length and pooling size must match: {} vs {}",
                paddings.len(),
                ksize.len()
            ));
        }

        for axis in 0..spatial_rank {
            let (dim, k, s, p) = (
                input_shape[axis + 2],
                ksize[axis],
                self.strides[axis],
                paddings[axis],
            );

            if k == 0 {
                return Err(format!("Pooling window extent on axis {axis} must be positive"));
            }
            if s == 0 {
                return Err(format!("Pooling stride on axis {axis} must be positive"));
            }
            // A window no larger than the padding clips to nothing on the
            // first output position; the max over it is undefined.
            if p >= k {
                return Err(format!(
                    "Padding {p} on axis {axis} must be smaller than the window extent {k}"
                ));
            }
            if dim + 2 * p < k {
                return Err(format!(
                    "Window extent {k} exceeds padded input extent {} on axis {axis}",
                    dim + 2 * p
                ));
            }
        }

        Ok(ResolvedPoolConfig {
            ksize,
            strides: self.strides.clone(),
            paddings,
        })
    }
}

/// A [`PoolConfig`] validated against a concrete input shape.
///
/// Immutable by construction: global pooling has already been substituted
/// (window = full spatial extent, paddings zeroed), every length matches the
/// input's spatial rank, and every window is known to clip to a non-empty
/// range. The kernels rely on these invariants instead of re-validating.
#[derive(Debug, Clone)]
pub struct ResolvedPoolConfig {
    ksize: Vec<usize>,
    strides: Vec<usize>,
    paddings: Vec<usize>,
}

impl ResolvedPoolConfig {
    pub fn ksize(&self) -> &[usize] {
        &self.ksize
    }

    pub fn strides(&self) -> &[usize] {
        &self.strides
    }

    pub fn paddings(&self) -> &[usize] {
        &self.paddings
    }

    /// Number of pooled spatial axes (2 for NCHW, 3 for NCDHW)
    pub fn spatial_rank(&self) -> usize {
        self.ksize.len()
    }
}
