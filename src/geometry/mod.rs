//! 2D transform math for layers: affine construction, bounds and hit testing.

/// Layer transform tuple and pure helpers over it.
pub mod transform;
