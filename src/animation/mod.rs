/// Easing curves.
pub mod ease;
/// Per-layer keyframe tracks and their sampling.
pub mod keyframes;
