//! Pointer-driven editing: hit testing, snapping and the gesture state machine.
//!
//! Nothing here touches a rendering surface. The machine reads the scene and the selection and
//! answers with actions; committing is left to the editing session.

/// Gesture state machine.
pub mod gesture;
/// Resize and rotate handle geometry.
pub mod handles;
/// Pointer hit testing and marquee selection.
pub mod hit;
/// Position and angle snapping.
pub mod snap;
