//! Scene graph: layers, reversible edit commands and JSON persistence.

/// Reversible scene edits.
pub mod command;
/// Scene, layer and content types.
pub mod model;
/// JSON load/save for scenes.
pub mod persist;
