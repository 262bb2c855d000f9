//! Editing session: the document (scene, history, selection) and the pointer-driven editor.

/// Scene plus history plus selection.
pub mod document;
/// Document plus gesture handling and live preview.
pub mod editor;
