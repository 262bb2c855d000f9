/// Command-based undo/redo.
pub mod stack;
