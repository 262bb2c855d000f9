//! Deterministic scene rasterization.
//!
//! The renderer never decodes or fetches pixels on its own: image, sticker and text layers draw
//! what an [`assets::AssetSource`] hands it.

/// Prepared pixels and the asset collaborator.
pub mod assets;
/// Backend trait and shared frame types.
pub mod backend;
/// CPU backend powered by `vello_cpu`.
pub mod cpu;
