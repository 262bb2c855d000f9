//! Encoder collaborators.
//!
//! Sinks consume rendered frames in timeline order. The export pipeline guarantees that a sink
//! sees `begin`, then frames in strictly increasing index order, then exactly one of `end` or
//! `abort`.

/// `ffmpeg`-based sink (MP4 output via system `ffmpeg`).
pub mod ffmpeg;
/// Animated GIF sink built on the `image` crate.
pub mod gif;
/// Generic frame sink trait and the in-memory sink.
pub mod sink;
