//! Timeline export: render a scene snapshot over a time range and stream the frames, in order, to
//! a [`crate::encode::sink::FrameSink`].

/// Evaluated-state fingerprints used for static-frame elision.
pub mod fingerprint;
/// Job, request, status and progress types.
pub mod job;
/// Background job spawning with per-scene exclusivity.
pub mod manager;
/// Sequential and parallel frame loops.
pub mod pipeline;
