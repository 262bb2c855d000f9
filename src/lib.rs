//! Layerstack is a layered canvas composition engine for flyer, GIF and short-video builders.
//!
//! A scene is an ordered stack of positioned layers. Edits go through reversible commands with
//! undo/redo, pointer gestures move, resize and rotate layers with snapping, and a deterministic
//! CPU renderer turns the scene into frames that an export job streams, in order, to an encoder:
//!
//! - Build or load a [`Scene`] and wrap it in an [`Editor`]
//! - Feed pointer events to [`Editor::handle_pointer`] and render previews
//! - Export a time range with an [`ExportJob`] or a background [`ExportManager`] into a
//!   [`FrameSink`]
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod foundation;

/// Easing curves and keyframe tracks.
pub mod animation;
/// Encoder collaborators that consume rendered frames.
pub mod encode;
/// Timeline export jobs.
pub mod export;
/// Transform math.
pub mod geometry;
/// Command-based undo/redo.
pub mod history;
/// Hit testing, snapping and gestures.
pub mod interaction;
/// Rendering backend(s) and asset sources.
pub mod render;
/// Scene model, commands and persistence.
pub mod scene;
/// Editing session glue.
pub mod session;

pub use crate::foundation::color::Color;
pub use crate::foundation::core::{
    Affine, Canvas, Fps, FrameIndex, Point, Rect, Rgba8Premul, Size, TimeRange, Vec2,
};
pub use crate::foundation::error::{LayerstackError, LayerstackResult};

pub use crate::animation::ease::Ease;
pub use crate::animation::keyframes::{Keyframe, Keyframes};
pub use crate::encode::ffmpeg::{FfmpegSink, FfmpegSinkOpts};
pub use crate::encode::gif::GifSink;
pub use crate::encode::sink::{FrameSink, InMemorySink, SinkConfig};
pub use crate::export::job::{
    CancelToken, ExportEvent, ExportJob, ExportOpts, ExportProgress, ExportReport, ExportRequest,
    ExportStatus, JobId, RenderStats,
};
pub use crate::export::manager::{ExportHandle, ExportManager};
pub use crate::geometry::transform::Transform2D;
pub use crate::history::stack::HistoryStack;
pub use crate::interaction::gesture::{InteractionAction, Modifiers, PointerEvent};
pub use crate::interaction::snap::{SnapConfig, SnapGuide};
pub use crate::render::assets::{AssetSource, InMemoryAssets, PreparedImage};
pub use crate::render::backend::{FrameRGBA, RenderBackend, RenderSettings};
pub use crate::render::cpu::CpuBackend;
pub use crate::scene::command::Command;
pub use crate::scene::model::{AssetRef, Layer, LayerContent, LayerId, Scene, SceneId, TextContent};
pub use crate::session::document::Document;
pub use crate::session::editor::{Editor, EditorConfig};
