use crate::animation::keyframes::Keyframes;
use crate::foundation::color::Color;
use crate::foundation::core::{Canvas, Rect, Size};
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::geometry::transform::{Transform2D, rotated_rect_aabb};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_SCENE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of the editing session a scene belongs to.
///
/// Clones of a scene (history states, export snapshots) share the id; loading or creating a scene
/// allocates a fresh one. The id is not content: it is ignored by equality and never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(u64);

impl SceneId {
    pub(crate) fn fresh() -> Self {
        Self(NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SceneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

/// Stable layer identity. Never reused within a scene, survives undo/redo.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LayerId(pub u64);

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "layer#{}", self.0)
    }
}

/// Opaque handle to host-provided pixels (image or sticker).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetRef(pub String);

impl AssetRef {
    /// Wrap a handle string.
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Borrow the handle string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text run handed to the host for rasterization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    /// UTF-8 text.
    pub text: String,
    /// Font size in canvas pixels.
    pub font_size: f64,
    /// Fill color.
    #[serde(default = "default_text_color")]
    pub color: Color,
    /// Optional font family hint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

fn default_text_color() -> Color {
    Color::BLACK
}

/// What a layer draws. `size` is the unscaled content box in canvas pixels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerContent {
    /// Photo or other raster image.
    Image {
        /// Pixel source.
        asset: AssetRef,
        /// Content box.
        size: Size,
    },
    /// Text block rasterized by the host.
    Text {
        /// Text run.
        text: TextContent,
        /// Content box.
        size: Size,
    },
    /// Decorative sticker artwork.
    Sticker {
        /// Pixel source.
        asset: AssetRef,
        /// Content box.
        size: Size,
    },
    /// Flat color plate.
    Solid {
        /// Fill color.
        color: Color,
        /// Content box.
        size: Size,
    },
}

impl LayerContent {
    /// Unscaled content size.
    pub fn size(&self) -> Size {
        match self {
            Self::Image { size, .. }
            | Self::Text { size, .. }
            | Self::Sticker { size, .. }
            | Self::Solid { size, .. } => *size,
        }
    }

    /// Short tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image { .. } => "image",
            Self::Text { .. } => "text",
            Self::Sticker { .. } => "sticker",
            Self::Solid { .. } => "solid",
        }
    }
}

/// One positioned visual element of a scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Stable id.
    pub id: LayerId,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Content drawn by this layer.
    pub content: LayerContent,
    /// Base transform.
    #[serde(default)]
    pub transform: Transform2D,
    /// Base opacity in `[0, 1]`.
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Hidden layers are neither drawn nor hit.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Animation track, deltas over the base transform.
    #[serde(default, skip_serializing_if = "Keyframes::is_empty")]
    pub keyframes: Keyframes,
}

fn default_opacity() -> f64 {
    1.0
}

fn default_visible() -> bool {
    true
}

impl Layer {
    /// Visible, opaque layer at the identity transform.
    pub fn new(id: LayerId, content: LayerContent) -> Self {
        Self {
            id,
            name: String::new(),
            content,
            transform: Transform2D::IDENTITY,
            opacity: 1.0,
            visible: true,
            keyframes: Keyframes::none(),
        }
    }

    /// Set the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the base transform.
    pub fn with_transform(mut self, transform: Transform2D) -> Self {
        self.transform = transform;
        self
    }

    /// Set the base opacity.
    pub fn with_opacity(mut self, opacity: f64) -> Self {
        self.opacity = opacity;
        self
    }

    /// Set the visibility flag.
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Set the animation track.
    pub fn with_keyframes(mut self, keyframes: Keyframes) -> Self {
        self.keyframes = keyframes;
        self
    }

    /// Unscaled content size.
    pub fn size(&self) -> Size {
        self.content.size()
    }

    /// Canvas-space bounding box at the base transform.
    pub fn bounds(&self) -> Rect {
        rotated_rect_aabb(&self.transform, self.size())
    }

    /// Transform and opacity after applying keyframes at `t_s`.
    pub fn evaluated_at(&self, t_s: f64) -> (Transform2D, f64) {
        self.keyframes
            .sample(t_s)
            .apply_to(&self.transform, self.opacity)
    }

    /// Copy with the transform sanitized and opacity clamped into `[0, 1]`.
    pub(crate) fn sanitized(mut self) -> LayerstackResult<Self> {
        self.transform = self.transform.sanitize()?;
        self.opacity = sanitize_opacity(self.opacity)?;
        self.keyframes.validate()?;
        Ok(self)
    }

    fn validate(&self) -> LayerstackResult<()> {
        if !self.transform.is_finite() {
            return Err(LayerstackError::invalid_geometry(format!(
                "{} has a non-finite transform",
                self.id
            )));
        }
        if !self.opacity.is_finite() || !(0.0..=1.0).contains(&self.opacity) {
            return Err(LayerstackError::validation(format!(
                "{} opacity must be within [0, 1], got {}",
                self.id, self.opacity
            )));
        }
        let size = self.size();
        if !(size.width.is_finite() && size.height.is_finite())
            || size.width <= 0.0
            || size.height <= 0.0
        {
            return Err(LayerstackError::invalid_geometry(format!(
                "{} content size must be positive, got {}x{}",
                self.id, size.width, size.height
            )));
        }
        if let LayerContent::Text { text, .. } = &self.content
            && !(text.font_size.is_finite() && text.font_size > 0.0)
        {
            return Err(LayerstackError::validation(format!(
                "{} font_size must be > 0",
                self.id
            )));
        }
        self.keyframes.validate()
    }
}

pub(crate) fn sanitize_opacity(opacity: f64) -> LayerstackResult<f64> {
    if !opacity.is_finite() {
        return Err(LayerstackError::invalid_geometry(format!(
            "opacity must be finite, got {opacity}"
        )));
    }
    Ok(opacity.clamp(0.0, 1.0))
}

/// Full composable state of one canvas.
///
/// Layers are ordered bottom to top. They are `Arc`-shared so cloning a scene for history or export
/// is cheap; edits copy only the touched layer.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Scene {
    #[serde(skip, default = "SceneId::fresh")]
    id: SceneId,
    canvas: Canvas,
    #[serde(default)]
    background: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration_s: Option<f64>,
    #[serde(default)]
    layers: Vec<Arc<Layer>>,
}

impl PartialEq for Scene {
    fn eq(&self, other: &Self) -> bool {
        self.canvas == other.canvas
            && self.background == other.background
            && self.duration_s == other.duration_s
            && self.layers == other.layers
    }
}

impl Scene {
    /// Empty scene with a white background.
    pub fn new(canvas: Canvas) -> Self {
        Self {
            id: SceneId::fresh(),
            canvas,
            background: Color::WHITE,
            duration_s: None,
            layers: Vec::new(),
        }
    }

    /// Set the background color.
    pub fn with_background(mut self, background: Color) -> Self {
        self.background = background;
        self
    }

    /// Set the animation duration.
    pub fn with_duration(mut self, duration_s: f64) -> Self {
        self.duration_s = Some(duration_s);
        self
    }

    /// Append `layer` on top. Fails on a duplicate id or non-finite geometry.
    pub fn with_layer(mut self, layer: Layer) -> LayerstackResult<Self> {
        let at = self.layers.len();
        self.insert_layer(at, layer.sanitized()?)?;
        Ok(self)
    }

    /// Editing session this scene belongs to.
    pub fn id(&self) -> SceneId {
        self.id
    }

    /// Canvas size.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Background color.
    pub fn background(&self) -> Color {
        self.background
    }

    /// Animation duration, if the scene is animated.
    pub fn duration_s(&self) -> Option<f64> {
        self.duration_s
    }

    /// Layers bottom to top.
    pub fn layers(&self) -> &[Arc<Layer>] {
        &self.layers
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// `true` when the scene has no layers.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Look up a layer.
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id == id).map(|l| l.as_ref())
    }

    /// Z-index of a layer.
    pub fn index_of(&self, id: LayerId) -> Option<usize> {
        self.layers.iter().position(|l| l.id == id)
    }

    /// `true` when a layer with `id` exists.
    pub fn contains(&self, id: LayerId) -> bool {
        self.index_of(id).is_some()
    }

    /// Highest layer id in use.
    pub fn max_layer_id(&self) -> Option<LayerId> {
        self.layers.iter().map(|l| l.id).max()
    }

    /// Check ids, geometry and timing for consistency.
    pub fn validate(&self) -> LayerstackResult<()> {
        if self.canvas.width == 0 || self.canvas.height == 0 {
            return Err(LayerstackError::validation(
                "canvas width/height must be non-zero",
            ));
        }
        if let Some(d) = self.duration_s
            && !(d.is_finite() && d >= 0.0)
        {
            return Err(LayerstackError::validation(format!(
                "duration_s must be finite and >= 0, got {d}"
            )));
        }
        let mut seen = HashSet::with_capacity(self.layers.len());
        for layer in &self.layers {
            if !seen.insert(layer.id) {
                return Err(LayerstackError::validation(format!(
                    "duplicate layer id {}",
                    layer.id
                )));
            }
            layer.validate()?;
        }
        Ok(())
    }

    /// Bring every layer into canonical form (normalized angles, clamped scales).
    pub(crate) fn sanitize_layers(&mut self) -> LayerstackResult<()> {
        for layer in &mut self.layers {
            let clean = layer.as_ref().clone().sanitized()?;
            if clean != **layer {
                *layer = Arc::new(clean);
            }
        }
        Ok(())
    }

    pub(crate) fn require_index(&self, id: LayerId) -> LayerstackResult<usize> {
        self.index_of(id)
            .ok_or_else(|| LayerstackError::not_found(id.to_string()))
    }

    pub(crate) fn insert_layer(&mut self, index: usize, layer: Layer) -> LayerstackResult<usize> {
        if self.contains(layer.id) {
            return Err(LayerstackError::validation(format!(
                "layer id {} already exists",
                layer.id
            )));
        }
        let index = index.min(self.layers.len());
        self.layers.insert(index, Arc::new(layer));
        Ok(index)
    }

    pub(crate) fn remove_layer(&mut self, id: LayerId) -> LayerstackResult<(usize, Arc<Layer>)> {
        let index = self.require_index(id)?;
        Ok((index, self.layers.remove(index)))
    }

    /// Move a layer to `to` (clamped). Returns the previous index.
    pub(crate) fn move_layer(&mut self, id: LayerId, to: usize) -> LayerstackResult<usize> {
        let from = self.require_index(id)?;
        let to = to.min(self.layers.len().saturating_sub(1));
        let layer = self.layers.remove(from);
        self.layers.insert(to, layer);
        Ok(from)
    }

    pub(crate) fn layer_mut(&mut self, id: LayerId) -> LayerstackResult<&mut Layer> {
        let index = self.require_index(id)?;
        Ok(Arc::make_mut(&mut self.layers[index]))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/scene/model.rs"]
mod tests;
