use crate::foundation::color::Color;
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::foundation::math::mul_div255_u8;
use crate::scene::model::{AssetRef, LayerContent, Scene, TextContent};
use anyhow::Context as _;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Raster pixels ready for drawing, in premultiplied RGBA8.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreparedImage {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major premultiplied RGBA8 bytes, shared between clones.
    pub rgba8_premul: Arc<Vec<u8>>,
}

impl PreparedImage {
    /// Wrap already-premultiplied bytes.
    pub fn from_premul_rgba8(width: u32, height: u32, bytes: Vec<u8>) -> LayerstackResult<Self> {
        let expected = (width as usize)
            .saturating_mul(height as usize)
            .saturating_mul(4);
        if width == 0 || height == 0 || bytes.len() != expected {
            return Err(LayerstackError::validation(format!(
                "prepared image {width}x{height} expects {expected} bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul: Arc::new(bytes),
        })
    }

    /// Premultiply straight-alpha bytes.
    pub fn from_straight_rgba8(
        width: u32,
        height: u32,
        mut bytes: Vec<u8>,
    ) -> LayerstackResult<Self> {
        premultiply_rgba8_in_place(&mut bytes);
        Self::from_premul_rgba8(width, height, bytes)
    }

    /// Uniformly colored image.
    pub fn solid(width: u32, height: u32, color: Color) -> LayerstackResult<Self> {
        let px = color.to_premul().to_array();
        let n = (width as usize).saturating_mul(height as usize);
        Self::from_premul_rgba8(width, height, px.repeat(n))
    }

    /// Decode an encoded raster image (PNG, JPEG, GIF, ...) with the `image` crate.
    pub fn decode(bytes: &[u8]) -> LayerstackResult<Self> {
        let dyn_img = image::load_from_memory(bytes).context("decode image from memory")?;
        let rgba = dyn_img.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_straight_rgba8(width, height, rgba.into_raw())
    }
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = mul_div255_u8(u16::from(px[0]), a);
        px[1] = mul_div255_u8(u16::from(px[1]), a);
        px[2] = mul_div255_u8(u16::from(px[2]), a);
    }
}

/// Host collaborator resolving asset handles and text runs into pixels.
///
/// Implementations must be deterministic and shareable across render workers.
pub trait AssetSource: Send + Sync {
    /// Pixels for an image or sticker handle.
    fn image(&self, asset: &AssetRef) -> LayerstackResult<PreparedImage>;

    /// Rasterized text run.
    fn text(&self, text: &TextContent) -> LayerstackResult<PreparedImage>;
}

/// Asset source backed by in-memory maps.
///
/// Text runs are looked up by their exact string.
#[derive(Clone, Debug, Default)]
pub struct InMemoryAssets {
    images: HashMap<AssetRef, PreparedImage>,
    texts: HashMap<String, PreparedImage>,
}

impl InMemoryAssets {
    /// Empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register pixels for `asset`.
    pub fn insert_image(&mut self, asset: AssetRef, image: PreparedImage) {
        self.images.insert(asset, image);
    }

    /// Register a pre-rasterized text run.
    pub fn insert_text(&mut self, text: impl Into<String>, image: PreparedImage) {
        self.texts.insert(text.into(), image);
    }

    /// Number of registered images.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Decode every image and sticker referenced by `scene` from files under `root`.
    ///
    /// Handles are interpreted as relative paths; absolute paths and `..` are rejected.
    pub fn load_scene_assets(root: impl AsRef<Path>, scene: &Scene) -> LayerstackResult<Self> {
        let root = root.as_ref();
        let mut out = Self::new();
        for layer in scene.layers() {
            let (LayerContent::Image { asset, .. } | LayerContent::Sticker { asset, .. }) =
                &layer.content
            else {
                continue;
            };
            if out.images.contains_key(asset) {
                continue;
            }
            let rel = normalize_rel_path(asset.as_str())?;
            let path = root.join(Path::new(&rel));
            let bytes = std::fs::read(&path)
                .with_context(|| format!("read asset '{}'", path.display()))?;
            let image = PreparedImage::decode(&bytes)?;
            tracing::debug!(asset = %asset, w = image.width, h = image.height, "asset decoded");
            out.images.insert(asset.clone(), image);
        }
        Ok(out)
    }
}

impl AssetSource for InMemoryAssets {
    fn image(&self, asset: &AssetRef) -> LayerstackResult<PreparedImage> {
        self.images
            .get(asset)
            .cloned()
            .ok_or_else(|| LayerstackError::render(format!("missing asset '{asset}'")))
    }

    fn text(&self, text: &TextContent) -> LayerstackResult<PreparedImage> {
        self.texts.get(&text.text).cloned().ok_or_else(|| {
            LayerstackError::render(format!("no rasterized text for \"{}\"", text.text))
        })
    }
}

/// Normalize and validate scene-relative asset paths.
///
/// The normalized result uses `/` separators, removes `.` segments, and rejects absolute paths or
/// parent traversals (`..`).
pub(crate) fn normalize_rel_path(source: &str) -> LayerstackResult<String> {
    let s = source.replace('\\', "/");
    if s.starts_with('/') {
        return Err(LayerstackError::validation("asset paths must be relative"));
    }
    let mut out = Vec::<&str>::new();
    for part in s.split('/') {
        if part.is_empty() || part == "." {
            continue;
        }
        if part == ".." {
            return Err(LayerstackError::validation(
                "asset paths must not contain '..'",
            ));
        }
        out.push(part);
    }
    if out.is_empty() {
        return Err(LayerstackError::validation(
            "asset path must contain a file name",
        ));
    }
    Ok(out.join("/"))
}

#[cfg(test)]
#[path = "../../tests/unit/render/assets.rs"]
mod tests;
