use crate::foundation::core::Canvas;
use crate::foundation::error::LayerstackResult;
use crate::render::assets::AssetSource;
use crate::scene::model::Scene;

/// A rendered frame as RGBA8 pixels.
///
/// Frames are **premultiplied alpha** by default. The `premultiplied` flag is included to make this
/// explicit at API boundaries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether the `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Premultiplied RGBA of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        self.data
            .get(i..i + 4)
            .map(|p| [p[0], p[1], p[2], p[3]])
    }
}

/// A renderer that rasterizes a [`Scene`] at a point in time into a [`FrameRGBA`].
///
/// Rendering is deterministic: the same scene, time, output size and assets always yield the same
/// bytes.
pub trait RenderBackend: Send {
    /// Render `scene` at `t_s` seconds into an `output`-sized frame.
    ///
    /// The canvas is scaled per axis to fill `output`. Missing assets or an unusable output size
    /// are [`crate::LayerstackError::RenderFailure`]s.
    fn render_scene(
        &mut self,
        scene: &Scene,
        t_s: f64,
        output: Canvas,
        assets: &dyn AssetSource,
    ) -> LayerstackResult<FrameRGBA>;

    /// Return backend settings required to construct equivalent worker backends.
    ///
    /// This is used by parallel rendering paths.
    fn worker_render_settings(&self) -> Option<RenderSettings> {
        None
    }
}

/// Available backend kinds.
///
/// - `Cpu` is always available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// CPU raster backend powered by `vello_cpu`.
    #[default]
    Cpu,
}

/// Backend-agnostic settings.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderSettings {
    /// If set, backends clear the target to this RGBA8 color (straight alpha) before drawing the
    /// scene background.
    pub clear_rgba: Option<[u8; 4]>,
}

/// Create a rendering backend implementation.
pub fn create_backend(
    kind: BackendKind,
    settings: &RenderSettings,
) -> LayerstackResult<Box<dyn RenderBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(crate::render::cpu::CpuBackend::new(
            settings.clone(),
        ))),
    }
}
