use crate::foundation::color::Color;
use crate::foundation::core::{Affine, Canvas, Rect, Size};
use crate::foundation::error::{LayerstackError, LayerstackResult};
use crate::geometry::transform::content_rect;
use crate::render::assets::{AssetSource, PreparedImage};
use crate::render::backend::{FrameRGBA, RenderBackend, RenderSettings};
use crate::scene::model::{AssetRef, LayerContent, Scene, TextContent};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
struct ImagePaint {
    source: Arc<Vec<u8>>,
    paint: vello_cpu::Image,
    w: u32,
    h: u32,
}

/// Every field of a text run that can change its raster.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TextKey {
    text: String,
    font_size_bits: u64,
    color: Color,
    font_family: Option<String>,
}

impl TextKey {
    fn of(text: &TextContent) -> Self {
        Self {
            text: text.text.clone(),
            font_size_bits: text.font_size.to_bits(),
            color: text.color,
            font_family: text.font_family.clone(),
        }
    }
}

/// CPU backend powered by `vello_cpu`.
///
/// The render context and decoded paints are reused across frames; a paint is rebuilt whenever the
/// asset source hands back different pixels for the same handle.
pub struct CpuBackend {
    settings: RenderSettings,
    ctx: Option<vello_cpu::RenderContext>,
    image_cache: HashMap<AssetRef, ImagePaint>,
    text_cache: HashMap<TextKey, ImagePaint>,
}

impl CpuBackend {
    /// Create a backend with the given settings.
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            ctx: None,
            image_cache: HashMap::new(),
            text_cache: HashMap::new(),
        }
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> LayerstackResult<R>,
    ) -> LayerstackResult<R> {
        let mut ctx = match self.ctx.take() {
            None => vello_cpu::RenderContext::new(width, height),
            Some(ctx) if ctx.width() == width && ctx.height() == height => ctx,
            Some(_) => vello_cpu::RenderContext::new(width, height),
        };
        ctx.reset();
        let out = f(self, &mut ctx)?;
        self.ctx = Some(ctx);
        Ok(out)
    }

    fn image_paint_for(
        &mut self,
        asset: &AssetRef,
        assets: &dyn AssetSource,
    ) -> LayerstackResult<ImagePaint> {
        let prepared = assets.image(asset).map_err(LayerstackError::into_render_failure)?;
        if let Some(cached) = self.image_cache.get(asset)
            && Arc::ptr_eq(&cached.source, &prepared.rgba8_premul)
        {
            return Ok(cached.clone());
        }
        let paint = image_paint(&prepared)?;
        self.image_cache.insert(asset.clone(), paint.clone());
        Ok(paint)
    }

    fn text_paint_for(
        &mut self,
        text: &TextContent,
        assets: &dyn AssetSource,
    ) -> LayerstackResult<ImagePaint> {
        let prepared = assets.text(text).map_err(LayerstackError::into_render_failure)?;
        let key = TextKey::of(text);
        if let Some(cached) = self.text_cache.get(&key)
            && Arc::ptr_eq(&cached.source, &prepared.rgba8_premul)
        {
            return Ok(cached.clone());
        }
        let paint = image_paint(&prepared)?;
        self.text_cache.insert(key, paint.clone());
        Ok(paint)
    }
}

impl RenderBackend for CpuBackend {
    #[tracing::instrument(level = "trace", skip(self, scene, assets))]
    fn render_scene(
        &mut self,
        scene: &Scene,
        t_s: f64,
        output: Canvas,
        assets: &dyn AssetSource,
    ) -> LayerstackResult<FrameRGBA> {
        output
            .validate_raster()
            .map_err(|e| LayerstackError::render(format!("output size: {e}")))?;
        scene
            .canvas()
            .validate_raster()
            .map_err(|e| LayerstackError::render(format!("scene canvas: {e}")))?;
        if !t_s.is_finite() {
            return Err(LayerstackError::render("render time must be finite"));
        }

        let (w, h) = (output.width as u16, output.height as u16);
        let view = Affine::scale_non_uniform(
            f64::from(output.width) / f64::from(scene.canvas().width),
            f64::from(output.height) / f64::from(scene.canvas().height),
        );
        let clear = self.settings.clear_rgba;

        self.with_ctx_mut(w, h, |backend, ctx| {
            let full = vello_cpu::kurbo::Rect::new(0.0, 0.0, f64::from(w), f64::from(h));
            ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            if let Some([r, g, b, a]) = clear
                && a > 0
            {
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(r, g, b, a));
                ctx.fill_rect(&full);
            }
            let bg = scene.background();
            if bg.a > 0 {
                ctx.set_paint(color_to_cpu(bg));
                ctx.fill_rect(&full);
            }

            for layer in scene.layers() {
                if !layer.visible {
                    continue;
                }
                let (transform, opacity) = layer.evaluated_at(t_s);
                if opacity <= 0.0 {
                    continue;
                }
                let size = layer.size();
                if size.width <= 0.0 || size.height <= 0.0 {
                    continue;
                }
                let placed = view * transform.to_affine();

                let paint = match &layer.content {
                    LayerContent::Solid { color, .. } => {
                        if color.a == 0 {
                            continue;
                        }
                        ctx.set_transform(affine_to_cpu(placed));
                        ctx.set_paint(color_to_cpu(*color));
                        fill_with_opacity(ctx, rect_to_cpu(content_rect(size)), opacity);
                        continue;
                    }
                    LayerContent::Image { asset, .. } | LayerContent::Sticker { asset, .. } => {
                        backend.image_paint_for(asset, assets)?
                    }
                    LayerContent::Text { text, .. } => backend.text_paint_for(text, assets)?,
                };

                ctx.set_transform(affine_to_cpu(placed * fit_affine(size, paint.w, paint.h)));
                ctx.set_paint(paint.paint);
                fill_with_opacity(
                    ctx,
                    vello_cpu::kurbo::Rect::new(0.0, 0.0, f64::from(paint.w), f64::from(paint.h)),
                    opacity,
                );
            }

            let mut pixmap = vello_cpu::Pixmap::new(w, h);
            ctx.flush();
            ctx.render_to_pixmap(&mut pixmap);
            Ok(FrameRGBA {
                width: output.width,
                height: output.height,
                data: pixmap.data_as_u8_slice().to_vec(),
                premultiplied: true,
            })
        })
    }

    fn worker_render_settings(&self) -> Option<RenderSettings> {
        Some(self.settings.clone())
    }
}

/// Maps pixel space `[0, iw] x [0, ih]` onto the layer's content rect centered at the origin.
fn fit_affine(size: Size, iw: u32, ih: u32) -> Affine {
    Affine::translate((-size.width / 2.0, -size.height / 2.0))
        * Affine::scale_non_uniform(size.width / f64::from(iw), size.height / f64::from(ih))
}

fn fill_with_opacity(
    ctx: &mut vello_cpu::RenderContext,
    rect: vello_cpu::kurbo::Rect,
    opacity: f64,
) {
    if opacity < 1.0 {
        ctx.push_opacity_layer(opacity as f32);
    }
    ctx.fill_rect(&rect);
    if opacity < 1.0 {
        ctx.pop_layer();
    }
}

fn image_paint(img: &PreparedImage) -> LayerstackResult<ImagePaint> {
    let w: u16 = img
        .width
        .try_into()
        .map_err(|_| LayerstackError::render("image width exceeds u16"))?;
    let h: u16 = img
        .height
        .try_into()
        .map_err(|_| LayerstackError::render("image height exceeds u16"))?;
    if img.rgba8_premul.len() != img.width as usize * img.height as usize * 4 {
        return Err(LayerstackError::render(
            "prepared image byte length mismatch",
        ));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(img.width as usize * img.height as usize);
    for px in img.rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }
    let pixmap = vello_cpu::Pixmap::from_parts_with_opacity(pixels, w, h, may_have_opacities);

    Ok(ImagePaint {
        source: img.rgba8_premul.clone(),
        paint: vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        },
        w: img.width,
        h: img.height,
    })
}

fn color_to_cpu(c: Color) -> vello_cpu::peniko::Color {
    vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
