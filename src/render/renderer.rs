use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use crate::{
    foundation::{
        core::{Affine, Frame, Point},
        error::KinemaResult,
    },
    render::{
        composite::{premul_over_in_place, premul_over_in_place_opacity},
        device::Device,
        drawable::Drawable,
        fx::{self, EdgeMode},
        surface::{FrameRGBA, Surface, SurfaceDesc},
    },
    scene::{
        composition::Composition,
        effect::{AntialiasQuality, BlurDimensions, Effect, EffectKind, RadialBlurMode},
        layer::{ImagePixels, Layer, LayerKind},
    },
};

/// Per-render options.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderSettings {
    /// Premultiplied RGBA8 clear color under everything, transparent when
    /// `None`. A composition background still paints over this.
    pub clear_rgba: Option<[u8; 4]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BlurKernelKey {
    radius_px: u32,
    sigma_bits: u32,
}

/// CPU compositor.
///
/// Draws one layer at a time into a pooled scratch surface and composites it
/// over the accumulated target, since `vello_cpu` renders each pass into a
/// fresh buffer. Kernel and scratch allocations are cached, so steady-state
/// playback is allocation-free after warmup.
pub struct Renderer {
    device: Arc<Device>,
    ctx: Option<vello_cpu::RenderContext>,
    blur_kernel_cache: HashMap<BlurKernelKey, Arc<Vec<u32>>>,
    blur_scratch_a: Vec<u8>,
    blur_scratch_b: Vec<u8>,
    image_paints: HashMap<usize, (Weak<ImagePixels>, vello_cpu::Image)>,
}

impl Renderer {
    pub fn new() -> Self {
        Self::with_device(Device::new())
    }

    /// Renderer whose scratch surfaces come from a shared device.
    pub fn with_device(device: Arc<Device>) -> Self {
        Self {
            device,
            ctx: None,
            blur_kernel_cache: HashMap::new(),
            blur_scratch_a: Vec::new(),
            blur_scratch_b: Vec::new(),
            image_paints: HashMap::new(),
        }
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Evaluates `comp` at `frame` into an owned premultiplied frame.
    #[tracing::instrument(skip_all, fields(frame = frame.0))]
    pub fn render_frame(
        &mut self,
        comp: &Composition,
        frame: Frame,
        settings: RenderSettings,
    ) -> KinemaResult<FrameRGBA> {
        let desc = SurfaceDesc::rgba8(comp.width, comp.height);
        let mut surface = self.device.create_surface(desc)?;
        match settings.clear_rgba {
            Some(rgba) => surface.clear(rgba),
            None => surface.clear_transparent(),
        }
        let result = self.draw_composition(comp, frame, Affine::IDENTITY, &mut surface);
        let out = result.map(|()| surface.to_frame());
        self.device.release_surface(surface);
        out
    }

    /// Renders into the drawable's surface and presents. `Ok(false)` means
    /// the frame was skipped (no surface available or nothing committed).
    #[tracing::instrument(skip_all, fields(frame = frame.0))]
    pub fn render_into(
        &mut self,
        comp: &Composition,
        frame: Frame,
        drawable: &mut dyn Drawable,
        settings: RenderSettings,
    ) -> KinemaResult<bool> {
        drawable.update_size();
        let (dw, dh) = (drawable.width(), drawable.height());
        if dw == 0 || dh == 0 || comp.width == 0 || comp.height == 0 {
            tracing::debug!(width = dw, height = dh, "zero-sized target, frame skipped");
            return Ok(false);
        }
        let view = Affine::scale_non_uniform(
            f64::from(dw) / f64::from(comp.width),
            f64::from(dh) / f64::from(comp.height),
        );

        let Some(surface) = drawable.acquire_surface() else {
            tracing::warn!("drawable has no surface, frame skipped");
            return Ok(false);
        };
        match settings.clear_rgba {
            Some(rgba) => surface.clear(rgba),
            None => surface.clear_transparent(),
        }
        self.draw_composition(comp, frame, view, surface)?;
        Ok(drawable.present())
    }

    fn draw_composition(
        &mut self,
        comp: &Composition,
        frame: Frame,
        view: Affine,
        target: &mut Surface,
    ) -> KinemaResult<()> {
        if let Some(bg) = comp.background {
            let (w, h) = (f64::from(comp.width), f64::from(comp.height));
            let mut scratch = self.device.create_surface(target.desc())?;
            scratch.clear_transparent();
            let mut result = self.fill_pass(&mut scratch, |ctx| {
                ctx.set_transform(affine_to_cpu(view));
                ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(bg.r, bg.g, bg.b, 255));
                ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
            });
            if result.is_ok() {
                result = premul_over_in_place(target.data_mut(), scratch.data());
            }
            self.device.release_surface(scratch);
            result?;
        }

        // First layer is bottom-most.
        for layer in &comp.layers {
            if !layer.visible_at(frame) {
                continue;
            }
            self.draw_layer(layer, frame, view, target)?;
        }
        Ok(())
    }

    fn draw_layer(
        &mut self,
        layer: &Layer,
        frame: Frame,
        view: Affine,
        target: &mut Surface,
    ) -> KinemaResult<()> {
        // Cameras describe a viewport, not drawn content.
        if matches!(layer.kind, LayerKind::Camera(_)) {
            return Ok(());
        }
        let Some(transform) = layer.transform.as_ref() else {
            tracing::debug!(layer = %layer.name, "layer without transform skipped");
            return Ok(());
        };
        let opacity = transform.opacity_at(frame) as f32;
        if opacity <= 0.0 {
            return Ok(());
        }
        let affine = view * transform.to_affine(frame);

        let mut scratch = self.device.create_surface(target.desc())?;
        scratch.clear_transparent();
        let mut result = self.draw_layer_content(layer, frame, affine, &mut scratch);
        if result.is_ok() {
            result = self.apply_effects(layer, frame, affine, &mut scratch);
        }
        if result.is_ok() {
            result = premul_over_in_place_opacity(target.data_mut(), scratch.data(), opacity);
        }
        self.device.release_surface(scratch);
        result
    }

    fn draw_layer_content(
        &mut self,
        layer: &Layer,
        frame: Frame,
        affine: Affine,
        scratch: &mut Surface,
    ) -> KinemaResult<()> {
        match &layer.kind {
            LayerKind::Camera(_) => Ok(()),
            LayerKind::Solid(solid) => {
                let color = solid.color.value_at(frame);
                let (w, h) = (f64::from(solid.width), f64::from(solid.height));
                self.fill_pass(scratch, |ctx| {
                    ctx.set_transform(affine_to_cpu(affine));
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                        color.r, color.g, color.b, 255,
                    ));
                    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
                })
            }
            LayerKind::Shape(shape) => {
                let color = shape.fill.value_at(frame);
                let path = bezpath_to_cpu(&shape.path);
                self.fill_pass(scratch, |ctx| {
                    ctx.set_transform(affine_to_cpu(affine));
                    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
                        color.r, color.g, color.b, 255,
                    ));
                    ctx.fill_path(&path);
                })
            }
            LayerKind::Image(image) => {
                let Some(pixels) = image.pixels.as_ref() else {
                    tracing::debug!(layer = %layer.name, "image layer without pixels skipped");
                    return Ok(());
                };
                let paint = self.image_paint_for(pixels)?;
                let (w, h) = (f64::from(pixels.width), f64::from(pixels.height));
                self.fill_pass(scratch, |ctx| {
                    ctx.set_transform(affine_to_cpu(affine));
                    ctx.set_paint(paint);
                    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(0.0, 0.0, w, h));
                })
            }
            LayerKind::PreCompose(pre) => {
                let Some(child) = pre.composition.as_ref() else {
                    tracing::debug!(layer = %layer.name, "precompose without child skipped");
                    return Ok(());
                };
                let child_frame = pre.child_frame(child, frame);
                self.draw_composition(child, child_frame, affine, scratch)
            }
        }
    }

    fn apply_effects(
        &mut self,
        layer: &Layer,
        frame: Frame,
        affine: Affine,
        scratch: &mut Surface,
    ) -> KinemaResult<()> {
        for effect in &layer.effects {
            if !effect.visible_at(frame) {
                continue;
            }
            self.apply_effect(effect, frame, affine, scratch)?;
        }
        Ok(())
    }

    fn apply_effect(
        &mut self,
        effect: &Effect,
        frame: Frame,
        affine: Affine,
        scratch: &mut Surface,
    ) -> KinemaResult<()> {
        let (w, h) = (scratch.width(), scratch.height());
        let expected = scratch.data().len();
        match &effect.kind {
            EffectKind::GaussianBlur(blur) => {
                let blurriness = blur.blurriness.as_ref().map_or(0.0, |p| p.value_at(frame));
                let dimensions = blur
                    .dimensions
                    .as_ref()
                    .map_or(BlurDimensions::All, |p| p.value_at(frame));
                let repeat = blur
                    .repeat_edge_pixels
                    .as_ref()
                    .map_or(true, |p| p.value_at(frame));

                let radius_px = (blurriness.max(0.0) * blur_scale(affine, dimensions))
                    .round()
                    .clamp(0.0, 255.0) as u32;
                if radius_px == 0 {
                    return Ok(());
                }
                let kernel = self.blur_kernel(radius_px)?;
                let edge = if repeat {
                    EdgeMode::Clamp
                } else {
                    EdgeMode::Transparent
                };

                self.blur_scratch_b.resize(expected, 0);
                self.blur_scratch_b.copy_from_slice(scratch.data());
                fx::blur_rgba8_premul_q16(
                    &self.blur_scratch_b,
                    scratch.data_mut(),
                    &mut self.blur_scratch_a,
                    w,
                    h,
                    &kernel,
                    dimensions,
                    edge,
                );
                Ok(())
            }
            EffectKind::RadialBlur(radial) => {
                let amount = radial.amount.as_ref().map_or(0.0, |p| p.value_at(frame));
                if amount == 0.0 {
                    return Ok(());
                }
                let center = radial
                    .center
                    .as_ref()
                    .map_or(Point::ZERO, |p| p.value_at(frame));
                let mode = radial
                    .mode
                    .as_ref()
                    .map_or(RadialBlurMode::Spin, |p| p.value_at(frame));
                let quality = radial
                    .antialias
                    .as_ref()
                    .map_or(AntialiasQuality::Low, |p| p.value_at(frame));
                let device_center = affine * center;

                self.blur_scratch_b.resize(expected, 0);
                self.blur_scratch_b.copy_from_slice(scratch.data());
                fx::radial_blur_rgba8_premul(
                    &self.blur_scratch_b,
                    scratch.data_mut(),
                    w,
                    h,
                    amount as f32,
                    (device_center.x as f32, device_center.y as f32),
                    mode,
                    quality,
                );
                Ok(())
            }
            EffectKind::ColorAdjust(adjust) => {
                let brightness = adjust.brightness.as_ref().map_or(0.0, |p| p.value_at(frame));
                let contrast = adjust.contrast.as_ref().map_or(0.0, |p| p.value_at(frame));
                fx::brightness_contrast_rgba8_premul(
                    scratch.data_mut(),
                    brightness as f32,
                    contrast as f32,
                );
                Ok(())
            }
        }
    }

    /// One `vello_cpu` pass into `scratch`. The context only writes covered
    /// regions, so `scratch` must already be cleared.
    fn fill_pass(
        &mut self,
        scratch: &mut Surface,
        f: impl FnOnce(&mut vello_cpu::RenderContext),
    ) -> KinemaResult<()> {
        let desc = scratch.desc();
        self.with_ctx_mut(desc.width as u16, desc.height as u16, |_, ctx| {
            ctx.set_blend_mode(vello_cpu::peniko::BlendMode::default());
            ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
            f(ctx);
            ctx.flush();
            ctx.render_to_pixmap(scratch.pixmap_mut());
            Ok(())
        })
    }

    fn with_ctx_mut<R>(
        &mut self,
        width: u16,
        height: u16,
        f: impl FnOnce(&mut Self, &mut vello_cpu::RenderContext) -> KinemaResult<R>,
    ) -> KinemaResult<R> {
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

    fn blur_kernel(&mut self, radius_px: u32) -> KinemaResult<Arc<Vec<u32>>> {
        let sigma = fx::default_blur_sigma(radius_px);
        let key = BlurKernelKey {
            radius_px,
            sigma_bits: sigma.to_bits(),
        };
        if let Some(kernel) = self.blur_kernel_cache.get(&key) {
            return Ok(Arc::clone(kernel));
        }
        let kernel = Arc::new(fx::gaussian_kernel_q16(radius_px, sigma)?);
        self.blur_kernel_cache.insert(key, Arc::clone(&kernel));
        Ok(kernel)
    }

    fn image_paint_for(&mut self, pixels: &Arc<ImagePixels>) -> KinemaResult<vello_cpu::Image> {
        let key = Arc::as_ptr(pixels) as usize;
        if let Some((weak, paint)) = self.image_paints.get(&key)
            && let Some(live) = weak.upgrade()
            && Arc::ptr_eq(&live, pixels)
        {
            return Ok(paint.clone());
        }

        let pixmap = crate::render::surface::pixmap_from_premul_bytes(
            &pixels.rgba8_premul,
            pixels.width,
            pixels.height,
        )?;
        let paint = vello_cpu::Image {
            image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
            sampler: vello_cpu::peniko::ImageSampler::default(),
        };
        self.image_paints
            .insert(key, (Arc::downgrade(pixels), paint.clone()));
        Ok(paint)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Pixel footprint of one source pixel along the blurred axes under `affine`.
fn blur_scale(affine: Affine, dimensions: BlurDimensions) -> f64 {
    let [a, b, c, d, _, _] = affine.as_coeffs();
    match dimensions {
        BlurDimensions::All => (a * d - b * c).abs().sqrt(),
        BlurDimensions::Horizontal => a.hypot(b),
        BlurDimensions::Vertical => c.hypot(d),
    }
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn bezpath_to_cpu(path: &kurbo::BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::LineTo(p) => out.line_to(vello_cpu::kurbo::Point::new(p.x, p.y)),
            PathEl::QuadTo(p1, p2) => out.quad_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
            ),
            PathEl::CurveTo(p1, p2, p3) => out.curve_to(
                vello_cpu::kurbo::Point::new(p1.x, p1.y),
                vello_cpu::kurbo::Point::new(p2.x, p2.y),
                vello_cpu::kurbo::Point::new(p3.x, p3.y),
            ),
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        animation::property::Property,
        foundation::core::{Color, Fps},
        scene::{layer::SolidLayer, transform::Transform2D},
    };

    fn solid_layer(name: &str, w: u32, h: u32, color: Color) -> Layer {
        Layer {
            name: name.into(),
            range: crate::foundation::core::TimeRange::new(Frame(0), Frame(100)).unwrap(),
            transform: Some(Transform2D::default()),
            effects: Vec::new(),
            kind: LayerKind::Solid(SolidLayer {
                width: w,
                height: h,
                color: Property::constant(color),
            }),
        }
    }

    fn comp(width: u32, height: u32, background: Option<Color>, layers: Vec<Layer>) -> Composition {
        Composition {
            width,
            height,
            duration: Frame(100),
            fps: Fps::new(30, 1).unwrap(),
            background,
            layers,
        }
    }

    fn pixel(frame: &FrameRGBA, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * frame.width + x) * 4) as usize;
        frame.data[i..i + 4].try_into().unwrap()
    }

    #[test]
    fn background_fills_the_whole_frame() {
        let doc = comp(4, 3, Some(Color::rgb(20, 40, 60)), Vec::new());
        let mut renderer = Renderer::new();
        let frame = renderer
            .render_frame(&doc, Frame(0), RenderSettings::default())
            .unwrap();

        assert_eq!((frame.width, frame.height), (4, 3));
        for y in 0..3 {
            for x in 0..4 {
                assert_eq!(pixel(&frame, x, y), [20, 40, 60, 255]);
            }
        }
    }

    #[test]
    fn solid_layer_covers_its_rect_only() {
        let doc = comp(4, 4, None, vec![solid_layer("s", 2, 2, Color::rgb(255, 0, 0))]);
        let mut renderer = Renderer::new();
        let frame = renderer
            .render_frame(&doc, Frame(0), RenderSettings::default())
            .unwrap();

        assert_eq!(pixel(&frame, 0, 0), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 1, 1), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 3, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn clear_color_shows_behind_transparent_regions() {
        let doc = comp(2, 2, None, Vec::new());
        let mut renderer = Renderer::new();
        let frame = renderer
            .render_frame(
                &doc,
                Frame(0),
                RenderSettings {
                    clear_rgba: Some([0, 0, 255, 255]),
                },
            )
            .unwrap();
        assert_eq!(pixel(&frame, 1, 1), [0, 0, 255, 255]);
    }

    #[test]
    fn invisible_layers_draw_nothing() {
        let mut layer = solid_layer("s", 4, 4, Color::WHITE);
        layer.range = crate::foundation::core::TimeRange::new(Frame(10), Frame(20)).unwrap();
        let doc = comp(4, 4, None, vec![layer]);

        let mut renderer = Renderer::new();
        let early = renderer
            .render_frame(&doc, Frame(0), RenderSettings::default())
            .unwrap();
        assert_eq!(pixel(&early, 0, 0), [0, 0, 0, 0]);

        let inside = renderer
            .render_frame(&doc, Frame(10), RenderSettings::default())
            .unwrap();
        assert_eq!(pixel(&inside, 0, 0), [255, 255, 255, 255]);
    }
}
