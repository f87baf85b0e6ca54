//! Optional `wgpu`-backed renderer behind the `gpu` cargo feature.
//!
//! Encodes the same layer stack as the CPU path into a `vello` scene and
//! reads the result back from a texture. Raster effect passes (blur, color
//! adjust) have no GPU implementation; documents using them at the requested
//! frame are rejected up front so callers can fall back to the CPU renderer.

use std::{
    collections::HashMap,
    sync::{Arc, Weak},
};

use crate::{
    foundation::{
        core::{Affine, Frame},
        error::{KinemaError, KinemaResult},
    },
    render::{renderer::RenderSettings, surface::FrameRGBA},
    scene::{
        composition::Composition,
        layer::{ImagePixels, Layer, LayerKind},
    },
};

struct GpuTarget {
    width: u32,
    height: u32,
    texture: vello::wgpu::Texture,
    view: vello::wgpu::TextureView,
}

pub struct GpuRenderer {
    device: Option<vello::wgpu::Device>,
    queue: Option<vello::wgpu::Queue>,
    renderer: Option<vello::Renderer>,
    scene: vello::Scene,

    target: Option<GpuTarget>,
    readback: Option<vello::wgpu::Buffer>,
    readback_bytes_per_row: u32,
    width: u32,
    height: u32,

    image_cache: HashMap<usize, (Weak<ImagePixels>, vello::peniko::ImageData)>,
}

impl GpuRenderer {
    pub fn new() -> Self {
        Self {
            device: None,
            queue: None,
            renderer: None,
            scene: vello::Scene::new(),
            target: None,
            readback: None,
            readback_bytes_per_row: 0,
            width: 0,
            height: 0,
            image_cache: HashMap::new(),
        }
    }

    /// Evaluates `comp` at `frame` on the GPU into an owned premultiplied
    /// frame. Errors with "no gpu adapter available" on adapterless hosts.
    #[tracing::instrument(skip_all, fields(frame = frame.0))]
    pub fn render_frame(
        &mut self,
        comp: &Composition,
        frame: Frame,
        settings: RenderSettings,
    ) -> KinemaResult<FrameRGBA> {
        if comp.width == 0 || comp.height == 0 {
            return Err(KinemaError::render("composition has zero pixel size"));
        }
        reject_raster_effects(comp, frame)?;
        self.ensure_init(comp.width, comp.height)?;

        self.scene.reset();
        self.encode_composition(comp, frame, kurbo::Affine::IDENTITY)?;

        let device = self
            .device
            .as_ref()
            .ok_or_else(|| KinemaError::render("gpu renderer not initialized"))?;
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| KinemaError::render("gpu renderer not initialized"))?;
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| KinemaError::render("gpu target not initialized"))?;

        let base_color = match settings.clear_rgba {
            Some([r, g, b, a]) => vello::peniko::Color::from_rgba8(r, g, b, a),
            None => vello::peniko::Color::from_rgba8(0, 0, 0, 0),
        };

        let renderer = self
            .renderer
            .as_mut()
            .ok_or_else(|| KinemaError::render("gpu renderer not initialized"))?;
        renderer
            .render_to_texture(
                device,
                queue,
                &self.scene,
                &target.view,
                &vello::RenderParams {
                    base_color,
                    width: target.width,
                    height: target.height,
                    antialiasing_method: vello::AaConfig::Area,
                },
            )
            .map_err(|e| KinemaError::render(format!("vello render failed: {e:?}")))?;

        self.readback_rgba8()
    }

    fn ensure_init(&mut self, width: u32, height: u32) -> KinemaResult<()> {
        if self.device.is_some() && self.width == width && self.height == height {
            return Ok(());
        }

        let instance = vello::wgpu::Instance::new(&vello::wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(
            &vello::wgpu::RequestAdapterOptions {
                power_preference: vello::wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            },
        ))
        .map_err(|e| match e {
            vello::wgpu::RequestAdapterError::NotFound { .. } => {
                KinemaError::render("no gpu adapter available")
            }
            other => KinemaError::render(format!("wgpu request_adapter failed: {other:?}")),
        })?;

        let (device, queue) =
            pollster::block_on(adapter.request_device(&vello::wgpu::DeviceDescriptor {
                label: None,
                required_features: vello::wgpu::Features::empty(),
                required_limits: vello::wgpu::Limits::default(),
                experimental_features: vello::wgpu::ExperimentalFeatures::default(),
                memory_hints: vello::wgpu::MemoryHints::Performance,
                trace: vello::wgpu::Trace::Off,
            }))
            .map_err(|e| KinemaError::render(format!("wgpu request_device failed: {e:?}")))?;

        let renderer = vello::Renderer::new(&device, vello::RendererOptions::default())
            .map_err(|e| KinemaError::render(format!("vello renderer init failed: {e:?}")))?;

        let texture = device.create_texture(&vello::wgpu::TextureDescriptor {
            label: Some("kinema_target"),
            size: vello::wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: vello::wgpu::TextureDimension::D2,
            format: vello::wgpu::TextureFormat::Rgba8Unorm,
            usage: vello::wgpu::TextureUsages::STORAGE_BINDING
                | vello::wgpu::TextureUsages::TEXTURE_BINDING
                | vello::wgpu::TextureUsages::RENDER_ATTACHMENT
                | vello::wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&vello::wgpu::TextureViewDescriptor::default());

        let bytes_per_row_unpadded = width
            .checked_mul(4)
            .ok_or_else(|| KinemaError::render("render target width overflow"))?;
        let bytes_per_row = align_to(
            bytes_per_row_unpadded,
            vello::wgpu::COPY_BYTES_PER_ROW_ALIGNMENT,
        );
        let buffer_size = (bytes_per_row as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| KinemaError::render("readback buffer size overflow"))?;

        let readback = device.create_buffer(&vello::wgpu::BufferDescriptor {
            label: Some("kinema_readback"),
            size: buffer_size,
            usage: vello::wgpu::BufferUsages::MAP_READ | vello::wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        self.device = Some(device);
        self.queue = Some(queue);
        self.renderer = Some(renderer);
        self.target = Some(GpuTarget {
            width,
            height,
            texture,
            view,
        });
        self.readback = Some(readback);
        self.readback_bytes_per_row = bytes_per_row;
        self.width = width;
        self.height = height;
        self.image_cache.clear();
        Ok(())
    }

    fn encode_composition(
        &mut self,
        comp: &Composition,
        frame: Frame,
        view: kurbo::Affine,
    ) -> KinemaResult<()> {
        if let Some(bg) = comp.background {
            self.scene.fill(
                vello::peniko::Fill::NonZero,
                view,
                vello::peniko::Color::from_rgba8(bg.r, bg.g, bg.b, 255),
                None,
                &kurbo::Rect::new(0.0, 0.0, f64::from(comp.width), f64::from(comp.height)),
            );
        }
        for layer in &comp.layers {
            if !layer.visible_at(frame) {
                continue;
            }
            self.encode_layer(layer, frame, view)?;
        }
        Ok(())
    }

    fn encode_layer(
        &mut self,
        layer: &Layer,
        frame: Frame,
        view: kurbo::Affine,
    ) -> KinemaResult<()> {
        if matches!(layer.kind, LayerKind::Camera(_)) {
            return Ok(());
        }
        let Some(transform) = layer.transform.as_ref() else {
            return Ok(());
        };
        let opacity = transform.opacity_at(frame) as f32;
        if opacity <= 0.0 {
            return Ok(());
        }
        let affine = view * transform.to_affine(frame);

        let grouped = opacity < 1.0;
        if grouped {
            self.scene.push_layer(
                vello::peniko::Fill::NonZero,
                vello::peniko::BlendMode::default(),
                opacity,
                kurbo::Affine::IDENTITY,
                &kurbo::Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height)),
            );
        }

        let result = match &layer.kind {
            LayerKind::Camera(_) => Ok(()),
            LayerKind::Solid(solid) => {
                let color = solid.color.value_at(frame);
                self.scene.fill(
                    vello::peniko::Fill::NonZero,
                    affine,
                    vello::peniko::Color::from_rgba8(color.r, color.g, color.b, 255),
                    None,
                    &kurbo::Rect::new(0.0, 0.0, f64::from(solid.width), f64::from(solid.height)),
                );
                Ok(())
            }
            LayerKind::Shape(shape) => {
                let color = shape.fill.value_at(frame);
                self.scene.fill(
                    vello::peniko::Fill::NonZero,
                    affine,
                    vello::peniko::Color::from_rgba8(color.r, color.g, color.b, 255),
                    None,
                    &shape.path,
                );
                Ok(())
            }
            LayerKind::Image(image) => {
                if let Some(pixels) = image.pixels.as_ref() {
                    let img = self.image_for(pixels);
                    self.scene.draw_image(&img, affine);
                }
                Ok(())
            }
            LayerKind::PreCompose(pre) => {
                if let Some(child) = pre.composition.as_ref() {
                    let child_frame = pre.child_frame(child, frame);
                    self.encode_composition(child, child_frame, affine)
                } else {
                    Ok(())
                }
            }
        };

        if grouped {
            self.scene.pop_layer();
        }
        result
    }

    fn image_for(&mut self, pixels: &Arc<ImagePixels>) -> vello::peniko::ImageData {
        let key = Arc::as_ptr(pixels) as usize;
        if let Some((weak, img)) = self.image_cache.get(&key)
            && let Some(live) = weak.upgrade()
            && Arc::ptr_eq(&live, pixels)
        {
            return img.clone();
        }

        let data = vello::peniko::Blob::from(pixels.rgba8_premul.clone());
        let image = vello::peniko::ImageData {
            data,
            format: vello::peniko::ImageFormat::Rgba8,
            alpha_type: vello::peniko::ImageAlphaType::AlphaPremultiplied,
            width: pixels.width,
            height: pixels.height,
        };
        self.image_cache
            .insert(key, (Arc::downgrade(pixels), image.clone()));
        image
    }

    fn readback_rgba8(&mut self) -> KinemaResult<FrameRGBA> {
        let device = self
            .device
            .as_ref()
            .ok_or_else(|| KinemaError::render("gpu renderer not initialized"))?;
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| KinemaError::render("gpu renderer not initialized"))?;
        let readback = self
            .readback
            .as_ref()
            .ok_or_else(|| KinemaError::render("gpu renderer not initialized"))?;
        let target = self
            .target
            .as_ref()
            .ok_or_else(|| KinemaError::render("gpu target not initialized"))?;

        let mut encoder = device.create_command_encoder(&vello::wgpu::CommandEncoderDescriptor {
            label: Some("kinema_readback_encoder"),
        });
        encoder.copy_texture_to_buffer(
            vello::wgpu::TexelCopyTextureInfo {
                texture: &target.texture,
                mip_level: 0,
                origin: vello::wgpu::Origin3d::ZERO,
                aspect: vello::wgpu::TextureAspect::All,
            },
            vello::wgpu::TexelCopyBufferInfo {
                buffer: readback,
                layout: vello::wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.readback_bytes_per_row),
                    rows_per_image: Some(target.height),
                },
            },
            vello::wgpu::Extent3d {
                width: target.width,
                height: target.height,
                depth_or_array_layers: 1,
            },
        );
        queue.submit(Some(encoder.finish()));

        let buffer_slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(vello::wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        device
            .poll(vello::wgpu::PollType::wait_indefinitely())
            .map_err(|e| KinemaError::render(format!("wgpu poll failed: {e:?}")))?;
        rx.recv()
            .map_err(|_| KinemaError::render("readback channel closed"))?
            .map_err(|e| KinemaError::render(format!("readback map failed: {e:?}")))?;

        let mapped = buffer_slice.get_mapped_range();
        let row_bytes = (target.width as usize) * 4;
        let padded_row_bytes = self.readback_bytes_per_row as usize;
        let mut out = Vec::with_capacity(row_bytes * target.height as usize);
        for row in 0..target.height as usize {
            let start = row * padded_row_bytes;
            out.extend_from_slice(&mapped[start..start + row_bytes]);
        }
        drop(mapped);
        readback.unmap();

        Ok(FrameRGBA {
            width: target.width,
            height: target.height,
            data: out,
            premultiplied: true,
        })
    }
}

impl Default for GpuRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn align_to(value: u32, alignment: u32) -> u32 {
    let mask = alignment - 1;
    (value + mask) & !mask
}

fn reject_raster_effects(comp: &Composition, frame: Frame) -> KinemaResult<()> {
    for layer in &comp.layers {
        if !layer.visible_at(frame) {
            continue;
        }
        if layer.effects.iter().any(|e| e.visible_at(frame)) {
            return Err(KinemaError::render(format!(
                "layer {:?} uses raster effects, which the gpu path does not support",
                layer.name
            )));
        }
        if let LayerKind::PreCompose(pre) = &layer.kind
            && let Some(child) = pre.composition.as_ref()
        {
            reject_raster_effects(child, pre.child_frame(child, frame))?;
        }
    }
    Ok(())
}
