use std::sync::{Arc, Mutex, PoisonError};

use crate::{
    foundation::error::{KinemaError, KinemaResult},
    render::{
        device::Device,
        drawable::{Drawable, SurfaceSlot},
        surface::{Surface, SurfaceDesc},
    },
};

/// Caller-owned RGBA8 premultiplied pixel storage, fixed-size.
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Zeroed buffer. Dimensions must be non-zero.
    pub fn new(width: u32, height: u32) -> KinemaResult<Self> {
        if width == 0 || height == 0 {
            return Err(KinemaError::validation(format!(
                "pixel buffer dimensions must be non-zero, got {width}x{height}"
            )));
        }
        let len = width as usize * height as usize * 4;
        Ok(Self {
            width,
            height,
            data: vec![0; len],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

/// Drawable that presents into an externally shared [`PixelBuffer`].
///
/// The host keeps its own `Arc` to the buffer and reads pixels out between
/// presents. The drawable's size is fixed to the buffer's size at
/// construction.
pub struct PixelBufferDrawable {
    buffer: Arc<Mutex<PixelBuffer>>,
    device: Option<Arc<Device>>,
    width: u32,
    height: u32,
    slot: SurfaceSlot,
}

impl PixelBufferDrawable {
    /// Targets `buffer`, allocating surfaces from `device` when given or from
    /// a private device otherwise.
    pub fn from_buffer(buffer: Arc<Mutex<PixelBuffer>>, device: Option<Arc<Device>>) -> Self {
        let (width, height) = {
            let buf = lock(&buffer);
            (buf.width(), buf.height())
        };
        Self {
            buffer,
            device,
            width,
            height,
            slot: SurfaceSlot::default(),
        }
    }
}

impl Drawable for PixelBufferDrawable {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn device(&mut self) -> Arc<Device> {
        Arc::clone(self.device.get_or_insert_with(Device::new))
    }

    fn acquire_surface(&mut self) -> Option<&mut Surface> {
        let device = self.device();
        let desc = SurfaceDesc::rgba8(self.width, self.height);
        self.slot.acquire_with(|| device.create_surface(desc))
    }

    fn free_surface(&mut self) {
        let device = self.device();
        self.slot.free_into(&device);
    }

    fn present(&mut self) -> bool {
        let Some(surface) = self.slot.for_present() else {
            return false;
        };
        let src = surface.data();
        let mut buf = lock(&self.buffer);
        let dst = buf.data_mut();
        if dst.len() != src.len() {
            tracing::warn!(
                surface_bytes = src.len(),
                buffer_bytes = dst.len(),
                "pixel buffer size mismatch, frame dropped"
            );
            return false;
        }
        dst.copy_from_slice(src);
        true
    }
}

fn lock(buffer: &Mutex<PixelBuffer>) -> std::sync::MutexGuard<'_, PixelBuffer> {
    buffer.lock().unwrap_or_else(PoisonError::into_inner)
}
