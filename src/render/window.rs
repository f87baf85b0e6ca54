use std::sync::Arc;

use crate::render::{
    device::Device,
    drawable::{Drawable, SurfaceSlot},
    surface::{FrameRGBA, Surface, SurfaceDesc},
};

/// Host-side window seam.
///
/// The platform layer implements this; the engine only ever asks for the
/// authoritative size and hands finished frames back.
pub trait NativeWindow: Send {
    /// Current window size in pixels. May change between calls.
    fn size(&self) -> (u32, u32);

    /// Accepts a finished frame. Returns false when the window rejected it
    /// (minimized, closed, mid-teardown).
    fn commit(&mut self, frame: &FrameRGBA) -> bool;
}

/// In-memory window for headless playback and tests.
pub struct OffscreenWindow {
    width: u32,
    height: u32,
    committed: u64,
    last_frame: Option<FrameRGBA>,
}

impl OffscreenWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            committed: 0,
            last_frame: None,
        }
    }

    /// Simulates an external resize. Takes effect on the drawable's next
    /// `update_size`.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn commit_count(&self) -> u64 {
        self.committed
    }

    pub fn last_frame(&self) -> Option<&FrameRGBA> {
        self.last_frame.as_ref()
    }
}

impl NativeWindow for OffscreenWindow {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn commit(&mut self, frame: &FrameRGBA) -> bool {
        self.committed += 1;
        self.last_frame = Some(frame.clone());
        true
    }
}

/// Drawable backed by a [`NativeWindow`].
///
/// Owns its device, created lazily on first use so constructing the drawable
/// stays cheap. The surface tracks the window size reported at the last
/// `update_size`.
pub struct WindowDrawable<W: NativeWindow> {
    window: W,
    device: Option<Arc<Device>>,
    width: u32,
    height: u32,
    slot: SurfaceSlot,
}

impl<W: NativeWindow> WindowDrawable<W> {
    pub fn from_window(window: W) -> Self {
        let (width, height) = window.size();
        Self {
            window,
            device: None,
            width,
            height,
            slot: SurfaceSlot::default(),
        }
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn window_mut(&mut self) -> &mut W {
        &mut self.window
    }
}

impl<W: NativeWindow> Drawable for WindowDrawable<W> {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn device(&mut self) -> Arc<Device> {
        Arc::clone(self.device.get_or_insert_with(Device::new))
    }

    fn update_size(&mut self) {
        let (w, h) = self.window.size();
        if (w, h) != (self.width, self.height) {
            tracing::debug!(
                from_width = self.width,
                from_height = self.height,
                to_width = w,
                to_height = h,
                "window resized, surface invalidated"
            );
            let device = self.device();
            self.slot.free_into(&device);
            self.width = w;
            self.height = h;
        }
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
        let frame = surface.to_frame();
        self.window.commit(&frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_track_the_window() {
        let mut d = WindowDrawable::from_window(OffscreenWindow::new(64, 48));
        assert_eq!((d.width(), d.height()), (64, 48));

        d.window_mut().resize(32, 32);
        // Not visible until the host asks for a size update.
        assert_eq!((d.width(), d.height()), (64, 48));
        d.update_size();
        assert_eq!((d.width(), d.height()), (32, 32));
    }

    #[test]
    fn present_commits_the_surface_contents() {
        let mut d = WindowDrawable::from_window(OffscreenWindow::new(4, 2));
        let surface = d.acquire_surface().unwrap();
        surface.clear([0, 128, 0, 255]);

        assert!(d.present());
        let frame = d.window().last_frame().unwrap();
        assert_eq!(frame.width, 4);
        assert_eq!(frame.data[..4], [0, 128, 0, 255]);
        assert_eq!(d.window().commit_count(), 1);
    }

    #[test]
    fn resize_invalidates_the_surface() {
        let mut d = WindowDrawable::from_window(OffscreenWindow::new(16, 16));
        d.acquire_surface().unwrap();

        d.window_mut().resize(8, 8);
        d.update_size();
        let surface = d.acquire_surface().unwrap();
        assert_eq!((surface.width(), surface.height()), (8, 8));
    }
}
