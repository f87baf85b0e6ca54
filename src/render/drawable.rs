use std::sync::Arc;

use crate::{
    foundation::error::KinemaResult,
    render::{device::Device, surface::Surface},
};

/// A presentation target the compositor can render into.
///
/// Implementations own (or borrow) a [`Device`] and manage one surface at a
/// time through an explicit create/free lifecycle. All lifecycle methods take
/// `&mut self`; hosts serialize access per instance.
pub trait Drawable {
    /// Current target width in pixels. Valid before the first surface exists.
    fn width(&self) -> u32;

    /// Current target height in pixels. Valid before the first surface exists.
    fn height(&self) -> u32;

    /// The device surfaces are allocated from. Lazily created by
    /// implementations that own their device.
    fn device(&mut self) -> Arc<Device>;

    /// Re-reads the authoritative target size and invalidates the surface if
    /// it changed. Fixed-size targets keep the default no-op.
    fn update_size(&mut self) {}

    /// The active surface, created on first call after construction or a
    /// free. `None` when the target cannot back a surface right now; callers
    /// skip the frame rather than abort.
    fn acquire_surface(&mut self) -> Option<&mut Surface>;

    /// Releases the active surface back to the device. Idempotent.
    fn free_surface(&mut self);

    /// Pushes the rendered surface contents to the platform target. Returns
    /// false when nothing was presented.
    fn present(&mut self) -> bool;
}

/// Surface lifecycle state held by each drawable.
///
/// `Uninitialized` and `Freed` both mean "no surface", kept distinct so the
/// first acquire and a post-free acquire are observable as different
/// transitions in logs.
#[derive(Default)]
pub(crate) enum SurfaceSlot {
    #[default]
    Uninitialized,
    Active(Surface),
    Freed,
}

impl SurfaceSlot {
    pub(crate) fn is_active(&self) -> bool {
        matches!(self, SurfaceSlot::Active(_))
    }

    /// Active surface, creating one via `create` if none exists. Creation
    /// failure is logged and reported as `None`.
    pub(crate) fn acquire_with<F>(&mut self, create: F) -> Option<&mut Surface>
    where
        F: FnOnce() -> KinemaResult<Surface>,
    {
        if !self.is_active() {
            match create() {
                Ok(surface) => *self = SurfaceSlot::Active(surface),
                Err(err) => {
                    tracing::warn!(error = %err, "surface creation failed");
                    return None;
                }
            }
        }
        match self {
            SurfaceSlot::Active(surface) => Some(surface),
            _ => None,
        }
    }

    /// Active surface for presentation. Presenting with no active surface is
    /// misuse: asserts in debug builds, logs and skips in release builds.
    pub(crate) fn for_present(&mut self) -> Option<&mut Surface> {
        match self {
            SurfaceSlot::Active(surface) => Some(surface),
            _ => {
                debug_assert!(false, "present called with no active surface");
                tracing::warn!("present called with no active surface");
                None
            }
        }
    }

    /// Releases an active surface back to `device`. A slot that never held a
    /// surface stays `Uninitialized`; releasing twice is a no-op.
    pub(crate) fn free_into(&mut self, device: &Device) {
        if self.is_active()
            && let SurfaceSlot::Active(surface) = std::mem::replace(self, SurfaceSlot::Freed)
        {
            device.release_surface(surface);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::surface::SurfaceDesc;

    #[test]
    fn acquire_creates_once_then_reuses() {
        let device = Device::new();
        let mut slot = SurfaceSlot::default();
        let desc = SurfaceDesc::rgba8(8, 8);

        assert!(slot.acquire_with(|| device.create_surface(desc)).is_some());
        assert!(slot.acquire_with(|| device.create_surface(desc)).is_some());
        assert_eq!(device.pool_stats().alloc_surfaces, 1);
    }

    #[test]
    fn failed_creation_leaves_the_slot_empty() {
        let device = Device::new();
        let mut slot = SurfaceSlot::default();

        let got = slot.acquire_with(|| device.create_surface(SurfaceDesc::rgba8(0, 8)));
        assert!(got.is_none());
        assert!(!slot.is_active());
    }

    #[test]
    fn free_is_idempotent_and_only_releases_active() {
        let device = Device::new();
        let mut slot = SurfaceSlot::default();

        slot.free_into(&device);
        assert!(matches!(slot, SurfaceSlot::Uninitialized));

        slot.acquire_with(|| device.create_surface(SurfaceDesc::rgba8(8, 8)))
            .unwrap();
        slot.free_into(&device);
        slot.free_into(&device);
        assert!(matches!(slot, SurfaceSlot::Freed));
        assert_eq!(device.pool_stats().retained_surfaces, 1);
    }
}
