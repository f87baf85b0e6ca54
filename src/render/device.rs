use std::sync::{Arc, Mutex, PoisonError};

use crate::{
    foundation::error::{KinemaError, KinemaResult},
    render::{
        pool::{SurfacePool, SurfacePoolOpts, SurfacePoolStats},
        surface::{Surface, SurfaceDesc},
    },
};

/// Owner of pooled surface memory.
///
/// Every drawable holds an `Arc<Device>` and routes its surface lifetime
/// through it, so surfaces freed by one drawable can back the next one
/// rendered at the same size. The pool lock is held only for the borrow or
/// release itself, never across drawing.
pub struct Device {
    pool: Mutex<SurfacePool>,
}

impl Device {
    /// Device with default pool caps (`KINEMA_SURFACE_POOL_BYTES` applies).
    pub fn new() -> Arc<Self> {
        Self::with_pool_opts(SurfacePoolOpts::from_env())
    }

    pub(crate) fn with_pool_opts(opts: SurfacePoolOpts) -> Arc<Self> {
        Arc::new(Self {
            pool: Mutex::new(SurfacePool::new(opts)),
        })
    }

    /// Allocates (or reuses) a surface. Contents are unspecified until the
    /// caller clears or draws over them.
    pub fn create_surface(&self, desc: SurfaceDesc) -> KinemaResult<Surface> {
        if desc.width == 0 || desc.height == 0 {
            return Err(KinemaError::render(format!(
                "surface dimensions must be non-zero, got {}x{}",
                desc.width, desc.height
            )));
        }
        let pixmap = self.lock_pool().borrow(desc)?;
        tracing::debug!(width = desc.width, height = desc.height, "surface created");
        Ok(Surface::from_pixmap(desc, pixmap))
    }

    /// Returns a surface to the pool. Dropping a `Surface` instead is safe
    /// but forfeits reuse.
    pub fn release_surface(&self, surface: Surface) {
        let (desc, pixmap) = surface.into_parts();
        self.lock_pool().release(desc, pixmap);
        tracing::debug!(width = desc.width, height = desc.height, "surface released");
    }

    pub(crate) fn pool_stats(&self) -> SurfacePoolStats {
        self.lock_pool().stats()
    }

    fn lock_pool(&self) -> std::sync::MutexGuard<'_, SurfacePool> {
        // Pool state stays coherent even if a panic unwound mid-release.
        self.pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn released_surfaces_are_reused() {
        let device = Device::new();
        let desc = SurfaceDesc::rgba8(32, 32);

        let s = device.create_surface(desc).unwrap();
        device.release_surface(s);
        let _s = device.create_surface(desc).unwrap();

        assert_eq!(device.pool_stats().alloc_surfaces, 1);
    }

    #[test]
    fn zero_sized_surfaces_are_rejected() {
        let device = Device::new();
        assert!(device.create_surface(SurfaceDesc::rgba8(0, 32)).is_err());
        assert!(device.create_surface(SurfaceDesc::rgba8(32, 0)).is_err());
    }

    #[test]
    fn device_is_shareable_across_threads() {
        let device = Device::new();
        let d2 = Arc::clone(&device);
        let t = std::thread::spawn(move || {
            let s = d2.create_surface(SurfaceDesc::rgba8(8, 8)).unwrap();
            d2.release_surface(s);
        });
        t.join().unwrap();
        assert_eq!(device.pool_stats().retained_surfaces, 1);
    }
}
