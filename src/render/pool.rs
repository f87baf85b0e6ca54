use std::collections::HashMap;

use crate::{
    foundation::error::{KinemaError, KinemaResult},
    render::surface::SurfaceDesc,
};

/// Pool configuration for cached surfaces.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SurfacePoolOpts {
    /// Maximum bytes retained across all buckets.
    pub(crate) max_pool_bytes: usize,
    /// Maximum number of retained surfaces per (w,h,format) bucket.
    pub(crate) max_surfaces_per_bucket: usize,
}

impl Default for SurfacePoolOpts {
    fn default() -> Self {
        Self {
            max_pool_bytes: 256 * 1024 * 1024,
            max_surfaces_per_bucket: 8,
        }
    }
}

impl SurfacePoolOpts {
    /// Default caps, with the byte budget overridable through
    /// `KINEMA_SURFACE_POOL_BYTES`. Zero disables retention entirely.
    pub(crate) fn from_env() -> Self {
        let mut opts = Self::default();
        if let Some(bytes) = std::env::var("KINEMA_SURFACE_POOL_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
        {
            opts.max_pool_bytes = bytes;
        }
        opts
    }
}

#[derive(Debug, Default, Clone)]
pub(crate) struct SurfacePoolStats {
    pub(crate) retained_surfaces: usize,
    pub(crate) retained_bytes: usize,
    pub(crate) alloc_surfaces: u64,
    pub(crate) alloc_bytes: u64,
    pub(crate) dropped_on_release: u64,
}

/// Bounded pooled allocator for CPU pixmaps.
///
/// Keyed by surface descriptor. Borrow/release happens at frame or pass
/// granularity, so a hash lookup per call is acceptable.
pub(crate) struct SurfacePool {
    opts: SurfacePoolOpts,
    stats: SurfacePoolStats,
    buckets: HashMap<SurfaceDesc, Vec<vello_cpu::Pixmap>>,
}

impl SurfacePool {
    pub(crate) fn new(opts: SurfacePoolOpts) -> Self {
        Self {
            opts,
            stats: SurfacePoolStats::default(),
            buckets: HashMap::new(),
        }
    }

    pub(crate) fn stats(&self) -> SurfacePoolStats {
        self.stats.clone()
    }

    /// Reuses a retained pixmap when one matches, allocating otherwise.
    /// Returned contents are unspecified; callers clear before drawing.
    pub(crate) fn borrow(&mut self, desc: SurfaceDesc) -> KinemaResult<vello_cpu::Pixmap> {
        if let Some(bucket) = self.buckets.get_mut(&desc)
            && let Some(pixmap) = bucket.pop()
        {
            self.stats.retained_surfaces = self.stats.retained_surfaces.saturating_sub(1);
            self.stats.retained_bytes = self.stats.retained_bytes.saturating_sub(desc.byte_len());
            return Ok(pixmap);
        }

        let w: u16 = desc.width.try_into().map_err(|_| {
            KinemaError::render(format!("surface width exceeds u16: {}", desc.width))
        })?;
        let h: u16 = desc.height.try_into().map_err(|_| {
            KinemaError::render(format!("surface height exceeds u16: {}", desc.height))
        })?;

        self.stats.alloc_surfaces = self.stats.alloc_surfaces.saturating_add(1);
        self.stats.alloc_bytes = self
            .stats
            .alloc_bytes
            .saturating_add(desc.byte_len() as u64);
        Ok(vello_cpu::Pixmap::new(w, h))
    }

    pub(crate) fn release(&mut self, desc: SurfaceDesc, pixmap: vello_cpu::Pixmap) {
        if self.opts.max_pool_bytes == 0 || self.opts.max_surfaces_per_bucket == 0 {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bytes = desc.byte_len();
        if self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_pool_bytes {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        let bucket = self.buckets.entry(desc).or_default();
        if bucket.len() >= self.opts.max_surfaces_per_bucket {
            self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
            return;
        }

        bucket.push(pixmap);
        self.stats.retained_surfaces = self.stats.retained_surfaces.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }
}
