//! Rasterization: surfaces and their pool, devices, drawables, and the CPU
//! frame renderer.

pub mod buffer;
pub(crate) mod composite;
pub mod device;
pub mod drawable;
pub(crate) mod fx;
#[cfg(feature = "gpu")]
pub mod gpu;
pub(crate) mod pool;
pub mod renderer;
pub mod surface;
pub mod window;
