//! The document model: compositions, layers, effects, and their
//! structural verification.

pub mod camera;
pub mod composition;
pub mod effect;
pub mod layer;
pub mod transform;
pub(crate) mod verify;
