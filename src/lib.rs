//! Kinema is a keyframe animation and compositing engine.
//!
//! The public API is document-oriented:
//!
//! - Build or decode a [`Composition`] tree of layers and effects
//! - Validate it with [`Composition::verify`] and query
//!   [`Composition::static_time_ranges`] for caching decisions
//! - Render frames with a [`Renderer`], either into an owned [`FrameRGBA`]
//!   or through a [`Drawable`] presentation target
#![forbid(unsafe_code)]

mod animation;
mod foundation;
mod render;
mod scene;

pub use crate::foundation::core::{
    Affine, BezPath, Color, Fps, Frame, Point, Rect, TimeRange, Vec2,
};
pub use crate::foundation::error::{KinemaError, KinemaResult};

pub use crate::animation::ease::Ease;
pub use crate::animation::property::{Interp, Interpolate, Keyframe, KeyframeTrack, Property};

pub use crate::scene::camera::{CameraLayer, CameraOption};
pub use crate::scene::composition::Composition;
pub use crate::scene::effect::{
    AntialiasQuality, BlurDimensions, ColorAdjustEffect, Effect, EffectKind, GaussianBlurEffect,
    RadialBlurEffect, RadialBlurMode,
};
pub use crate::scene::layer::{
    ImageLayer, ImagePixels, Layer, LayerKind, PreComposeLayer, ShapeLayer, SolidLayer,
};
pub use crate::scene::transform::Transform2D;

pub use crate::render::buffer::{PixelBuffer, PixelBufferDrawable};
pub use crate::render::device::Device;
pub use crate::render::drawable::Drawable;
pub use crate::render::renderer::{RenderSettings, Renderer};
pub use crate::render::surface::{FrameRGBA, PixelFormat, Surface, SurfaceDesc};
pub use crate::render::window::{NativeWindow, OffscreenWindow, WindowDrawable};

#[cfg(feature = "gpu")]
pub use crate::render::gpu::GpuRenderer;
