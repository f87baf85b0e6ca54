use std::sync::Arc;

use kurbo::Shape;

use crate::{
    animation::property::Property,
    animation::ranges::{complement_ranges, split_ranges_at, subtract_range},
    foundation::core::{BezPath, Color, Frame, Point, Rect, TimeRange},
    foundation::error::{KinemaError, KinemaResult},
    scene::camera::CameraLayer,
    scene::composition::Composition,
    scene::effect::Effect,
    scene::transform::Transform2D,
    scene::verify::verify_failed,
};

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ShapeLayer {
    pub path: BezPath, // in layer-local space
    pub fill: Property<Color>,
}

impl ShapeLayer {
    pub fn verify(&self) -> bool {
        if self.path.elements().is_empty() {
            verify_failed("ShapeLayer", "path has no elements");
            return false;
        }
        true
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct SolidLayer {
    pub width: u32,
    pub height: u32,
    pub color: Property<Color>,
}

impl SolidLayer {
    pub fn verify(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            verify_failed("SolidLayer", "dimensions must be positive");
            return false;
        }
        true
    }
}

/// Decoded RGBA8 pixels, premultiplied, shared between layers that reuse
/// the same source image.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ImagePixels {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Vec<u8>,
}

impl ImagePixels {
    pub fn new(width: u32, height: u32, rgba8_premul: Vec<u8>) -> KinemaResult<Self> {
        if width == 0 || height == 0 {
            return Err(KinemaError::validation(
                "ImagePixels dimensions must be positive",
            ));
        }
        let expected = (width as usize) * (height as usize) * 4;
        if rgba8_premul.len() != expected {
            return Err(KinemaError::validation(format!(
                "ImagePixels byte length {} does not match {}x{} RGBA8",
                rgba8_premul.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            rgba8_premul,
        })
    }

    pub fn is_consistent(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.rgba8_premul.len() == (self.width as usize) * (self.height as usize) * 4
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ImageLayer {
    pub pixels: Option<Arc<ImagePixels>>,
}

impl ImageLayer {
    pub fn verify(&self) -> bool {
        match &self.pixels {
            Some(pixels) if pixels.is_consistent() => true,
            Some(_) => {
                verify_failed("ImageLayer", "pixel buffer inconsistent with dimensions");
                false
            }
            None => {
                verify_failed("ImageLayer", "pixels missing");
                false
            }
        }
    }
}

/// Plays another composition as this layer's content.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct PreComposeLayer {
    pub composition: Option<Arc<Composition>>,
    /// Parent-timeline frame at which the child's frame zero plays. The child
    /// holds its boundary frames outside its own timeline.
    pub composition_start: Frame,
}

impl PreComposeLayer {
    pub fn verify(&self) -> bool {
        match &self.composition {
            Some(child) => {
                if child.verify() {
                    true
                } else {
                    verify_failed("PreComposeLayer", "child composition failed verification");
                    false
                }
            }
            None => {
                verify_failed("PreComposeLayer", "child composition missing");
                false
            }
        }
    }

    /// Child frame for a parent frame, clamped into the child's timeline.
    pub fn child_frame(&self, child: &Composition, frame: Frame) -> Frame {
        child.timeline().clamp(Frame(frame.0 - self.composition_start.0))
    }

    pub fn exclude_varying_ranges(&self, ranges: &mut Vec<TimeRange>) {
        let Some(child) = &self.composition else {
            return;
        };
        let child_static = child.static_time_ranges();
        for varying in complement_ranges(&child_static, child.timeline()) {
            subtract_range(ranges, varying.shift(self.composition_start.0));
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum LayerKind {
    Shape(ShapeLayer),
    Solid(SolidLayer),
    Camera(CameraLayer),
    Image(ImageLayer),
    PreCompose(PreComposeLayer),
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Layer {
    pub name: String,
    pub range: TimeRange, // timeline placement [start,end)
    pub transform: Option<Transform2D>,
    pub effects: Vec<Effect>,
    pub kind: LayerKind,
}

impl Layer {
    pub fn visible_at(&self, frame: Frame) -> bool {
        self.range.contains(frame)
    }

    /// Content box in layer-local space, before effects.
    ///
    /// A camera frames its containing composition, so it reports the full
    /// canvas no matter how its parameters animate.
    pub fn content_bounds(&self, parent: &Composition) -> Rect {
        match &self.kind {
            LayerKind::Shape(shape) => shape.path.bounding_box(),
            LayerKind::Solid(solid) => Rect::new(
                0.0,
                0.0,
                f64::from(solid.width),
                f64::from(solid.height),
            ),
            LayerKind::Camera(_) => Rect::new(
                0.0,
                0.0,
                f64::from(parent.width),
                f64::from(parent.height),
            ),
            LayerKind::Image(image) => match &image.pixels {
                Some(pixels) => Rect::new(
                    0.0,
                    0.0,
                    f64::from(pixels.width),
                    f64::from(pixels.height),
                ),
                None => Rect::ZERO,
            },
            LayerKind::PreCompose(pre) => match &pre.composition {
                Some(child) => Rect::new(
                    0.0,
                    0.0,
                    f64::from(child.width),
                    f64::from(child.height),
                ),
                None => Rect::ZERO,
            },
        }
    }

    /// Content box after the effects visible at `frame` have grown it.
    pub fn bounds_at(&self, parent: &Composition, frame: Frame) -> Rect {
        let mut bounds = self.content_bounds(parent);
        let anchor = match &self.transform {
            Some(transform) => transform.anchor.value_at(frame),
            None => Point::ZERO,
        };
        for effect in &self.effects {
            if effect.visible_at(frame) {
                effect.transform_bounds(&mut bounds, anchor, frame);
            }
        }
        bounds
    }

    pub fn verify(&self) -> bool {
        if self.transform.is_none() {
            verify_failed("Layer", "transform missing");
            return false;
        }
        if !self.effects.iter().all(Effect::verify) {
            verify_failed("Layer", "effect failed verification");
            return false;
        }
        match &self.kind {
            LayerKind::Shape(shape) => shape.verify(),
            LayerKind::Solid(solid) => solid.verify(),
            LayerKind::Camera(camera) => camera.verify(),
            LayerKind::Image(image) => image.verify(),
            LayerKind::PreCompose(pre) => pre.verify(),
        }
    }

    /// Narrows `ranges` by everything that can change this layer's pixels.
    pub fn exclude_varying_ranges(&self, ranges: &mut Vec<TimeRange>) {
        // Switching on or off changes the output, but the frames on either
        // side stay eligible.
        split_ranges_at(ranges, self.range.start);
        split_ranges_at(ranges, self.range.end);

        if let Some(transform) = &self.transform {
            transform.exclude_varying_ranges(ranges);
        }
        for effect in &self.effects {
            effect.exclude_varying_ranges(ranges);
        }
        match &self.kind {
            LayerKind::Shape(shape) => shape.fill.exclude_varying_ranges(ranges),
            LayerKind::Solid(solid) => solid.color.exclude_varying_ranges(ranges),
            LayerKind::Camera(camera) => {
                if let Some(option) = &camera.option {
                    option.exclude_varying_ranges(ranges);
                }
            }
            LayerKind::Image(_) => {}
            LayerKind::PreCompose(pre) => pre.exclude_varying_ranges(ranges),
        }
    }
}
