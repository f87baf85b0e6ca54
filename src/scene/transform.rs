use crate::{
    animation::property::Property,
    foundation::core::{Affine, Frame, Point, TimeRange, Vec2},
};

/// Animated 2D placement: rotate and scale about an anchor, then translate.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Transform2D {
    pub anchor: Property<Point>, // pivot in local space
    pub position: Property<Point>,
    pub scale: Property<Vec2>, // default (1,1)
    pub rotation_rad: Property<f64>,
    pub opacity: Property<f64>, // 0..=1, clamped at sampling
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            anchor: Property::constant(Point::ZERO),
            position: Property::constant(Point::ZERO),
            scale: Property::constant(Vec2::new(1.0, 1.0)),
            rotation_rad: Property::constant(0.0),
            opacity: Property::constant(1.0),
        }
    }
}

impl Transform2D {
    pub fn to_affine(&self, frame: Frame) -> Affine {
        let anchor = self.anchor.value_at(frame);
        let position = self.position.value_at(frame);
        let scale = self.scale.value_at(frame);
        let rotation = self.rotation_rad.value_at(frame);

        let t_position = Affine::translate(position.to_vec2());
        let t_rotate = Affine::rotate(rotation);
        let t_scale = Affine::scale_non_uniform(scale.x, scale.y);
        let t_unanchor = Affine::translate(-anchor.to_vec2());

        // Canonical order: rotate and scale about the anchor, and the anchor
        // point itself maps to `position`.
        t_position * t_rotate * t_scale * t_unanchor
    }

    pub fn opacity_at(&self, frame: Frame) -> f64 {
        self.opacity.value_at(frame).clamp(0.0, 1.0)
    }

    pub fn exclude_varying_ranges(&self, ranges: &mut Vec<TimeRange>) {
        self.anchor.exclude_varying_ranges(ranges);
        self.position.exclude_varying_ranges(ranges);
        self.scale.exclude_varying_ranges(ranges);
        self.rotation_rad.exclude_varying_ranges(ranges);
        self.opacity.exclude_varying_ranges(ranges);
    }
}
