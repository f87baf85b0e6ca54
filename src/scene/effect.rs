//! Layer effects.
//!
//! Every effect property is optional at the data-model level so that a
//! partially decoded document can be represented; `verify` is the gate that
//! rejects such documents before playback. Visibility, bounds growth, and
//! static-range narrowing all run the shared contract first and the
//! variant's own rules second.

use crate::{
    animation::property::{Interpolate, Property},
    foundation::core::{Frame, Point, Rect, TimeRange},
    scene::verify::verify_failed,
};

/// Which way radial blur smears: an angular arc or a scale toward the center.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum RadialBlurMode {
    Spin,
    Zoom,
}

impl Interpolate for RadialBlurMode {
    const DISCRETE: bool = true;

    fn interpolate(a: &Self, _b: &Self, _t: f64) -> Self {
        *a
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AntialiasQuality {
    Low,
    High,
}

impl Interpolate for AntialiasQuality {
    const DISCRETE: bool = true;

    fn interpolate(a: &Self, _b: &Self, _t: f64) -> Self {
        *a
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum BlurDimensions {
    All,
    Horizontal,
    Vertical,
}

impl Interpolate for BlurDimensions {
    const DISCRETE: bool = true;

    fn interpolate(a: &Self, _b: &Self, _t: f64) -> Self {
        *a
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct RadialBlurEffect {
    pub amount: Option<Property<f64>>,
    pub center: Option<Property<Point>>, // in layer-local space
    pub mode: Option<Property<RadialBlurMode>>,
    pub antialias: Option<Property<AntialiasQuality>>,
}

impl RadialBlurEffect {
    pub fn verify(&self) -> bool {
        let ok = self.amount.is_some()
            && self.center.is_some()
            && self.mode.is_some()
            && self.antialias.is_some();
        if !ok {
            verify_failed("RadialBlurEffect", "missing required property");
        }
        ok
    }

    pub fn visible_at(&self, frame: Frame) -> bool {
        self.amount
            .as_ref()
            .is_some_and(|amount| amount.value_at(frame) != 0.0)
    }

    fn exclude_varying_ranges(&self, ranges: &mut Vec<TimeRange>) {
        if let Some(p) = &self.amount {
            p.exclude_varying_ranges(ranges);
        }
        if let Some(p) = &self.center {
            p.exclude_varying_ranges(ranges);
        }
        if let Some(p) = &self.mode {
            p.exclude_varying_ranges(ranges);
        }
        if let Some(p) = &self.antialias {
            p.exclude_varying_ranges(ranges);
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GaussianBlurEffect {
    pub blurriness: Option<Property<f64>>, // kernel size in pixels
    pub dimensions: Option<Property<BlurDimensions>>,
    pub repeat_edge_pixels: Option<Property<bool>>,
}

impl GaussianBlurEffect {
    pub fn verify(&self) -> bool {
        let ok = self.blurriness.is_some()
            && self.dimensions.is_some()
            && self.repeat_edge_pixels.is_some();
        if !ok {
            verify_failed("GaussianBlurEffect", "missing required property");
        }
        ok
    }

    pub fn visible_at(&self, frame: Frame) -> bool {
        self.blurriness
            .as_ref()
            .is_some_and(|blurriness| blurriness.value_at(frame) != 0.0)
    }

    fn transform_bounds(&self, bounds: &mut Rect, frame: Frame) {
        let repeat_edge = self
            .repeat_edge_pixels
            .as_ref()
            .is_some_and(|p| p.value_at(frame));
        if repeat_edge {
            // Edge repetition keeps all the energy inside the content box.
            return;
        }
        let blurriness = self
            .blurriness
            .as_ref()
            .map_or(0.0, |p| p.value_at(frame))
            .max(0.0);
        let dimensions = self
            .dimensions
            .as_ref()
            .map_or(BlurDimensions::All, |p| p.value_at(frame));
        let expand_x = match dimensions {
            BlurDimensions::All | BlurDimensions::Horizontal => blurriness,
            BlurDimensions::Vertical => 0.0,
        };
        let expand_y = match dimensions {
            BlurDimensions::All | BlurDimensions::Vertical => blurriness,
            BlurDimensions::Horizontal => 0.0,
        };
        *bounds = bounds.inflate(expand_x, expand_y);
    }

    fn exclude_varying_ranges(&self, ranges: &mut Vec<TimeRange>) {
        if let Some(p) = &self.blurriness {
            p.exclude_varying_ranges(ranges);
        }
        if let Some(p) = &self.dimensions {
            p.exclude_varying_ranges(ranges);
        }
        if let Some(p) = &self.repeat_edge_pixels {
            p.exclude_varying_ranges(ranges);
        }
    }
}

/// Brightness and contrast adjustment; 0 is neutral for both knobs.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ColorAdjustEffect {
    pub brightness: Option<Property<f64>>, // -1..=1
    pub contrast: Option<Property<f64>>,   // -1..=1
}

impl ColorAdjustEffect {
    pub fn verify(&self) -> bool {
        let ok = self.brightness.is_some() && self.contrast.is_some();
        if !ok {
            verify_failed("ColorAdjustEffect", "missing required property");
        }
        ok
    }

    pub fn visible_at(&self, frame: Frame) -> bool {
        let brightness = self
            .brightness
            .as_ref()
            .is_some_and(|p| p.value_at(frame) != 0.0);
        let contrast = self
            .contrast
            .as_ref()
            .is_some_and(|p| p.value_at(frame) != 0.0);
        brightness || contrast
    }

    fn exclude_varying_ranges(&self, ranges: &mut Vec<TimeRange>) {
        if let Some(p) = &self.brightness {
            p.exclude_varying_ranges(ranges);
        }
        if let Some(p) = &self.contrast {
            p.exclude_varying_ranges(ranges);
        }
    }
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum EffectKind {
    RadialBlur(RadialBlurEffect),
    GaussianBlur(GaussianBlurEffect),
    ColorAdjust(ColorAdjustEffect),
}

/// One effect applied to a layer's rastered content.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Effect {
    pub enabled: Option<Property<bool>>, // absent means always on
    pub kind: EffectKind,
}

impl Effect {
    pub fn verify(&self) -> bool {
        // The shared contract has no required properties; variants add theirs.
        match &self.kind {
            EffectKind::RadialBlur(fx) => fx.verify(),
            EffectKind::GaussianBlur(fx) => fx.verify(),
            EffectKind::ColorAdjust(fx) => fx.verify(),
        }
    }

    /// Whether the effect changes any pixels at `frame`. An effect whose
    /// strength animates through zero is invisible exactly on those frames.
    pub fn visible_at(&self, frame: Frame) -> bool {
        if let Some(enabled) = &self.enabled
            && !enabled.value_at(frame)
        {
            return false;
        }
        match &self.kind {
            EffectKind::RadialBlur(fx) => fx.visible_at(frame),
            EffectKind::GaussianBlur(fx) => fx.visible_at(frame),
            EffectKind::ColorAdjust(fx) => fx.visible_at(frame),
        }
    }

    /// Grows `bounds` to cover everything the effect can touch at `frame`.
    /// Variants that only recolor or resample in place leave it unchanged.
    pub fn transform_bounds(&self, bounds: &mut Rect, _anchor: Point, frame: Frame) {
        match &self.kind {
            EffectKind::GaussianBlur(fx) => fx.transform_bounds(bounds, frame),
            EffectKind::RadialBlur(_) | EffectKind::ColorAdjust(_) => {}
        }
    }

    /// Narrows `ranges` by the shared contract first, then the variant.
    pub fn exclude_varying_ranges(&self, ranges: &mut Vec<TimeRange>) {
        if let Some(enabled) = &self.enabled {
            enabled.exclude_varying_ranges(ranges);
        }
        match &self.kind {
            EffectKind::RadialBlur(fx) => fx.exclude_varying_ranges(ranges),
            EffectKind::GaussianBlur(fx) => fx.exclude_varying_ranges(ranges),
            EffectKind::ColorAdjust(fx) => fx.exclude_varying_ranges(ranges),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::property::{Interp, Keyframe};

    fn key<T>(frame: i64, value: T) -> Keyframe<T> {
        Keyframe {
            frame: Frame(frame),
            value,
            interp: Interp::Linear,
        }
    }

    fn radial_blur(amount: Property<f64>) -> Effect {
        Effect {
            enabled: None,
            kind: EffectKind::RadialBlur(RadialBlurEffect {
                amount: Some(amount),
                center: Some(Property::constant(Point::new(0.5, 0.5))),
                mode: Some(Property::constant(RadialBlurMode::Spin)),
                antialias: Some(Property::constant(AntialiasQuality::Low)),
            }),
        }
    }

    #[test]
    fn radial_blur_visibility_follows_amount() {
        let fx = radial_blur(
            Property::animated(vec![key(0, 0.0), key(10, 5.0)]).unwrap(),
        );
        assert!(!fx.visible_at(Frame(0)));
        assert!(fx.visible_at(Frame(5)));
        assert!(fx.visible_at(Frame(10)));
    }

    #[test]
    fn disabled_effect_is_invisible() {
        let mut fx = radial_blur(Property::constant(5.0));
        assert!(fx.visible_at(Frame(3)));
        fx.enabled = Some(Property::constant(false));
        assert!(!fx.visible_at(Frame(3)));
    }

    #[test]
    fn verify_requires_every_variant_property() {
        let mut fx = radial_blur(Property::constant(1.0));
        assert!(fx.verify());
        if let EffectKind::RadialBlur(inner) = &mut fx.kind {
            inner.mode = None;
        }
        assert!(!fx.verify());

        let gaussian = Effect {
            enabled: None,
            kind: EffectKind::GaussianBlur(GaussianBlurEffect {
                blurriness: Some(Property::constant(4.0)),
                dimensions: None,
                repeat_edge_pixels: Some(Property::constant(true)),
            }),
        };
        assert!(!gaussian.verify());

        let adjust = Effect {
            enabled: None,
            kind: EffectKind::ColorAdjust(ColorAdjustEffect {
                brightness: Some(Property::constant(0.2)),
                contrast: None,
            }),
        };
        assert!(!adjust.verify());
    }

    #[test]
    fn gaussian_blur_outsets_bounds_unless_edges_repeat() {
        let mut fx = GaussianBlurEffect {
            blurriness: Some(Property::constant(6.0)),
            dimensions: Some(Property::constant(BlurDimensions::All)),
            repeat_edge_pixels: Some(Property::constant(false)),
        };
        let mut bounds = Rect::new(10.0, 10.0, 20.0, 20.0);
        fx.transform_bounds(&mut bounds, Frame(0));
        assert_eq!(bounds, Rect::new(4.0, 4.0, 26.0, 26.0));

        fx.repeat_edge_pixels = Some(Property::constant(true));
        let mut bounds = Rect::new(10.0, 10.0, 20.0, 20.0);
        fx.transform_bounds(&mut bounds, Frame(0));
        assert_eq!(bounds, Rect::new(10.0, 10.0, 20.0, 20.0));
    }

    #[test]
    fn gaussian_blur_outset_follows_direction() {
        let fx = GaussianBlurEffect {
            blurriness: Some(Property::constant(3.0)),
            dimensions: Some(Property::constant(BlurDimensions::Horizontal)),
            repeat_edge_pixels: Some(Property::constant(false)),
        };
        let mut bounds = Rect::new(0.0, 0.0, 10.0, 10.0);
        fx.transform_bounds(&mut bounds, Frame(0));
        assert_eq!(bounds, Rect::new(-3.0, 0.0, 13.0, 10.0));
    }

    #[test]
    fn narrowing_covers_shared_and_variant_properties() {
        let fx = Effect {
            enabled: Some(
                Property::animated(vec![key(0, false), key(10, true)]).unwrap(),
            ),
            kind: EffectKind::RadialBlur(RadialBlurEffect {
                amount: Some(Property::animated(vec![key(20, 0.0), key(30, 5.0)]).unwrap()),
                center: Some(Property::constant(Point::new(0.5, 0.5))),
                mode: Some(Property::constant(RadialBlurMode::Zoom)),
                antialias: Some(Property::constant(AntialiasQuality::High)),
            }),
        };
        let mut ranges = vec![TimeRange {
            start: Frame(0),
            end: Frame(40),
        }];
        fx.exclude_varying_ranges(&mut ranges);
        assert_eq!(
            ranges,
            vec![
                TimeRange {
                    start: Frame(0),
                    end: Frame(10)
                },
                TimeRange {
                    start: Frame(10),
                    end: Frame(20)
                },
                TimeRange {
                    start: Frame(30),
                    end: Frame(40)
                },
            ]
        );
    }
}
