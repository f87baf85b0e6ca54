use crate::{
    animation::property::Property,
    foundation::core::TimeRange,
    scene::verify::verify_failed,
};

/// Camera parameters. The block is optional on the layer, but once present
/// every knob must be too.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CameraOption {
    pub zoom: Option<Property<f64>>,
    pub depth_of_field: Option<Property<bool>>,
    pub focus_distance: Option<Property<f64>>,
    pub aperture: Option<Property<f64>>,
    pub blur_level: Option<Property<f64>>, // 0..=1
}

impl CameraOption {
    pub fn verify(&self) -> bool {
        let ok = self.zoom.is_some()
            && self.depth_of_field.is_some()
            && self.focus_distance.is_some()
            && self.aperture.is_some()
            && self.blur_level.is_some();
        if !ok {
            verify_failed("CameraOption", "missing required property");
        }
        ok
    }

    pub fn exclude_varying_ranges(&self, ranges: &mut Vec<TimeRange>) {
        if let Some(p) = &self.zoom {
            p.exclude_varying_ranges(ranges);
        }
        if let Some(p) = &self.depth_of_field {
            p.exclude_varying_ranges(ranges);
        }
        if let Some(p) = &self.focus_distance {
            p.exclude_varying_ranges(ranges);
        }
        if let Some(p) = &self.aperture {
            p.exclude_varying_ranges(ranges);
        }
        if let Some(p) = &self.blur_level {
            p.exclude_varying_ranges(ranges);
        }
    }
}

/// A camera frames its containing composition; it draws nothing itself.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct CameraLayer {
    pub option: Option<CameraOption>,
}

impl CameraLayer {
    pub fn verify(&self) -> bool {
        match &self.option {
            Some(option) => option.verify(),
            None => {
                verify_failed("CameraLayer", "camera option missing");
                false
            }
        }
    }
}
