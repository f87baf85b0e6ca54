use crate::{
    foundation::core::{Color, Fps, Frame, TimeRange},
    scene::layer::Layer,
    scene::verify::verify_failed,
};

/// A timed canvas with an ordered layer stack, bottom-most first.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Composition {
    pub width: u32,
    pub height: u32,
    pub duration: Frame, // exclusive end of the timeline
    pub fps: Fps,
    pub background: Option<Color>,
    pub layers: Vec<Layer>,
}

impl Composition {
    pub fn timeline(&self) -> TimeRange {
        TimeRange {
            start: Frame(0),
            end: self.duration,
        }
    }

    /// Structural check of the whole document tree. Never samples property
    /// values; it only asks whether everything playback relies on is present.
    pub fn verify(&self) -> bool {
        if self.width == 0 || self.height == 0 {
            verify_failed("Composition", "canvas dimensions must be positive");
            return false;
        }
        if self.duration.0 <= 0 {
            verify_failed("Composition", "duration must be positive");
            return false;
        }
        if !self.fps.is_valid() {
            verify_failed("Composition", "fps terms must be positive");
            return false;
        }
        for layer in &self.layers {
            if !layer.verify() {
                verify_failed("Composition", &format!("layer {:?} failed", layer.name));
                return false;
            }
        }
        true
    }

    /// Ranges of the timeline whose frames are provably identical, in order.
    ///
    /// Starts from the whole timeline and lets every layer narrow it. The
    /// result is conservative: a frame inside a returned range renders the
    /// same as every other frame of that range, while frames outside may or
    /// may not differ.
    #[tracing::instrument(skip(self))]
    pub fn static_time_ranges(&self) -> Vec<TimeRange> {
        let timeline = self.timeline();
        if timeline.is_empty() {
            return Vec::new();
        }
        let mut ranges = vec![timeline];
        for layer in &self.layers {
            layer.exclude_varying_ranges(&mut ranges);
            if ranges.is_empty() {
                break;
            }
        }
        ranges
    }
}
