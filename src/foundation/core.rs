use crate::foundation::error::{KinemaError, KinemaResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Position on a composition timeline, in whole frames.
///
/// Signed so that child-composition offsets can land before frame zero;
/// sampling clamps into the valid window.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Frame(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TimeRange {
    pub start: Frame,
    pub end: Frame, // exclusive
}

impl TimeRange {
    pub fn new(start: Frame, end: Frame) -> KinemaResult<Self> {
        if start.0 > end.0 {
            return Err(KinemaError::validation("TimeRange start must be <= end"));
        }
        Ok(Self { start, end })
    }

    pub fn len_frames(self) -> u64 {
        self.end.0.saturating_sub(self.start.0).max(0) as u64
    }

    pub fn is_empty(self) -> bool {
        self.start.0 >= self.end.0
    }

    pub fn contains(self, f: Frame) -> bool {
        self.start.0 <= f.0 && f.0 < self.end.0
    }

    pub fn clamp(self, f: Frame) -> Frame {
        if self.is_empty() {
            return self.start;
        }
        let max_inclusive = self.end.0 - 1;
        Frame(f.0.clamp(self.start.0, max_inclusive))
    }

    pub fn shift(self, delta: i64) -> Self {
        Self {
            start: Frame(self.start.0.saturating_add(delta)),
            end: Frame(self.end.0.saturating_add(delta)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Fps {
    pub num: u32,
    pub den: u32, // must be > 0
}

impl Fps {
    pub fn new(num: u32, den: u32) -> KinemaResult<Self> {
        if den == 0 {
            return Err(KinemaError::validation("Fps den must be > 0"));
        }
        if num == 0 {
            return Err(KinemaError::validation("Fps num must be > 0"));
        }
        Ok(Self { num, den })
    }

    pub fn is_valid(self) -> bool {
        self.num > 0 && self.den > 0
    }

    pub fn as_f64(self) -> f64 {
        f64::from(self.num) / f64::from(self.den)
    }

    pub fn frame_duration_secs(self) -> f64 {
        f64::from(self.den) / f64::from(self.num)
    }

    pub fn frames_to_secs(self, frames: i64) -> f64 {
        (frames as f64) * self.frame_duration_secs()
    }
}

/// Straight (non-premultiplied) 8-bit RGB, the fill color of solids and shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const BLACK: Color = Color { r: 0, g: 0, b: 0 };
    pub const WHITE: Color = Color {
        r: 255,
        g: 255,
        b: 255,
    };

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Premultiplied RGBA8 bytes at the given alpha.
    pub fn to_premul_rgba8(self, a: u8) -> [u8; 4] {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }

        [premul(self.r, a), premul(self.g, a), premul(self.b, a), a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_contains_is_half_open() {
        let r = TimeRange::new(Frame(2), Frame(5)).unwrap();
        assert!(!r.contains(Frame(1)));
        assert!(r.contains(Frame(2)));
        assert!(r.contains(Frame(4)));
        assert!(!r.contains(Frame(5)));
        assert_eq!(r.len_frames(), 3);
    }

    #[test]
    fn range_rejects_reversed_bounds() {
        assert!(TimeRange::new(Frame(5), Frame(2)).is_err());
        assert!(TimeRange::new(Frame(3), Frame(3)).unwrap().is_empty());
    }

    #[test]
    fn range_clamp_hits_last_frame() {
        let r = TimeRange::new(Frame(0), Frame(10)).unwrap();
        assert_eq!(r.clamp(Frame(-3)), Frame(0));
        assert_eq!(r.clamp(Frame(4)), Frame(4));
        assert_eq!(r.clamp(Frame(99)), Frame(9));
    }

    #[test]
    fn range_shift_handles_negative_delta() {
        let r = TimeRange::new(Frame(2), Frame(5)).unwrap();
        assert_eq!(r.shift(-4), TimeRange { start: Frame(-2), end: Frame(1) });
        assert_eq!(r.shift(3), TimeRange { start: Frame(5), end: Frame(8) });
    }

    #[test]
    fn fps_rejects_zero_terms() {
        assert!(Fps::new(0, 1).is_err());
        assert!(Fps::new(30, 0).is_err());
        let f = Fps::new(30000, 1001).unwrap();
        assert!((f.as_f64() - 29.97).abs() < 0.01);
        assert!(f.is_valid());
    }

    #[test]
    fn color_premultiplies_with_rounding() {
        assert_eq!(Color::WHITE.to_premul_rgba8(255), [255, 255, 255, 255]);
        assert_eq!(Color::WHITE.to_premul_rgba8(0), [0, 0, 0, 0]);
        assert_eq!(Color::rgb(200, 100, 0).to_premul_rgba8(128), [100, 50, 0, 128]);
    }
}
