//! Time-varying parameters.
//!
//! A [`Property`] is either a bare constant or a keyframed track sampled by
//! frame. Tracks also answer the reverse question: over which frames does this
//! parameter provably hold still? That analysis is computed once per track and
//! memoized, so repeated cache-eligibility queries never re-walk the keys.

use std::sync::OnceLock;

use crate::{
    animation::ease::Ease,
    animation::ranges::{split_ranges_at, subtract_range},
    foundation::core::{Color, Frame, Point, TimeRange, Vec2},
    foundation::error::{KinemaError, KinemaResult},
};

/// Blend between two keyframe values.
pub trait Interpolate: Clone + PartialEq {
    /// Discrete values never blend; a segment holds its starting value.
    const DISCRETE: bool = false;

    fn interpolate(a: &Self, b: &Self, t: f64) -> Self;
}

impl Interpolate for f64 {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        a + (b - a) * t
    }
}

impl Interpolate for Point {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
    }
}

impl Interpolate for Vec2 {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        Vec2::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
    }
}

impl Interpolate for Color {
    fn interpolate(a: &Self, b: &Self, t: f64) -> Self {
        fn lerp_u8(a: u8, b: u8, t: f64) -> u8 {
            let a = f64::from(a);
            let b = f64::from(b);
            (a + (b - a) * t).round().clamp(0.0, 255.0) as u8
        }

        Color {
            r: lerp_u8(a.r, b.r, t),
            g: lerp_u8(a.g, b.g, t),
            b: lerp_u8(a.b, b.b, t),
        }
    }
}

impl Interpolate for bool {
    const DISCRETE: bool = true;

    fn interpolate(a: &Self, _b: &Self, _t: f64) -> Self {
        *a
    }
}

/// How a segment moves from its key toward the next one.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum Interp {
    Hold,
    Linear,
    Eased(Ease),
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct Keyframe<T> {
    pub frame: Frame,
    pub value: T,
    pub interp: Interp, // applied over [frame, next key's frame)
}

/// Ordered keyframes with a memoized view of where the value is in motion.
///
/// Keys are fixed at construction; replacing them means building a new track,
/// which is what keeps the memo trustworthy.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct KeyframeTrack<T> {
    keys: Vec<Keyframe<T>>, // strictly increasing frames, never empty
    #[serde(skip)]
    varying: OnceLock<VaryingSpans>,
}

/// Frames where a track's sampled value changes from one frame to the next.
///
/// `subtract` spans come from interpolating segments and remove candidate
/// frames outright. `cuts` come from hold-style jumps: the frames on both
/// sides stay eligible, but no candidate range may straddle the jump.
#[derive(Clone, Debug, Default, PartialEq)]
struct VaryingSpans {
    subtract: Vec<TimeRange>,
    cuts: Vec<Frame>,
}

fn compute_varying<T: Interpolate>(keys: &[Keyframe<T>]) -> VaryingSpans {
    let mut spans = VaryingSpans::default();
    for w in keys.windows(2) {
        let (a, b) = (&w[0], &w[1]);
        if a.value == b.value {
            // Interpolating between equal endpoints still lands on the same
            // value at every frame.
            continue;
        }
        if T::DISCRETE || matches!(a.interp, Interp::Hold) {
            spans.cuts.push(b.frame);
        } else {
            let next = TimeRange {
                start: a.frame,
                end: b.frame,
            };
            match spans.subtract.last_mut() {
                Some(last) if last.end.0 >= next.start.0 => last.end = next.end,
                _ => spans.subtract.push(next),
            }
        }
    }
    spans
}

impl<T: Interpolate> KeyframeTrack<T> {
    pub fn new(keys: Vec<Keyframe<T>>) -> KinemaResult<Self> {
        if keys.is_empty() {
            return Err(KinemaError::animation(
                "KeyframeTrack needs at least one key",
            ));
        }
        if !keys.windows(2).all(|w| w[0].frame.0 < w[1].frame.0) {
            return Err(KinemaError::animation(
                "KeyframeTrack keys must be strictly increasing by frame",
            ));
        }
        Ok(Self {
            keys,
            varying: OnceLock::new(),
        })
    }

    pub fn keys(&self) -> &[Keyframe<T>] {
        &self.keys
    }

    /// Samples the track. Frames before the first key take the first value,
    /// frames at or after the last key take the last.
    pub fn value_at(&self, frame: Frame) -> T {
        let f = frame.0;
        let idx = self.keys.partition_point(|k| k.frame.0 <= f);

        if idx == 0 {
            return self.keys[0].value.clone();
        }
        if idx >= self.keys.len() {
            return self.keys[self.keys.len() - 1].value.clone();
        }

        let a = &self.keys[idx - 1];
        let b = &self.keys[idx];
        // a.frame <= f < b.frame, so the denominator is at least one.
        let t = ((f - a.frame.0) as f64) / ((b.frame.0 - a.frame.0) as f64);
        match a.interp {
            Interp::Hold => a.value.clone(),
            Interp::Linear => T::interpolate(&a.value, &b.value, t),
            Interp::Eased(ease) => T::interpolate(&a.value, &b.value, ease.apply(t)),
        }
    }

    fn varying(&self) -> &VaryingSpans {
        self.varying.get_or_init(|| compute_varying(&self.keys))
    }

    /// Narrows `ranges` to frames where this track provably holds still.
    pub fn exclude_varying_ranges(&self, ranges: &mut Vec<TimeRange>) {
        if self.keys.len() <= 1 {
            return;
        }
        let spans = self.varying();
        for &cut in &spans.subtract {
            subtract_range(ranges, cut);
        }
        for &frame in &spans.cuts {
            split_ranges_at(ranges, frame);
        }
    }
}

/// A parameter that may change over time: a bare constant or a keyframed track.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub enum Property<T> {
    Constant(T),
    Animated(KeyframeTrack<T>),
}

impl<T: Interpolate> Property<T> {
    pub fn constant(value: T) -> Self {
        Self::Constant(value)
    }

    pub fn animated(keys: Vec<Keyframe<T>>) -> KinemaResult<Self> {
        Ok(Self::Animated(KeyframeTrack::new(keys)?))
    }

    pub fn is_animated(&self) -> bool {
        matches!(self, Self::Animated(track) if track.keys.len() > 1)
    }

    pub fn value_at(&self, frame: Frame) -> T {
        match self {
            Self::Constant(v) => v.clone(),
            Self::Animated(track) => track.value_at(frame),
        }
    }

    /// Narrows `ranges` to frames where this property provably holds still.
    /// Constants and single-key tracks leave the candidates untouched.
    pub fn exclude_varying_ranges(&self, ranges: &mut Vec<TimeRange>) {
        match self {
            Self::Constant(_) => {}
            Self::Animated(track) => track.exclude_varying_ranges(ranges),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key<T>(frame: i64, value: T, interp: Interp) -> Keyframe<T> {
        Keyframe {
            frame: Frame(frame),
            value,
            interp,
        }
    }

    fn r(start: i64, end: i64) -> TimeRange {
        TimeRange {
            start: Frame(start),
            end: Frame(end),
        }
    }

    #[test]
    fn track_rejects_bad_key_order() {
        assert!(KeyframeTrack::<f64>::new(vec![]).is_err());
        assert!(
            KeyframeTrack::new(vec![
                key(5, 1.0, Interp::Linear),
                key(5, 2.0, Interp::Linear),
            ])
            .is_err()
        );
        assert!(
            KeyframeTrack::new(vec![
                key(9, 1.0, Interp::Linear),
                key(3, 2.0, Interp::Linear),
            ])
            .is_err()
        );
    }

    #[test]
    fn constant_samples_everywhere() {
        let p = Property::constant(7.5);
        assert_eq!(p.value_at(Frame(-100)), 7.5);
        assert_eq!(p.value_at(Frame(0)), 7.5);
        assert_eq!(p.value_at(Frame(1_000_000)), 7.5);
        assert!(!p.is_animated());
    }

    #[test]
    fn sampling_clamps_outside_the_key_span() {
        let p = Property::animated(vec![
            key(10, 1.0, Interp::Linear),
            key(20, 9.0, Interp::Linear),
        ])
        .unwrap();
        assert_eq!(p.value_at(Frame(-5)), 1.0);
        assert_eq!(p.value_at(Frame(10)), 1.0);
        assert_eq!(p.value_at(Frame(20)), 9.0);
        assert_eq!(p.value_at(Frame(300)), 9.0);
    }

    #[test]
    fn linear_segment_interpolates() {
        let p = Property::animated(vec![
            key(0, 0.0, Interp::Linear),
            key(10, 10.0, Interp::Linear),
        ])
        .unwrap();
        assert_eq!(p.value_at(Frame(3)), 3.0);
        assert_eq!(p.value_at(Frame(5)), 5.0);
    }

    #[test]
    fn eased_segment_bends_the_midpoint() {
        let p = Property::animated(vec![
            key(0, 0.0, Interp::Eased(Ease::OutQuad)),
            key(10, 10.0, Interp::Linear),
        ])
        .unwrap();
        assert_eq!(p.value_at(Frame(5)), 7.5);
    }

    #[test]
    fn hold_segment_keeps_value_until_next_key() {
        let p = Property::animated(vec![
            key(0, 1.0, Interp::Hold),
            key(10, 5.0, Interp::Linear),
        ])
        .unwrap();
        assert_eq!(p.value_at(Frame(0)), 1.0);
        assert_eq!(p.value_at(Frame(9)), 1.0);
        assert_eq!(p.value_at(Frame(10)), 5.0);
    }

    #[test]
    fn point_and_color_blend_per_component() {
        let p = Property::animated(vec![
            key(0, Point::new(0.0, 10.0), Interp::Linear),
            key(10, Point::new(10.0, 0.0), Interp::Linear),
        ])
        .unwrap();
        assert_eq!(p.value_at(Frame(5)), Point::new(5.0, 5.0));

        let c = Property::animated(vec![
            key(0, Color::rgb(0, 0, 100), Interp::Linear),
            key(10, Color::rgb(100, 0, 0), Interp::Linear),
        ])
        .unwrap();
        assert_eq!(c.value_at(Frame(5)), Color::rgb(50, 0, 50));
    }

    #[test]
    fn constant_and_single_key_exclude_nothing() {
        let mut ranges = vec![r(0, 100)];
        Property::constant(1.0).exclude_varying_ranges(&mut ranges);
        assert_eq!(ranges, vec![r(0, 100)]);

        let single = Property::animated(vec![key(40, 2.0, Interp::Linear)]).unwrap();
        single.exclude_varying_ranges(&mut ranges);
        assert_eq!(ranges, vec![r(0, 100)]);
    }

    #[test]
    fn equal_endpoints_exclude_nothing() {
        let p = Property::animated(vec![
            key(10, 3.0, Interp::Linear),
            key(20, 3.0, Interp::Linear),
        ])
        .unwrap();
        let mut ranges = vec![r(0, 30)];
        p.exclude_varying_ranges(&mut ranges);
        assert_eq!(ranges, vec![r(0, 30)]);
    }

    #[test]
    fn interpolating_segment_subtracts_its_span() {
        let p = Property::animated(vec![
            key(10, 0.0, Interp::Linear),
            key(20, 10.0, Interp::Linear),
        ])
        .unwrap();
        let mut ranges = vec![r(0, 30)];
        p.exclude_varying_ranges(&mut ranges);
        assert_eq!(ranges, vec![r(0, 10), r(20, 30)]);
    }

    #[test]
    fn hold_jump_splits_at_the_landing_frame() {
        let p = Property::animated(vec![
            key(10, 0.0, Interp::Hold),
            key(20, 10.0, Interp::Linear),
        ])
        .unwrap();
        let mut ranges = vec![r(0, 30)];
        p.exclude_varying_ranges(&mut ranges);
        // Both sides of the jump stay eligible.
        assert_eq!(ranges, vec![r(0, 20), r(20, 30)]);
    }

    #[test]
    fn discrete_values_jump_even_when_marked_linear() {
        let p = Property::animated(vec![
            key(0, false, Interp::Linear),
            key(10, true, Interp::Linear),
        ])
        .unwrap();
        assert!(!p.value_at(Frame(5)));
        assert!(p.value_at(Frame(10)));

        let mut ranges = vec![r(0, 30)];
        p.exclude_varying_ranges(&mut ranges);
        assert_eq!(ranges, vec![r(0, 10), r(10, 30)]);
    }

    #[test]
    fn touching_motion_spans_coalesce() {
        let p = Property::animated(vec![
            key(0, 0.0, Interp::Linear),
            key(10, 1.0, Interp::Linear),
            key(20, 2.0, Interp::Linear),
        ])
        .unwrap();
        let mut ranges = vec![r(0, 30)];
        p.exclude_varying_ranges(&mut ranges);
        assert_eq!(ranges, vec![r(20, 30)]);
    }

    #[test]
    fn mixed_hold_and_motion_segments() {
        let p = Property::animated(vec![
            key(0, 0.0, Interp::Linear),
            key(10, 10.0, Interp::Hold),
            key(20, 20.0, Interp::Linear),
        ])
        .unwrap();
        let mut ranges = vec![r(0, 30)];
        p.exclude_varying_ranges(&mut ranges);
        assert_eq!(ranges, vec![r(10, 20), r(20, 30)]);
    }

    #[test]
    fn narrowing_twice_gives_the_same_answer() {
        let p = Property::animated(vec![
            key(5, 0.0, Interp::Linear),
            key(15, 1.0, Interp::Linear),
        ])
        .unwrap();

        let mut first = vec![r(0, 20)];
        p.exclude_varying_ranges(&mut first);
        let mut second = vec![r(0, 20)];
        p.exclude_varying_ranges(&mut second);
        assert_eq!(first, second);
        assert_eq!(first, vec![r(0, 5), r(15, 20)]);
    }

    #[test]
    fn json_roundtrip_preserves_sampling() {
        let p = Property::animated(vec![
            key(0, 0.0, Interp::Eased(Ease::InOutCubic)),
            key(12, 4.0, Interp::Hold),
            key(30, -2.0, Interp::Linear),
        ])
        .unwrap();
        let text = serde_json::to_string(&p).unwrap();
        let back: Property<f64> = serde_json::from_str(&text).unwrap();
        for f in -5..40 {
            assert_eq!(p.value_at(Frame(f)), back.value_at(Frame(f)));
        }
    }
}
