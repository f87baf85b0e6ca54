//! Set algebra over ordered, disjoint [`TimeRange`] lists.
//!
//! Static-range analysis starts from one candidate range covering a whole
//! timeline and narrows it by repeatedly applying the operations here. All
//! functions expect their input sorted by start frame with no overlaps, and
//! preserve that shape.

use crate::foundation::core::{Frame, TimeRange};

/// Splits the range that strictly contains `frame` into two touching halves.
///
/// Used for jump discontinuities: both halves stay in the candidate set, the
/// boundary just may not be crossed inside one range.
pub fn split_ranges_at(ranges: &mut Vec<TimeRange>, frame: Frame) {
    let idx = ranges.partition_point(|r| r.end.0 <= frame.0);
    if idx >= ranges.len() {
        return;
    }
    let r = ranges[idx];
    if r.start.0 < frame.0 && frame.0 < r.end.0 {
        ranges[idx] = TimeRange {
            start: r.start,
            end: frame,
        };
        ranges.insert(
            idx + 1,
            TimeRange {
                start: frame,
                end: r.end,
            },
        );
    }
}

/// Removes every frame of `cut` from `ranges`.
///
/// A range overlapped in the middle is split in two; ranges that end up empty
/// are dropped.
pub fn subtract_range(ranges: &mut Vec<TimeRange>, cut: TimeRange) {
    if cut.is_empty() || ranges.is_empty() {
        return;
    }
    let mut out = Vec::with_capacity(ranges.len() + 1);
    for &r in ranges.iter() {
        if r.end.0 <= cut.start.0 || cut.end.0 <= r.start.0 {
            out.push(r);
            continue;
        }
        if r.start.0 < cut.start.0 {
            out.push(TimeRange {
                start: r.start,
                end: cut.start,
            });
        }
        if cut.end.0 < r.end.0 {
            out.push(TimeRange {
                start: cut.end,
                end: r.end,
            });
        }
    }
    *ranges = out;
}

/// Frames of `domain` not covered by `ranges`.
pub fn complement_ranges(ranges: &[TimeRange], domain: TimeRange) -> Vec<TimeRange> {
    let mut out = Vec::new();
    let mut cursor = domain.start;
    for &r in ranges {
        let start = Frame(r.start.0.max(domain.start.0));
        let end = Frame(r.end.0.min(domain.end.0));
        if end.0 <= cursor.0 {
            continue;
        }
        if start.0 > cursor.0 {
            out.push(TimeRange { start: cursor, end: start });
        }
        cursor = end;
    }
    if cursor.0 < domain.end.0 {
        out.push(TimeRange {
            start: cursor,
            end: domain.end,
        });
    }
    out
}
