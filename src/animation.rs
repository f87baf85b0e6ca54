//! Keyframed parameter evaluation and static-range analysis.

pub mod ease;
pub mod property;
pub mod ranges;
