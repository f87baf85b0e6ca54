//! Shared primitive types: frames, ranges, rates, colors, errors.

pub mod core;
pub mod error;
