//! # Gain Conversion
//!
//! Levels are presented to the user in decibels, but the mixer multiplies
//! samples by linear amplitude factors. The conversion is
//!
//! ```text
//! gain = 10^(dB / 20)
//! ```
//!
//! A few reference points:
//!
//! | dB    | linear gain |
//! |-------|-------------|
//! | +12   | ≈ 3.981     |
//! | 0     | 1.0 (unity) |
//! | -3    | ≈ 0.708     |
//! | -60   | 0.001       |
//!
//! The actual math lives in `nih_plug::util`; this module pins it to the
//! level range the delay exposes.

use nih_plug::util;

/// Lowest wet/dry level, in dB.
pub const MIN_LEVEL_DB: f32 = -60.0;

/// Highest wet/dry level, in dB.
pub const MAX_LEVEL_DB: f32 = 12.0;

/// Convert a decibel level to a linear amplitude multiplier.
///
/// The level is clamped to `[MIN_LEVEL_DB, MAX_LEVEL_DB]` first, so the
/// result always lies between 0.001 and ~3.98. 0 dB maps to exactly 1.0.
pub fn level_to_gain(level_db: f32) -> f32 {
    util::db_to_gain(level_db.clamp(MIN_LEVEL_DB, MAX_LEVEL_DB))
}
