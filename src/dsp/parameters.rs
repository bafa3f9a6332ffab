//! The user-facing settings of the LCR delay, as one plain value.

use super::gain::{MAX_LEVEL_DB, MIN_LEVEL_DB};

/// Longest delay any tap can be set to, in milliseconds. The adapter sizes
/// the delay buffers for exactly this.
pub const MAX_DELAY_MS: f32 = 2000.0;

/// Highest feedback setting, in percent.
pub const MAX_FEEDBACK_PCT: f32 = 100.0;

/// A complete snapshot of the delay settings.
///
/// Snapshots are passed by value. The engine never sees half of one: they
/// travel from the control side to the audio thread through
/// [`LcrParameterHandle`](super::exchange::LcrParameterHandle) as a unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LcrParameters {
    /// Left tap delay, 0 to 2000 ms.
    pub left_delay_ms: f32,
    /// Right tap delay, 0 to 2000 ms.
    pub right_delay_ms: f32,
    /// Center tap delay, 0 to 2000 ms.
    pub center_delay_ms: f32,
    /// Shared feedback for all three taps, 0 to 100 %.
    pub feedback_pct: f32,
    /// Level of the delayed signal, -60 to +12 dB.
    pub wet_level_db: f32,
    /// Level of the unprocessed signal, -60 to +12 dB.
    pub dry_level_db: f32,
}

impl Default for LcrParameters {
    fn default() -> Self {
        Self {
            left_delay_ms: 250.0,
            right_delay_ms: 350.0,
            center_delay_ms: 450.0,
            feedback_pct: 30.0,
            wet_level_db: -3.0,
            dry_level_db: -3.0,
        }
    }
}

impl LcrParameters {
    /// Pull every field into its declared range.
    ///
    /// This is the caller-side clamp. The engine clamps again when it
    /// converts values, so an unclamped snapshot is still safe to apply.
    pub fn clamped(self) -> Self {
        Self {
            left_delay_ms: clamp_delay_ms(self.left_delay_ms),
            right_delay_ms: clamp_delay_ms(self.right_delay_ms),
            center_delay_ms: clamp_delay_ms(self.center_delay_ms),
            feedback_pct: self.feedback_pct.clamp(0.0, MAX_FEEDBACK_PCT),
            wet_level_db: self.wet_level_db.clamp(MIN_LEVEL_DB, MAX_LEVEL_DB),
            dry_level_db: self.dry_level_db.clamp(MIN_LEVEL_DB, MAX_LEVEL_DB),
        }
    }

    /// Feedback as a linear factor in `[0, 1]`. NaN becomes 0.
    pub fn feedback_gain(&self) -> f32 {
        let gain = self.feedback_pct / MAX_FEEDBACK_PCT;
        if gain.is_nan() {
            return 0.0;
        }
        gain.clamp(0.0, 1.0)
    }
}

/// Clamp a tap delay to `[0, MAX_DELAY_MS]`. NaN becomes 0.
pub fn clamp_delay_ms(delay_ms: f32) -> f32 {
    if delay_ms.is_nan() {
        return 0.0;
    }
    delay_ms.clamp(0.0, MAX_DELAY_MS)
}

/// Convert milliseconds to (fractional) samples: `ms * sample_rate / 1000`.
///
/// At 48 kHz, 250 ms is 12000 samples and 2000 ms is 96000.
pub const fn ms_to_samples(delay_ms: f32, sample_rate: f32) -> f32 {
    delay_ms * sample_rate / 1000.0
}
