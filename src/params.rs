//! # Plugin Parameters
//!
//! The six knobs the DAW shows. Each has a stable string ID (`#[id = "..."]`)
//! that hosts use to save and recall presets, so never change a published
//! ID.
//!
//! Every parameter carries a value-changed callback that raises a shared
//! flag. The plugin checks that flag at the top of each block and, if it is
//! set, publishes one complete [`LcrParameters`] snapshot to the engine.
//! The engine therefore never sees the six values one at a time.
//!
//! There is no smoothing: a snapshot applies from the next frame on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nih_plug::prelude::*;

use crate::dsp::gain::{MAX_LEVEL_DB, MIN_LEVEL_DB};
use crate::dsp::parameters::{LcrParameters, MAX_DELAY_MS, MAX_FEEDBACK_PCT};

/// All user-facing parameters for the LCR Delay plugin.
#[derive(Params)]
pub struct PluginParams {
    /// **Left Time** — delay of the left tap, which hears the left input
    /// and plays back on the left output. 0 to 2000 ms.
    #[id = "left"]
    pub left_delay: FloatParam,

    /// **Right Time** — delay of the right tap. 0 to 2000 ms.
    #[id = "right"]
    pub right_delay: FloatParam,

    /// **Center Time** — delay of the center tap, which hears `(L + R) / 2`
    /// and plays back at half level on both outputs. 0 to 2000 ms.
    #[id = "center"]
    pub center_delay: FloatParam,

    /// **Feedback** — how much of each tap's output re-enters that tap.
    ///
    /// - 0% = one echo per tap
    /// - 30% = a few fading repeats (the default)
    /// - 100% = repeats that never decay
    #[id = "fdbk"]
    pub feedback: FloatParam,

    /// **Wet Level** — level of the three taps combined. -60 to +12 dB.
    #[id = "wet"]
    pub wet_level: FloatParam,

    /// **Dry Level** — level of the unprocessed input. -60 to +12 dB.
    #[id = "dry"]
    pub dry_level: FloatParam,
}

impl PluginParams {
    /// Build the parameter set. `changed` is raised whenever any parameter
    /// moves.
    pub fn new(changed: Arc<AtomicBool>) -> Self {
        let defaults = LcrParameters::default();
        let notify = move || -> Arc<dyn Fn(f32) + Send + Sync> {
            let changed = changed.clone();
            Arc::new(move |_| changed.store(true, Ordering::Release))
        };

        Self {
            left_delay: delay_param("Left Time", defaults.left_delay_ms)
                .with_callback(notify()),
            right_delay: delay_param("Right Time", defaults.right_delay_ms)
                .with_callback(notify()),
            center_delay: delay_param("Center Time", defaults.center_delay_ms)
                .with_callback(notify()),

            feedback: FloatParam::new(
                "Feedback",
                defaults.feedback_pct,
                FloatRange::Linear {
                    min: 0.0,
                    max: MAX_FEEDBACK_PCT,
                },
            )
            .with_unit(" %")
            .with_step_size(1.0)
            .with_callback(notify()),

            wet_level: level_param("Wet Level", defaults.wet_level_db).with_callback(notify()),
            dry_level: level_param("Dry Level", defaults.dry_level_db).with_callback(notify()),
        }
    }

    /// The current values as one snapshot, clamped to their declared
    /// ranges.
    pub fn snapshot(&self) -> LcrParameters {
        LcrParameters {
            left_delay_ms: self.left_delay.value(),
            right_delay_ms: self.right_delay.value(),
            center_delay_ms: self.center_delay.value(),
            feedback_pct: self.feedback.value(),
            wet_level_db: self.wet_level.value(),
            dry_level_db: self.dry_level.value(),
        }
        .clamped()
    }
}

fn delay_param(name: &str, default_ms: f32) -> FloatParam {
    FloatParam::new(
        name,
        default_ms,
        FloatRange::Linear {
            min: 0.0,
            max: MAX_DELAY_MS,
        },
    )
    .with_unit(" ms")
    .with_step_size(1.0)
}

fn level_param(name: &str, default_db: f32) -> FloatParam {
    FloatParam::new(
        name,
        default_db,
        FloatRange::Linear {
            min: MIN_LEVEL_DB,
            max: MAX_LEVEL_DB,
        },
    )
    .with_unit(" dB")
    .with_step_size(1.0)
}
