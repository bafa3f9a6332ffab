//! # LCR Delay — An AU/VST3/CLAP Left/Center/Right Delay Plugin
//!
//! Three independently timed delay taps with a shared feedback amount,
//! built with [nih-plug](https://github.com/robbert-vdh/nih-plug). Outputs
//! Audio Unit (AUv2), VST3, and CLAP from a single codebase.
//!
//! ## Signal Flow
//!
//! ```text
//! in L ──┬──────────────────────────────────────────── × dry ──►(+)──► out L
//!        ├──► [left tap ⟲]  ───────────────────┐                ▲
//!        │                                     └─(+)─► × wet ───┘
//!        ├─(L+R)/2─► [center tap ⟲] ── × ½ ─────┤
//!        │                                     ┌─(+)─► × wet ───┐
//!        ├──► [right tap ⟲] ───────────────────┘                ▼
//! in R ──┴──────────────────────────────────────────── × dry ──►(+)──► out R
//!
//!   ⟲ = the tap's own feedback loop, scaled by the shared feedback amount
//! ```
//!
//! The DSP lives in [`dsp`] and has no knowledge of the host. This file is
//! the adapter: it sizes the engine when the host configures the stream,
//! forwards parameter changes as whole snapshots, and hands each block of
//! stereo audio to the engine.

pub mod dsp;
mod params;

use std::num::{NonZeroU32, NonZeroUsize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dsp::parameters::MAX_DELAY_MS;
use dsp::{LcrDelayEngine, LcrParameterHandle};
use nih_plug::prelude::*;
use params::PluginParams;

/// The main plugin struct.
///
/// Parameters (`PluginParams`) are shared with the host through an `Arc`
/// and can be touched from any thread. The engine is owned by the audio
/// thread and only used in `initialize()`, `reset()`, and `process()`.
struct LcrDelay {
    params: Arc<PluginParams>,

    /// Raised by every parameter's value-changed callback.
    params_changed: Arc<AtomicBool>,

    /// The current sample rate in Hz, set in `initialize()`.
    sample_rate: f32,

    engine: LcrDelayEngine,

    /// Queues parameter snapshots for `engine`.
    engine_params: LcrParameterHandle,
}

impl Default for LcrDelay {
    fn default() -> Self {
        let params_changed = Arc::new(AtomicBool::new(false));
        let params = Arc::new(PluginParams::new(params_changed.clone()));
        let (engine, engine_params) = LcrDelayEngine::new(params.snapshot());

        Self {
            params,
            params_changed,
            // Placeholder until initialize() reports the real rate.
            sample_rate: 44100.0,
            engine,
            engine_params,
        }
    }
}

impl LcrDelay {
    /// Queue the host's current parameter values if any of them changed
    /// since the last call, or retry a snapshot the queue had no room for.
    /// Never blocks.
    fn sync_parameters(&mut self) {
        if self.params_changed.swap(false, Ordering::AcqRel) {
            self.engine_params
                .set_lcr_parameters(self.params.snapshot());
        } else {
            self.engine_params.flush();
        }
    }
}

impl Plugin for LcrDelay {
    const NAME: &'static str = "LCR Delay";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Stereo in, stereo out. The center tap needs both inputs and writes
    // to both outputs, so there is no mono fallback.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[AudioIOLayout {
        main_input_channels: NonZeroU32::new(2),
        main_output_channels: NonZeroU32::new(2),
        aux_input_ports: &[],
        aux_output_ports: &[],
        names: PortNames::const_default(),
    }];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // Snapshots are picked up at block boundaries, not mid-block.
    const SAMPLE_ACCURATE_AUTOMATION: bool = false;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Size the three delay taps for the host's sample rate and push the
    /// current parameter values into the engine.
    ///
    /// Returning `false` tells the host this configuration can't be used.
    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        self.sample_rate = buffer_config.sample_rate;

        self.engine.reset(self.sample_rate);
        let capacity = self
            .engine
            .create_delay_buffers(self.sample_rate, MAX_DELAY_MS);

        // A zero-length ring buffer has nothing to read from.
        let Some(capacity) = NonZeroUsize::new(capacity) else {
            nih_error!(
                "Cannot size delay buffers for a sample rate of {} Hz",
                self.sample_rate
            );
            return false;
        };

        self.params_changed.store(false, Ordering::Release);
        self.engine.set_lcr_parameters(self.params.snapshot());

        nih_log!(
            "LCR Delay ready at {} Hz, {} samples per tap",
            self.sample_rate,
            capacity
        );

        true
    }

    /// Called when playback stops or the plugin is bypassed. Clears the
    /// taps so stale echoes don't play when the transport restarts.
    fn reset(&mut self) {
        self.engine.reset(self.sample_rate);
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        self.sync_parameters();

        let [left, right] = buffer.as_slice() else {
            nih_debug_assert_failure!("expected a stereo buffer");
            return ProcessStatus::Normal;
        };
        self.engine.process_block(left, right);

        // Keep the host calling process() after the input goes silent so
        // the echoes ring out.
        match self.engine.tail_samples() {
            Some(samples) => ProcessStatus::Tail(samples),
            None => ProcessStatus::KeepAlive,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// Plugin format trait implementations
// ─────────────────────────────────────────────────────────────────────

impl ClapPlugin for LcrDelay {
    const CLAP_ID: &'static str = "com.loveless-audio.lcr-delay";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Left, center, and right delay taps with shared feedback");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Delay,
    ];
}

impl Vst3Plugin for LcrDelay {
    // `*b"..."` turns the 16-character ASCII literal into a `[u8; 16]`.
    const VST3_CLASS_ID: [u8; 16] = *b"LvlssLCRDelay001";

    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Delay];
}

// ─────────────────────────────────────────────────────────────────────
// Export macros
// ─────────────────────────────────────────────────────────────────────
//
// nih_export_clap! exports the `clap_entry` symbol for CLAP hosts.
// nih_export_vst3! exports `GetPluginFactory` for VST3 hosts.
// clap_wrapper re-exports the CLAP entry point as AUv2 for Logic Pro.

nih_export_clap!(LcrDelay);
nih_export_vst3!(LcrDelay);

clap_wrapper::export_auv2!();
