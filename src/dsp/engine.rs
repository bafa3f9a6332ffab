//! # LCR Delay Engine
//!
//! Three delay lines ("taps") share one feedback amount and one wet/dry
//! mix. The left tap hears the left input, the right tap the right input,
//! and the center tap a mono sum of both. The center echo is split evenly
//! back into both outputs so it sits in the middle of the stereo image.
//!
//! ```text
//!  in L ──┬───────────────────────────────────────────── × dry ──►(+)──► out L
//!         ├──► [left tap]   ──────────────────┐                    ▲
//!         │                                   ├─► (+) ─► × wet ────┘
//!         └─┐                       ┌─ × 0.5 ─┘
//!          (+)× 0.5 ─► [center tap]─┤
//!         ┌─┘                       └─ × 0.5 ─┐
//!         ├──► [right tap]  ──────────────────┤
//!         │                                   └─► (+) ─► × wet ────┐
//!  in R ──┴───────────────────────────────────────────── × dry ──►(+)──► out R
//! ```
//!
//! Each tap's feedback loop lives inside its [`DelayLine`].
//!
//! ## Threads
//!
//! [`LcrDelayEngine`] itself belongs to the audio thread. Parameters arrive
//! through the [`LcrParameterHandle`] created alongside it, which may live
//! on another thread. At the start of every frame the engine drains the
//! parameter queue and applies only the newest snapshot, so each output
//! sample is computed from exactly one parameter set.
//!
//! [`create_delay_buffers`](LcrDelayEngine::create_delay_buffers) allocates
//! and must only run while the audio stream is stopped.

use nih_plug::{nih_debug_assert, nih_log};
use rtrb::Consumer;

use super::delay_line::DelayLine;
use super::exchange::{parameter_channel, LcrParameterHandle};
use super::gain::level_to_gain;
use super::parameters::{clamp_delay_ms, ms_to_samples, LcrParameters};

/// Gains derived from the applied [`LcrParameters`].
#[derive(Debug, Clone, Copy, PartialEq)]
struct MixGains {
    feedback: f32,
    wet: f32,
    dry: f32,
}

impl MixGains {
    fn from_parameters(params: &LcrParameters) -> Self {
        Self {
            feedback: params.feedback_gain(),
            wet: level_to_gain(params.wet_level_db),
            dry: level_to_gain(params.dry_level_db),
        }
    }
}

/// The left/center/right delay, one stereo frame at a time.
#[derive(Debug)]
pub struct LcrDelayEngine {
    /// The current sample rate in Hz. Drives the ms → samples conversion.
    sample_rate: f32,

    left: DelayLine,
    center: DelayLine,
    right: DelayLine,

    /// Snapshots sent through the engine's [`LcrParameterHandle`].
    queue: Consumer<LcrParameters>,

    /// The most recently applied snapshot.
    parameters: LcrParameters,

    /// `None` until `parameters` has been derived at the current sample
    /// rate and buffer size.
    gains: Option<MixGains>,
}

impl LcrDelayEngine {
    /// Create an engine starting from `initial`, and the handle that feeds
    /// it new parameters.
    ///
    /// The delay lines start out empty. Call
    /// [`reset`](Self::reset) and [`create_delay_buffers`](Self::create_delay_buffers)
    /// before processing audio.
    pub fn new(initial: LcrParameters) -> (Self, LcrParameterHandle) {
        let (handle, queue) = parameter_channel(initial);
        let engine = Self {
            // Placeholder until reset() tells us the real rate.
            sample_rate: 44100.0,
            left: DelayLine::default(),
            center: DelayLine::default(),
            right: DelayLine::default(),
            queue,
            parameters: initial,
            gains: None,
        };
        (engine, handle)
    }

    /// Store the sample rate, silence all three taps, and drop the derived
    /// delay lengths and gains. They are re-derived from the current
    /// parameters at the start of the next frame.
    pub fn reset(&mut self, sample_rate: f32) {
        nih_debug_assert!(sample_rate > 0.0, "invalid sample rate {}", sample_rate);
        self.sample_rate = sample_rate;

        self.left.clear();
        self.center.clear();
        self.right.clear();

        self.gains = None;
    }

    /// Size each tap to hold `max_delay_ms` at `sample_rate`, i.e.
    /// `ceil(sample_rate * max_delay_ms / 1000)` samples, and return that
    /// capacity.
    ///
    /// This allocates. Only call it while no audio is being processed.
    pub fn create_delay_buffers(&mut self, sample_rate: f32, max_delay_ms: f32) -> usize {
        self.sample_rate = sample_rate;

        // f64 so that e.g. 48000 * 2000 / 1000 can't round up to 96001.
        let capacity = (f64::from(sample_rate) * f64::from(max_delay_ms) / 1000.0).ceil();
        // `as` saturates: negative or NaN sizes become 0.
        let capacity = capacity as usize;

        self.left.resize(capacity);
        self.center.resize(capacity);
        self.right.resize(capacity);

        nih_log!(
            "Allocated 3 delay taps of {} samples ({} ms at {} Hz)",
            capacity,
            max_delay_ms,
            sample_rate
        );

        self.gains = None;
        capacity
    }

    /// Apply `params` right away, on the thread that owns the engine.
    ///
    /// Snapshots still waiting in the queue are older than this one and are
    /// discarded. From other threads, use the [`LcrParameterHandle`].
    pub fn set_lcr_parameters(&mut self, params: LcrParameters) {
        while self.queue.pop().is_ok() {}
        self.apply(params);
    }

    /// The most recently applied parameters.
    pub fn parameters(&self) -> LcrParameters {
        self.parameters
    }

    /// Current delay of the left, center, and right taps, in samples.
    pub fn tap_delay_samples(&self) -> [f32; 3] {
        [
            self.left.delay_samples(),
            self.center.delay_samples(),
            self.right.delay_samples(),
        ]
    }

    /// Process one stereo frame.
    ///
    /// Non-finite input is not filtered. It will circulate in the feedback
    /// loop until it is overwritten or the engine is reset.
    #[inline]
    pub fn process_audio_frame(&mut self, inputs: &[f32; 2], outputs: &mut [f32; 2]) {
        let gains = self.pull_parameters();

        let [in_l, in_r] = *inputs;
        let mono = (in_l + in_r) * 0.5;

        let left = self.left.process(in_l, gains.feedback);
        let center = self.center.process(mono, gains.feedback);
        let right = self.right.process(in_r, gains.feedback);

        let center_half = center * 0.5;
        outputs[0] = (left + center_half) * gains.wet + in_l * gains.dry;
        outputs[1] = (right + center_half) * gains.wet + in_r * gains.dry;
    }

    /// Run [`process_audio_frame`](Self::process_audio_frame) over two
    /// channel buffers in place.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        nih_debug_assert!(
            left.len() == right.len(),
            "channel lengths differ: {} vs {}",
            left.len(),
            right.len()
        );

        let mut frame = [0.0; 2];
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            self.process_audio_frame(&[*l, *r], &mut frame);
            *l = frame[0];
            *r = frame[1];
        }
    }

    /// How many samples of output remain audible after the input stops.
    ///
    /// Counts the repeats needed for the feedback loop to decay to -60 dB,
    /// `feedback^n = 0.001`, times the longest tap. `None` means the tail
    /// never ends (100 % feedback).
    pub fn tail_samples(&self) -> Option<u32> {
        let feedback = self
            .gains
            .unwrap_or_else(|| MixGains::from_parameters(&self.parameters))
            .feedback;

        let longest = self
            .tap_delay_samples()
            .into_iter()
            .fold(0.0_f32, f32::max);

        if feedback >= 1.0 {
            None
        } else if feedback > 0.001 {
            // log10(0.001) = -3
            let repeats = -3.0 / feedback.log10();
            Some((repeats * longest).ceil() as u32)
        } else {
            // No feedback: one echo per tap.
            Some(longest.ceil() as u32)
        }
    }

    /// Apply the newest queued snapshot, or re-derive the current one if
    /// `reset`/`create_delay_buffers` dropped it. Wait-free.
    #[inline]
    fn pull_parameters(&mut self) -> MixGains {
        let mut newest = None;
        while let Ok(params) = self.queue.pop() {
            newest = Some(params);
        }

        match (newest, self.gains) {
            (Some(params), _) => self.apply(params),
            (None, Some(gains)) => gains,
            (None, None) => self.apply(self.parameters),
        }
    }

    /// Derive tap lengths and gains from `params`. Every value is clamped
    /// here, at conversion time.
    fn apply(&mut self, params: LcrParameters) -> MixGains {
        let sample_rate = self.sample_rate;
        let tap_samples = |line: &DelayLine, delay_ms: f32| {
            ms_to_samples(clamp_delay_ms(delay_ms), sample_rate)
                .clamp(0.0, line.max_delay_samples())
        };

        let left = tap_samples(&self.left, params.left_delay_ms);
        let center = tap_samples(&self.center, params.center_delay_ms);
        let right = tap_samples(&self.right, params.right_delay_ms);
        self.left.set_delay_samples(left);
        self.center.set_delay_samples(center);
        self.right.set_delay_samples(right);

        let gains = MixGains::from_parameters(&params);
        self.gains = Some(gains);
        self.parameters = params;
        gains
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::dsp::parameters::MAX_DELAY_MS;

    /// An engine ready to run, as the plugin prepares it.
    fn prepared(sample_rate: f32, params: LcrParameters) -> LcrDelayEngine {
        let (mut engine, _handle) = LcrDelayEngine::new(params);
        engine.reset(sample_rate);
        engine.create_delay_buffers(sample_rate, MAX_DELAY_MS);
        engine.set_lcr_parameters(params);
        engine
    }

    /// Feed `first` then silence, collecting `len` output frames.
    fn run_impulse(engine: &mut LcrDelayEngine, first: [f32; 2], len: usize) -> Vec<[f32; 2]> {
        let mut out = Vec::with_capacity(len);
        let mut frame = [0.0; 2];
        for n in 0..len {
            let input = if n == 0 { first } else { [0.0; 2] };
            engine.process_audio_frame(&input, &mut frame);
            out.push(frame);
        }
        out
    }

    fn first_nonzero(out: &[[f32; 2]], channel: usize, from: usize) -> Option<usize> {
        (from..out.len()).find(|&n| out[n][channel] != 0.0)
    }

    /// 48 kHz, taps at 250/350/450 ms, no feedback, unity wet, -60 dB dry.
    #[test]
    fn test_impulse_reaches_each_tap_on_time() {
        let params = LcrParameters {
            left_delay_ms: 250.0,
            right_delay_ms: 350.0,
            center_delay_ms: 450.0,
            feedback_pct: 0.0,
            wet_level_db: 0.0,
            dry_level_db: -60.0,
        };
        let mut engine = prepared(48000.0, params);
        assert_eq!(engine.tap_delay_samples(), [12000.0, 21600.0, 16800.0]);

        let out = run_impulse(&mut engine, [1.0, 1.0], 22000);

        // Sample 0 is only the dry leak.
        let dry = level_to_gain(-60.0);
        assert!((out[0][0] - dry).abs() < 1e-7);
        assert!((out[0][1] - dry).abs() < 1e-7);

        // Left tap: left channel only.
        assert_eq!(first_nonzero(&out, 0, 1), Some(12000));
        assert!((out[12000][0] - 1.0).abs() < 1e-6);
        assert_eq!(out[12000][1], 0.0);

        // Right tap: right channel only.
        assert_eq!(first_nonzero(&out, 1, 1), Some(16800));
        assert!((out[16800][1] - 1.0).abs() < 1e-6);
        assert_eq!(out[16800][0], 0.0);

        // Center tap: half gain in both channels.
        assert_eq!(first_nonzero(&out, 0, 12001), Some(21600));
        assert_eq!(first_nonzero(&out, 1, 16801), Some(21600));
        assert!((out[21600][0] - 0.5).abs() < 1e-6);
        assert!((out[21600][1] - 0.5).abs() < 1e-6);
    }

    /// The center tap hears the mono sum, so a left-only impulse shows up
    /// at a quarter level on both sides.
    #[test]
    fn test_center_tap_hears_mono_sum() {
        let params = LcrParameters {
            left_delay_ms: 5.0,
            right_delay_ms: 6.0,
            center_delay_ms: 10.0,
            feedback_pct: 0.0,
            wet_level_db: 0.0,
            dry_level_db: -60.0,
        };
        let mut engine = prepared(1000.0, params);

        let out = run_impulse(&mut engine, [1.0, 0.0], 20);

        assert!((out[5][0] - 1.0).abs() < 1e-6);
        assert_eq!(out[6], [0.0, 0.0]);
        assert!((out[10][0] - 0.25).abs() < 1e-6);
        assert!((out[10][1] - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_feedback_repeats_through_engine() {
        let params = LcrParameters {
            left_delay_ms: 10.0,
            right_delay_ms: 700.0,
            center_delay_ms: 900.0,
            feedback_pct: 50.0,
            wet_level_db: 0.0,
            dry_level_db: -60.0,
        };
        let mut engine = prepared(1000.0, params);

        let out = run_impulse(&mut engine, [1.0, 0.0], 41);

        assert!((out[10][0] - 1.0).abs() < 1e-6);
        assert!((out[20][0] - 0.5).abs() < 1e-6);
        assert!((out[30][0] - 0.25).abs() < 1e-6);
        assert!((out[40][0] - 0.125).abs() < 1e-6);
    }

    /// With the wet gain at zero, the output is exactly the dry-scaled
    /// input, whatever the taps and feedback are doing.
    #[test]
    fn test_zero_wet_is_dry_only() {
        let params = LcrParameters {
            left_delay_ms: 1.0,
            right_delay_ms: 2.0,
            center_delay_ms: 3.0,
            feedback_pct: 90.0,
            wet_level_db: 0.0,
            dry_level_db: -6.0,
        };
        let mut engine = prepared(1000.0, params);
        engine.gains = Some(MixGains {
            wet: 0.0,
            ..engine.gains.unwrap()
        });
        let dry = level_to_gain(-6.0);

        let mut frame = [0.0; 2];
        for n in 0..500 {
            let input = [(n as f32 * 0.3).sin(), (n as f32 * 0.17).cos()];
            engine.process_audio_frame(&input, &mut frame);
            assert_eq!(frame[0], input[0] * dry, "left, sample {n}");
            assert_eq!(frame[1], input[1] * dry, "right, sample {n}");
        }
    }

    #[test]
    fn test_reset_then_silence_is_silent() {
        let params = LcrParameters {
            feedback_pct: 90.0,
            ..LcrParameters::default()
        };
        let mut engine = prepared(8000.0, params);

        let mut frame = [0.0; 2];
        for n in 0..20_000 {
            let x = (n as f32 * 0.05).sin();
            engine.process_audio_frame(&[x, -x], &mut frame);
        }

        engine.reset(8000.0);

        // Longer than the 2 s buffer.
        for n in 0..17_000 {
            engine.process_audio_frame(&[0.0, 0.0], &mut frame);
            assert_eq!(frame, [0.0, 0.0], "sample {n}");
        }
        assert_eq!(engine.parameters(), params);
    }

    #[test]
    fn test_delay_clamped_to_buffer_capacity() {
        let (mut engine, _handle) = LcrDelayEngine::new(LcrParameters::default());
        engine.reset(48000.0);
        assert_eq!(engine.create_delay_buffers(48000.0, 100.0), 4800);

        engine.set_lcr_parameters(LcrParameters {
            left_delay_ms: 2000.0,
            right_delay_ms: 50.0,
            center_delay_ms: 100.0,
            ..LcrParameters::default()
        });

        assert_eq!(engine.tap_delay_samples(), [4799.0, 4799.0, 2400.0]);
    }

    #[test]
    fn test_out_of_range_snapshot_is_clamped_on_conversion() {
        let mut engine = prepared(1000.0, LcrParameters::default());
        engine.set_lcr_parameters(LcrParameters {
            left_delay_ms: -50.0,
            right_delay_ms: 1e9,
            center_delay_ms: 20.0,
            feedback_pct: 400.0,
            wet_level_db: 99.0,
            dry_level_db: -99.0,
        });

        assert_eq!(engine.tap_delay_samples(), [0.0, 20.0, 1999.0]);
        let gains = engine.gains.unwrap();
        assert_eq!(gains.feedback, 1.0);
        assert_eq!(gains.wet, level_to_gain(12.0));
        assert_eq!(gains.dry, level_to_gain(-60.0));
    }

    #[test]
    fn test_buffers_at_new_sample_rate_rederive_taps() {
        let mut engine = prepared(48000.0, LcrParameters::default());
        assert_eq!(engine.tap_delay_samples()[0], 12000.0);

        engine.reset(96000.0);
        engine.create_delay_buffers(96000.0, MAX_DELAY_MS);
        let mut frame = [0.0; 2];
        engine.process_audio_frame(&[0.0, 0.0], &mut frame);

        assert_eq!(engine.tap_delay_samples(), [24000.0, 43200.0, 33600.0]);
    }

    /// Parameters sent from another thread land at the next frame.
    #[test]
    fn test_handle_updates_from_another_thread() {
        let (mut engine, mut handle) = LcrDelayEngine::new(LcrParameters::default());
        engine.reset(1000.0);
        engine.create_delay_buffers(1000.0, MAX_DELAY_MS);
        let update = LcrParameters {
            left_delay_ms: 100.0,
            feedback_pct: 10.0,
            ..LcrParameters::default()
        };

        let sent = thread::spawn(move || handle.set_lcr_parameters(update))
            .join()
            .unwrap();
        assert!(sent);
        assert_ne!(engine.parameters(), update);

        let mut frame = [0.0; 2];
        engine.process_audio_frame(&[0.0, 0.0], &mut frame);

        assert_eq!(engine.parameters(), update);
        assert_eq!(engine.tap_delay_samples()[0], 100.0);
    }

    /// Several snapshots queued within one block: only the newest applies.
    #[test]
    fn test_newest_queued_snapshot_wins() {
        let (mut engine, mut handle) = LcrDelayEngine::new(LcrParameters::default());
        engine.reset(1000.0);
        engine.create_delay_buffers(1000.0, MAX_DELAY_MS);

        for ms in [10.0, 20.0, 30.0] {
            handle.set_lcr_parameters(LcrParameters {
                left_delay_ms: ms,
                ..LcrParameters::default()
            });
        }

        let mut frame = [0.0; 2];
        engine.process_audio_frame(&[0.0, 0.0], &mut frame);
        assert_eq!(engine.tap_delay_samples()[0], 30.0);
    }

    /// A direct update on the audio side supersedes anything still queued.
    #[test]
    fn test_direct_update_discards_stale_queue() {
        let (mut engine, mut handle) = LcrDelayEngine::new(LcrParameters::default());
        engine.reset(1000.0);
        engine.create_delay_buffers(1000.0, MAX_DELAY_MS);

        handle.set_lcr_parameters(LcrParameters {
            left_delay_ms: 10.0,
            ..LcrParameters::default()
        });
        let direct = LcrParameters {
            left_delay_ms: 40.0,
            ..LcrParameters::default()
        };
        engine.set_lcr_parameters(direct);

        let mut frame = [0.0; 2];
        engine.process_audio_frame(&[0.0, 0.0], &mut frame);
        assert_eq!(engine.parameters(), direct);
    }

    /// A writer thread streams snapshots while this thread processes audio.
    /// Every frame sees one whole snapshot and the last one always lands.
    #[test]
    fn test_concurrent_updates_apply_whole_snapshots() {
        const UPDATES: u32 = 5000;
        let uniform = |v: f32| LcrParameters {
            left_delay_ms: v,
            right_delay_ms: v,
            center_delay_ms: v,
            feedback_pct: v,
            wet_level_db: v,
            dry_level_db: v,
        };

        let (mut engine, mut handle) = LcrDelayEngine::new(uniform(0.0));
        engine.reset(1000.0);
        engine.create_delay_buffers(1000.0, MAX_DELAY_MS);

        let writer = thread::spawn(move || {
            for i in 1..=UPDATES {
                handle.set_lcr_parameters(uniform((i % 50) as f32));
                while !handle.flush() {
                    thread::yield_now();
                }
            }
            handle.set_lcr_parameters(uniform(99.0));
            while !handle.flush() {
                thread::yield_now();
            }
        });

        let mut frame = [0.0; 2];
        let mut landed = false;
        for _ in 0..50_000_000 {
            engine.process_audio_frame(&[0.1, -0.1], &mut frame);
            let p = engine.parameters();
            assert!(
                [p.right_delay_ms, p.center_delay_ms, p.feedback_pct, p.wet_level_db, p.dry_level_db]
                    .iter()
                    .all(|&v| v == p.left_delay_ms),
                "mixed snapshot {p:?}"
            );
            if p == uniform(99.0) {
                landed = true;
                break;
            }
        }

        writer.join().unwrap();
        assert!(landed, "final snapshot never applied");
    }

    /// After a reset the very first frame already carries the dry signal.
    #[test]
    fn test_reset_keeps_dry_path() {
        let params = LcrParameters {
            dry_level_db: 0.0,
            ..LcrParameters::default()
        };
        let mut engine = prepared(1000.0, params);

        engine.reset(1000.0);
        let mut frame = [0.0; 2];
        engine.process_audio_frame(&[0.25, -0.5], &mut frame);
        assert_eq!(frame, [0.25, -0.5]);

        engine.create_delay_buffers(1000.0, MAX_DELAY_MS);
        engine.process_audio_frame(&[0.25, -0.5], &mut frame);
        assert_eq!(frame, [0.25, -0.5]);
        assert_eq!(engine.parameters(), params);
    }

    #[test]
    fn test_process_block_matches_frames() {
        let params = LcrParameters {
            feedback_pct: 40.0,
            ..LcrParameters::default()
        };
        let mut by_block = prepared(1000.0, params);
        let mut by_frame = prepared(1000.0, params);

        let mut left: Vec<f32> = (0..1000).map(|n| (n as f32 * 0.1).sin()).collect();
        let mut right: Vec<f32> = (0..1000).map(|n| (n as f32 * 0.07).cos()).collect();
        let expected: Vec<[f32; 2]> = left
            .iter()
            .zip(&right)
            .map(|(&l, &r)| {
                let mut frame = [0.0; 2];
                by_frame.process_audio_frame(&[l, r], &mut frame);
                frame
            })
            .collect();

        by_block.process_block(&mut left, &mut right);

        for (n, frame) in expected.iter().enumerate() {
            assert_eq!([left[n], right[n]], *frame, "sample {n}");
        }
    }

    #[test]
    fn test_tail_length() {
        let mut engine = prepared(
            1000.0,
            LcrParameters {
                left_delay_ms: 100.0,
                right_delay_ms: 300.0,
                center_delay_ms: 200.0,
                feedback_pct: 0.0,
                ..LcrParameters::default()
            },
        );
        assert_eq!(engine.tail_samples(), Some(300));

        engine.set_lcr_parameters(LcrParameters {
            feedback_pct: 50.0,
            ..engine.parameters()
        });
        // -3 / log10(0.5) ≈ 9.966 repeats of 300 samples.
        let tail = engine.tail_samples().unwrap();
        assert!((2989..=2991).contains(&tail), "got {tail}");

        engine.set_lcr_parameters(LcrParameters {
            feedback_pct: 100.0,
            ..engine.parameters()
        });
        assert_eq!(engine.tail_samples(), None);
    }

    #[test]
    fn test_independent_instances() {
        let mut a = prepared(1000.0, LcrParameters::default());
        let b = prepared(1000.0, LcrParameters::default());

        a.set_lcr_parameters(LcrParameters {
            feedback_pct: 0.0,
            ..LcrParameters::default()
        });

        assert_eq!(b.parameters(), LcrParameters::default());
        assert_ne!(a.parameters(), b.parameters());
    }

    #[test]
    fn test_unprepared_engine_passes_only_dry() {
        let (mut engine, _handle) = LcrDelayEngine::new(LcrParameters::default());
        let mut frame = [1.0; 2];
        engine.process_audio_frame(&[0.5, 0.5], &mut frame);

        // No buffers yet: the taps stay silent, only the dry path remains.
        let dry = level_to_gain(LcrParameters::default().dry_level_db);
        assert!((frame[0] - 0.5 * dry).abs() < 1e-6);
        assert!((frame[1] - 0.5 * dry).abs() < 1e-6);
    }
}
