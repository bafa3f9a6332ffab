//! # Delay Line (Ring Buffer with Feedback)
//!
//! A delay line stores audio samples and plays them back after a set
//! amount of time. Each of the three taps in the LCR delay is one of these.
//!
//! ## How a Ring Buffer Works
//!
//! Picture a tape loop: a write head records incoming audio, and a read
//! head plays it back from a position further behind on the loop. The gap
//! between the two heads is the delay time.
//!
//! In code, the "tape" is a `Vec<f32>` and the write head is an index.
//! For every sample, [`DelayLine::process`] does, in this order:
//!
//! 1. **Read** the sample `delay_samples` behind the write head.
//! 2. **Write** `input + delayed * feedback` at the write head.
//! 3. **Advance** the write head by one, wrapping to 0 at the end.
//! 4. Return the sample read in step 1.
//!
//! The read must happen before the write. The feedback term is built from
//! the sample that was just read, so every tap recirculates on exactly the
//! same sample clock and the three taps stay phase-aligned.
//!
//! ```text
//!   input ──►(+)──► [ ring buffer ] ──┬──► delayed (returned)
//!             ▲                       │
//!             └──── × feedback ◄──────┘
//! ```
//!
//! ## Linear Interpolation
//!
//! Delay times in milliseconds rarely land on a whole number of samples
//! (250.01 ms at 44100 Hz is 11025.44 samples). The fractional part blends
//! the two stored samples either side of the read position:
//!
//! ```text
//! result = newer * (1 - frac) + older * frac
//! ```
//!
//! where `newer` sits `floor(delay)` samples back and `older` one further.
//! A delay of 0 samples reads the input that is about to be written.

use nih_plug::nih_debug_assert;

/// A single-channel circular delay buffer with a built-in feedback path.
///
/// Memory is only allocated by [`resize`](Self::resize), which the engine
/// calls while the audio stream is stopped. Everything else is
/// allocation-free and safe to call on the audio thread.
#[derive(Debug, Default)]
pub struct DelayLine {
    /// The stored samples. Starts out as silence.
    buffer: Vec<f32>,

    /// Where the next sample will be written. Always `< buffer.len()`
    /// once the buffer is non-empty.
    write_pos: usize,

    /// Current delay length, in (possibly fractional) samples.
    /// Kept within `[0, capacity - 1]`.
    delay_samples: f32,
}

impl DelayLine {
    /// Create a delay line that can hold `capacity` samples.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut line = Self::default();
        line.resize(capacity);
        line
    }

    /// Reallocate the buffer to hold `max_samples` samples of silence.
    ///
    /// The write position is rewound and any delay length that no longer
    /// fits is pulled back to `max_samples - 1`.
    pub fn resize(&mut self, max_samples: usize) {
        self.buffer.clear();
        self.buffer.resize(max_samples, 0.0);
        self.buffer.shrink_to_fit();
        self.write_pos = 0;
        self.delay_samples = self.delay_samples.min(self.max_delay_samples());
    }

    /// Fill the buffer with silence and rewind the write position.
    ///
    /// Used when the transport restarts so stale echoes from the last
    /// session don't bleed into the next one.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }

    /// Set the delay length in samples.
    ///
    /// Values outside `[0, capacity - 1]` are a caller bug; they are
    /// flagged in debug builds and clamped so the read never leaves the
    /// buffer. NaN becomes 0.
    pub fn set_delay_samples(&mut self, delay_samples: f32) {
        let max = self.max_delay_samples();
        nih_debug_assert!(
            (0.0..=max).contains(&delay_samples),
            "delay of {} samples outside [0, {}]",
            delay_samples,
            max
        );
        self.delay_samples = if delay_samples.is_nan() {
            0.0
        } else {
            delay_samples.clamp(0.0, max)
        };
    }

    pub fn delay_samples(&self) -> f32 {
        self.delay_samples
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Run one sample through the delay line and its feedback loop.
    ///
    /// Returns the delayed sample read *before* `input + delayed *
    /// feedback_gain` is written. See the module docs for the ordering.
    #[inline]
    pub fn process(&mut self, input: f32, feedback_gain: f32) -> f32 {
        nih_debug_assert!(
            !self.buffer.is_empty(),
            "DelayLine::process called before resize"
        );
        if self.buffer.is_empty() {
            return 0.0;
        }

        let delayed = self.read(input);

        self.buffer[self.write_pos] = input + delayed * feedback_gain;

        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }

        delayed
    }

    /// Interpolated read at the current delay length. `input` stands in for
    /// the slot zero samples back, which hasn't been written yet.
    #[inline]
    fn read(&self, input: f32) -> f32 {
        // `delay_samples` is never negative, so the cast floors.
        let whole = self.delay_samples as usize;
        let frac = self.delay_samples - whole as f32;

        let newer = if whole == 0 {
            input
        } else {
            self.buffer[self.index_behind(whole)]
        };
        if frac == 0.0 {
            return newer;
        }

        // whole <= capacity - 1, so whole + 1 never exceeds the capacity.
        let older = self.buffer[self.index_behind(whole + 1)];
        newer * (1.0 - frac) + older * frac
    }

    /// Index of the sample written `samples_back` steps ago, for
    /// `1 <= samples_back <= capacity`.
    ///
    /// Adding the length before subtracting keeps the `usize` math from
    /// underflowing: with `write_pos = 5`, `samples_back = 10` and a length
    /// of 100, `(5 + 100 - 10) % 100 = 95`.
    #[inline]
    fn index_behind(&self, samples_back: usize) -> usize {
        let len = self.buffer.len();
        (self.write_pos + len - samples_back) % len
    }

    /// Longest delay the buffer can represent: `capacity - 1`.
    pub fn max_delay_samples(&self) -> f32 {
        self.buffer.len().saturating_sub(1) as f32
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
