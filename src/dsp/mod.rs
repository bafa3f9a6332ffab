//! # DSP (Digital Signal Processing) Core
//!
//! Everything that runs per sample, independent of any plugin host:
//!
//! - **`gain`**: decibel → linear amplitude conversion for the wet and dry
//!   levels.
//!
//! - **`delay_line`**: a ring buffer with fractional reads and a built-in
//!   feedback path. One per tap.
//!
//! - **`parameters`**: the six user settings as one plain `Copy` value.
//!
//! - **`exchange`**: a wait-free queue carrying parameter snapshots from
//!   the control side to the audio thread.
//!
//! - **`engine`**: the three taps, their routing, and the wet/dry mix.

pub mod delay_line;
pub mod engine;
pub mod exchange;
pub mod gain;
pub mod parameters;

pub use engine::LcrDelayEngine;
pub use exchange::LcrParameterHandle;
pub use parameters::LcrParameters;
