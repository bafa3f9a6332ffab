//! # Parameter Queue
//!
//! Parameter changes come from the host's control side while the audio
//! thread is busy running samples. The audio thread can't take a lock (a
//! lower-priority thread might be holding it), and it can't allocate. Yet
//! it must never see a snapshot where, say, the left delay is new but the
//! feedback is still old.
//!
//! Whole [`LcrParameters`] snapshots travel through a bounded
//! single-producer/single-consumer ring buffer (`rtrb`):
//!
//! ```text
//! control side                          audio thread
//! ────────────                          ────────────
//! LcrParameterHandle ── push ──► [ring] ── pop (drain) ──► LcrDelayEngine
//!                                                          applies the newest
//! ```
//!
//! Both ends are wait-free. A snapshot is copied into the ring as one value,
//! so the engine only ever pops complete snapshots. When the ring is full
//! (the audio thread isn't running), the handle keeps the newest snapshot
//! back and retries on the next [`flush`](LcrParameterHandle::flush).

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use super::parameters::LcrParameters;

/// Snapshots that can be in flight before the handle starts holding back.
///
/// The engine drains the ring every frame, so in practice it holds at most
/// the changes made during one audio block.
pub const PARAMETER_QUEUE_CAPACITY: usize = 16;

/// Create a connected handle/consumer pair. `initial` is what the handle
/// reports until the first snapshot is sent.
pub(crate) fn parameter_channel(
    initial: LcrParameters,
) -> (LcrParameterHandle, Consumer<LcrParameters>) {
    let (producer, consumer) = RingBuffer::new(PARAMETER_QUEUE_CAPACITY);
    let handle = LcrParameterHandle {
        producer,
        latest: initial,
        pending: false,
    };
    (handle, consumer)
}

/// The control side's end of the parameter queue.
///
/// `Send`, so it can move to whichever thread reacts to host parameter
/// changes. There is exactly one per engine.
#[derive(Debug)]
pub struct LcrParameterHandle {
    producer: Producer<LcrParameters>,
    /// The most recent snapshot handed to `set_lcr_parameters`.
    latest: LcrParameters,
    /// `latest` has not made it into the ring yet.
    pending: bool,
}

impl LcrParameterHandle {
    /// Send a complete set of parameters to the engine.
    ///
    /// Returns `false` if the ring was full. The snapshot is then kept and
    /// sent by a later [`flush`](Self::flush) or `set_lcr_parameters`,
    /// replacing any older snapshot that was also held back.
    pub fn set_lcr_parameters(&mut self, params: LcrParameters) -> bool {
        self.latest = params;
        self.pending = true;
        self.flush()
    }

    /// Retry a held-back snapshot. Returns `true` once nothing is pending.
    pub fn flush(&mut self) -> bool {
        if !self.pending {
            return true;
        }

        match self.producer.push(self.latest) {
            Ok(()) => {
                self.pending = false;
                true
            }
            Err(PushError::Full(_)) => false,
        }
    }

    /// The most recent snapshot passed to this handle.
    pub fn lcr_parameters(&self) -> LcrParameters {
        self.latest
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }
}
