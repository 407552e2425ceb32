//! Decoded sample storage
//!
//! [`SampleBuffer`] owns the per-channel sample sequences for the loaded
//! file. The decode side is the single writer: it either fills the buffer in
//! one shot or streams frames in with [`SampleBuffer::append`] while the
//! display side is already reading. Reads of already-written regions stay
//! valid across appends, and a reader can never observe a torn sample: the
//! published length only advances after the samples behind it are fully
//! written, and slice access goes through a per-channel read lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use thiserror::Error;

use crate::types::{Sample, TimeRange};

/// Errors that can occur when reading from a sample buffer
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Requested range exceeds the currently available samples
    #[error("range [{start}, {end}) out of bounds, buffer has {len} samples")]
    OutOfRange { start: u64, end: u64, len: u64 },

    /// Requested channel does not exist
    #[error("no such channel {channel}, buffer has {channels} channels")]
    NoSuchChannel { channel: usize, channels: usize },
}

/// Result type for buffer reads
pub type BufferResult<T> = Result<T, BufferError>;

/// Per-channel decoded sample sequences with single-writer append semantics
///
/// Channel count is fixed for the buffer's lifetime; all channels grow in
/// lock step. The display side holds this behind an `Arc` and only ever
/// reads; [`SampleBuffer::clear`] gives the buffer a new identity
/// (generation bump) when a different file is loaded into it.
pub struct SampleBuffer {
    channels: Vec<RwLock<Vec<Sample>>>,
    len: AtomicU64,
    generation: AtomicU64,
}

impl SampleBuffer {
    /// Create an empty buffer with a fixed channel count
    pub fn new(num_channels: usize) -> Self {
        assert!(num_channels > 0, "buffer needs at least one channel");
        Self {
            channels: (0..num_channels).map(|_| RwLock::new(Vec::new())).collect(),
            len: AtomicU64::new(0),
            generation: AtomicU64::new(0),
        }
    }

    /// Create a buffer from complete per-channel sample data
    ///
    /// All channels must be the same length. This is the non-streaming load
    /// path: the buffer is fully populated before anyone reads it.
    pub fn from_channels(channels: Vec<Vec<Sample>>) -> Self {
        assert!(!channels.is_empty(), "buffer needs at least one channel");
        let len = channels[0].len() as u64;
        assert!(
            channels.iter().all(|c| c.len() as u64 == len),
            "channel lengths must match"
        );
        Self {
            channels: channels.into_iter().map(RwLock::new).collect(),
            len: AtomicU64::new(len),
            generation: AtomicU64::new(0),
        }
    }

    /// Number of channels (fixed at creation)
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Current sample count per channel
    ///
    /// Monotonically growing while a streaming decode is in progress.
    #[inline]
    pub fn len(&self) -> u64 {
        self.len.load(Ordering::Acquire)
    }

    /// Whether no samples have been decoded yet
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Buffer identity counter, bumped every time a new file replaces the
    /// contents. Caches key their captured state on `(generation, len)`.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Append one block of frames per channel (streaming decode)
    ///
    /// Single-writer: only the decode side calls this. `frames` must carry
    /// one slice per channel and all slices must have equal length. The
    /// published length advances only after every channel's samples are in
    /// place, so concurrent readers see either the old or the new length,
    /// never half-written data.
    pub fn append(&self, frames: &[&[Sample]]) {
        assert_eq!(
            frames.len(),
            self.channels.len(),
            "append must supply one slice per channel"
        );
        let block = frames[0].len();
        assert!(
            frames.iter().all(|f| f.len() == block),
            "per-channel block lengths must match"
        );
        if block == 0 {
            return;
        }

        for (channel, samples) in self.channels.iter().zip(frames) {
            let mut guard = channel.write().expect("sample buffer lock poisoned");
            guard.extend_from_slice(samples);
        }
        let new_len = self.len.load(Ordering::Relaxed) + block as u64;
        self.len.store(new_len, Ordering::Release);
        log::trace!("buffer append: +{} samples, now {}", block, new_len);
    }

    /// Drop all samples and take on a new identity (file unloaded/replaced)
    pub fn clear(&self) {
        self.len.store(0, Ordering::Release);
        for channel in &self.channels {
            channel.write().expect("sample buffer lock poisoned").clear();
        }
        self.generation.fetch_add(1, Ordering::AcqRel);
        log::debug!("buffer cleared, generation {}", self.generation());
    }

    /// Copy the samples of `range` out of `channel`
    pub fn read(&self, channel: usize, range: TimeRange) -> BufferResult<Vec<Sample>> {
        self.with_samples(channel, range, |samples| samples.to_vec())
    }

    /// Run `f` over the samples of `range` without copying
    ///
    /// Constant-time access to the backing slice; the per-channel read lock
    /// is held only for the duration of `f`.
    pub fn with_samples<R>(
        &self,
        channel: usize,
        range: TimeRange,
        f: impl FnOnce(&[Sample]) -> R,
    ) -> BufferResult<R> {
        let lock = self
            .channels
            .get(channel)
            .ok_or(BufferError::NoSuchChannel {
                channel,
                channels: self.channels.len(),
            })?;
        let guard = lock.read().expect("sample buffer lock poisoned");
        // A concurrent clear() can empty the channel between a len() read and
        // this lock acquisition; the guard's own length is the authority
        let len = guard.len() as u64;
        if range.end > len {
            return Err(BufferError::OutOfRange {
                start: range.start,
                end: range.end,
                len,
            });
        }
        Ok(f(&guard[range.start as usize..range.end as usize]))
    }
}

impl std::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("channels", &self.num_channels())
            .field("len", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}
