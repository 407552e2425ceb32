//! Precomputed resolution tiers
//!
//! Recomputing a full-track reduction on every interaction frame means
//! rescanning millions of samples for a view that only needs a few thousand
//! points. The cache precomputes the full-range envelope at a small number of
//! fixed bucket counts once per load; a zoomed-out request is then served by
//! merging the overlapping buckets of an adequate tier. At high zoom no tier
//! is fine enough and the caller falls back to reducing the exact range from
//! the sample buffer.
//!
//! Invalidation is all-or-nothing: a new file (buffer generation change) or
//! a streaming append past the captured length drops every tier.

use waveview_core::envelope::{reduce, Bucket, Envelope};
use waveview_core::{Sample, SampleBuffer, TimeRange};

/// How much finer than the requested bucket width a tier must be before it
/// may substitute for an exact reduction (at least this many tier buckets
/// merged per output bucket).
const FIDELITY_FACTOR: u64 = 4;

/// Full-range envelope tiers at fixed coarseness levels, per channel
pub struct ResolutionCache {
    tier_buckets: Vec<usize>,
    /// `tiers[channel][tier_idx]`, same order as `tier_buckets`; empty until
    /// populated
    tiers: Vec<Vec<Envelope>>,
    captured_generation: u64,
    captured_len: u64,
}

impl ResolutionCache {
    /// Create an empty cache with the given tier bucket counts
    pub fn new(tier_buckets: &[usize]) -> Self {
        let mut tier_buckets: Vec<usize> = tier_buckets.iter().copied().filter(|&b| b > 0).collect();
        tier_buckets.sort_unstable();
        tier_buckets.dedup();
        Self {
            tier_buckets,
            tiers: Vec::new(),
            captured_generation: 0,
            captured_len: 0,
        }
    }

    /// Compute the full-range envelope of every channel at every tier
    ///
    /// Called once per load, after decode completes (and again if the caller
    /// decides a grown streaming buffer is worth re-capturing). One linear
    /// pass per tier per channel.
    pub fn populate(&mut self, buffer: &SampleBuffer) {
        let len = buffer.len();
        self.tiers = (0..buffer.num_channels())
            .map(|channel| {
                self.tier_buckets
                    .iter()
                    .map(|&count| {
                        reduce(buffer, channel, TimeRange::full(len), count)
                            .expect("full range of the captured length is always readable")
                    })
                    .collect()
            })
            .collect();
        self.captured_generation = buffer.generation();
        self.captured_len = len;
        log::debug!(
            "resolution cache populated: {} channels x {:?} buckets over {} samples",
            self.tiers.len(),
            self.tier_buckets,
            len
        );
    }

    /// Whether the cached tiers still describe this buffer
    pub fn is_fresh(&self, buffer: &SampleBuffer) -> bool {
        !self.tiers.is_empty()
            && self.captured_generation == buffer.generation()
            && self.captured_len == buffer.len()
    }

    /// Drop all tiers
    pub fn invalidate(&mut self) {
        if !self.tiers.is_empty() {
            log::debug!("resolution cache invalidated");
        }
        self.tiers.clear();
        self.captured_len = 0;
    }

    /// Serve `range` at `width` buckets from a cached tier, if one is fine
    /// enough
    ///
    /// Picks the coarsest adequate tier (fewest buckets to merge) and
    /// re-buckets its overlapping entries into `width` output buckets.
    /// Returns `None` when unpopulated, when the request wants exact samples
    /// (range no longer than the width), or when even the finest tier is too
    /// coarse - the caller then reduces directly from the buffer.
    pub fn lookup(&self, channel: usize, range: TimeRange, width: usize) -> Option<Envelope> {
        assert!(width >= 1, "bucket count must be at least 1");
        let tier_envelopes = self.tiers.get(channel)?;
        let range = range.clamp_to(self.captured_len);
        if range.is_empty() || range.len() <= width as u64 {
            return None;
        }

        let requested_bucket_width = range.len() / width as u64;
        let (tier_count, tier) = self
            .tier_buckets
            .iter()
            .zip(tier_envelopes)
            .find(|(&count, _)| {
                // Tier bucket width must be at least FIDELITY_FACTOR times
                // finer than what the request resolves
                let tier_bucket_width = self.captured_len / count as u64;
                tier_bucket_width > 0 && tier_bucket_width * FIDELITY_FACTOR <= requested_bucket_width
            })
            .map(|(&count, tier)| (count as u64, tier))?;

        let mut buckets = Vec::with_capacity(width);
        let count = width as u64;
        for i in 0..count {
            let lo = range.start + i * range.len() / count;
            let hi = range.start + (i + 1) * range.len() / count;

            // Tier bucket j covers [j*len/T, (j+1)*len/T); merge every tier
            // bucket overlapping [lo, hi)
            let j_lo = (lo * tier_count / self.captured_len) as usize;
            let j_hi = (hi * tier_count).div_ceil(self.captured_len) as usize;
            let j_hi = j_hi.min(tier.buckets.len());

            let mut min = Sample::INFINITY;
            let mut max = Sample::NEG_INFINITY;
            for bucket in &tier.buckets[j_lo..j_hi] {
                min = min.min(bucket.min);
                max = max.max(bucket.max);
            }

            buckets.push(Bucket {
                min,
                max,
                range: TimeRange::new(lo, hi),
            });
        }

        log::trace!(
            "cache hit: [{}, {}) x {} served from {}-bucket tier",
            range.start,
            range.end,
            width,
            tier_count
        );
        Some(Envelope {
            buckets,
            range,
            target_width: width,
        })
    }
}
