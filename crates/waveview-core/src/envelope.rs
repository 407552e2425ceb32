//! Peak-envelope reduction
//!
//! Turns a large ordered sample range into a bounded number of (min, max)
//! buckets for display. Min/max per bucket is used rather than stride
//! decimation or averaging because short transients would otherwise alias
//! away: a one-sample peak must survive no matter how far the view is zoomed
//! out. The same reduction applies to any numeric sequence aligned to the
//! buffer's sample indexing, so an analysis algorithm's output can feed a
//! second synchronized view through the identical contract.
//!
//! Bucket boundaries use Bresenham-style integer division
//! (`start + i * len / count`): deterministic, full coverage with no gaps or
//! overlaps, buckets varying by at most one sample. A single linear pass,
//! O(range length); serving coarse views from precomputed tiers is the
//! resolution cache's job, not this layer's.

use crate::buffer::{BufferResult, SampleBuffer};
use crate::types::{Sample, TimeRange};

/// One bucket of a reduced envelope: the min/max observed over `range`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bucket {
    pub min: Sample,
    pub max: Sample,
    /// The sub-range of source samples this bucket collapses
    pub range: TimeRange,
}

/// A reduced, renderable view of a sample range
///
/// Immutable once produced. `buckets.len() <= target_width`; when the source
/// range is no longer than the width the samples pass through unreduced
/// (one bucket per sample, `min == max`).
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub buckets: Vec<Bucket>,
    /// The source range the envelope covers
    pub range: TimeRange,
    /// The bucket budget the envelope was produced for
    pub target_width: usize,
}

impl Envelope {
    /// An envelope covering nothing (empty buffer, empty viewport)
    pub fn empty(target_width: usize) -> Self {
        Self {
            buckets: Vec::new(),
            range: TimeRange::new(0, 0),
            target_width,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

/// Reduce a sample slice to at most `bucket_count` (min, max) buckets
///
/// `start_index` is the buffer index of `samples[0]`, carried through so the
/// emitted bucket ranges line up with the source indexing. Deterministic:
/// identical input always yields bit-identical output.
pub fn reduce_slice(samples: &[Sample], start_index: u64, bucket_count: usize) -> Envelope {
    assert!(bucket_count >= 1, "bucket count must be at least 1");

    let len = samples.len() as u64;
    let range = TimeRange::new(start_index, start_index + len);
    if len == 0 {
        return Envelope {
            buckets: Vec::new(),
            range,
            target_width: bucket_count,
        };
    }

    // Zoomed in past one sample per bucket: pass through unreduced
    if len <= bucket_count as u64 {
        let buckets = samples
            .iter()
            .enumerate()
            .map(|(i, &s)| Bucket {
                min: s,
                max: s,
                range: TimeRange::new(start_index + i as u64, start_index + i as u64 + 1),
            })
            .collect();
        return Envelope {
            buckets,
            range,
            target_width: bucket_count,
        };
    }

    let count = bucket_count as u64;
    let mut buckets = Vec::with_capacity(bucket_count);
    for i in 0..count {
        let lo = (i * len / count) as usize;
        let hi = ((i + 1) * len / count) as usize;

        let mut min = Sample::INFINITY;
        let mut max = Sample::NEG_INFINITY;
        for &s in &samples[lo..hi] {
            min = min.min(s);
            max = max.max(s);
        }

        buckets.push(Bucket {
            min,
            max,
            range: TimeRange::new(start_index + lo as u64, start_index + hi as u64),
        });
    }

    Envelope {
        buckets,
        range,
        target_width: bucket_count,
    }
}

/// Reduce `range` of `channel` straight out of a sample buffer
///
/// Fails with [`crate::BufferError::OutOfRange`] if the range exceeds the
/// buffer's current length; callers on the interactive path clamp first.
pub fn reduce(
    buffer: &SampleBuffer,
    channel: usize,
    range: TimeRange,
    bucket_count: usize,
) -> BufferResult<Envelope> {
    buffer.with_samples(channel, range, |samples| {
        reduce_slice(samples, range.start, bucket_count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sawtooth(len: usize) -> Vec<Sample> {
        (0..len).map(|i| (i % 100) as Sample / 100.0 - 0.5).collect()
    }

    #[test]
    fn test_bucket_ranges_cover_input_exactly() {
        let samples = sawtooth(10_007);
        let envelope = reduce_slice(&samples, 40, 128);

        assert_eq!(envelope.len(), 128);
        assert_eq!(envelope.buckets[0].range.start, 40);
        assert_eq!(envelope.buckets.last().unwrap().range.end, 40 + 10_007);
        // No gaps, no overlaps
        for pair in envelope.buckets.windows(2) {
            assert_eq!(pair[0].range.end, pair[1].range.start);
        }
        // Buckets vary by at most one sample
        let sizes: Vec<u64> = envelope.buckets.iter().map(|b| b.range.len()).collect();
        let min_size = *sizes.iter().min().unwrap();
        let max_size = *sizes.iter().max().unwrap();
        assert!(max_size - min_size <= 1);
    }

    #[test]
    fn test_peaks_are_preserved() {
        let mut samples = sawtooth(50_000);
        // Bury a one-sample transient that naive decimation would drop
        samples[31_337] = 0.97;
        samples[7_911] = -0.93;

        let envelope = reduce_slice(&samples, 0, 500);
        let max = envelope.buckets.iter().map(|b| b.max).fold(Sample::NEG_INFINITY, Sample::max);
        let min = envelope.buckets.iter().map(|b| b.min).fold(Sample::INFINITY, Sample::min);
        assert_eq!(max, 0.97);
        assert_eq!(min, -0.93);
    }

    #[test]
    fn test_passthrough_when_zoomed_past_one_sample_per_bucket() {
        let samples = sawtooth(500);
        let envelope = reduce_slice(&samples, 0, 1000);

        assert_eq!(envelope.len(), 500);
        for (i, bucket) in envelope.buckets.iter().enumerate() {
            assert_eq!(bucket.min, samples[i]);
            assert_eq!(bucket.max, samples[i]);
            assert_eq!(bucket.range.len(), 1);
        }
    }

    #[test]
    fn test_deterministic() {
        let samples = sawtooth(44_100);
        let a = reduce_slice(&samples, 100, 777);
        let b = reduce_slice(&samples, 100, 777);
        assert_eq!(a, b);
    }

    #[test]
    fn test_two_million_samples_thousand_buckets() {
        let samples = vec![0.1; 2_000_000];
        let envelope = reduce_slice(&samples, 0, 1000);

        assert_eq!(envelope.len(), 1000);
        assert_eq!(envelope.buckets[0].range, TimeRange::new(0, 2000));
        assert_eq!(
            envelope.buckets[999].range,
            TimeRange::new(1_998_000, 2_000_000)
        );
    }

    #[test]
    fn test_empty_input() {
        let envelope = reduce_slice(&[], 0, 64);
        assert!(envelope.is_empty());
        assert!(envelope.range.is_empty());
    }

    #[test]
    fn test_reduce_from_buffer() {
        let buffer = SampleBuffer::from_channels(vec![(0..1000).map(|i| i as Sample).collect()]);
        let envelope = reduce(&buffer, 0, TimeRange::new(200, 800), 10).unwrap();

        assert_eq!(envelope.len(), 10);
        assert_eq!(envelope.range, TimeRange::new(200, 800));
        // First bucket covers [200, 260): min 200, max 259
        assert_eq!(envelope.buckets[0].min, 200.0);
        assert_eq!(envelope.buckets[0].max, 259.0);
    }

    #[test]
    #[should_panic]
    fn test_zero_bucket_count_is_a_programming_error() {
        reduce_slice(&[0.0], 0, 0);
    }
}
