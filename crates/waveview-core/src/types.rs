//! Common types for Waveview
//!
//! Fundamental types shared by the sample buffer, the envelope reducer and
//! the display crates: the sample alias and the half-open sample-index range
//! used everywhere a viewport or bucket is described.

/// Audio sample type (32-bit float, amplitudes roughly in [-1, 1])
pub type Sample = f32;

/// A half-open range of sample indices `[start, end)`
///
/// Invariant: `start <= end`. Ranges are always expressed in the sample
/// indexing of the buffer they refer to, and are clampable to the buffer's
/// current length, so a range is never an error by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    /// First sample index covered by the range
    pub start: u64,
    /// One past the last sample index covered by the range
    pub end: u64,
}

impl TimeRange {
    /// Create a new range (panics if inverted - that is a programming error)
    pub fn new(start: u64, end: u64) -> Self {
        assert!(start <= end, "inverted TimeRange: {} > {}", start, end);
        Self { start, end }
    }

    /// The full range of a buffer with `len` samples
    pub fn full(len: u64) -> Self {
        Self { start: 0, end: len }
    }

    /// Number of samples covered
    #[inline]
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// Whether the range covers no samples
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `index` falls inside the range
    #[inline]
    pub fn contains(&self, index: u64) -> bool {
        index >= self.start && index < self.end
    }

    /// Clamp both ends to `[0, len]`
    ///
    /// This is how out-of-range viewport requests are recovered: the result
    /// may be empty, never invalid.
    pub fn clamp_to(&self, len: u64) -> Self {
        Self {
            start: self.start.min(len),
            end: self.end.min(len),
        }
    }

    /// Intersection with another range (empty ranges collapse to the
    /// intersection boundary)
    pub fn intersect(&self, other: &TimeRange) -> Self {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end).max(start);
        Self { start, end }
    }

    /// Widen the range by `margin` samples on each side, saturating at 0
    pub fn with_margin(&self, margin: u64) -> Self {
        Self {
            start: self.start.saturating_sub(margin),
            end: self.end.saturating_add(margin),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_basics() {
        let r = TimeRange::new(10, 30);
        assert_eq!(r.len(), 20);
        assert!(!r.is_empty());
        assert!(r.contains(10));
        assert!(r.contains(29));
        assert!(!r.contains(30));
    }

    #[test]
    fn test_clamp_to_shorter_buffer() {
        let r = TimeRange::new(500, 2000).clamp_to(1000);
        assert_eq!(r, TimeRange::new(500, 1000));

        // Entirely past the end collapses to an empty range at the boundary
        let r = TimeRange::new(5000, 6000).clamp_to(1000);
        assert!(r.is_empty());
        assert_eq!(r.start, 1000);
    }

    #[test]
    fn test_intersect() {
        let a = TimeRange::new(0, 100);
        let b = TimeRange::new(50, 200);
        assert_eq!(a.intersect(&b), TimeRange::new(50, 100));

        let disjoint = TimeRange::new(300, 400);
        assert!(a.intersect(&disjoint).is_empty());
    }

    #[test]
    fn test_with_margin_saturates() {
        let r = TimeRange::new(5, 100).with_margin(10);
        assert_eq!(r, TimeRange::new(0, 110));
    }

    #[test]
    #[should_panic]
    fn test_inverted_range_panics() {
        TimeRange::new(10, 5);
    }
}
