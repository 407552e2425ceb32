//! Viewport state for the interactive waveform view
//!
//! Tracks the visible sample range and the output width budget. Mutated only
//! by interaction events (pan, zoom, resize) and the playback-cursor follow
//! policy, always on the interactive thread; every mutation clamps the range
//! to the currently known buffer length and marks the state dirty so the
//! scheduler knows a redraw is owed.

use waveview_core::TimeRange;

/// The currently visible time range and its target output resolution
#[derive(Debug, Clone)]
pub struct ViewportState {
    range: TimeRange,
    width: usize,
    total_len: u64,
    follow: bool,
    dirty: bool,
}

impl ViewportState {
    /// Create a viewport with an output budget of `width` points
    ///
    /// Starts empty; the first [`ViewportState::set_total_len`] (decode
    /// produced data) expands it to show the whole file.
    pub fn new(width: usize) -> Self {
        assert!(width >= 1, "viewport width must be at least 1");
        Self {
            range: TimeRange::new(0, 0),
            width,
            total_len: 0,
            follow: false,
            dirty: false,
        }
    }

    /// The visible sample range
    #[inline]
    pub fn visible_range(&self) -> TimeRange {
        self.range
    }

    /// The output width budget in points
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Whether the view tracks the playback cursor
    pub fn set_follow(&mut self, follow: bool) {
        self.follow = follow;
    }

    /// Tell the viewport how long the buffer currently is
    ///
    /// Called when decode appends (growing length) or a new file loads. An
    /// empty view expands to the full file; an existing view is re-clamped.
    pub fn set_total_len(&mut self, total_len: u64) {
        if self.total_len == total_len {
            return;
        }
        self.total_len = total_len;
        if self.range.is_empty() {
            self.range = TimeRange::full(total_len);
        } else {
            self.range = self.range.clamp_to(total_len);
        }
        self.dirty = true;
    }

    /// Shift the view by `delta` samples, keeping the span where possible
    pub fn pan(&mut self, delta: i64) {
        let span = self.range.len();
        let max_start = self.total_len.saturating_sub(span);
        let start = (self.range.start as i64).saturating_add(delta).max(0) as u64;
        let start = start.min(max_start);
        self.range = TimeRange::new(start, start + span);
        self.dirty = true;
    }

    /// Scale the visible span by `factor` around the `anchor` sample
    ///
    /// Factors below 1 zoom in, above 1 zoom out; the anchor keeps its
    /// relative screen position (wheel zoom centered on the pointer).
    pub fn zoom(&mut self, factor: f64, anchor: u64) {
        assert!(factor > 0.0, "zoom factor must be positive");
        let span = self.range.len();
        if span == 0 {
            return;
        }
        let new_span = ((span as f64 * factor).round() as u64).clamp(1, self.total_len.max(1));

        // Preserve the anchor's fraction within the span
        let anchor = anchor.clamp(self.range.start, self.range.end);
        let frac = (anchor - self.range.start) as f64 / span as f64;
        let offset = (frac * new_span as f64).round() as u64;
        let start = anchor.saturating_sub(offset);
        let start = start.min(self.total_len.saturating_sub(new_span));

        self.range = TimeRange::new(start, start + new_span);
        self.dirty = true;
    }

    /// Update the output width budget (window resize)
    pub fn resize(&mut self, width: usize) {
        assert!(width >= 1, "viewport width must be at least 1");
        if self.width != width {
            self.width = width;
            self.dirty = true;
        }
    }

    /// Playback cursor tick: keep `cursor` in view while follow is on
    ///
    /// Recenters the current span on the cursor once it leaves the visible
    /// range; does nothing while the cursor is still on screen.
    pub fn follow_cursor(&mut self, cursor: u64) {
        if !self.follow || self.range.contains(cursor) || self.range.is_empty() {
            return;
        }
        let span = self.range.len();
        let start = cursor
            .saturating_sub(span / 2)
            .min(self.total_len.saturating_sub(span));
        self.range = TimeRange::new(start, start + span);
        self.dirty = true;
    }

    /// Consume the dirty flag; true means a redraw is owed
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}
