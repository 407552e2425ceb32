//! Render scheduling
//!
//! Keeps reduction work off the interactive thread. Viewport events are
//! coalesced: a burst of pan/zoom/resize/cursor events inside the coalescing
//! window collapses into one render request carrying only the latest
//! viewport snapshot. At most one reduction runs at a time; a newer event
//! supersedes rather than queues behind it, and a superseded result is
//! discarded at delivery, never shown out of order. Jobs have no
//! cancellation signal - ranges are bounded and reduction is fast, so a job
//! always runs to completion and staleness is purely a delivery-time
//! decision.
//!
//! The interactive thread submits snapshots with
//! [`RenderScheduler::viewport_changed`] and drives the state machine from
//! its tick handler with [`RenderScheduler::poll`]; the worker thread does
//! the scanning and posts results back over an mpsc channel.

use std::sync::mpsc::{Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use waveview_core::config::EngineConfig;
use waveview_core::envelope::{reduce, Envelope};
use waveview_core::{SampleBuffer, TimeRange};

use crate::cache::ResolutionCache;
use crate::viewport::ViewportState;

/// Extra range rendered beyond the visible span, as a fraction denominator
/// (1/10 on each side), so small pans land on already-rendered data
const MARGIN_DIVISOR: u64 = 10;

/// One reduction job for the worker
struct RenderJob {
    generation: u64,
    channel: usize,
    range: TimeRange,
    width: usize,
}

/// A finished reduction, tagged with the job that produced it
struct RenderOutcome {
    generation: u64,
    envelope: Envelope,
}

/// The latest viewport snapshot waiting to be rendered
#[derive(Debug, Clone, Copy)]
struct Snapshot {
    range: TimeRange,
    width: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    /// Collecting events; `since` is the first event of the burst
    Pending { since: Instant },
    Rendering,
}

/// Coalescing, latest-wins render scheduler for one view
///
/// One scheduler per rendered view (waveform plot, analysis subplot, ...);
/// each owns a worker thread and renders a single channel of its buffer.
pub struct RenderScheduler {
    tx: Sender<RenderJob>,
    rx: Receiver<RenderOutcome>,
    _handle: JoinHandle<()>,
    phase: Phase,
    pending: Option<Snapshot>,
    /// Generation of the most recently dispatched job; doubles as the
    /// dispatch counter
    dispatched: u64,
    channel: usize,
    max_buckets: usize,
    coalesce_window: Duration,
}

impl RenderScheduler {
    /// Spawn the worker thread and return the scheduler handle
    ///
    /// The configuration is captured at construction: output budget and
    /// coalescing window are explicit values here, not ambient state.
    pub fn spawn(
        buffer: Arc<SampleBuffer>,
        cache: Arc<Mutex<ResolutionCache>>,
        channel: usize,
        config: &EngineConfig,
    ) -> Self {
        let (job_tx, job_rx) = std::sync::mpsc::channel::<RenderJob>();
        let (outcome_tx, outcome_rx) = std::sync::mpsc::channel::<RenderOutcome>();

        let handle = thread::Builder::new()
            .name("waveview-render".to_string())
            .spawn(move || {
                render_worker(job_rx, outcome_tx, buffer, cache);
            })
            .expect("failed to spawn render worker thread");

        log::info!(
            "render scheduler started for channel {} (max {} buckets, {}ms window)",
            channel,
            config.max_buckets,
            config.coalesce_window_ms
        );

        Self {
            tx: job_tx,
            rx: outcome_rx,
            _handle: handle,
            phase: Phase::Idle,
            pending: None,
            dispatched: 0,
            channel,
            max_buckets: config.max_buckets,
            coalesce_window: Duration::from_millis(config.coalesce_window_ms),
        }
    }

    /// Record a viewport change (pan, zoom, resize, cursor follow)
    ///
    /// Only the latest snapshot is kept; intermediate states of a drag
    /// gesture are never queued. Non-blocking.
    pub fn viewport_changed(&mut self, viewport: &ViewportState) {
        self.pending = Some(Snapshot {
            range: viewport.visible_range(),
            width: viewport.width(),
        });
        if self.phase == Phase::Idle {
            self.phase = Phase::Pending {
                since: Instant::now(),
            };
        }
        // Pending keeps its burst anchor; Rendering stays put - the pending
        // snapshot is picked up when the in-flight job lands
    }

    /// Drive the state machine; returns an envelope ready to hand to the
    /// renderer, if one landed
    ///
    /// Call from the tick handler on the interactive thread. A result that
    /// was superseded while in flight is dropped here and the newer request
    /// dispatched immediately.
    pub fn poll(&mut self, now: Instant) -> Option<Envelope> {
        let mut delivered = None;

        loop {
            match self.rx.try_recv() {
                Ok(outcome) => {
                    if outcome.generation < self.dispatched || self.pending.is_some() {
                        log::trace!(
                            "discarding stale result for generation {} (latest {})",
                            outcome.generation,
                            self.dispatched
                        );
                        self.phase = Phase::Idle;
                        // Superseded: render the latest state right away,
                        // without waiting out another coalescing window
                        self.dispatch();
                    } else {
                        self.phase = Phase::Idle;
                        delivered = Some(outcome.envelope);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    log::error!("render worker thread disconnected unexpectedly");
                    // The in-flight job will never land; go back to Idle so
                    // later requests still reach dispatch and report failure
                    if self.phase == Phase::Rendering {
                        self.phase = Phase::Idle;
                    }
                    break;
                }
            }
        }

        if let Phase::Pending { since } = self.phase {
            if now.duration_since(since) >= self.coalesce_window {
                self.dispatch();
            }
        }

        delivered
    }

    /// Send the pending snapshot to the worker (latest state only)
    fn dispatch(&mut self) {
        let Some(snapshot) = self.pending.take() else {
            return;
        };
        self.dispatched += 1;
        let job = RenderJob {
            generation: self.dispatched,
            channel: self.channel,
            range: snapshot.range,
            width: snapshot.width.min(self.max_buckets).max(1),
        };
        if self.tx.send(job).is_err() {
            log::error!("render worker thread is gone, dropping request");
            self.phase = Phase::Idle;
            return;
        }
        self.phase = Phase::Rendering;
    }

    /// Number of jobs dispatched so far
    #[cfg(test)]
    fn dispatch_count(&self) -> u64 {
        self.dispatched
    }
}

/// The worker: clamp, consult the cache, reduce, post back
///
/// Never fails outward. A range the buffer cannot satisfy yet (streaming
/// decode still filling) is clamped to the available length; an empty buffer
/// yields an empty envelope - a transient state, not an error.
fn render_worker(
    rx: Receiver<RenderJob>,
    tx: Sender<RenderOutcome>,
    buffer: Arc<SampleBuffer>,
    cache: Arc<Mutex<ResolutionCache>>,
) {
    log::debug!("render worker starting");

    while let Ok(job) = rx.recv() {
        let started = Instant::now();
        let len = buffer.len();
        let visible = job.range.clamp_to(len);
        // Widen by 10% per side so a small pan is already covered
        let range = visible.with_margin(visible.len() / MARGIN_DIVISOR).clamp_to(len);

        let envelope = if range.is_empty() {
            Envelope::empty(job.width)
        } else {
            let cached = {
                let mut cache = cache.lock().expect("resolution cache lock poisoned");
                if cache.is_fresh(&buffer) {
                    cache.lookup(job.channel, range, job.width)
                } else {
                    cache.invalidate();
                    None
                }
            };
            match cached {
                Some(envelope) => envelope,
                None => match reduce(&buffer, job.channel, range, job.width) {
                    Ok(envelope) => envelope,
                    Err(e) => {
                        // Buffer was cleared between the length read and the
                        // scan; the next viewport event re-renders
                        log::debug!("reduction skipped: {}", e);
                        Envelope::empty(job.width)
                    }
                },
            }
        };

        log::debug!(
            "rendered [{}, {}) x {} -> {} buckets in {:?}",
            range.start,
            range.end,
            job.width,
            envelope.len(),
            started.elapsed()
        );

        if tx
            .send(RenderOutcome {
                generation: job.generation,
                envelope,
            })
            .is_err()
        {
            break;
        }
    }

    log::debug!("render worker shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(window_ms: u64) -> EngineConfig {
        EngineConfig {
            max_buckets: 512,
            tier_buckets: vec![64],
            coalesce_window_ms: window_ms,
        }
    }

    fn scheduler_over(len: usize, window_ms: u64) -> (RenderScheduler, Arc<SampleBuffer>) {
        let buffer = Arc::new(SampleBuffer::from_channels(vec![(0..len)
            .map(|i| (i % 97) as f32 / 97.0)
            .collect()]));
        let cache = Arc::new(Mutex::new(ResolutionCache::new(&[64])));
        let scheduler = RenderScheduler::spawn(
            Arc::clone(&buffer),
            cache,
            0,
            &test_config(window_ms),
        );
        (scheduler, buffer)
    }

    /// Poll until the scheduler delivers, or give up after a second
    fn poll_until_delivery(scheduler: &mut RenderScheduler) -> Option<Envelope> {
        let deadline = Instant::now() + Duration::from_secs(1);
        while Instant::now() < deadline {
            if let Some(envelope) = scheduler.poll(Instant::now()) {
                return Some(envelope);
            }
            thread::sleep(Duration::from_millis(1));
        }
        None
    }

    #[test]
    fn test_burst_coalesces_to_one_request_for_last_state() {
        let (mut scheduler, _buffer) = scheduler_over(100_000, 50);
        let mut viewport = ViewportState::new(200);
        viewport.set_total_len(100_000);

        // Rapid drag: five events inside the window
        viewport.zoom(0.1, 0); // span 10_000
        for start in [0i64, 10_000, 20_000, 30_000, 40_000] {
            viewport.pan(start - viewport.visible_range().start as i64);
            scheduler.viewport_changed(&viewport);
        }
        let last_range = viewport.visible_range();

        // Nothing dispatches before the window elapses
        assert!(scheduler.poll(Instant::now()).is_none());
        assert_eq!(scheduler.dispatch_count(), 0);

        thread::sleep(Duration::from_millis(60));
        let envelope = poll_until_delivery(&mut scheduler).expect("render never delivered");

        assert_eq!(scheduler.dispatch_count(), 1);
        // The one request carried the final state of the burst
        assert!(envelope.range.contains(last_range.start));
        assert!(envelope.range.contains(last_range.end - 1));

        // And the pipeline is quiet afterwards
        thread::sleep(Duration::from_millis(30));
        assert!(scheduler.poll(Instant::now()).is_none());
        assert_eq!(scheduler.dispatch_count(), 1);
    }

    #[test]
    fn test_superseded_result_is_discarded() {
        let (mut scheduler, _buffer) = scheduler_over(1_000_000, 1);
        let mut viewport = ViewportState::new(100);
        viewport.set_total_len(1_000_000);

        // First request: the full range
        scheduler.viewport_changed(&viewport);
        thread::sleep(Duration::from_millis(5));
        scheduler.poll(Instant::now());
        assert_eq!(scheduler.dispatch_count(), 1);

        // Zoom lands while the first reduction is (possibly) in flight
        viewport.zoom(0.2, 300_000);
        let newer_range = viewport.visible_range();
        scheduler.viewport_changed(&viewport);

        let envelope = poll_until_delivery(&mut scheduler).expect("render never delivered");

        // Only the newer request's envelope ever reaches the renderer
        assert_eq!(scheduler.dispatch_count(), 2);
        assert!(envelope.range.contains(newer_range.start));
        assert!(envelope.range.len() < 1_000_000);

        // Nothing else arrives
        thread::sleep(Duration::from_millis(20));
        assert!(scheduler.poll(Instant::now()).is_none());
    }

    #[test]
    fn test_empty_buffer_renders_empty_envelope() {
        let buffer = Arc::new(SampleBuffer::new(1));
        let cache = Arc::new(Mutex::new(ResolutionCache::new(&[64])));
        let mut scheduler =
            RenderScheduler::spawn(Arc::clone(&buffer), cache, 0, &test_config(1));

        let mut viewport = ViewportState::new(100);
        viewport.set_total_len(0);
        scheduler.viewport_changed(&viewport);
        thread::sleep(Duration::from_millis(5));

        let envelope = poll_until_delivery(&mut scheduler).expect("render never delivered");
        assert!(envelope.is_empty());
    }

    #[test]
    fn test_request_beyond_buffer_is_clamped() {
        let (mut scheduler, buffer) = scheduler_over(10_000, 1);
        let mut viewport = ViewportState::new(100);
        // Viewport believes the file is longer than the buffer has decoded
        viewport.set_total_len(50_000);
        scheduler.viewport_changed(&viewport);
        thread::sleep(Duration::from_millis(5));

        let envelope = poll_until_delivery(&mut scheduler).expect("render never delivered");
        assert!(envelope.range.end <= buffer.len());
        assert!(!envelope.is_empty());
    }

    #[test]
    fn test_output_never_exceeds_bucket_budget() {
        let (mut scheduler, _buffer) = scheduler_over(100_000, 1);
        let mut viewport = ViewportState::new(100_000); // absurd width
        viewport.set_total_len(100_000);
        scheduler.viewport_changed(&viewport);
        thread::sleep(Duration::from_millis(5));

        let envelope = poll_until_delivery(&mut scheduler).expect("render never delivered");
        assert!(envelope.len() <= 512);
    }

    #[test]
    fn test_worker_loss_resets_to_idle() {
        let (mut scheduler, _buffer) = scheduler_over(1_000, 1);

        // Sever the job channel so the worker exits and its result channel
        // hangs up
        let (dead_tx, dead_rx) = std::sync::mpsc::channel();
        drop(dead_rx);
        drop(std::mem::replace(&mut scheduler.tx, dead_tx));
        let deadline = Instant::now() + Duration::from_secs(1);
        loop {
            match scheduler.rx.try_recv() {
                Err(TryRecvError::Disconnected) => break,
                _ => {
                    assert!(Instant::now() < deadline, "worker never exited");
                    thread::sleep(Duration::from_millis(1));
                }
            }
        }

        // A job that was in flight when the worker died must not leave the
        // scheduler stuck waiting for it
        scheduler.phase = Phase::Rendering;
        scheduler.poll(Instant::now());
        assert_eq!(scheduler.phase, Phase::Idle);

        // Later requests reach dispatch, fail to send, and land back in Idle
        // instead of wedging in Rendering
        let mut viewport = ViewportState::new(100);
        viewport.set_total_len(1_000);
        scheduler.viewport_changed(&viewport);
        thread::sleep(Duration::from_millis(5));
        assert!(scheduler.poll(Instant::now()).is_none());
        assert_eq!(scheduler.phase, Phase::Idle);
        assert_eq!(scheduler.dispatch_count(), 1);
    }
}
