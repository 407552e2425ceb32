//! Waveview Display - the interactive side of the waveform viewer
//!
//! This crate keeps the view responsive while the user pans, zooms or a
//! playback cursor advances:
//!
//! - [`ViewportState`] tracks the visible sample range and the output width,
//!   mutated only by interaction events on the interactive thread.
//! - [`RenderScheduler`] coalesces viewport changes, runs the reduction on a
//!   worker thread (latest-wins, at most one job in flight) and hands the
//!   finished [`waveview_core::Envelope`] back on the interactive thread.
//! - [`ResolutionCache`] holds precomputed full-range envelope tiers so
//!   zoomed-out views re-bucket a few thousand cached buckets instead of
//!   rescanning millions of samples.
//!
//! ## Usage
//!
//! ```ignore
//! let mut viewport = ViewportState::new(1280);
//! let mut scheduler = RenderScheduler::spawn(buffer, cache, 0, &config);
//!
//! // In the event handler:
//! viewport.pan(-4800);
//! if viewport.take_dirty() {
//!     scheduler.viewport_changed(&viewport);
//! }
//!
//! // In the tick handler:
//! if let Some(envelope) = scheduler.poll(Instant::now()) {
//!     renderer.draw(&envelope);
//! }
//! ```

pub mod cache;
pub mod scheduler;
pub mod viewport;

pub use cache::ResolutionCache;
pub use scheduler::RenderScheduler;
pub use viewport::ViewportState;
