//! Waveview Core - sample storage and peak-envelope reduction
//!
//! The data plane of the waveform viewer: decoded samples live in a
//! [`buffer::SampleBuffer`], and [`envelope`] turns any sample range into a
//! bounded-size min/max envelope suitable for drawing. The interactive side
//! (viewport tracking, render scheduling, resolution caching) lives in the
//! `waveview-display` crate.

pub mod buffer;
pub mod config;
pub mod envelope;
pub mod types;

pub use buffer::{BufferError, BufferResult, SampleBuffer};
pub use envelope::{reduce, reduce_slice, Bucket, Envelope};
pub use types::{Sample, TimeRange};
