//! Adaptive jitter-buffer delay estimation — pure Rust port of NetEq's delay
//! manager.
//!
//! A real-time audio receiver buffers incoming packets to absorb network
//! jitter before playout. For every received packet, [`DelayManager::update`]
//! folds the packet's arrival-time deviation into a decaying statistical
//! model and recomputes the buffering depth (the target delay) that covers a
//! configured percentile of the observed jitter, trading added latency
//! against the risk of buffer underrun.
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//!
//! use fermata::{DelayManager, DelayManagerConfig, TickTimer};
//!
//! let tick_timer = Arc::new(TickTimer::default());
//! let mut delay_manager =
//!     DelayManager::new(DelayManagerConfig::default(), Arc::clone(&tick_timer));
//!
//! // The first packet only anchors the estimation.
//! assert_eq!(delay_manager.update(1600, 8000, false), None);
//! assert_eq!(delay_manager.target_delay_ms(), 80);
//!
//! // Advance the timer from the audio loop, then report the next arrival.
//! // 20 ms of wall time for 20 ms of media time: no jitter.
//! tick_timer.increment_by(2);
//! assert_eq!(delay_manager.update(1760, 8000, false), Some(0));
//! assert_eq!(delay_manager.target_delay_ms(), 20);
//! ```
//!
//! The tick timer is shared with the caller's real-time loop; see
//! [`fermata_tick`] for the timing model.

pub(crate) mod delay_constraints;
mod delay_manager;
pub mod histogram;
pub(crate) mod relative_arrival_delay_tracker;
pub(crate) mod timestamp;

pub use delay_manager::{DelayManager, DelayManagerConfig, percentile_to_quantile};
pub use histogram::{DelayHistogram, Histogram};

// The tick timer is part of the public construction API.
pub use fermata_tick::{Countdown, Stopwatch, TickTimer};
