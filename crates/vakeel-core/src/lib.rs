//! Core domain types for vakeel-way.
//!
//! This crate holds the pieces the state engine is built on:
//! - [`Status`]: the two-valued up/down service state
//! - [`Clock`]: an injectable time source so expiry can be tested
//!   deterministically
//! - [`Cache`]: a concurrent key-value store with per-entry time-to-live,
//!   a background sweeper, and composable eviction callbacks

pub mod cache;
pub mod clock;
pub mod status;

pub use cache::{Cache, CacheConfig};
pub use clock::{Clock, TokioClock};
pub use status::Status;
