//! Liveness state engine for vakeel-way.
//!
//! Wires three collaborators around the TTL cache from `vakeel-core`:
//!
//! - [`WebhookDirectory`]: immutable service id to URL mapping
//! - [`Notifier`]: delivers `{"trigger": "<status>"}` payloads over HTTP
//! - [`StateEngine`]: edge detection and the bounded retry discipline
//!
//! The engine is constructed once by the server builder and shared behind
//! an `Arc`; the ingress drainer feeds it heartbeats while its expiry
//! worker handles evictions from the cache sweeper.

pub mod directory;
pub mod engine;
pub mod error;
pub mod notifier;

pub use directory::{StaticDirectory, WebhookDirectory};
pub use engine::{EngineConfig, ServiceState, StateEngine};
pub use error::{Error, Result};
pub use notifier::{Notifier, WebhookClient};
