//! vakeel-way server: gRPC heartbeat ingress and application wiring.
//!
//! The server accepts heartbeat streams over gRPC, funnels them through a
//! bounded channel into the state engine, and exposes everything the
//! `vakeel-way` binary needs: configuration loading, the service
//! implementation, shutdown plumbing and the application builder.

pub mod builder;
pub mod config;
pub mod error;
pub mod service;

pub use builder::{App, AppBuilder};
pub use config::{Config, ConfigError};
pub use error::Error;
