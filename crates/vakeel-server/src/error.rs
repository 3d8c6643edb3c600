//! Server assembly errors. All of these are fatal at startup.

use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("bind {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    #[error("grpc transport: {0}")]
    Transport(#[from] tonic::transport::Error),

    #[error("reflection service: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
