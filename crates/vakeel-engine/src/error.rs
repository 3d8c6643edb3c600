//! Error types for the state engine and its collaborators.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
    /// No webhook target is configured for the service id.
    #[error("webhook not found: {0}")]
    WebhookNotFound(Uuid),

    /// The HTTP round-trip to the webhook target failed.
    #[error("http transport: {0}")]
    Http(#[from] reqwest::Error),

    /// A non-HTTP delivery path failed; carries the transport's message.
    #[error("transport: {0}")]
    Transport(String),

    /// The notification did not complete within the delivery deadline.
    #[error("notification timed out after {0:?}")]
    NotifyTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, Error>;
