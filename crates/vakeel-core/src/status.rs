//! Service status as observed by the aggregator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Liveness state of a single service.
///
/// The canonical lowercase form (`"up"` / `"down"`) is what webhook
/// receivers see in the notification payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Heartbeats are arriving for the service.
    Up,
    /// Heartbeats have stopped and the entry expired.
    Down,
}

impl Status {
    /// Canonical lowercase string form used in outbound payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Up => "up",
            Status::Down => "down",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
