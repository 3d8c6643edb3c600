//! Webhook directory: service id to notification target.
//!
//! The directory is built once from configuration and never mutated, so
//! lookups are lock-free. Ids without a configured target cannot be
//! notified and resolve to [`Error::WebhookNotFound`].

use std::collections::HashMap;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};

/// Resolves notification targets for service ids.
#[async_trait]
pub trait WebhookDirectory: Send + Sync {
    /// Returns the target URL configured for `id`.
    async fn get(&self, id: Uuid) -> Result<String>;

    /// Snapshot of all configured ids, used once at startup to size the
    /// state cache.
    fn all(&self) -> Vec<Uuid>;
}

/// Immutable in-memory directory.
pub struct StaticDirectory {
    targets: HashMap<Uuid, String>,
}

impl StaticDirectory {
    pub fn new(targets: HashMap<Uuid, String>) -> Self {
        Self { targets }
    }
}

#[async_trait]
impl WebhookDirectory for StaticDirectory {
    async fn get(&self, id: Uuid) -> Result<String> {
        self.targets
            .get(&id)
            .cloned()
            .ok_or(Error::WebhookNotFound(id))
    }

    fn all(&self) -> Vec<Uuid> {
        self.targets.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_configured_target() {
        let id = Uuid::new_v4();
        let directory = StaticDirectory::new(HashMap::from([(id, "http://h/1".to_string())]));

        assert_eq!(directory.get(id).await.unwrap(), "http://h/1");
        assert_eq!(directory.all(), vec![id]);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let directory = StaticDirectory::new(HashMap::new());
        let id = Uuid::new_v4();

        assert!(matches!(
            directory.get(id).await,
            Err(Error::WebhookNotFound(missing)) if missing == id
        ));
        assert!(directory.all().is_empty());
    }
}
