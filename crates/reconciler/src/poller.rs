//! Readiness gate for the parent collection

use ossindex_backend::{BackendAdminClient, BackendError, CollectionStatus};
use ossindex_core::error::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Outcome of a single readiness check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionReadiness {
    /// The collection accepts index operations
    Active,
    /// Still materializing; re-check later
    NotReady,
    /// The collection will never become ready
    Failed(String),
}

/// Polls the parent collection's status as a precondition gate for
/// index operations.
///
/// Each call performs exactly one status read: the controller's own
/// invocation budget is too small for a sleep loop, so "waiting" means
/// reporting `NotReady` and letting the caller re-invoke. Transient
/// backend errors surface as `Err` (retryable), distinct from
/// `NotReady`, so the caller can tell "collection still creating" from
/// "could not find out".
pub struct ReadinessPoller {
    backend: Arc<dyn BackendAdminClient>,
}

impl ReadinessPoller {
    pub fn new(backend: Arc<dyn BackendAdminClient>) -> Self {
        Self { backend }
    }

    /// Single bounded readiness check; no writes, no sleeping
    pub async fn check(&self, collection_id: &str) -> Result<CollectionReadiness> {
        match self.backend.describe_collection(collection_id).await {
            Ok(CollectionStatus::Active) => Ok(CollectionReadiness::Active),
            Ok(CollectionStatus::Creating) => {
                debug!(collection = %collection_id, "Collection still creating");
                Ok(CollectionReadiness::NotReady)
            }
            Ok(status @ (CollectionStatus::Failed
            | CollectionStatus::Deleting
            | CollectionStatus::Deleted)) => Ok(CollectionReadiness::Failed(format!(
                "collection '{collection_id}' is {status:?}"
            ))),
            // The control plane may lag behind the deployment engine's
            // own create; treat a missing collection as not-ready and
            // let the deadline bound the wait.
            Err(BackendError::CollectionNotFound(_)) => Ok(CollectionReadiness::NotReady),
            Err(e) if e.is_transient() => Err(Error::transient(format!(
                "readiness check for collection '{collection_id}' failed: {e}"
            ))),
            Err(e) => Err(e.into()),
        }
    }
}
