//! Backend admin API for the managed search collection
//!
//! This crate owns the four-operation administrative interface the
//! reconciler drives: create/describe/update/delete on indexes plus a
//! read-only collection status check. Two implementations exist: an
//! HTTP client for a live collection endpoint and a stateful in-memory
//! fake for tests and dry runs.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod error;
pub mod fake;
mod factory;
mod http;

pub use error::BackendError;
pub use factory::create_admin_client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ==== Models ====

/// Status of the backend-owned collection. Created and destroyed
/// entirely outside this controller; observed only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionStatus {
    Creating,
    Active,
    Failed,
    Deleting,
    Deleted,
}

/// State of an index as reported by the backend. Absence is modeled as
/// `describe_index` returning `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexState {
    Creating,
    Present,
    Deleting,
}

/// Field mapping and dimension of a vector index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
    pub vector_field: String,
    pub text_field: String,
    pub metadata_field: String,
    pub dimension: u32,
}

/// Snapshot of an index returned by `describe_index`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDescription {
    pub name: String,
    pub state: IndexState,
    pub schema: IndexSchema,
}

// ==== Trait ====

/// Administrative operations against the managed search collection
///
/// All methods perform exactly one backend round trip; none of them
/// poll or sleep. Errors carry enough classification for the caller to
/// distinguish transient failures from conflicts and user errors.
#[async_trait]
pub trait BackendAdminClient: Send + Sync {
    /// Current status of the parent collection (read-only)
    async fn describe_collection(
        &self,
        collection_id: &str,
    ) -> Result<CollectionStatus, BackendError>;

    /// Creates an index with the given schema. Asynchronous on the
    /// backend: acceptance does not imply the index is present yet.
    /// Fails with [`BackendError::Conflict`] if an index with this name
    /// already exists.
    async fn create_index(
        &self,
        collection_id: &str,
        name: &str,
        schema: &IndexSchema,
    ) -> Result<(), BackendError>;

    /// Describes an index, or `Ok(None)` if it does not exist
    async fn describe_index(
        &self,
        collection_id: &str,
        name: &str,
    ) -> Result<Option<IndexDescription>, BackendError>;

    /// Applies mutable schema additions to an existing index. The
    /// backend cannot change existing k-NN mappings in place; callers
    /// must replace the index for those.
    async fn update_index(
        &self,
        collection_id: &str,
        name: &str,
        schema: &IndexSchema,
    ) -> Result<(), BackendError>;

    /// Deletes an index. Asynchronous on the backend; fails with
    /// [`BackendError::IndexNotFound`] if it does not exist.
    async fn delete_index(&self, collection_id: &str, name: &str) -> Result<(), BackendError>;
}
