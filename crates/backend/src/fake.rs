//! Stateful in-memory fake of the backend admin API
//!
//! Used by reconciler tests and by the CLI's "fake" provider. The fake
//! models the backend's eventual consistency with poll latencies: an
//! index created with a latency of `n` reports `Creating` for the next
//! `n` describe calls before becoming `Present` (and symmetrically for
//! deletes). Every call is recorded so tests can assert on exactly
//! which backend operations an invocation issued.

use crate::{
    BackendAdminClient, BackendError, CollectionStatus, IndexDescription, IndexSchema, IndexState,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use tokio::sync::Mutex;

/// One recorded admin API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCall {
    DescribeCollection(String),
    CreateIndex(String),
    DescribeIndex(String),
    UpdateIndex(String),
    DeleteIndex(String),
}

/// Operation selector for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FakeOp {
    DescribeCollection,
    CreateIndex,
    DescribeIndex,
    UpdateIndex,
    DeleteIndex,
}

#[derive(Debug)]
struct FakeIndex {
    schema: IndexSchema,
    state: IndexState,
    /// Remaining describe calls before the in-flight transition settles
    ticks: u32,
}

#[derive(Default)]
struct FakeState {
    collections: HashMap<String, CollectionStatus>,
    indexes: HashMap<String, FakeIndex>,
    calls: Vec<AdminCall>,
    failures: HashMap<FakeOp, VecDeque<BackendError>>,
    create_latency: u32,
    delete_latency: u32,
    max_live_indexes: usize,
}

/// In-memory fake admin client
#[derive(Default)]
pub struct FakeAdminClient {
    state: Mutex<FakeState>,
}

fn index_key(collection_id: &str, name: &str) -> String {
    format!("{collection_id}/{name}")
}

impl FakeAdminClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or re-statuses) a collection
    pub async fn set_collection(&self, collection_id: &str, status: CollectionStatus) {
        self.state
            .lock()
            .await
            .collections
            .insert(collection_id.to_string(), status);
    }

    /// Number of describe calls an index stays `Creating` after create
    pub async fn set_create_latency(&self, ticks: u32) {
        self.state.lock().await.create_latency = ticks;
    }

    /// Number of describe calls an index stays `Deleting` after delete
    pub async fn set_delete_latency(&self, ticks: u32) {
        self.state.lock().await.delete_latency = ticks;
    }

    /// Seeds an index that already exists on the backend
    pub async fn insert_index(
        &self,
        collection_id: &str,
        name: &str,
        schema: IndexSchema,
        state: IndexState,
    ) {
        let mut guard = self.state.lock().await;
        guard.indexes.insert(
            index_key(collection_id, name),
            FakeIndex {
                schema,
                state,
                ticks: 0,
            },
        );
        let live = guard.indexes.len();
        guard.max_live_indexes = guard.max_live_indexes.max(live);
    }

    /// Queues an error to be returned by the next call of the given kind
    pub async fn fail_next(&self, op: FakeOp, err: BackendError) {
        self.state
            .lock()
            .await
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// All admin calls issued so far, in order
    pub async fn calls(&self) -> Vec<AdminCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn clear_calls(&self) {
        self.state.lock().await.calls.clear();
    }

    /// Whether the index currently exists (in any state)
    pub async fn has_index(&self, collection_id: &str, name: &str) -> bool {
        self.state
            .lock()
            .await
            .indexes
            .contains_key(&index_key(collection_id, name))
    }

    /// High-water mark of simultaneously existing indexes
    pub async fn max_live_indexes(&self) -> usize {
        self.state.lock().await.max_live_indexes
    }
}

impl FakeState {
    fn take_failure(&mut self, op: FakeOp) -> Option<BackendError> {
        self.failures.get_mut(&op).and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl BackendAdminClient for FakeAdminClient {
    async fn describe_collection(
        &self,
        collection_id: &str,
    ) -> Result<CollectionStatus, BackendError> {
        let mut guard = self.state.lock().await;
        guard
            .calls
            .push(AdminCall::DescribeCollection(collection_id.to_string()));
        if let Some(err) = guard.take_failure(FakeOp::DescribeCollection) {
            return Err(err);
        }
        guard
            .collections
            .get(collection_id)
            .copied()
            .ok_or_else(|| BackendError::CollectionNotFound(collection_id.to_string()))
    }

    async fn create_index(
        &self,
        collection_id: &str,
        name: &str,
        schema: &IndexSchema,
    ) -> Result<(), BackendError> {
        let mut guard = self.state.lock().await;
        guard.calls.push(AdminCall::CreateIndex(name.to_string()));
        if let Some(err) = guard.take_failure(FakeOp::CreateIndex) {
            return Err(err);
        }

        let key = index_key(collection_id, name);
        if guard.indexes.contains_key(&key) {
            return Err(BackendError::Conflict(format!(
                "resource_already_exists_exception: index '{name}'"
            )));
        }

        let (state, ticks) = if guard.create_latency == 0 {
            (IndexState::Present, 0)
        } else {
            (IndexState::Creating, guard.create_latency)
        };
        guard.indexes.insert(
            key,
            FakeIndex {
                schema: schema.clone(),
                state,
                ticks,
            },
        );
        let live = guard.indexes.len();
        guard.max_live_indexes = guard.max_live_indexes.max(live);
        Ok(())
    }

    async fn describe_index(
        &self,
        collection_id: &str,
        name: &str,
    ) -> Result<Option<IndexDescription>, BackendError> {
        let mut guard = self.state.lock().await;
        guard.calls.push(AdminCall::DescribeIndex(name.to_string()));
        if let Some(err) = guard.take_failure(FakeOp::DescribeIndex) {
            return Err(err);
        }

        let key = index_key(collection_id, name);
        let Some((state, ticks)) = guard.indexes.get(&key).map(|i| (i.state, i.ticks)) else {
            return Ok(None);
        };

        // Advance the in-flight transition by one observation
        match state {
            IndexState::Creating => {
                if let Some(index) = guard.indexes.get_mut(&key) {
                    if ticks <= 1 {
                        index.state = IndexState::Present;
                        index.ticks = 0;
                    } else {
                        index.ticks -= 1;
                    }
                }
            }
            IndexState::Deleting => {
                if ticks <= 1 {
                    guard.indexes.remove(&key);
                    return Ok(None);
                }
                if let Some(index) = guard.indexes.get_mut(&key) {
                    index.ticks -= 1;
                }
            }
            IndexState::Present => {}
        }

        let index = guard
            .indexes
            .get(&key)
            .ok_or_else(|| BackendError::Api("index vanished mid-describe".to_string()))?;
        Ok(Some(IndexDescription {
            name: name.to_string(),
            state: index.state,
            schema: index.schema.clone(),
        }))
    }

    async fn update_index(
        &self,
        collection_id: &str,
        name: &str,
        schema: &IndexSchema,
    ) -> Result<(), BackendError> {
        let mut guard = self.state.lock().await;
        guard.calls.push(AdminCall::UpdateIndex(name.to_string()));
        if let Some(err) = guard.take_failure(FakeOp::UpdateIndex) {
            return Err(err);
        }

        let key = index_key(collection_id, name);
        let Some(index) = guard.indexes.get_mut(&key) else {
            return Err(BackendError::IndexNotFound(name.to_string()));
        };
        index.schema.text_field = schema.text_field.clone();
        index.schema.metadata_field = schema.metadata_field.clone();
        Ok(())
    }

    async fn delete_index(&self, collection_id: &str, name: &str) -> Result<(), BackendError> {
        let mut guard = self.state.lock().await;
        guard.calls.push(AdminCall::DeleteIndex(name.to_string()));
        if let Some(err) = guard.take_failure(FakeOp::DeleteIndex) {
            return Err(err);
        }

        let key = index_key(collection_id, name);
        if !guard.indexes.contains_key(&key) {
            return Err(BackendError::IndexNotFound(name.to_string()));
        }

        if guard.delete_latency == 0 {
            guard.indexes.remove(&key);
        } else {
            let ticks = guard.delete_latency;
            if let Some(index) = guard.indexes.get_mut(&key) {
                index.state = IndexState::Deleting;
                index.ticks = ticks;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn schema(dimension: u32) -> IndexSchema {
        IndexSchema {
            vector_field: "vec".to_string(),
            text_field: "text".to_string(),
            metadata_field: "meta".to_string(),
            dimension,
        }
    }

    #[tokio::test]
    async fn unknown_collection_is_not_found() {
        let fake = FakeAdminClient::new();
        assert!(matches!(
            fake.describe_collection("col-1").await,
            Err(BackendError::CollectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn create_with_latency_settles_after_n_describes() {
        let fake = FakeAdminClient::new();
        fake.set_create_latency(2).await;
        fake.create_index("col-1", "idx", &schema(1024)).await.unwrap();

        let first = fake.describe_index("col-1", "idx").await.unwrap().unwrap();
        assert_eq!(first.state, IndexState::Creating);
        let second = fake.describe_index("col-1", "idx").await.unwrap().unwrap();
        assert_eq!(second.state, IndexState::Present);
    }

    #[tokio::test]
    async fn duplicate_create_conflicts() {
        let fake = FakeAdminClient::new();
        fake.create_index("col-1", "idx", &schema(1024)).await.unwrap();
        assert!(matches!(
            fake.create_index("col-1", "idx", &schema(1024)).await,
            Err(BackendError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn delete_with_latency_reports_deleting_then_gone() {
        let fake = FakeAdminClient::new();
        fake.create_index("col-1", "idx", &schema(1024)).await.unwrap();
        fake.set_delete_latency(2).await;
        fake.delete_index("col-1", "idx").await.unwrap();

        let first = fake.describe_index("col-1", "idx").await.unwrap().unwrap();
        assert_eq!(first.state, IndexState::Deleting);
        let second = fake.describe_index("col-1", "idx").await.unwrap();
        assert_eq!(second, None);
    }

    #[tokio::test]
    async fn delete_of_missing_index_is_not_found() {
        let fake = FakeAdminClient::new();
        assert!(matches!(
            fake.delete_index("col-1", "idx").await,
            Err(BackendError::IndexNotFound(_))
        ));
    }

    #[tokio::test]
    async fn calls_are_recorded_in_order() {
        let fake = FakeAdminClient::new();
        fake.set_collection("col-1", CollectionStatus::Active).await;
        fake.describe_collection("col-1").await.unwrap();
        fake.create_index("col-1", "idx", &schema(1024)).await.unwrap();
        fake.describe_index("col-1", "idx").await.unwrap();

        assert_eq!(
            fake.calls().await,
            vec![
                AdminCall::DescribeCollection("col-1".to_string()),
                AdminCall::CreateIndex("idx".to_string()),
                AdminCall::DescribeIndex("idx".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn injected_failure_fires_once() {
        let fake = FakeAdminClient::new();
        fake.set_collection("col-1", CollectionStatus::Active).await;
        fake.fail_next(
            FakeOp::DescribeCollection,
            BackendError::Unavailable("503".to_string()),
        )
        .await;

        assert!(matches!(
            fake.describe_collection("col-1").await,
            Err(BackendError::Unavailable(_))
        ));
        assert_eq!(
            fake.describe_collection("col-1").await.unwrap(),
            CollectionStatus::Active
        );
    }

    #[tokio::test]
    async fn max_live_indexes_tracks_overlap() {
        let fake = FakeAdminClient::new();
        fake.create_index("col-1", "a", &schema(1024)).await.unwrap();
        fake.delete_index("col-1", "a").await.unwrap();
        fake.create_index("col-1", "b", &schema(1536)).await.unwrap();
        assert_eq!(fake.max_live_indexes().await, 1);
    }
}
