//! The index lifecycle state machine
//!
//! One `reconcile` call is one bounded invocation: it decodes the
//! continuation marker (if any), checks the deadline, performs at most a
//! couple of backend round trips, and terminates with success, failure,
//! or an in-progress result carrying everything needed to resume.
//!
//! Invariants:
//! - Creates are gated on the parent collection being active; no index
//!   call is issued while the collection is still materializing.
//! - Deletes are never gated on the collection. A missing collection
//!   makes any delete trivially successful.
//! - Immutable property changes (dimension, field names, identity)
//!   always take the delete-then-create path. The old and the new index
//!   never exist at the same time.

use crate::{BackoffPolicy, CollectionReadiness, ReadinessPoller};
use ossindex_backend::{BackendAdminClient, BackendError, IndexSchema, IndexState};
use ossindex_core::config::ReconcilerConfig;
use ossindex_core::error::{Error, Result};
use ossindex_core::provision::{
    Continuation, IndexProperties, Operation, ProvisioningRequest, ProvisioningResult, SagaPhase,
};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Reconciles one vector index toward its desired state
pub struct IndexReconciler {
    backend: Arc<dyn BackendAdminClient>,
    poller: ReadinessPoller,
    backoff: BackoffPolicy,
    default_timeout_secs: u64,
}

fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn schema_of(props: &IndexProperties) -> IndexSchema {
    IndexSchema {
        vector_field: props.vector_field.clone(),
        text_field: props.text_field.clone(),
        metadata_field: props.metadata_field.clone(),
        dimension: props.dimension,
    }
}

fn schema_matches(schema: &IndexSchema, props: &IndexProperties) -> bool {
    schema.dimension == props.dimension
        && schema.vector_field == props.vector_field
        && schema.text_field == props.text_field
        && schema.metadata_field == props.metadata_field
}

/// Moves the continuation into `phase`, counting a poll attempt when it
/// is already there
fn step(cont: Continuation, phase: SagaPhase) -> Continuation {
    if cont.phase == phase {
        cont.next_attempt()
    } else {
        cont.advance(phase)
    }
}

impl IndexReconciler {
    pub fn new(backend: Arc<dyn BackendAdminClient>, config: &ReconcilerConfig) -> Self {
        Self {
            poller: ReadinessPoller::new(Arc::clone(&backend)),
            backoff: BackoffPolicy::from_config(config),
            default_timeout_secs: config.default_service_timeout_secs,
            backend,
        }
    }

    /// Runs one invocation against the current wall clock
    pub async fn reconcile(&self, request: &ProvisioningRequest) -> ProvisioningResult {
        self.reconcile_at(request, epoch_now()).await
    }

    /// Clock-explicit entry point; `now` is unix epoch seconds
    pub async fn reconcile_at(&self, request: &ProvisioningRequest, now: u64) -> ProvisioningResult {
        let props = &request.properties;

        let cont = match &request.continuation {
            Some(token) => match Continuation::decode(token) {
                Ok(cont) => cont,
                Err(e) => {
                    return ProvisioningResult::Failed {
                        physical_id: request.physical_id.clone(),
                        reason: format!(
                            "{} of index '{}' failed: {e}",
                            request.operation, props.index_name
                        ),
                    }
                }
            },
            None => {
                let timeout = if props.service_timeout_secs > 0 {
                    props.service_timeout_secs
                } else {
                    self.default_timeout_secs
                };
                Continuation::begin(initial_phase(request.operation), now, timeout)
            }
        };

        // Terminal user errors are caught before any backend call.
        // Deletes skip validation: a rollback must succeed even when the
        // properties that caused it were never valid.
        if request.operation != Operation::Delete {
            if let Err(e) = props.validate() {
                return self.failed(request, &cont, e);
            }
        }

        if cont.expired(now) {
            warn!(operation = %request.operation, index = %props.index_name,
                "Provisioning deadline exceeded");
            return ProvisioningResult::Failed {
                physical_id: cont.physical_id.clone().or_else(|| request.physical_id.clone()),
                reason: format!(
                    "{} of index '{}' timed out waiting for the backend to settle",
                    request.operation, props.index_name
                ),
            };
        }

        let outcome = match request.operation {
            Operation::Create => self.drive_create(request, cont.clone()).await,
            Operation::Update => self.drive_update(request, cont.clone()).await,
            Operation::Delete => self.drive_delete(request, cont.clone()).await,
        };

        match outcome {
            Ok(result) => result,
            Err(e) if e.is_retryable() => {
                debug!(operation = %request.operation, index = %props.index_name,
                    error = %e, "Transient failure; requesting re-invocation");
                let physical_id = cont.physical_id.clone().or_else(|| request.physical_id.clone());
                self.in_progress(physical_id, cont.next_attempt())
            }
            Err(e) => self.failed(request, &cont, e),
        }
    }

    fn failed(
        &self,
        request: &ProvisioningRequest,
        cont: &Continuation,
        err: Error,
    ) -> ProvisioningResult {
        ProvisioningResult::Failed {
            physical_id: cont.physical_id.clone().or_else(|| request.physical_id.clone()),
            reason: format!(
                "{} of index '{}' failed: {err}",
                request.operation, request.properties.index_name
            ),
        }
    }

    fn in_progress(&self, physical_id: Option<String>, cont: Continuation) -> ProvisioningResult {
        let retry_after = self.backoff.delay_for(cont.attempt);
        ProvisioningResult::InProgress {
            physical_id,
            continuation: cont,
            retry_after,
        }
    }

    // ==== Create ====

    async fn drive_create(
        &self,
        request: &ProvisioningRequest,
        cont: Continuation,
    ) -> Result<ProvisioningResult> {
        let props = &request.properties;
        match cont.phase {
            SagaPhase::AwaitIndexPresent | SagaPhase::ReplaceAwaitPresent => {
                self.await_present(props, cont).await
            }
            _ => self.gate_and_create(props, cont, SagaPhase::AwaitIndexPresent).await,
        }
    }

    /// Checks collection readiness and, once active, issues the create.
    /// `on_accept` is the phase to enter after the backend accepts.
    async fn gate_and_create(
        &self,
        props: &IndexProperties,
        cont: Continuation,
        on_accept: SagaPhase,
    ) -> Result<ProvisioningResult> {
        match self.poller.check(&props.collection_id).await? {
            CollectionReadiness::NotReady => {
                info!(collection = %props.collection_id, index = %props.index_name,
                    "Parent collection not ready; deferring create");
                let physical_id = cont.physical_id.clone();
                Ok(self.in_progress(physical_id, cont.next_attempt()))
            }
            CollectionReadiness::Failed(reason) => {
                Err(Error::backend(format!("parent collection unusable: {reason}")))
            }
            CollectionReadiness::Active => {
                let schema = schema_of(props);
                match self
                    .backend
                    .create_index(&props.collection_id, &props.index_name, &schema)
                    .await
                {
                    Ok(()) => {
                        info!(index = %props.index_name, dimension = props.dimension,
                            "Create accepted by backend");
                        let cont = step(cont, on_accept).with_physical_id(props.physical_id());
                        let physical_id = cont.physical_id.clone();
                        Ok(self.in_progress(physical_id, cont))
                    }
                    // Already exists: an earlier retry (or a competing
                    // invocation for the same logical resource) got here
                    // first. Fold into a status check on the next pass.
                    Err(BackendError::Conflict(_)) => {
                        debug!(index = %props.index_name,
                            "Create conflicted; verifying existing index instead");
                        let cont = step(cont, on_accept).with_physical_id(props.physical_id());
                        let physical_id = cont.physical_id.clone();
                        Ok(self.in_progress(physical_id, cont))
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Polls until the index is present with the desired schema
    async fn await_present(
        &self,
        props: &IndexProperties,
        cont: Continuation,
    ) -> Result<ProvisioningResult> {
        match self
            .backend
            .describe_index(&props.collection_id, &props.index_name)
            .await
        {
            Ok(Some(desc)) => match desc.state {
                IndexState::Present => {
                    if schema_matches(&desc.schema, props) {
                        info!(index = %props.index_name, "Index present with desired schema");
                        Ok(ProvisioningResult::Success {
                            physical_id: props.physical_id(),
                        })
                    } else {
                        Err(Error::conflict(format!(
                            "index '{}' already exists with a different schema \
                             (found dimension {}, requested {})",
                            props.index_name, desc.schema.dimension, props.dimension
                        )))
                    }
                }
                IndexState::Creating | IndexState::Deleting => {
                    let cont = cont.next_attempt();
                    let physical_id = cont.physical_id.clone();
                    Ok(self.in_progress(physical_id, cont))
                }
            },
            // The accepted create is not visible (or a competing delete
            // settled); re-issue it under the readiness gate.
            Ok(None) => {
                let phase = cont.phase;
                self.gate_and_create(props, cont, phase).await
            }
            Err(BackendError::IndexNotFound(_)) => {
                let phase = cont.phase;
                self.gate_and_create(props, cont, phase).await
            }
            Err(e) => Err(e.into()),
        }
    }

    // ==== Update ====

    async fn drive_update(
        &self,
        request: &ProvisioningRequest,
        cont: Continuation,
    ) -> Result<ProvisioningResult> {
        let props = &request.properties;
        match cont.phase {
            SagaPhase::ReplaceAwaitDeleted => self.replace_await_deleted(request, cont).await,
            SagaPhase::ReplaceAwaitPresent => self.await_present(props, cont).await,
            _ => {
                let Some(prior) = &request.prior_properties else {
                    // No recorded prior state to diff against: converge
                    // by ensuring the desired index exists.
                    let cont = step(cont, SagaPhase::AwaitIndexPresent)
                        .with_physical_id(props.physical_id());
                    return self.await_present(props, cont).await;
                };

                let changed = props.immutable_changes(prior);
                if changed.is_empty() {
                    // Nothing the backend stores differs. Timeout-hint
                    // changes land here: no call, same physical id.
                    debug!(index = %props.index_name, "Update is a no-op");
                    return Ok(ProvisioningResult::Success {
                        physical_id: props.physical_id(),
                    });
                }

                info!(index = %props.index_name, changed = ?changed,
                    "Immutable properties changed; replacing index");
                self.begin_replace(prior, request, cont).await
            }
        }
    }

    /// Starts the replace saga by deleting the old index. Same-name
    /// indexes cannot coexist, so the create only happens after the old
    /// one is gone.
    async fn begin_replace(
        &self,
        prior: &IndexProperties,
        request: &ProvisioningRequest,
        cont: Continuation,
    ) -> Result<ProvisioningResult> {
        match self
            .backend
            .delete_index(&prior.collection_id, &prior.index_name)
            .await
        {
            Ok(()) => {
                let cont = step(cont, SagaPhase::ReplaceAwaitDeleted);
                Ok(self.in_progress(request.physical_id.clone(), cont))
            }
            // Old index already gone; move straight to the create side.
            Err(BackendError::IndexNotFound(_) | BackendError::CollectionNotFound(_)) => {
                let cont = step(cont, SagaPhase::ReplaceAwaitDeleted);
                Ok(self.in_progress(request.physical_id.clone(), cont))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Waits for the old index to disappear, then creates the new one
    async fn replace_await_deleted(
        &self,
        request: &ProvisioningRequest,
        cont: Continuation,
    ) -> Result<ProvisioningResult> {
        let props = &request.properties;
        let prior = request.prior_properties.as_ref().unwrap_or(props);

        match self
            .backend
            .describe_index(&prior.collection_id, &prior.index_name)
            .await
        {
            Ok(Some(desc)) => {
                if schema_matches(&desc.schema, props) {
                    // The replacement already landed (same name); fall
                    // through to the present check.
                    let cont = step(cont, SagaPhase::ReplaceAwaitPresent)
                        .with_physical_id(props.physical_id());
                    return self.await_present(props, cont).await;
                }
                match desc.state {
                    // Delete was issued but has not registered yet;
                    // re-issuing is idempotent and covers a lost call.
                    IndexState::Present => {
                        match self
                            .backend
                            .delete_index(&prior.collection_id, &prior.index_name)
                            .await
                        {
                            Ok(())
                            | Err(BackendError::IndexNotFound(_)
                            | BackendError::CollectionNotFound(_)) => {
                                let cont = cont.next_attempt();
                                Ok(self.in_progress(request.physical_id.clone(), cont))
                            }
                            Err(e) => Err(e.into()),
                        }
                    }
                    IndexState::Deleting | IndexState::Creating => {
                        let cont = cont.next_attempt();
                        Ok(self.in_progress(request.physical_id.clone(), cont))
                    }
                }
            }
            Ok(None) | Err(BackendError::IndexNotFound(_)) => {
                info!(index = %prior.index_name, "Old index gone; creating replacement");
                let cont = step(cont, SagaPhase::ReplaceAwaitPresent)
                    .with_physical_id(props.physical_id());
                self.gate_and_create(props, cont, SagaPhase::ReplaceAwaitPresent).await
            }
            Err(e) => Err(e.into()),
        }
    }

    // ==== Delete ====

    async fn drive_delete(
        &self,
        request: &ProvisioningRequest,
        cont: Continuation,
    ) -> Result<ProvisioningResult> {
        let props = &request.properties;
        // The recorded properties name the index the physical id refers
        // to; the desired properties are only a fallback.
        let target = request.prior_properties.as_ref().unwrap_or(props);
        let echo_id = request
            .physical_id
            .clone()
            .unwrap_or_else(|| target.physical_id());

        // Delete of a never-provisioned resource is not an error.
        if request.physical_id.is_none() {
            debug!(index = %target.index_name, "Delete without physical id; nothing to do");
            return Ok(ProvisioningResult::Success { physical_id: echo_id });
        }

        // No readiness gate here: if the collection itself is gone or
        // deleting, the index cannot outlive it.
        let desc = match self
            .backend
            .describe_index(&target.collection_id, &target.index_name)
            .await
        {
            Ok(Some(desc)) => desc,
            Ok(None) => {
                return Ok(ProvisioningResult::Success { physical_id: echo_id });
            }
            Err(BackendError::IndexNotFound(_) | BackendError::CollectionNotFound(_)) => {
                return Ok(ProvisioningResult::Success { physical_id: echo_id });
            }
            Err(e) => return Err(e.into()),
        };

        // A replacement already swapped the index under this name; the
        // stale identifier being deleted addresses nothing.
        if !schema_matches(&desc.schema, target) {
            info!(index = %target.index_name,
                "Live index does not match the recorded properties; treating delete as complete");
            return Ok(ProvisioningResult::Success { physical_id: echo_id });
        }

        match desc.state {
            // Mid-creation: wait for the conflicting operation to
            // settle before deleting, bounded by the deadline.
            IndexState::Creating => {
                debug!(index = %target.index_name, "Index still creating; deferring delete");
                let cont = step(cont, SagaPhase::AwaitConflictSettled);
                Ok(self.in_progress(Some(echo_id), cont))
            }
            IndexState::Deleting => {
                let cont = step(cont, SagaPhase::AwaitIndexDeleted);
                Ok(self.in_progress(Some(echo_id), cont))
            }
            IndexState::Present => {
                match self
                    .backend
                    .delete_index(&target.collection_id, &target.index_name)
                    .await
                {
                    Ok(()) => {
                        info!(index = %target.index_name, "Delete accepted by backend");
                        let cont = step(cont, SagaPhase::AwaitIndexDeleted);
                        Ok(self.in_progress(Some(echo_id), cont))
                    }
                    Err(BackendError::IndexNotFound(_) | BackendError::CollectionNotFound(_)) => {
                        Ok(ProvisioningResult::Success { physical_id: echo_id })
                    }
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

fn initial_phase(operation: Operation) -> SagaPhase {
    match operation {
        Operation::Create => SagaPhase::AwaitCollectionActive,
        Operation::Update => SagaPhase::AwaitCollectionActive,
        Operation::Delete => SagaPhase::AwaitIndexDeleted,
    }
}
