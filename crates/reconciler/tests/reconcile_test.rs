//! End-to-end reconciler scenarios against the in-memory fake backend
//!
//! Each scenario drives a full saga the way the deployment engine would:
//! re-invoking with the returned continuation token and a clock advanced
//! by the recommended delay, until a terminal result comes back.

use ossindex_backend::fake::{AdminCall, FakeAdminClient, FakeOp};
use ossindex_backend::{BackendAdminClient, BackendError, CollectionStatus, IndexSchema, IndexState};
use ossindex_core::config::ReconcilerConfig;
use ossindex_core::provision::{
    IndexProperties, Operation, ProvisioningRequest, ProvisioningResult,
};
use ossindex_reconciler::IndexReconciler;
use pretty_assertions::assert_eq;
use std::sync::Arc;

const COLLECTION: &str = "col-123";
const INDEX: &str = "bedrock-knowledge-base-default";

fn props(dimension: u32) -> IndexProperties {
    IndexProperties {
        collection_id: COLLECTION.to_string(),
        index_name: INDEX.to_string(),
        vector_field: "bedrock-knowledge-base-default-vector".to_string(),
        text_field: "AMAZON_BEDROCK_TEXT_CHUNK".to_string(),
        metadata_field: "AMAZON_BEDROCK_METADATA".to_string(),
        dimension,
        service_timeout_secs: 180,
    }
}

fn schema(dimension: u32) -> IndexSchema {
    IndexSchema {
        vector_field: "bedrock-knowledge-base-default-vector".to_string(),
        text_field: "AMAZON_BEDROCK_TEXT_CHUNK".to_string(),
        metadata_field: "AMAZON_BEDROCK_METADATA".to_string(),
        dimension,
    }
}

fn request(operation: Operation, properties: IndexProperties) -> ProvisioningRequest {
    ProvisioningRequest {
        operation,
        properties,
        physical_id: None,
        prior_properties: None,
        continuation: None,
    }
}

fn reconciler(fake: &Arc<FakeAdminClient>) -> IndexReconciler {
    IndexReconciler::new(
        Arc::clone(fake) as Arc<dyn ossindex_backend::BackendAdminClient>,
        &ReconcilerConfig::default(),
    )
}

/// Re-invokes until the saga settles, advancing the clock by the
/// recommended delay each round
async fn drive(
    reconciler: &IndexReconciler,
    mut request: ProvisioningRequest,
    mut now: u64,
) -> ProvisioningResult {
    for _ in 0..20 {
        match reconciler.reconcile_at(&request, now).await {
            ProvisioningResult::InProgress {
                continuation,
                retry_after,
                ..
            } => {
                now += retry_after.as_secs();
                request.continuation = Some(continuation.encode().unwrap());
            }
            terminal => return terminal,
        }
    }
    panic!("saga did not settle within 20 invocations");
}

#[tokio::test]
async fn create_waits_for_collection_before_touching_the_index() {
    let fake = Arc::new(FakeAdminClient::new());
    fake.set_collection(COLLECTION, CollectionStatus::Creating).await;
    let reconciler = reconciler(&fake);

    let mut req = request(Operation::Create, props(1024));
    let result = reconciler.reconcile_at(&req, 1_000).await;

    let ProvisioningResult::InProgress { continuation, .. } = result else {
        panic!("expected in-progress while the collection is creating");
    };
    // Only the readiness check ran; no index call was issued
    assert_eq!(
        fake.calls().await,
        vec![AdminCall::DescribeCollection(COLLECTION.to_string())]
    );

    fake.set_collection(COLLECTION, CollectionStatus::Active).await;
    req.continuation = Some(continuation.encode().unwrap());
    let result = drive(&reconciler, req, 1_005).await;
    assert_eq!(
        result,
        ProvisioningResult::Success {
            physical_id: props(1024).physical_id()
        }
    );
    assert!(fake.has_index(COLLECTION, INDEX).await);
}

#[tokio::test]
async fn create_settles_through_backend_lag() {
    let fake = Arc::new(FakeAdminClient::new());
    fake.set_collection(COLLECTION, CollectionStatus::Active).await;
    fake.set_create_latency(2).await;
    let reconciler = reconciler(&fake);

    let result = drive(&reconciler, request(Operation::Create, props(1024)), 1_000).await;
    assert_eq!(
        result,
        ProvisioningResult::Success {
            physical_id: props(1024).physical_id()
        }
    );
}

#[tokio::test]
async fn retried_create_converges_on_the_same_physical_id() {
    let fake = Arc::new(FakeAdminClient::new());
    fake.set_collection(COLLECTION, CollectionStatus::Active).await;
    let reconciler = reconciler(&fake);

    let first = drive(&reconciler, request(Operation::Create, props(1024)), 1_000).await;
    // A full re-delivery of the same create, with no continuation
    let second = drive(&reconciler, request(Operation::Create, props(1024)), 2_000).await;

    let expected = ProvisioningResult::Success {
        physical_id: props(1024).physical_id(),
    };
    assert_eq!(first, expected);
    assert_eq!(second, expected);
    assert_eq!(fake.max_live_indexes().await, 1);
}

#[tokio::test]
async fn create_fails_when_a_different_schema_occupies_the_name() {
    let fake = Arc::new(FakeAdminClient::new());
    fake.set_collection(COLLECTION, CollectionStatus::Active).await;
    fake.insert_index(COLLECTION, INDEX, schema(1536), IndexState::Present).await;
    let reconciler = reconciler(&fake);

    let result = drive(&reconciler, request(Operation::Create, props(1024)), 1_000).await;
    let ProvisioningResult::Failed { reason, .. } = result else {
        panic!("expected terminal failure on schema conflict");
    };
    assert!(reason.contains(INDEX));
    assert!(reason.contains("different schema"));
}

#[tokio::test]
async fn transient_backend_error_keeps_the_saga_in_progress() {
    let fake = Arc::new(FakeAdminClient::new());
    fake.set_collection(COLLECTION, CollectionStatus::Active).await;
    fake.fail_next(FakeOp::CreateIndex, BackendError::Unavailable("503".to_string())).await;
    let reconciler = reconciler(&fake);

    let result = drive(&reconciler, request(Operation::Create, props(1024)), 1_000).await;
    // The injected failure fires once; the retry succeeds
    assert_eq!(
        result,
        ProvisioningResult::Success {
            physical_id: props(1024).physical_id()
        }
    );
}

#[tokio::test]
async fn invalid_properties_fail_before_any_backend_call() {
    let fake = Arc::new(FakeAdminClient::new());
    let reconciler = reconciler(&fake);

    let mut bad = props(1024);
    bad.dimension = 0;
    let result = reconciler.reconcile_at(&request(Operation::Create, bad), 1_000).await;

    let ProvisioningResult::Failed { reason, .. } = result else {
        panic!("expected terminal failure for invalid properties");
    };
    assert!(reason.contains("VectorDimension"));
    assert!(fake.calls().await.is_empty());
}

#[tokio::test]
async fn create_times_out_when_the_collection_never_activates() {
    let fake = Arc::new(FakeAdminClient::new());
    fake.set_collection(COLLECTION, CollectionStatus::Creating).await;
    let reconciler = reconciler(&fake);

    let result = drive(&reconciler, request(Operation::Create, props(1024)), 1_000).await;
    let ProvisioningResult::Failed { reason, .. } = result else {
        panic!("expected the deadline to produce a terminal failure");
    };
    assert!(reason.contains("timed out"));
    assert!(!fake.has_index(COLLECTION, INDEX).await);
}

#[tokio::test]
async fn create_fails_when_the_collection_is_unusable() {
    let fake = Arc::new(FakeAdminClient::new());
    fake.set_collection(COLLECTION, CollectionStatus::Failed).await;
    let reconciler = reconciler(&fake);

    let result = drive(&reconciler, request(Operation::Create, props(1024)), 1_000).await;
    let ProvisioningResult::Failed { reason, .. } = result else {
        panic!("expected terminal failure for a failed collection");
    };
    assert!(reason.contains(COLLECTION));
}

#[tokio::test]
async fn noop_update_succeeds_without_backend_calls() {
    let fake = Arc::new(FakeAdminClient::new());
    let reconciler = reconciler(&fake);

    let prior = props(1024);
    let mut desired = props(1024);
    desired.service_timeout_secs = 300;

    let mut req = request(Operation::Update, desired.clone());
    req.physical_id = Some(prior.physical_id());
    req.prior_properties = Some(prior.clone());

    let result = reconciler.reconcile_at(&req, 1_000).await;
    assert_eq!(
        result,
        ProvisioningResult::Success {
            physical_id: prior.physical_id()
        }
    );
    assert!(fake.calls().await.is_empty());
}

#[tokio::test]
async fn dimension_change_replaces_the_index_without_overlap() {
    let fake = Arc::new(FakeAdminClient::new());
    fake.set_collection(COLLECTION, CollectionStatus::Active).await;
    fake.insert_index(COLLECTION, INDEX, schema(1024), IndexState::Present).await;
    let reconciler = reconciler(&fake);

    let prior = props(1024);
    let desired = props(1536);
    let mut req = request(Operation::Update, desired.clone());
    req.physical_id = Some(prior.physical_id());
    req.prior_properties = Some(prior.clone());

    // Delete phase still reports the old identifier
    let first = reconciler.reconcile_at(&req, 1_000).await;
    let ProvisioningResult::InProgress { physical_id, continuation, .. } = first else {
        panic!("expected in-progress during the delete phase");
    };
    assert_eq!(physical_id.as_deref(), Some(prior.physical_id().as_str()));

    // Create phase switches to the replacement's identifier
    req.continuation = Some(continuation.encode().unwrap());
    let second = reconciler.reconcile_at(&req, 1_005).await;
    let ProvisioningResult::InProgress { physical_id, continuation, .. } = second else {
        panic!("expected in-progress during the create phase");
    };
    assert_eq!(physical_id.as_deref(), Some(desired.physical_id().as_str()));

    req.continuation = Some(continuation.encode().unwrap());
    let result = drive(&reconciler, req, 1_010).await;
    assert_eq!(
        result,
        ProvisioningResult::Success {
            physical_id: desired.physical_id()
        }
    );
    // Replacement yields a new physical identifier even with the same name
    assert_ne!(prior.physical_id(), desired.physical_id());
    // The old index was gone before the new one was created
    assert_eq!(fake.max_live_indexes().await, 1);
    let calls = fake.calls().await;
    let delete_pos = calls
        .iter()
        .position(|c| matches!(c, AdminCall::DeleteIndex(_)))
        .unwrap();
    let create_pos = calls
        .iter()
        .position(|c| matches!(c, AdminCall::CreateIndex(_)))
        .unwrap();
    assert!(delete_pos < create_pos);
}

#[tokio::test]
async fn update_without_recorded_prior_state_ensures_the_index() {
    let fake = Arc::new(FakeAdminClient::new());
    fake.set_collection(COLLECTION, CollectionStatus::Active).await;
    let reconciler = reconciler(&fake);

    let desired = props(1024);
    let mut req = request(Operation::Update, desired.clone());
    req.physical_id = Some(desired.physical_id());

    let result = drive(&reconciler, req, 1_000).await;
    assert_eq!(
        result,
        ProvisioningResult::Success {
            physical_id: desired.physical_id()
        }
    );
    assert!(fake.has_index(COLLECTION, INDEX).await);
}

#[tokio::test]
async fn delete_of_a_missing_index_succeeds() {
    let fake = Arc::new(FakeAdminClient::new());
    let reconciler = reconciler(&fake);

    let target = props(1024);
    let mut req = request(Operation::Delete, target.clone());
    req.physical_id = Some(target.physical_id());
    req.prior_properties = Some(target.clone());

    let result = reconciler.reconcile_at(&req, 1_000).await;
    assert_eq!(
        result,
        ProvisioningResult::Success {
            physical_id: target.physical_id()
        }
    );
}

#[tokio::test]
async fn delete_without_a_physical_id_is_a_noop() {
    let fake = Arc::new(FakeAdminClient::new());
    let reconciler = reconciler(&fake);

    let result = reconciler
        .reconcile_at(&request(Operation::Delete, props(1024)), 1_000)
        .await;
    assert!(matches!(result, ProvisioningResult::Success { .. }));
    assert!(fake.calls().await.is_empty());
}

#[tokio::test]
async fn delete_waits_for_an_in_flight_create_to_settle() {
    let fake = Arc::new(FakeAdminClient::new());
    fake.set_collection(COLLECTION, CollectionStatus::Active).await;
    fake.set_create_latency(3).await;
    fake.create_index(COLLECTION, INDEX, &schema(1024)).await.unwrap();
    fake.clear_calls().await;
    let reconciler = reconciler(&fake);

    let target = props(1024);
    let mut req = request(Operation::Delete, target.clone());
    req.physical_id = Some(target.physical_id());
    req.prior_properties = Some(target.clone());

    let result = drive(&reconciler, req, 1_000).await;
    assert_eq!(
        result,
        ProvisioningResult::Success {
            physical_id: target.physical_id()
        }
    );
    assert!(!fake.has_index(COLLECTION, INDEX).await);
    // The delete call only went out once the index had settled
    let calls = fake.calls().await;
    let delete_pos = calls
        .iter()
        .position(|c| matches!(c, AdminCall::DeleteIndex(_)))
        .unwrap();
    assert!(delete_pos >= 3);
}

#[tokio::test]
async fn delete_with_a_stale_physical_id_leaves_the_replacement_alone() {
    let fake = Arc::new(FakeAdminClient::new());
    // The name is now occupied by a replacement with a different schema
    fake.insert_index(COLLECTION, INDEX, schema(1536), IndexState::Present).await;
    let reconciler = reconciler(&fake);

    let recorded = props(1024);
    let mut req = request(Operation::Delete, recorded.clone());
    req.physical_id = Some(recorded.physical_id());
    req.prior_properties = Some(recorded.clone());

    let result = reconciler.reconcile_at(&req, 1_000).await;
    assert_eq!(
        result,
        ProvisioningResult::Success {
            physical_id: recorded.physical_id()
        }
    );
    assert!(fake.has_index(COLLECTION, INDEX).await);
}

#[tokio::test]
async fn delete_ignores_collection_readiness() {
    let fake = Arc::new(FakeAdminClient::new());
    // Collection unregistered entirely; delete must still settle
    fake.insert_index(COLLECTION, INDEX, schema(1024), IndexState::Present).await;
    let reconciler = reconciler(&fake);

    let target = props(1024);
    let mut req = request(Operation::Delete, target.clone());
    req.physical_id = Some(target.physical_id());
    req.prior_properties = Some(target.clone());

    let result = drive(&reconciler, req, 1_000).await;
    assert!(matches!(result, ProvisioningResult::Success { .. }));
    assert!(!fake.has_index(COLLECTION, INDEX).await);
    assert!(!fake
        .calls()
        .await
        .iter()
        .any(|c| matches!(c, AdminCall::DescribeCollection(_))));
}

#[tokio::test]
async fn corrupt_continuation_token_fails_terminally() {
    let fake = Arc::new(FakeAdminClient::new());
    let reconciler = reconciler(&fake);

    let mut req = request(Operation::Create, props(1024));
    req.continuation = Some("{not a token".to_string());

    let result = reconciler.reconcile_at(&req, 1_000).await;
    let ProvisioningResult::Failed { reason, .. } = result else {
        panic!("expected terminal failure for a corrupt token");
    };
    assert!(reason.contains(INDEX));
    assert!(fake.calls().await.is_empty());
}
