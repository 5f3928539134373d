//! Event-to-reconciler adapter

use crate::envelope::{ProvisioningEvent, ProvisioningResponse};
use ossindex_backend::BackendAdminClient;
use ossindex_core::config::ReconcilerConfig;
use ossindex_core::error::{Result, ResultExt};
use ossindex_core::provision::ProvisioningResult;
use ossindex_reconciler::IndexReconciler;
use std::sync::Arc;
use tracing::{info, warn};

/// Handles one provisioning invocation end to end
///
/// Every event produces a well-formed response; malformed input becomes
/// a FAILED response rather than an error, because the deployment
/// engine treats a missing response as a stuck resource.
pub struct InvocationAdapter {
    reconciler: IndexReconciler,
}

impl InvocationAdapter {
    pub fn new(backend: Arc<dyn BackendAdminClient>, config: &ReconcilerConfig) -> Self {
        Self {
            reconciler: IndexReconciler::new(backend, config),
        }
    }

    pub async fn handle(&self, event: ProvisioningEvent) -> ProvisioningResponse {
        let echo_id = event.physical_resource_id.clone();
        let request = match event.into_request() {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "Rejecting malformed provisioning event");
                return ProvisioningResponse::failed(echo_id, e.to_string());
            }
        };

        info!(operation = %request.operation, index = %request.properties.index_name,
            resumed = request.continuation.is_some(), "Handling provisioning event");

        match self.reconciler.reconcile(&request).await {
            ProvisioningResult::Success { physical_id } => {
                ProvisioningResponse::success(physical_id)
            }
            ProvisioningResult::Failed {
                physical_id,
                reason,
            } => ProvisioningResponse::failed(physical_id, reason),
            ProvisioningResult::InProgress {
                physical_id,
                continuation,
                retry_after,
            } => match continuation.encode() {
                Ok(token) => {
                    ProvisioningResponse::in_progress(physical_id, token, retry_after.as_secs())
                }
                Err(e) => ProvisioningResponse::failed(physical_id, e.to_string()),
            },
        }
    }

    /// JSON-in, JSON-out entry point for the binary
    pub async fn handle_json(&self, payload: &str) -> Result<String> {
        let response = match serde_json::from_str::<ProvisioningEvent>(payload) {
            Ok(event) => self.handle(event).await,
            Err(e) => {
                warn!(error = %e, "Provisioning event is not valid JSON");
                ProvisioningResponse::failed(None, format!("malformed provisioning event: {e}"))
            }
        };
        serde_json::to_string_pretty(&response).context("serializing provisioning response")
    }
}
