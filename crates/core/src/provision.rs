//! Provisioning domain model
//!
//! Value types exchanged between the invocation adapter and the index
//! reconciler: the desired-state request, the per-invocation result, and
//! the continuation marker that carries saga state across invocations.
//!
//! Nothing in this module talks to the backend. The controller holds no
//! state between invocations; everything needed to resume a multi-step
//! operation lives in [`Continuation`] and the physical identifier.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Namespace for deriving deterministic physical identifiers (UUIDv5)
const PHYSICAL_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x8f, 0x2b, 0x4c, 0x1d, 0x5e, 0x6a, 0x47, 0x3b, 0x9c, 0x0d, 0x1e, 0x2f, 0x3a, 0x4b, 0x5c, 0x6d,
]);

/// Largest vector dimension the backend accepts for a k-NN field
const MAX_VECTOR_DIMENSION: u32 = 16_000;

/// Upper bound for the caller-supplied service timeout hint (seconds)
const MAX_SERVICE_TIMEOUT_SECS: u64 = 3_600;

/// Requested operation on the index resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Create => write!(f, "create"),
            Operation::Update => write!(f, "update"),
            Operation::Delete => write!(f, "delete"),
        }
    }
}

/// Desired properties of a vector index
///
/// Identity is `collection_id` + `index_name`. The dimension and the
/// three field names are immutable once the index exists: the backend
/// cannot change a k-NN mapping in place, so any change to them is a
/// replacement, never an in-place update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexProperties {
    /// Identifier of the parent collection
    pub collection_id: String,

    /// Index name, unique within the collection
    pub index_name: String,

    /// Name of the k-NN vector field
    pub vector_field: String,

    /// Name of the text chunk field
    pub text_field: String,

    /// Name of the metadata field
    pub metadata_field: String,

    /// Vector dimension (positive)
    pub dimension: u32,

    /// Overall provisioning deadline hint, in seconds. Not a backend
    /// property; changing it never touches the index.
    #[serde(default = "default_service_timeout_secs")]
    pub service_timeout_secs: u64,
}

pub(crate) fn default_service_timeout_secs() -> u64 {
    180
}

impl IndexProperties {
    /// Validates all properties, naming the offending field on failure
    pub fn validate(&self) -> Result<()> {
        if self.collection_id.trim().is_empty() {
            return Err(Error::invalid_property(
                "CollectionId",
                "must not be empty",
            ));
        }
        validate_name("VectorIndexName", &self.index_name)?;
        validate_field("VectorField", &self.vector_field)?;
        validate_field("TextField", &self.text_field)?;
        validate_field("MetadataField", &self.metadata_field)?;
        if self.dimension == 0 {
            return Err(Error::invalid_property(
                "VectorDimension",
                "must be a positive integer",
            ));
        }
        if self.dimension > MAX_VECTOR_DIMENSION {
            return Err(Error::invalid_property(
                "VectorDimension",
                format!("must not exceed {MAX_VECTOR_DIMENSION}"),
            ));
        }
        if self.service_timeout_secs == 0 || self.service_timeout_secs > MAX_SERVICE_TIMEOUT_SECS {
            return Err(Error::invalid_property(
                "ServiceTimeout",
                format!("must be between 1 and {MAX_SERVICE_TIMEOUT_SECS} seconds"),
            ));
        }
        Ok(())
    }

    /// Derives the stable physical identifier for these properties.
    ///
    /// The identifier is a UUIDv5 over the immutable properties, so a
    /// retried create with identical properties addresses the same
    /// physical resource, while a change to any immutable property
    /// yields a distinct identifier (signalling replacement to the
    /// deployment engine even when the index name is unchanged).
    pub fn physical_id(&self) -> String {
        let canonical = format!(
            "collection/{}/index/{}/dim/{}/v/{}/t/{}/m/{}",
            self.collection_id,
            self.index_name,
            self.dimension,
            self.vector_field,
            self.text_field,
            self.metadata_field,
        );
        let id = Uuid::new_v5(&PHYSICAL_ID_NAMESPACE, canonical.as_bytes());
        format!("{}-{}", self.index_name, id)
    }

    /// Names of immutable properties that differ from `prior`.
    ///
    /// A non-empty result means the index must be replaced; there is no
    /// in-place path for any of these.
    pub fn immutable_changes(&self, prior: &Self) -> Vec<&'static str> {
        let mut changed = Vec::new();
        if self.collection_id != prior.collection_id {
            changed.push("CollectionId");
        }
        if self.index_name != prior.index_name {
            changed.push("VectorIndexName");
        }
        if self.vector_field != prior.vector_field {
            changed.push("VectorField");
        }
        if self.text_field != prior.text_field {
            changed.push("TextField");
        }
        if self.metadata_field != prior.metadata_field {
            changed.push("MetadataField");
        }
        if self.dimension != prior.dimension {
            changed.push("VectorDimension");
        }
        changed
    }
}

fn validate_name(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::invalid_property(field, "must not be empty"));
    }
    if value.len() > 255 {
        return Err(Error::invalid_property(field, "must not exceed 255 bytes"));
    }
    if value.starts_with(['-', '_', '.']) {
        return Err(Error::invalid_property(
            field,
            "must not start with '-', '_' or '.'",
        ));
    }
    if !value
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.'))
    {
        return Err(Error::invalid_property(
            field,
            "must contain only lowercase letters, digits, '-', '_' or '.'",
        ));
    }
    Ok(())
}

fn validate_field(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::invalid_property(field, "must not be empty"));
    }
    if value.contains(char::is_whitespace) {
        return Err(Error::invalid_property(field, "must not contain whitespace"));
    }
    Ok(())
}

/// Desired-state request, immutable for the duration of one invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisioningRequest {
    pub operation: Operation,

    /// Desired properties snapshot
    pub properties: IndexProperties,

    /// Physical identifier returned by the last successful operation.
    /// Absent on first create.
    pub physical_id: Option<String>,

    /// Properties recorded with the prior successful result
    /// (update/delete only)
    pub prior_properties: Option<IndexProperties>,

    /// Opaque continuation marker from a previous in-progress result
    pub continuation: Option<String>,
}

/// Terminal or non-terminal outcome of a single invocation
///
/// Constructed fresh per invocation and never persisted by the
/// controller; the deployment engine owns whatever retry bookkeeping it
/// needs.
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisioningResult {
    /// Desired state reached
    Success { physical_id: String },

    /// Terminal failure; `reason` carries resource name, operation and
    /// backend error text
    Failed {
        physical_id: Option<String>,
        reason: String,
    },

    /// Re-invoke with the same request plus the continuation marker
    /// after roughly `retry_after`
    InProgress {
        physical_id: Option<String>,
        continuation: Continuation,
        retry_after: Duration,
    },
}

impl ProvisioningResult {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::InProgress { .. })
    }

    /// Physical identifier, if one has been assigned
    pub fn physical_id(&self) -> Option<&str> {
        match self {
            Self::Success { physical_id } => Some(physical_id),
            Self::Failed { physical_id, .. } | Self::InProgress { physical_id, .. } => {
                physical_id.as_deref()
            }
        }
    }
}

/// Position in a multi-invocation saga
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SagaPhase {
    /// Waiting for the parent collection to become active before any
    /// index call is issued
    AwaitCollectionActive,

    /// Create issued; waiting for the backend to report the index present
    AwaitIndexPresent,

    /// Delete requested while the index is still materializing; waiting
    /// for the conflicting operation to settle
    AwaitConflictSettled,

    /// Delete issued; waiting for the backend to report the index gone
    AwaitIndexDeleted,

    /// Replacement: waiting for the old index to be gone
    ReplaceAwaitDeleted,

    /// Replacement: new index created, waiting for it to be present
    ReplaceAwaitPresent,
}

/// State needed to resume a saga, round-tripped through the caller
///
/// Serialized to an opaque JSON token in the response envelope. The
/// deadline is absolute so it survives arbitrary gaps between
/// invocations; the attempt counter drives the backoff policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Continuation {
    pub phase: SagaPhase,

    /// Physical identifier assigned so far, if any
    pub physical_id: Option<String>,

    /// Consecutive polls in the current phase
    pub attempt: u32,

    /// Absolute provisioning deadline (unix epoch seconds)
    pub deadline_epoch_secs: u64,
}

impl Continuation {
    /// Starts a fresh saga in `phase` with a deadline `timeout_secs`
    /// from `now`
    pub fn begin(phase: SagaPhase, now_epoch_secs: u64, timeout_secs: u64) -> Self {
        Self {
            phase,
            physical_id: None,
            attempt: 0,
            deadline_epoch_secs: now_epoch_secs.saturating_add(timeout_secs),
        }
    }

    /// Same phase, one more poll
    pub fn next_attempt(mut self) -> Self {
        self.attempt = self.attempt.saturating_add(1);
        self
    }

    /// Moves to a new phase, resetting the poll counter
    pub fn advance(mut self, phase: SagaPhase) -> Self {
        self.phase = phase;
        self.attempt = 0;
        self
    }

    pub fn with_physical_id(mut self, physical_id: impl Into<String>) -> Self {
        self.physical_id = Some(physical_id.into());
        self
    }

    pub fn expired(&self, now_epoch_secs: u64) -> bool {
        now_epoch_secs >= self.deadline_epoch_secs
    }

    /// Encodes to the opaque token carried in the response envelope
    pub fn encode(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::CorruptContinuation(e.to_string()))
    }

    /// Decodes a token previously produced by [`Continuation::encode`]
    pub fn decode(token: &str) -> Result<Self> {
        serde_json::from_str(token).map_err(|e| Error::CorruptContinuation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn props() -> IndexProperties {
        IndexProperties {
            collection_id: "col-123".to_string(),
            index_name: "bedrock-knowledge-base-default".to_string(),
            vector_field: "bedrock-knowledge-base-default-vector".to_string(),
            text_field: "AMAZON_BEDROCK_TEXT_CHUNK".to_string(),
            metadata_field: "AMAZON_BEDROCK_METADATA".to_string(),
            dimension: 1024,
            service_timeout_secs: 180,
        }
    }

    #[test]
    fn physical_id_is_deterministic() {
        assert_eq!(props().physical_id(), props().physical_id());
    }

    #[test]
    fn physical_id_changes_with_dimension() {
        let mut other = props();
        other.dimension = 1536;
        assert_ne!(props().physical_id(), other.physical_id());
        // Name prefix survives for operator readability
        assert!(other.physical_id().starts_with("bedrock-knowledge-base-default-"));
    }

    #[test]
    fn validate_accepts_the_default_deployment() {
        assert!(props().validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_dimension() {
        let mut p = props();
        p.dimension = 0;
        let err = p.validate().unwrap_err();
        assert!(err.to_string().contains("VectorDimension"));
    }

    #[test]
    fn validate_rejects_bad_index_name() {
        let mut p = props();
        p.index_name = "_leading-underscore".to_string();
        assert!(p.validate().unwrap_err().to_string().contains("VectorIndexName"));

        p.index_name = "Upper-Case".to_string();
        assert!(p.validate().unwrap_err().to_string().contains("VectorIndexName"));
    }

    #[test]
    fn validate_rejects_empty_fields() {
        let mut p = props();
        p.metadata_field = String::new();
        assert!(p.validate().unwrap_err().to_string().contains("MetadataField"));
    }

    #[test]
    fn immutable_changes_lists_differing_fields() {
        let prior = props();
        let mut desired = props();
        assert!(desired.immutable_changes(&prior).is_empty());

        desired.dimension = 1536;
        desired.text_field = "chunk".to_string();
        assert_eq!(
            desired.immutable_changes(&prior),
            vec!["TextField", "VectorDimension"]
        );
    }

    #[test]
    fn timeout_hint_is_not_part_of_identity() {
        let prior = props();
        let mut desired = props();
        desired.service_timeout_secs = 300;
        assert!(desired.immutable_changes(&prior).is_empty());
        assert_eq!(prior.physical_id(), desired.physical_id());
    }

    #[test]
    fn continuation_round_trips() {
        let cont = Continuation::begin(SagaPhase::AwaitIndexPresent, 1_000, 180)
            .with_physical_id("idx-abc")
            .next_attempt();
        let token = cont.encode().unwrap();
        assert_eq!(Continuation::decode(&token).unwrap(), cont);
    }

    #[test]
    fn continuation_decode_rejects_garbage() {
        assert!(matches!(
            Continuation::decode("not json"),
            Err(crate::error::Error::CorruptContinuation(_))
        ));
    }

    #[test]
    fn continuation_deadline() {
        let cont = Continuation::begin(SagaPhase::AwaitCollectionActive, 1_000, 180);
        assert!(!cont.expired(1_179));
        assert!(cont.expired(1_180));
        assert!(cont.expired(5_000));
    }

    #[test]
    fn advance_resets_attempts() {
        let cont = Continuation::begin(SagaPhase::AwaitCollectionActive, 0, 60)
            .next_attempt()
            .next_attempt();
        assert_eq!(cont.attempt, 2);
        let cont = cont.advance(SagaPhase::AwaitIndexPresent);
        assert_eq!(cont.attempt, 0);
        assert_eq!(cont.phase, SagaPhase::AwaitIndexPresent);
    }
}
