//! Provisioning event and response envelopes
//!
//! Field names match what the deployment engine sends. Numeric
//! properties arrive stringified (`"1024"`), so the raw types accept
//! either form and parsing failures become terminal invalid-property
//! errors naming the field, never deserialization panics.

use ossindex_core::error::{Error, Result};
use ossindex_core::provision::{IndexProperties, Operation, ProvisioningRequest};
use serde::{Deserialize, Serialize};

/// Inbound provisioning event
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisioningEvent {
    /// "Create", "Update" or "Delete"
    pub request_type: String,

    /// Identifier returned by the last successful operation on this
    /// resource; absent on first create
    #[serde(default)]
    pub physical_resource_id: Option<String>,

    pub resource_properties: RawProperties,

    /// Properties recorded with the prior successful result
    #[serde(default)]
    pub old_resource_properties: Option<RawProperties>,

    /// Opaque marker from a previous in-progress response
    #[serde(default)]
    pub continuation_token: Option<String>,
}

/// Property bag as sent on the wire
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RawProperties {
    pub collection_id: String,
    pub vector_index_name: String,
    pub vector_field: String,
    pub text_field: String,
    pub metadata_field: String,
    pub vector_dimension: Stringy,
    #[serde(default)]
    pub service_timeout: Option<Stringy>,
}

/// A number the engine may have stringified in transit
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Stringy {
    Number(u64),
    Text(String),
}

impl Stringy {
    fn parse(&self, field: &str) -> Result<u64> {
        match self {
            Stringy::Number(n) => Ok(*n),
            Stringy::Text(s) => s.trim().parse::<u64>().map_err(|_| {
                Error::invalid_property(field, format!("must be a positive integer, got '{s}'"))
            }),
        }
    }
}

impl RawProperties {
    pub fn into_properties(self) -> Result<IndexProperties> {
        let dimension = self.vector_dimension.parse("VectorDimension")?;
        let dimension = u32::try_from(dimension)
            .map_err(|_| Error::invalid_property("VectorDimension", "value out of range"))?;
        let service_timeout_secs = match &self.service_timeout {
            Some(value) => value.parse("ServiceTimeout")?,
            None => 180,
        };
        Ok(IndexProperties {
            collection_id: self.collection_id,
            index_name: self.vector_index_name,
            vector_field: self.vector_field,
            text_field: self.text_field,
            metadata_field: self.metadata_field,
            dimension,
            service_timeout_secs,
        })
    }
}

impl ProvisioningEvent {
    pub fn into_request(self) -> Result<ProvisioningRequest> {
        let operation = match self.request_type.as_str() {
            "Create" => Operation::Create,
            "Update" => Operation::Update,
            "Delete" => Operation::Delete,
            other => {
                return Err(Error::invalid_property(
                    "RequestType",
                    format!("must be Create, Update or Delete, got '{other}'"),
                ))
            }
        };
        let properties = self.resource_properties.into_properties()?;
        let prior_properties = self
            .old_resource_properties
            .map(RawProperties::into_properties)
            .transpose()?;
        Ok(ProvisioningRequest {
            operation,
            properties,
            physical_id: self.physical_resource_id,
            prior_properties,
            continuation: self.continuation_token,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    #[serde(rename = "SUCCESS")]
    Success,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "IN_PROGRESS")]
    InProgress,
}

/// Outbound provisioning response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProvisioningResponse {
    pub status: ResponseStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub physical_resource_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continuation_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_seconds: Option<u64>,
}

impl ProvisioningResponse {
    pub fn success(physical_id: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Success,
            physical_resource_id: Some(physical_id.into()),
            reason: None,
            continuation_token: None,
            retry_after_seconds: None,
        }
    }

    pub fn failed(physical_id: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Failed,
            physical_resource_id: physical_id,
            reason: Some(reason.into()),
            continuation_token: None,
            retry_after_seconds: None,
        }
    }

    pub fn in_progress(
        physical_id: Option<String>,
        token: impl Into<String>,
        retry_after_seconds: u64,
    ) -> Self {
        Self {
            status: ResponseStatus::InProgress,
            physical_resource_id: physical_id,
            reason: None,
            continuation_token: Some(token.into()),
            retry_after_seconds: Some(retry_after_seconds),
        }
    }
}
