//! HTTP admin client for an OpenSearch-compatible collection endpoint
//!
//! Index operations go to the collection's data-plane endpoint
//! (`PUT /{index}`, `GET /{index}`, `DELETE /{index}`,
//! `PUT /{index}/_mapping`). Collection status comes from the
//! control-plane `BatchGetCollection` call.

use crate::{BackendAdminClient, BackendError, CollectionStatus, IndexDescription, IndexSchema, IndexState};
use async_trait::async_trait;
use ossindex_core::config::BackendConfig;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

/// Request payload for the control-plane collection lookup
#[derive(Debug, Serialize)]
struct BatchGetCollectionRequest<'a> {
    ids: [&'a str; 1],
}

/// Response from the control-plane collection lookup
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BatchGetCollectionResponse {
    #[serde(default)]
    collection_details: Vec<CollectionDetail>,
}

#[derive(Debug, Deserialize)]
struct CollectionDetail {
    id: String,
    status: String,
}

/// HTTP admin client
pub(crate) struct HttpAdminClient {
    client: Client,
    endpoint: String,
    control_endpoint: String,
    api_token: Option<String>,
}

impl HttpAdminClient {
    /// Creates a client from backend configuration
    pub fn new(config: &BackendConfig) -> Result<Self, BackendError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| BackendError::Api(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            control_endpoint: config.control_endpoint().trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    fn index_url(&self, name: &str) -> String {
        format!("{}/{}", self.endpoint, name)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => req.header("Authorization", format!("Bearer {token}")),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, BackendError> {
        self.authorized(req).send().await.map_err(|e| {
            if e.is_timeout() || e.is_connect() {
                BackendError::Unavailable(format!("request failed: {e}"))
            } else {
                BackendError::Api(format!("request failed: {e}"))
            }
        })
    }

    /// Maps a non-success response to a classified error
    async fn classify_failure(response: Response) -> BackendError {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error response".to_string());
        classify_status(status, &body)
    }
}

/// Classifies an HTTP status plus error body into a [`BackendError`]
fn classify_status(status: StatusCode, body: &str) -> BackendError {
    if body.contains("resource_already_exists_exception") {
        return BackendError::Conflict(format!("{status}: {body}"));
    }
    match status {
        StatusCode::NOT_FOUND => BackendError::IndexNotFound(body.to_string()),
        StatusCode::CONFLICT => BackendError::Conflict(format!("{status}: {body}")),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            BackendError::InvalidRequest(format!("{status}: {body}"))
        }
        StatusCode::TOO_MANY_REQUESTS
        | StatusCode::INTERNAL_SERVER_ERROR
        | StatusCode::BAD_GATEWAY
        | StatusCode::SERVICE_UNAVAILABLE
        | StatusCode::GATEWAY_TIMEOUT => BackendError::Unavailable(format!("{status}: {body}")),
        _ => BackendError::Api(format!("{status}: {body}")),
    }
}

/// Builds the index creation body with a k-NN mapping for the schema
fn create_index_body(schema: &IndexSchema) -> Value {
    json!({
        "settings": {
            "index.knn": true
        },
        "mappings": {
            "properties": {
                (schema.vector_field.as_str()): {
                    "type": "knn_vector",
                    "dimension": schema.dimension,
                    "method": {
                        "name": "hnsw",
                        "engine": "faiss",
                        "space_type": "l2"
                    }
                },
                (schema.text_field.as_str()): {
                    "type": "text"
                },
                (schema.metadata_field.as_str()): {
                    "type": "text",
                    "index": false
                }
            }
        }
    })
}

/// Extracts an [`IndexSchema`] from a `GET /{index}` response body
///
/// The vector field is the `knn_vector` property; among the text
/// properties, the unindexed one is the metadata field.
fn parse_index_schema(name: &str, body: &Value) -> Result<IndexSchema, BackendError> {
    let properties = body
        .get(name)
        .and_then(|idx| idx.get("mappings"))
        .and_then(|m| m.get("properties"))
        .and_then(Value::as_object)
        .ok_or_else(|| {
            BackendError::Api(format!("describe response for '{name}' has no mappings"))
        })?;

    let mut vector_field = None;
    let mut dimension = None;
    let mut text_field = None;
    let mut metadata_field = None;

    for (field, mapping) in properties {
        match mapping.get("type").and_then(Value::as_str) {
            Some("knn_vector") => {
                vector_field = Some(field.clone());
                dimension = mapping.get("dimension").and_then(Value::as_u64);
            }
            Some("text") => {
                let indexed = mapping
                    .get("index")
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                if indexed {
                    text_field = Some(field.clone());
                } else {
                    metadata_field = Some(field.clone());
                }
            }
            _ => {}
        }
    }

    match (vector_field, dimension, text_field, metadata_field) {
        (Some(vector_field), Some(dimension), Some(text_field), Some(metadata_field)) => {
            Ok(IndexSchema {
                vector_field,
                text_field,
                metadata_field,
                dimension: dimension as u32,
            })
        }
        _ => Err(BackendError::Api(format!(
            "index '{name}' does not carry the expected vector mapping"
        ))),
    }
}

fn parse_collection_status(status: &str) -> Result<CollectionStatus, BackendError> {
    match status {
        "CREATING" => Ok(CollectionStatus::Creating),
        "ACTIVE" => Ok(CollectionStatus::Active),
        "FAILED" => Ok(CollectionStatus::Failed),
        "DELETING" => Ok(CollectionStatus::Deleting),
        "DELETED" => Ok(CollectionStatus::Deleted),
        other => Err(BackendError::Api(format!(
            "unrecognized collection status '{other}'"
        ))),
    }
}

#[async_trait]
impl BackendAdminClient for HttpAdminClient {
    async fn describe_collection(
        &self,
        collection_id: &str,
    ) -> Result<CollectionStatus, BackendError> {
        let url = format!("{}/BatchGetCollection", self.control_endpoint);
        let payload = BatchGetCollectionRequest {
            ids: [collection_id],
        };

        let response = self.send(self.client.post(&url).json(&payload)).await?;
        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }

        let parsed: BatchGetCollectionResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Api(format!("invalid BatchGetCollection response: {e}")))?;

        let detail = parsed
            .collection_details
            .into_iter()
            .find(|d| d.id == collection_id)
            .ok_or_else(|| BackendError::CollectionNotFound(collection_id.to_string()))?;

        debug!(collection = %collection_id, status = %detail.status, "Described collection");
        parse_collection_status(&detail.status)
    }

    async fn create_index(
        &self,
        collection_id: &str,
        name: &str,
        schema: &IndexSchema,
    ) -> Result<(), BackendError> {
        let body = create_index_body(schema);
        let response = self
            .send(self.client.put(self.index_url(name)).json(&body))
            .await?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }
        debug!(collection = %collection_id, index = %name, dimension = schema.dimension,
            "Create index accepted");
        Ok(())
    }

    async fn describe_index(
        &self,
        collection_id: &str,
        name: &str,
    ) -> Result<Option<IndexDescription>, BackendError> {
        let response = self.send(self.client.get(self.index_url(name))).await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(collection = %collection_id, index = %name, "Index not present");
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| BackendError::Api(format!("invalid describe response: {e}")))?;
        let schema = parse_index_schema(name, &body)?;

        // The data plane only answers for fully materialized indexes;
        // anything readable here is present.
        Ok(Some(IndexDescription {
            name: name.to_string(),
            state: IndexState::Present,
            schema,
        }))
    }

    async fn update_index(
        &self,
        collection_id: &str,
        name: &str,
        schema: &IndexSchema,
    ) -> Result<(), BackendError> {
        let body = json!({
            "properties": {
                (schema.text_field.as_str()): { "type": "text" },
                (schema.metadata_field.as_str()): { "type": "text", "index": false }
            }
        });
        let url = format!("{}/_mapping", self.index_url(name));
        let response = self.send(self.client.put(&url).json(&body)).await?;

        if !response.status().is_success() {
            return Err(Self::classify_failure(response).await);
        }
        debug!(collection = %collection_id, index = %name, "Mapping update accepted");
        Ok(())
    }

    async fn delete_index(&self, collection_id: &str, name: &str) -> Result<(), BackendError> {
        let response = self.send(self.client.delete(self.index_url(name))).await?;

        if !response.status().is_success() {
            if response.status() == StatusCode::NOT_FOUND {
                warn!(collection = %collection_id, index = %name,
                    "Delete requested for an index that is already gone");
                return Err(BackendError::IndexNotFound(name.to_string()));
            }
            return Err(Self::classify_failure(response).await);
        }
        debug!(collection = %collection_id, index = %name, "Delete index accepted");
        Ok(())
    }
}
