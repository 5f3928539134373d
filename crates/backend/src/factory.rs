use crate::fake::FakeAdminClient;
use crate::http::HttpAdminClient;
use crate::BackendAdminClient;
use ossindex_core::{config::BackendConfig, Error};
use std::sync::Arc;

/// Creates a backend admin client based on configuration.
///
/// Returns a trait object so the reconciler is indifferent to whether it
/// drives a live collection endpoint or the in-memory fake.
///
/// # Errors
/// Returns an error if the provider is unknown or the HTTP client cannot
/// be constructed.
pub fn create_admin_client(config: &BackendConfig) -> Result<Arc<dyn BackendAdminClient>, Error> {
    match config.provider.as_str() {
        "http" => {
            let client = HttpAdminClient::new(config)?;
            Ok(Arc::new(client) as Arc<dyn BackendAdminClient>)
        }
        "fake" => Ok(Arc::new(FakeAdminClient::new()) as Arc<dyn BackendAdminClient>),
        other => Err(Error::config(format!(
            "Unknown backend provider '{other}': expected 'http' or 'fake'"
        ))),
    }
}
