use bold::backend::{BackendClient, BackendConfig};
use bold::errors::BackendError;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<BackendClient>,
}

impl AppState {
    pub fn new(config: BackendConfig) -> Result<Self, BackendError> {
        Ok(Self {
            backend: Arc::new(BackendClient::new(config)?),
        })
    }
}
