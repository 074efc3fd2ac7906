use std::sync::Arc;

use crate::intercept::InterceptorChain;
use crate::storage::gateway::StorageGateway;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// Flat file store; holds the storage key when encryption is enabled
    pub gateway: Arc<StorageGateway>,
    /// Interceptors run around every request (logging, authentication)
    pub interceptors: Arc<InterceptorChain>,
    /// Request body limit for uploads, in bytes
    pub max_upload_bytes: usize,
}
