use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::api::types::{ApiError, ApiRequest};

/// Capability that performs a single HTTP request.
///
/// Implementations must be safe to call many times concurrently and must
/// report every failure, timeouts included, through the returned error.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform(&self, request: ApiRequest) -> Result<Value, ApiError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn perform(&self, request: ApiRequest) -> Result<Value, ApiError> {
        (**self).perform(request).await
    }
}
