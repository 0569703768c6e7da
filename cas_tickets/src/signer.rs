//! The hook through which a dispatch layer authenticates outgoing requests

use std::{error, sync::Arc};

use async_trait::async_trait;

/// Authenticates an outgoing request immediately before it is sent
#[async_trait]
pub trait RequestSigner: Send + Sync {
    /// The error type returned in the event that signing fails
    type Error: error::Error + Send + Sync + 'static;

    /// Attaches authentication to the request
    async fn sign(&self, request: reqwest::Request) -> Result<reqwest::Request, Self::Error>;
}

#[async_trait]
impl<S: RequestSigner + ?Sized> RequestSigner for Arc<S> {
    type Error = S::Error;

    async fn sign(&self, request: reqwest::Request) -> Result<reqwest::Request, Self::Error> {
        (**self).sign(request).await
    }
}
