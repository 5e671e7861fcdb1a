//! HTTP transport interface

use std::future::Future;

use serde_json::Value;

use crate::TransportError;

/// Cookie policy of a callout request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Credentials {
    /// Send cookies with the request
    #[default]
    Include,
    Omit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchOptions {
    pub credentials: Credentials,
}

/// Response whose body has not been read yet
#[trait_variant::make(HttpResponse: Send)]
pub trait LocalHttpResponse {
    async fn text(self) -> Result<String, TransportError>;
}

/// Transport used for callouts and error beacons.
pub trait HttpClient: Send + Sync {
    type Response: HttpResponse;

    /// GET a JSON endpoint
    fn fetch_json(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> impl Future<Output = Result<Self::Response, TransportError>> + Send;

    /// Run a sandboxed-script URI and return the value it produced
    fn fetch_script(&self, uri: &str) -> impl Future<Output = Result<Value, TransportError>> + Send;

    /// Fire-and-forget tracking pixel. Must not block and never reports failure.
    fn send_beacon(&self, url: &str);
}
