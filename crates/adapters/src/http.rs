//! reqwest-backed transport

use std::future::Future;
use std::time::Duration;

use contracts::{Credentials, FetchOptions, HttpClient, HttpResponse, TransportError};
use reqwest::header::{ACCEPT, COOKIE};
use serde_json::Value;
use tracing::{debug, warn};

/// Upper bound for a single request. Callout deadlines are enforced by the dispatcher;
/// this only keeps detached beacons from hanging forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
    /// Sent with callouts whose credentials mode is `Include`
    cookie: Option<String>,
}

impl ReqwestHttpClient {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Network(format!("failed to build http client: {e}")))?;
        Ok(Self::from_client(client))
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            cookie: None,
        }
    }

    pub fn with_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }
}

pub struct ReqwestResponse(reqwest::Response);

impl HttpResponse for ReqwestResponse {
    async fn text(self) -> Result<String, TransportError> {
        self.0.text().await.map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Network(e.to_string())
    }
}

impl HttpClient for ReqwestHttpClient {
    type Response = ReqwestResponse;

    fn fetch_json(
        &self,
        url: &str,
        options: FetchOptions,
    ) -> impl Future<Output = Result<Self::Response, TransportError>> + Send {
        let mut request = self.client.get(url).header(ACCEPT, "application/json");
        if options.credentials == Credentials::Include {
            if let Some(cookie) = &self.cookie {
                request = request.header(COOKIE, cookie.as_str());
            }
        }

        async move {
            let response = request.send().await.map_err(map_reqwest_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(TransportError::Status {
                    status: status.as_u16(),
                });
            }
            Ok(ReqwestResponse(response))
        }
    }

    fn fetch_script(&self, uri: &str) -> impl Future<Output = Result<Value, TransportError>> + Send {
        let uri = uri.to_string();
        async move { Err(TransportError::ScriptUnavailable { uri }) }
    }

    fn send_beacon(&self, url: &str) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(url = %url, "No async runtime, error beacon dropped");
            return;
        };

        let request = self.client.get(url);
        let url = url.to_string();
        handle.spawn(async move {
            match request.send().await {
                Ok(response) => debug!(url = %url, status = %response.status(), "Error beacon sent"),
                Err(e) => debug!(url = %url, error = %e, "Error beacon failed"),
            }
        });
    }
}
