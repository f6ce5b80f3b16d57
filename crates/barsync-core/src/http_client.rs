//! Thin HTTP seam used by REST source adapters.
//!
//! Only GET is needed; the trait exists so adapter logic can be tested with
//! canned responses instead of a live endpoint.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("http transport error: {0}")]
    Transport(String),

    #[error("http request timed out after {0:?}")]
    Timeout(Duration),
}

/// A GET request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub timeout: Duration,
    pub bearer_token: Option<String>,
}

impl HttpRequest {
    #[must_use]
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
            bearer_token: None,
        }
    }

    #[must_use]
    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

pub trait HttpClient: Send + Sync {
    fn get<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>>;
}

/// Production client backed by `reqwest`.
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// # Errors
    /// Fails when the underlying client cannot be constructed.
    pub fn new() -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|error| HttpError::Transport(error.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for ReqwestHttpClient {
    fn get<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        Box::pin(async move {
            let mut builder = self.client.get(&request.url).timeout(request.timeout);
            if let Some(token) = &request.bearer_token {
                builder = builder.bearer_auth(token);
            }

            let response = builder.send().await.map_err(|error| {
                if error.is_timeout() {
                    HttpError::Timeout(request.timeout)
                } else {
                    HttpError::Transport(error.to_string())
                }
            })?;

            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .map_err(|error| HttpError::Transport(error.to_string()))?;
            Ok(HttpResponse { status, body })
        })
    }
}

/// Test double that serves canned responses keyed by exact URL.
#[derive(Default)]
pub struct StaticHttpClient {
    responses: Mutex<HashMap<String, HttpResponse>>,
}

impl StaticHttpClient {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stub(&self, url: impl Into<String>, status: u16, body: impl Into<String>) {
        self.responses
            .lock()
            .expect("stub response map mutex poisoned")
            .insert(
                url.into(),
                HttpResponse {
                    status,
                    body: body.into(),
                },
            );
    }
}

impl HttpClient for StaticHttpClient {
    fn get<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = self
            .responses
            .lock()
            .expect("stub response map mutex poisoned")
            .get(&request.url)
            .cloned();
        Box::pin(async move {
            response.ok_or_else(|| HttpError::Transport(format!("no stub for {}", request.url)))
        })
    }
}
