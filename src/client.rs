//! Authenticated HTTP client for the Xiaofubao API.
//!
//! Wraps `reqwest` with the service's conventions: an optional
//! cookie-style session credential, the envelope status check, and a
//! four-way failure classification (transport, HTTP status, decode,
//! application). Retry policy deliberately lives with the callers — the
//! lifecycle and the feed watcher have different cadences, so this layer
//! never retries.

use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, COOKIE};

use crate::config;
use crate::envelope::ApiResponse;
use crate::error::{Result, XfbError};
use crate::models::SessionToken;

/// Name of the session cookie the service authenticates by.
const SESSION_COOKIE: &str = "shiroJID";

/// Builder for constructing an [`XfbClient`].
#[derive(Debug, Default)]
pub struct XfbClientBuilder {
    /// Base URL override (for testing).
    base_url: Option<String>,
}

impl XfbClientBuilder {
    /// Overrides the base URL (useful for testing with a mock server).
    #[inline]
    #[must_use]
    pub fn base_url<T: Into<String>>(mut self, url: T) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// Returns [`XfbError::Transport`] if the HTTP client fails to build.
    #[inline]
    pub fn build(self) -> Result<XfbClient> {
        let base_url = self
            .base_url
            .unwrap_or_else(|| config::WEBAPP_BASE_URL.to_owned());
        let http = reqwest::Client::builder().build()?;

        Ok(XfbClient { http, base_url })
    }
}

/// Async client for the Xiaofubao web-app API.
///
/// Use [`XfbClient::builder()`] to construct an instance. The client is
/// cheap to clone; the session credential is passed per call, mirroring
/// the remote system's stateless cookie scheme.
#[derive(Debug, Clone)]
pub struct XfbClient {
    /// Underlying HTTP client.
    http: reqwest::Client,
    /// API base URL.
    base_url: String,
}

impl XfbClient {
    /// Creates a new builder for configuring the client.
    #[inline]
    #[must_use]
    pub const fn builder() -> XfbClientBuilder {
        XfbClientBuilder { base_url: None }
    }

    /// Sends an authenticated GET request and decodes the envelope.
    ///
    /// # Errors
    ///
    /// Returns the most specific of [`XfbError::Transport`],
    /// [`XfbError::HttpStatus`], [`XfbError::Decode`], or
    /// [`XfbError::Api`].
    #[tracing::instrument(skip_all, fields(path = %path))]
    pub async fn get<T: ApiResponse>(
        &self,
        path: &str,
        session: Option<&SessionToken>,
    ) -> Result<T> {
        let request = self.request(Method::GET, path, session);
        let response = request.send().await?;
        Self::handle_response(path, response).await
    }

    /// Sends an authenticated JSON POST request and decodes the envelope.
    ///
    /// Endpoints that take no parameters expect a literal `null` body;
    /// pass [`serde_json::Value::Null`].
    ///
    /// # Errors
    ///
    /// Returns the most specific of [`XfbError::Transport`],
    /// [`XfbError::HttpStatus`], [`XfbError::Decode`], or
    /// [`XfbError::Api`].
    #[tracing::instrument(skip_all, fields(path = %path))]
    pub async fn post<T: ApiResponse, B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
        session: Option<&SessionToken>,
    ) -> Result<T> {
        let request = self
            .request(Method::POST, path, session)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        let response = request.send().await?;
        Self::handle_response(path, response).await
    }

    /// Builds a request, attaching the session cookie when present.
    fn request(
        &self,
        method: Method,
        path: &str,
        session: Option<&SessionToken>,
    ) -> reqwest::RequestBuilder {
        let url = format!("{}{path}", self.base_url);
        let mut request = self.http.request(method, &url);
        if let Some(token) = session {
            request = request.header(COOKIE, format!("{SESSION_COOKIE}={}", token.expose()));
        }
        request
    }

    /// Checks the HTTP status, decodes the body, and runs the envelope
    /// status check. Classification order is fixed: HTTP status first,
    /// then decode, then the semantic status.
    async fn handle_response<T: ApiResponse>(path: &str, response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            tracing::error!(path, code = status.as_u16(), "bad HTTP status");
            return Err(XfbError::HttpStatus {
                code: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let parsed: T = serde_json::from_str(&body)?;

        if !parsed.is_ok() {
            tracing::error!(
                path,
                code = parsed.status_code(),
                message = parsed.message().unwrap_or("(no message)"),
                "bad envelope status"
            );
            return Err(XfbError::Api {
                code: parsed.status_code(),
                message: parsed.message().unwrap_or("(no message)").to_owned(),
            });
        }

        tracing::debug!(path, body_len = body.len(), "request succeeded");
        Ok(parsed)
    }
}
