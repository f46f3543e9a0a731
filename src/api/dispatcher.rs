//! Authenticated request path to the backend.
//!
//! Every resource call goes through the [`Dispatcher`]: it attaches the
//! current access token, classifies the response, and on an
//! authorization failure obtains fresh credentials and resends the
//! request exactly once. When credentials cannot be restored it tears
//! the session down and reports that to the caller.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::session::refresh::{RefreshCoordinator, RefreshError};
use crate::session::state::SessionHandle;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The request body could not be serialized.
    #[error("Request encoding error: {0}")]
    Encode(#[from] serde_json::Error),
    /// The session could not be restored; the caller must sign in again.
    #[error("Session expired")]
    SessionExpired,
    /// The backend could not be reached.
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The backend rejected the request; surfaced unchanged.
    #[error("Upstream error ({status}): {message}")]
    Upstream { message: String, status: StatusCode },
}

/// Which round of the request this is.
///
/// A request is resent at most once, after a successful refresh; an
/// authorization failure on the second round is surfaced as-is.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Attempt {
    First,
    Retry,
}

/// Shape of the backend's error payload.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<String>,
}

pub struct Dispatcher {
    base_url: String,
    coordinator: RefreshCoordinator,
    http: reqwest::Client,
    session: Arc<SessionHandle>,
}

impl Dispatcher {
    pub fn new(
        http: reqwest::Client,
        base_url: String,
        session: Arc<SessionHandle>,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            base_url,
            coordinator,
            http,
            session,
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DispatchError> {
        let response = self.send(Method::GET, path, None).await?;
        Ok(response.json().await?)
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DispatchError> {
        let body = serde_json::to_value(body)?;
        let response = self.send(Method::POST, path, Some(&body)).await?;
        Ok(response.json().await?)
    }

    /// POST without a request body.
    pub async fn post_no_body<T: DeserializeOwned>(&self, path: &str) -> Result<T, DispatchError> {
        let response = self.send(Method::POST, path, None).await?;
        Ok(response.json().await?)
    }

    /// POST without a request body, discarding the response body.
    pub async fn post_empty(&self, path: &str) -> Result<(), DispatchError> {
        self.send(Method::POST, path, None).await?;
        Ok(())
    }

    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DispatchError> {
        let body = serde_json::to_value(body)?;
        let response = self.send(Method::PATCH, path, Some(&body)).await?;
        Ok(response.json().await?)
    }

    pub async fn delete(&self, path: &str) -> Result<(), DispatchError> {
        self.send(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// Send a request, refreshing credentials and resending once if the
    /// backend rejects the access token.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, DispatchError> {
        let mut attempt = Attempt::First;

        loop {
            let response = self.send_once(&method, path, body).await?;

            if response.status() == StatusCode::UNAUTHORIZED && attempt == Attempt::First {
                debug!(%method, path, "Access token rejected, refreshing");
                match self.coordinator.ensure_fresh().await {
                    Ok(_) => {
                        attempt = Attempt::Retry;
                        continue;
                    }
                    // Nothing to try: there was no session to restore in
                    // the first place (e.g. a rejected sign-in attempt).
                    // The original response speaks for itself.
                    Err(RefreshError::NoRefreshToken) => {}
                    Err(error) => {
                        debug!(%error, "Refresh failed, ending session");
                        self.session.expire();
                        return Err(DispatchError::SessionExpired);
                    }
                }
            }

            return classify(response).await;
        }
    }

    /// One transmission: attach the current access token (if any) and
    /// send. Transport failures surface directly; they never trigger a
    /// refresh.
    async fn send_once(
        &self,
        method: &Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, DispatchError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method.clone(), &url);

        if let Some(pair) = self.session.credentials() {
            request = request.bearer_auth(&pair.access_token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Split a raw response into success and upstream failure.
async fn classify(response: reqwest::Response) -> Result<reqwest::Response, DispatchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    Err(DispatchError::Upstream {
        message: error_message(response).await,
        status,
    })
}

/// Pull the human-readable message out of an error response.
pub(crate) async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(ErrorBody {
            detail: Some(detail),
        }) => detail,
        _ => status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string(),
    }
}
