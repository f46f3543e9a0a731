//! Single-flight refresh of the credential pair.
//!
//! Any number of requests can hit an authorization failure at the same
//! moment; exactly one refresh call may reach the backend. The first
//! caller creates a ticket and spawns the refresh task, every later
//! caller joins the same ticket, and all of them observe one shared
//! outcome. Without this, two expired requests would each refresh
//! independently and the second refresh would invalidate the pair the
//! first had just been issued.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

use crate::api::auth::{RefreshRequest, TokenResponse};
use crate::storage::{CredentialPair, CredentialStore};

/// One outcome, fanned out to every waiter on the ticket.
type RefreshOutcome = Result<CredentialPair, RefreshError>;

#[derive(Debug, Clone, Error)]
pub enum RefreshError {
    /// Nothing to try: the store holds no refresh token.
    #[error("No refresh token stored")]
    NoRefreshToken,
    /// The backend examined the refresh token and refused it.
    #[error("Refresh token rejected: {0}")]
    RefreshRejected(String),
    /// The new pair could not be persisted.
    #[error("Credential storage failure: {0}")]
    Storage(String),
    /// The refresh endpoint could not be reached or misbehaved.
    #[error("Refresh transport failure: {0}")]
    Transport(String),
}

// ============================================================================
// Refresher strategies
// ============================================================================

/// How the coordinator exchanges a refresh token for a new pair.
pub enum Refresher {
    /// POST the token to the auth service refresh endpoint.
    Http(HttpRefresher),
    /// Scripted outcomes for tests.
    #[cfg(test)]
    Stub(crate::testutil::StubRefresher),
}

impl Refresher {
    async fn exchange(&self, refresh_token: &str) -> Result<CredentialPair, RefreshError> {
        match self {
            Refresher::Http(r) => r.exchange(refresh_token).await,
            #[cfg(test)]
            Refresher::Stub(r) => r.exchange(refresh_token).await,
        }
    }
}

/// Exchanges a refresh token against `POST /api/auth/refresh`.
pub struct HttpRefresher {
    base_url: String,
    http: reqwest::Client,
}

impl HttpRefresher {
    pub fn new(http: reqwest::Client, base_url: String) -> Self {
        Self { base_url, http }
    }

    async fn exchange(&self, refresh_token: &str) -> Result<CredentialPair, RefreshError> {
        let url = format!("{}/api/auth/refresh", self.base_url);
        let request = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };

        let response = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RefreshError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let tokens: TokenResponse = response
                .json()
                .await
                .map_err(|e| RefreshError::Transport(e.to_string()))?;
            return Ok(tokens.into_pair());
        }

        // The auth service answers 401 for a bad token and 404 for a
        // deleted user; both mean the token was examined and refused.
        if status.is_client_error() {
            let message = crate::api::dispatcher::error_message(response).await;
            Err(RefreshError::RefreshRejected(message))
        } else {
            Err(RefreshError::Transport(format!(
                "refresh endpoint returned {status}"
            )))
        }
    }
}

// ============================================================================
// Coordinator
// ============================================================================

/// Serializes refresh attempts: at most one in-flight ticket per client.
///
/// Cloning is cheap and yields a handle to the same ticket slot.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    refresher: Refresher,
    store: Arc<CredentialStore>,
    /// In-flight ticket. `Some` while a refresh task is running; waiters
    /// subscribe to the sender. Never held across network I/O.
    ticket: Mutex<Option<broadcast::Sender<RefreshOutcome>>>,
}

impl RefreshCoordinator {
    pub fn new(refresher: Refresher, store: Arc<CredentialStore>) -> Self {
        Self {
            inner: Arc::new(Inner {
                refresher,
                store,
                ticket: Mutex::new(None),
            }),
        }
    }

    /// Obtain a freshly issued credential pair.
    ///
    /// Joins the in-flight refresh if one exists, otherwise starts one.
    /// However many callers arrive while a ticket is outstanding, the
    /// backend sees a single refresh request, and every caller gets the
    /// same outcome.
    ///
    /// On failure the store is left untouched; tearing the session down
    /// is the caller's decision.
    pub async fn ensure_fresh(&self) -> RefreshOutcome {
        let mut rx = {
            let mut ticket = self.inner.ticket.lock().await;
            match ticket.as_ref() {
                Some(tx) => {
                    debug!("Joining in-flight refresh");
                    tx.subscribe()
                }
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    *ticket = Some(tx.clone());

                    // The task owns the refresh; it is not tied to any
                    // caller and always runs to completion, so waiters
                    // never observe a half-done rotation.
                    let inner = Arc::clone(&self.inner);
                    tokio::spawn(async move { inner.run_ticket(tx).await });
                    rx
                }
            }
        };

        match rx.recv().await {
            Ok(outcome) => outcome,
            // The ticket task publishes exactly once before dropping the
            // sender, so this only fires if it died unpublished.
            Err(error) => Err(RefreshError::Transport(format!(
                "refresh ticket lost: {error}"
            ))),
        }
    }
}

impl Inner {
    async fn run_ticket(&self, tx: broadcast::Sender<RefreshOutcome>) {
        let outcome = self.refresh_once().await;
        match &outcome {
            Ok(_) => debug!("Credential pair refreshed"),
            Err(error) => warn!(%error, "Refresh failed"),
        }

        // Retire the ticket before publishing, so an authorization
        // failure arriving after the outcome starts a fresh ticket.
        *self.ticket.lock().await = None;
        let _ = tx.send(outcome);
    }

    async fn refresh_once(&self) -> RefreshOutcome {
        let refresh_token = match self.store.get() {
            Some(pair) => pair.refresh_token,
            None => return Err(RefreshError::NoRefreshToken),
        };

        let pair = self.refresher.exchange(&refresh_token).await?;

        // Persist before publishing: a waiter that resends immediately
        // must already see the new pair in the store.
        self.store
            .set(pair.clone())
            .map_err(|e| RefreshError::Storage(e.to_string()))?;
        Ok(pair)
    }
}

impl std::fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshCoordinator").finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures_util::future::join_all;

    use super::*;
    use crate::testutil::{pair, setup_store, StubRefresher};

    fn coordinator(stub: StubRefresher, store: &Arc<CredentialStore>) -> RefreshCoordinator {
        RefreshCoordinator::new(Refresher::Stub(stub), Arc::clone(store))
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let (store, _temp) = setup_store();
        store.set(pair("stale")).unwrap();

        let stub = StubRefresher::new(Duration::from_millis(50));
        stub.push_ok(pair("fresh"));
        let calls = stub.call_counter();
        let coordinator = coordinator(stub, &store);

        let outcomes = join_all((0..8).map(|_| coordinator.ensure_fresh())).await;

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        for outcome in outcomes {
            assert_eq!(outcome.unwrap(), pair("fresh"));
        }
        assert_eq!(store.get(), Some(pair("fresh")));
    }

    #[tokio::test]
    async fn test_failure_is_shared_and_store_untouched() {
        let (store, _temp) = setup_store();
        store.set(pair("stale")).unwrap();

        let stub = StubRefresher::new(Duration::from_millis(50));
        stub.push_err(RefreshError::RefreshRejected("expired".to_string()));
        let calls = stub.call_counter();
        let coordinator = coordinator(stub, &store);

        let outcomes = join_all((0..4).map(|_| coordinator.ensure_fresh())).await;

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        for outcome in outcomes {
            assert!(matches!(outcome, Err(RefreshError::RefreshRejected(_))));
        }
        // Failure does not clear the store; that decision is the
        // dispatcher's.
        assert_eq!(store.get(), Some(pair("stale")));
    }

    #[tokio::test]
    async fn test_no_refresh_token_fails_fast() {
        let (store, _temp) = setup_store();

        let stub = StubRefresher::new(Duration::ZERO);
        let calls = stub.call_counter();
        let coordinator = coordinator(stub, &store);

        let outcome = coordinator.ensure_fresh().await;
        assert!(matches!(outcome, Err(RefreshError::NoRefreshToken)));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_next_failure_starts_a_fresh_ticket() {
        let (store, _temp) = setup_store();
        store.set(pair("a")).unwrap();

        let stub = StubRefresher::new(Duration::ZERO);
        stub.push_ok(pair("b"));
        stub.push_ok(pair("c"));
        let calls = stub.call_counter();
        let coordinator = coordinator(stub, &store);

        assert_eq!(coordinator.ensure_fresh().await.unwrap(), pair("b"));
        assert_eq!(coordinator.ensure_fresh().await.unwrap(), pair("c"));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert_eq!(store.get(), Some(pair("c")));
    }

    #[tokio::test]
    async fn test_ticket_completes_after_caller_gives_up() {
        let (store, _temp) = setup_store();
        store.set(pair("stale")).unwrap();

        let stub = StubRefresher::new(Duration::from_millis(50));
        stub.push_ok(pair("fresh"));
        let calls = stub.call_counter();
        let coordinator = coordinator(stub, &store);

        // The caller abandons the wait almost immediately.
        let abandoned = tokio::time::timeout(
            Duration::from_millis(5),
            coordinator.ensure_fresh(),
        )
        .await;
        assert!(abandoned.is_err());

        // The ticket still runs to completion and rotates the pair.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.get(), Some(pair("fresh")));
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
