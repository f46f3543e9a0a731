//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tempfile::TempDir;

use crate::api::auth::User;
use crate::session::refresh::RefreshError;
use crate::storage::{CredentialPair, CredentialStore};

/// Open a fresh credential store in a temporary directory.
///
/// The caller must keep the `TempDir` guard alive for the duration of
/// the test.
pub fn setup_store() -> (Arc<CredentialStore>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let store = CredentialStore::open(temp_dir.path()).unwrap();
    (Arc::new(store), temp_dir)
}

/// A credential pair with recognizable token values.
pub fn pair(tag: &str) -> CredentialPair {
    CredentialPair {
        access_token: format!("access_{tag}"),
        refresh_token: format!("refresh_{tag}"),
    }
}

pub fn user(id: i64) -> User {
    User {
        email: format!("user{id}@example.com"),
        id,
    }
}

/// Scripted stand-in for the refresh endpoint.
///
/// Outcomes are served in push order; an exhausted script fails as
/// rejected. The delay keeps the ticket in flight long enough for tests
/// to pile waiters onto it.
pub struct StubRefresher {
    calls: Arc<AtomicUsize>,
    delay: Duration,
    outcomes: Mutex<VecDeque<Result<CredentialPair, RefreshError>>>,
}

impl StubRefresher {
    pub fn new(delay: Duration) -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            delay,
            outcomes: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push_ok(&self, pair: CredentialPair) {
        self.outcomes.lock().push_back(Ok(pair));
    }

    pub fn push_err(&self, error: RefreshError) {
        self.outcomes.lock().push_back(Err(error));
    }

    /// Number of exchange calls made so far, shared with the test.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }

    pub(crate) async fn exchange(
        &self,
        _refresh_token: &str,
    ) -> Result<CredentialPair, RefreshError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outcomes
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(RefreshError::RefreshRejected("script exhausted".to_string())))
    }
}
