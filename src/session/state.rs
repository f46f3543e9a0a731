//! Observable session lifecycle state.
//!
//! One `SessionHandle` exists per client. Views observe it through a
//! watch channel; the dispatcher and the lifecycle operations mutate it
//! only through the methods here, which keep the stored credentials and
//! the published state consistent with each other.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::api::auth::User;
use crate::storage::{CredentialPair, CredentialStore, StoreError};

/// Where the session currently stands.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// No usable credentials; the user must sign in.
    Anonymous,
    /// A persisted credential pair exists but has not been validated
    /// against the backend yet (startup only).
    Restoring,
    /// Credentials validated; the user is signed in.
    Authenticated(User),
}

impl SessionState {
    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Authenticated(user) => Some(user),
            _ => None,
        }
    }
}

/// Shared core of the session: the credential store plus the observable
/// lifecycle state.
pub struct SessionHandle {
    state: watch::Sender<SessionState>,
    store: Arc<CredentialStore>,
}

impl SessionHandle {
    pub(crate) fn new(store: Arc<CredentialStore>) -> Self {
        let initial = if store.get().is_some() {
            SessionState::Restoring
        } else {
            SessionState::Anonymous
        };
        let (state, _) = watch::channel(initial);
        Self { state, store }
    }

    /// Snapshot of the current state.
    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Observe state changes. Only transitions after this call are
    /// reported as new.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The stored credential pair, if any.
    pub fn credentials(&self) -> Option<CredentialPair> {
        self.store.get()
    }

    pub(crate) fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub(crate) fn set_authenticated(&self, user: User) {
        let user_id = user.id;
        let changed = self.state.send_if_modified(move |state| {
            if matches!(state, SessionState::Authenticated(current) if *current == user) {
                false
            } else {
                *state = SessionState::Authenticated(user);
                true
            }
        });
        if changed {
            info!(user_id, "Session authenticated");
        }
    }

    /// Tear the session down to `Anonymous`: clear the stored pair and
    /// publish the transition.
    ///
    /// Idempotent. Repeated calls leave the same end state and emit no
    /// additional change notifications. The state transition is applied
    /// even when the store clear fails.
    pub(crate) fn teardown(&self) -> Result<(), StoreError> {
        let result = self.store.clear();
        let changed = self.state.send_if_modified(|state| {
            if matches!(state, SessionState::Anonymous) {
                false
            } else {
                *state = SessionState::Anonymous;
                true
            }
        });
        if changed {
            info!("Session ended");
        }
        result
    }

    /// Teardown for paths that cannot surface storage errors.
    pub(crate) fn expire(&self) {
        if let Err(error) = self.teardown() {
            warn!(%error, "Failed to clear credential store during teardown");
        }
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("state", &*self.state.borrow())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{pair, setup_store, user};

    #[test]
    fn test_initial_state_anonymous_without_credentials() {
        let (store, _temp) = setup_store();
        let handle = SessionHandle::new(store);
        assert_eq!(handle.current(), SessionState::Anonymous);
    }

    #[test]
    fn test_initial_state_restoring_with_credentials() {
        let (store, _temp) = setup_store();
        store.set(pair("persisted")).unwrap();

        let handle = SessionHandle::new(Arc::clone(&store));
        assert_eq!(handle.current(), SessionState::Restoring);
        assert_eq!(handle.credentials(), Some(pair("persisted")));
    }

    #[test]
    fn test_authenticated_then_teardown() {
        let (store, _temp) = setup_store();
        store.set(pair("p")).unwrap();
        let handle = SessionHandle::new(store);

        handle.set_authenticated(user(1));
        assert_eq!(handle.current(), SessionState::Authenticated(user(1)));

        handle.teardown().unwrap();
        assert_eq!(handle.current(), SessionState::Anonymous);
        assert!(handle.credentials().is_none());
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let (store, _temp) = setup_store();
        store.set(pair("p")).unwrap();
        let handle = SessionHandle::new(store);
        handle.set_authenticated(user(1));

        let mut observer = handle.subscribe();
        observer.borrow_and_update();

        handle.teardown().unwrap();
        assert!(observer.has_changed().unwrap());
        observer.borrow_and_update();

        // Second teardown: same end state, no further notification.
        handle.teardown().unwrap();
        assert!(!observer.has_changed().unwrap());
        assert_eq!(handle.current(), SessionState::Anonymous);
        assert!(handle.credentials().is_none());
    }

    #[test]
    fn test_reauthenticating_same_user_emits_nothing() {
        let (store, _temp) = setup_store();
        let handle = SessionHandle::new(store);

        handle.set_authenticated(user(1));
        let mut observer = handle.subscribe();
        observer.borrow_and_update();

        handle.set_authenticated(user(1));
        assert!(!observer.has_changed().unwrap());
    }
}
