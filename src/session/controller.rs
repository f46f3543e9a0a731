//! Session lifecycle operations: login, register, restore, logout.
//!
//! All session state mutation in the crate funnels through here (or
//! through the dispatcher's teardown on failed refresh, which uses the
//! same [`SessionHandle`] methods), so `Authenticated` state and a
//! validated stored credential pair never diverge.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;
use tracing::debug;

use super::state::{SessionHandle, SessionState};
use crate::api::auth::{self, User};
use crate::api::dispatcher::{DispatchError, Dispatcher};
use crate::storage::{CredentialPair, StoreError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
    #[error("Credential storage failure: {0}")]
    Store(#[from] StoreError),
}

pub struct SessionController {
    dispatcher: Arc<Dispatcher>,
    handle: Arc<SessionHandle>,
}

impl SessionController {
    pub(crate) fn new(dispatcher: Arc<Dispatcher>, handle: Arc<SessionHandle>) -> Self {
        Self { dispatcher, handle }
    }

    /// Snapshot of the current lifecycle state.
    pub fn current(&self) -> SessionState {
        self.handle.current()
    }

    /// Observe lifecycle transitions. A transition to
    /// [`SessionState::Anonymous`] means the session ended, whether by
    /// logout or by unrecoverable credential expiry, and the consumer
    /// should present its sign-in entry point.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.handle.subscribe()
    }

    /// The stored credential pair, if any.
    pub fn credentials(&self) -> Option<CredentialPair> {
        self.handle.credentials()
    }

    /// Sign in with an existing account.
    pub async fn login(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let tokens = auth::login(&self.dispatcher, email, password).await?;
        self.handle.store().set(tokens.into_pair())?;
        self.resolve_identity().await
    }

    /// Create an account and sign in.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, SessionError> {
        let tokens = auth::register(&self.dispatcher, email, password).await?;
        self.handle.store().set(tokens.into_pair())?;
        self.resolve_identity().await
    }

    /// Validate a persisted session at startup.
    ///
    /// Returns `Ok(None)` when there is nothing to restore. Any failure
    /// to resolve the identity (including a refresh token that died
    /// while the client was away) ends in `Anonymous` with the store
    /// cleared.
    pub async fn restore(&self) -> Result<Option<User>, SessionError> {
        match self.handle.current() {
            SessionState::Restoring => {}
            SessionState::Authenticated(user) => return Ok(Some(user)),
            SessionState::Anonymous => return Ok(None),
        }

        debug!("Validating persisted session");
        self.resolve_identity().await.map(Some)
    }

    /// Discard the session. The stored pair is removed and observers see
    /// a single transition to `Anonymous`.
    pub fn logout(&self) -> Result<(), SessionError> {
        self.handle.teardown()?;
        Ok(())
    }

    /// Look up who the stored credentials belong to and publish
    /// `Authenticated`. Tokens that cannot resolve an identity are
    /// useless, so failure tears the session down; leaving them behind
    /// would break the state/store consistency rule.
    async fn resolve_identity(&self) -> Result<User, SessionError> {
        match auth::me(&self.dispatcher).await {
            Ok(user) => {
                self.handle.set_authenticated(user.clone());
                Ok(user)
            }
            Err(error) => {
                // On SessionExpired the dispatcher has already torn the
                // session down; repeating the teardown is a no-op.
                self.handle.expire();
                Err(error.into())
            }
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("state", &self.handle.current())
            .finish()
    }
}
