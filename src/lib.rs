//! subman-client - Rust client for the Subscription Manager API
//!
//! This crate keeps a signed-in session alive against the Subscription
//! Manager backend:
//! - Persistent credential storage (redb) that survives restarts
//! - Transparent token refresh on authorization failure, de-duplicated
//!   so concurrent requests share a single refresh call
//! - An observable session lifecycle (anonymous / restoring /
//!   authenticated) for views to react to
//! - Typed wrappers for the subscriptions, notifications, and mail-scan
//!   resources, all routed through one dispatcher

pub mod api;
pub mod config;
pub mod session;
pub mod storage;
#[cfg(test)]
pub mod testutil;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use api::dispatcher::Dispatcher;
use config::{Config, ConfigError};
use session::controller::SessionController;
use session::refresh::{HttpRefresher, RefreshCoordinator, Refresher};
use session::state::SessionHandle;
use storage::{CredentialStore, StoreError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Credential storage error: {0}")]
    Store(#[from] StoreError),
}

/// One client instance: the session plus the request path into the API.
pub struct Client {
    pub config: Config,
    dispatcher: Arc<Dispatcher>,
    session: SessionController,
}

impl Client {
    /// Wire up a client: open the credential store, build the HTTP
    /// client, and connect the dispatcher, refresh coordinator, and
    /// session state to each other.
    ///
    /// The session starts in `Restoring` when a persisted pair exists;
    /// call [`SessionController::restore`] to validate it.
    pub fn open(config: Config) -> Result<Self, ClientError> {
        let store = Arc::new(CredentialStore::open(&config.data_dir)?);

        let http = reqwest::Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(2)
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let refresher = Refresher::Http(HttpRefresher::new(http.clone(), config.base_url.clone()));
        let coordinator = RefreshCoordinator::new(refresher, Arc::clone(&store));
        let handle = Arc::new(SessionHandle::new(store));
        let dispatcher = Arc::new(Dispatcher::new(
            http,
            config.base_url.clone(),
            Arc::clone(&handle),
            coordinator,
        ));
        let session = SessionController::new(Arc::clone(&dispatcher), handle);

        Ok(Self {
            config,
            dispatcher,
            session,
        })
    }

    /// The authenticated request path; hand this to the typed wrappers
    /// in [`api`].
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }
}
