pub mod auth;
pub mod dispatcher;
pub mod mail;
pub mod notifications;
pub mod subscriptions;

use serde::Deserialize;

pub use dispatcher::{DispatchError, Dispatcher};

#[derive(Debug, Deserialize)]
pub struct Health {
    pub status: String,
}

/// Unauthenticated liveness probe.
pub async fn health(dispatcher: &Dispatcher) -> Result<Health, DispatchError> {
    dispatcher.get("/api/health").await
}
