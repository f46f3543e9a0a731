//! Mail account integration: connection status and scan trigger.
//!
//! The OAuth consent flow itself happens in a browser against the
//! backend; this module only fetches the redirect URL and reports
//! connection state.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::dispatcher::{DispatchError, Dispatcher};

#[derive(Debug, Clone, Deserialize)]
pub struct MailStatus {
    pub connected: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ConnectUrl {
    url: String,
}

/// Outcome of a mailbox scan.
#[derive(Debug, Clone, Deserialize)]
pub struct ScanOutcome {
    pub new_subscriptions: i64,
    pub scanned: bool,
}

pub async fn status(dispatcher: &Dispatcher) -> Result<MailStatus, DispatchError> {
    dispatcher.get("/api/gmail/status").await
}

/// Fetch the URL the user must visit to grant mailbox access.
pub async fn connect_url(dispatcher: &Dispatcher) -> Result<String, DispatchError> {
    let connect: ConnectUrl = dispatcher.get("/api/gmail/connect").await?;
    Ok(connect.url)
}

pub async fn scan(dispatcher: &Dispatcher) -> Result<ScanOutcome, DispatchError> {
    dispatcher.post_no_body("/api/gmail/scan").await
}

pub async fn disconnect(dispatcher: &Dispatcher) -> Result<(), DispatchError> {
    dispatcher.delete("/api/gmail/disconnect").await
}
