//! Auth service endpoints: sign-in, registration, identity lookup.
//!
//! The refresh endpoint is deliberately not wrapped here: it is called
//! on the raw HTTP client by the refresh coordinator, outside the
//! dispatcher's refresh-and-resend path.

use serde::{Deserialize, Serialize};

use super::dispatcher::{DispatchError, Dispatcher};
use crate::storage::CredentialPair;

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AuthRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Body of the refresh call.
#[derive(Debug, Serialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(default)]
    pub token_type: String,
}

impl TokenResponse {
    pub fn into_pair(self) -> CredentialPair {
        CredentialPair {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
        }
    }
}

/// The signed-in user's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub email: String,
    pub id: i64,
}

// ============================================================================
// Operations
// ============================================================================

pub async fn login(
    dispatcher: &Dispatcher,
    email: &str,
    password: &str,
) -> Result<TokenResponse, DispatchError> {
    dispatcher
        .post("/api/auth/login", &AuthRequest { email, password })
        .await
}

pub async fn register(
    dispatcher: &Dispatcher,
    email: &str,
    password: &str,
) -> Result<TokenResponse, DispatchError> {
    dispatcher
        .post("/api/auth/register", &AuthRequest { email, password })
        .await
}

/// Resolve the identity behind the stored credentials.
pub async fn me(dispatcher: &Dispatcher) -> Result<User, DispatchError> {
    dispatcher.get("/api/auth/me").await
}
