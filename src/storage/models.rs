use serde::{Deserialize, Serialize};

/// The access/refresh token pair issued by the auth endpoints.
///
/// The two tokens only ever rotate together: a successful login,
/// register, or refresh replaces the whole pair. There is no code path
/// that stores one half on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    pub access_token: String,
    pub refresh_token: String,
}
