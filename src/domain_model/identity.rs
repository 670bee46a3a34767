use super::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything the identity store keeps for one account.
///
/// `credential_hash` and `current_refresh_token` never leave the service
/// layer; responses are built from [`IdentityProfile`].
#[derive(Debug, Clone)]
pub struct IdentityRecord {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub credential_hash: String,
    /// The only refresh token currently accepted for this identity.
    pub current_refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IdentityRecord {
    pub fn profile(&self) -> IdentityProfile {
        IdentityProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            fullname: self.fullname.clone(),
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub credential_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityProfile {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub fullname: String,
    pub created_at: DateTime<Utc>,
}
