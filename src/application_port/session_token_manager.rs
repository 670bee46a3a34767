use super::{AccessToken, RefreshToken};
use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct SessionTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorKind {
    Validation,
    Unauthorized,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("{0}")]
    Validation(String),
    /// Bad signature, expired, or no such identity. One message for all three.
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    /// Well-formed and signed, but superseded by a later issue or rotation.
    #[error("refresh token is expired or used")]
    RefreshTokenReused,
    #[error("invalid access token")]
    InvalidAccessToken,
    #[error("internal error: {0}")]
    InternalError(String),
}

impl SessionError {
    pub fn kind(&self) -> SessionErrorKind {
        match self {
            SessionError::Validation(_) => SessionErrorKind::Validation,
            SessionError::InvalidRefreshToken
            | SessionError::RefreshTokenReused
            | SessionError::InvalidAccessToken => SessionErrorKind::Unauthorized,
            SessionError::InternalError(_) => SessionErrorKind::Internal,
        }
    }
}

/// Access/refresh token lifecycle for one identity:
/// `issue` starts a session, `rotate` exchanges the current refresh token for
/// a new pair, `revoke` ends the session.
#[async_trait::async_trait]
pub trait SessionTokenManager: Send + Sync {
    /// Mint a new pair and make its refresh token the only valid one for `user_id`.
    async fn issue(&self, user_id: UserId) -> Result<SessionTokens, SessionError>;

    /// Exchange the presented refresh token for a new pair. Rejects tokens
    /// that verify but are no longer the identity's current one.
    async fn rotate(&self, presented_refresh_token: &str) -> Result<SessionTokens, SessionError>;

    /// Forget the current refresh token. Idempotent.
    async fn revoke(&self, user_id: UserId) -> Result<(), SessionError>;

    /// Signature and expiry check only; never touches the store.
    async fn verify_access(&self, access_token: &str) -> Result<UserId, SessionError>;
}
