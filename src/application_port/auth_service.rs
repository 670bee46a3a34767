use super::{SessionError, SessionTokens};
use crate::domain_model::{IdentityProfile, UserId};
use crate::domain_port::IdentityStoreError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid old password")]
    InvalidOldPassword,
    #[error("user already exists")]
    UserExists,
    #[error("user not found")]
    UserNotFound,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

impl From<IdentityStoreError> for AuthError {
    fn from(err: IdentityStoreError) -> Self {
        match err {
            IdentityStoreError::NotFound => AuthError::UserNotFound,
            IdentityStoreError::Conflict => AuthError::UserExists,
            IdentityStoreError::Store(e) => AuthError::Store(e),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub fullname: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username: Option<String>,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginResult {
    pub user: IdentityProfile,
    pub tokens: SessionTokens,
}

#[derive(Debug, Clone)]
pub struct ChangePasswordInput {
    pub old_password: String,
    pub new_password: String,
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<IdentityProfile, AuthError>;
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;
    async fn logout(&self, user_id: UserId) -> Result<(), AuthError>;
    async fn refresh_token(&self, refresh_token: &str) -> Result<SessionTokens, AuthError>;
    async fn change_password(
        &self,
        user_id: UserId,
        request: ChangePasswordInput,
    ) -> Result<(), AuthError>;
    async fn current_user(&self, user_id: UserId) -> Result<IdentityProfile, AuthError>;
    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError>;
}
