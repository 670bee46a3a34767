use crate::application_port::*;
use crate::domain_model::{IdentityProfile, UserId};
use chrono::{Duration, Utc};

const ACCESS_PREFIX: &str = "fake-access-token:";
const REFRESH_PREFIX: &str = "fake-refresh-token:";

/// Deterministic stand-in for front-end work: every username maps to a fixed
/// id and tokens are just prefixed ids. No state, no rotation.
#[derive(Debug, Default)]
pub struct FakeAuthService;

impl FakeAuthService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl AuthService for FakeAuthService {
    async fn register(&self, request: RegisterInput) -> Result<IdentityProfile, AuthError> {
        Ok(fake_profile(&request.username, &request.email))
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let name = request
            .username
            .or(request.email)
            .ok_or_else(|| AuthError::Validation("username or email is required".to_string()))?;
        let user = fake_profile(&name, &format!("{name}@example.invalid"));
        Ok(LoginResult {
            tokens: fake_tokens(user.id),
            user,
        })
    }

    async fn logout(&self, _user_id: UserId) -> Result<(), AuthError> {
        Ok(())
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<SessionTokens, AuthError> {
        let user_id = parse_fake(refresh_token, REFRESH_PREFIX)
            .ok_or(SessionError::InvalidRefreshToken)?;
        Ok(fake_tokens(user_id))
    }

    async fn change_password(
        &self,
        _user_id: UserId,
        _request: ChangePasswordInput,
    ) -> Result<(), AuthError> {
        Ok(())
    }

    async fn current_user(&self, user_id: UserId) -> Result<IdentityProfile, AuthError> {
        Ok(IdentityProfile {
            id: user_id,
            username: user_id.to_string(),
            email: format!("{user_id}@example.invalid"),
            fullname: String::new(),
            created_at: Utc::now(),
        })
    }

    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        Ok(parse_fake(token, ACCESS_PREFIX).ok_or(SessionError::InvalidAccessToken)?)
    }
}

fn get_fake_id(username: &str) -> UserId {
    UserId(uuid::Uuid::new_v5(
        &uuid::Uuid::NAMESPACE_OID,
        username.as_bytes(),
    ))
}

fn parse_fake(token: &str, prefix: &str) -> Option<UserId> {
    token.strip_prefix(prefix)?.parse().ok()
}

fn fake_profile(username: &str, email: &str) -> IdentityProfile {
    IdentityProfile {
        id: get_fake_id(username),
        username: username.to_lowercase(),
        email: email.to_string(),
        fullname: username.to_string(),
        created_at: Utc::now(),
    }
}

fn fake_tokens(user_id: UserId) -> SessionTokens {
    let now = Utc::now();
    SessionTokens {
        access_token: AccessToken(format!("{ACCESS_PREFIX}{user_id}")),
        access_token_expires_at: now + Duration::minutes(15),
        refresh_token: RefreshToken(format!("{REFRESH_PREFIX}{user_id}")),
        refresh_token_expires_at: now + Duration::days(10),
    }
}
