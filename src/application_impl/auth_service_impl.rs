use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::{IdentityFilter, IdentityStore};
use std::sync::Arc;
use tracing::{info, instrument};

pub struct RealAuthService {
    identity_store: Arc<dyn IdentityStore>,
    credential_hasher: Arc<dyn CredentialHasher>,
    session_manager: Arc<dyn SessionTokenManager>,
}

impl RealAuthService {
    pub fn new(
        identity_store: Arc<dyn IdentityStore>,
        credential_hasher: Arc<dyn CredentialHasher>,
        session_manager: Arc<dyn SessionTokenManager>,
    ) -> Self {
        Self {
            identity_store,
            credential_hasher,
            session_manager,
        }
    }

    fn non_blank(value: Option<String>) -> Option<String> {
        value
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    async fn load(&self, user_id: UserId) -> Result<IdentityRecord, AuthError> {
        self.identity_store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    #[instrument(skip_all, fields(username = %request.username))]
    async fn register(&self, request: RegisterInput) -> Result<IdentityProfile, AuthError> {
        let RegisterInput {
            fullname,
            username,
            email,
            password,
        } = request;

        if [&fullname, &username, &email, &password]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(AuthError::Validation("all fields are required".to_string()));
        }
        let username = username.trim().to_lowercase();
        let email = email.trim().to_string();

        let existing = self
            .identity_store
            .find_one(&IdentityFilter::UsernameOrEmail {
                username: Some(username.clone()),
                email: Some(email.clone()),
            })
            .await?;
        if existing.is_some() {
            return Err(AuthError::UserExists);
        }

        let credential_hash = self.credential_hasher.hash_password(&password).await?;
        let record = self
            .identity_store
            .create(NewIdentity {
                id: UserId::new_v4(),
                username,
                email,
                fullname: fullname.trim().to_string(),
                credential_hash,
            })
            .await?;

        info!(user_id = %record.id, "identity registered");
        Ok(record.profile())
    }

    #[instrument(skip_all)]
    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let username = Self::non_blank(request.username).map(|u| u.to_lowercase());
        let email = Self::non_blank(request.email);
        if username.is_none() && email.is_none() {
            return Err(AuthError::Validation(
                "username or email is required".to_string(),
            ));
        }

        let record = self
            .identity_store
            .find_one(&IdentityFilter::UsernameOrEmail { username, email })
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let ok = self
            .credential_hasher
            .verify_password(&request.password, &record.credential_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.session_manager.issue(record.id).await?;

        info!(user_id = %record.id, "logged in");
        Ok(LoginResult {
            user: record.profile(),
            tokens,
        })
    }

    #[instrument(skip(self))]
    async fn logout(&self, user_id: UserId) -> Result<(), AuthError> {
        self.session_manager.revoke(user_id).await?;
        info!("logged out");
        Ok(())
    }

    async fn refresh_token(&self, refresh_token: &str) -> Result<SessionTokens, AuthError> {
        Ok(self.session_manager.rotate(refresh_token).await?)
    }

    #[instrument(skip(self, request))]
    async fn change_password(
        &self,
        user_id: UserId,
        request: ChangePasswordInput,
    ) -> Result<(), AuthError> {
        if request.new_password.trim().is_empty() {
            return Err(AuthError::Validation("new password is required".to_string()));
        }

        let record = self.load(user_id).await?;
        let ok = self
            .credential_hasher
            .verify_password(&request.old_password, &record.credential_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidOldPassword);
        }

        let credential_hash = self
            .credential_hasher
            .hash_password(&request.new_password)
            .await?;
        self.identity_store
            .update_credential_hash(user_id, &credential_hash)
            .await?;

        info!("password changed");
        Ok(())
    }

    async fn current_user(&self, user_id: UserId) -> Result<IdentityProfile, AuthError> {
        Ok(self.load(user_id).await?.profile())
    }

    async fn verify_token(&self, token: &str) -> Result<UserId, AuthError> {
        Ok(self.session_manager.verify_access(token).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::jwt_token_codec::tests::test_config;
    use crate::application_impl::{Argon2PasswordHasher, JwtHs256Codec, RealSessionTokenManager};
    use crate::infra_memory::MemoryIdentityStore;

    fn service() -> RealAuthService {
        let store: Arc<dyn IdentityStore> = Arc::new(MemoryIdentityStore::new());
        let codec = Arc::new(JwtHs256Codec::new(test_config()));
        let manager = Arc::new(RealSessionTokenManager::new(store.clone(), codec));
        RealAuthService::new(store, Arc::new(Argon2PasswordHasher), manager)
    }

    fn register_input(username: &str, email: &str) -> RegisterInput {
        RegisterInput {
            fullname: "Ada Lovelace".to_string(),
            username: username.to_string(),
            email: email.to_string(),
            password: "s3cret-pass".to_string(),
        }
    }

    fn login_as(username: &str, password: &str) -> LoginInput {
        LoginInput {
            username: Some(username.to_string()),
            email: None,
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn register_normalizes_username() {
        let svc = service();
        let profile = svc
            .register(register_input("  Ada ", "ada@example.com"))
            .await
            .unwrap();
        assert_eq!(profile.username, "ada");
        assert_eq!(svc.current_user(profile.id).await.unwrap(), profile);
    }

    #[tokio::test]
    async fn register_requires_every_field() {
        let svc = service();
        let mut input = register_input("ada", "ada@example.com");
        input.fullname = "   ".to_string();
        assert!(matches!(
            svc.register(input).await,
            Err(AuthError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn register_rejects_taken_username_or_email() {
        let svc = service();
        svc.register(register_input("ada", "ada@example.com"))
            .await
            .unwrap();

        let same_name = svc.register(register_input("ADA", "other@example.com")).await;
        assert!(matches!(same_name, Err(AuthError::UserExists)));
        let same_mail = svc.register(register_input("grace", "ada@example.com")).await;
        assert!(matches!(same_mail, Err(AuthError::UserExists)));
    }

    #[tokio::test]
    async fn login_by_email_issues_a_verifiable_session() {
        let svc = service();
        let profile = svc
            .register(register_input("ada", "ada@example.com"))
            .await
            .unwrap();

        let result = svc
            .login(LoginInput {
                username: None,
                email: Some("ada@example.com".to_string()),
                password: "s3cret-pass".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result.user.id, profile.id);
        let verified = svc.verify_token(&result.tokens.access_token.0).await.unwrap();
        assert_eq!(verified, profile.id);
    }

    #[tokio::test]
    async fn login_does_not_reveal_which_part_was_wrong() {
        let svc = service();
        svc.register(register_input("ada", "ada@example.com"))
            .await
            .unwrap();

        let wrong_password = svc.login(login_as("ada", "nope")).await.unwrap_err();
        let unknown_user = svc.login(login_as("nobody", "nope")).await.unwrap_err();
        assert!(matches!(wrong_password, AuthError::InvalidCredentials));
        assert!(matches!(unknown_user, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_without_identifier_is_rejected() {
        let svc = service();
        let result = svc
            .login(LoginInput {
                username: Some(" ".to_string()),
                email: None,
                password: "x".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn logout_invalidates_the_refresh_token() {
        let svc = service();
        svc.register(register_input("ada", "ada@example.com"))
            .await
            .unwrap();
        let session = svc.login(login_as("ada", "s3cret-pass")).await.unwrap();

        svc.logout(session.user.id).await.unwrap();

        let result = svc.refresh_token(&session.tokens.refresh_token.0).await;
        assert!(matches!(
            result,
            Err(AuthError::Session(SessionError::RefreshTokenReused))
        ));
    }

    #[tokio::test]
    async fn change_password_checks_the_old_one() {
        let svc = service();
        let profile = svc
            .register(register_input("ada", "ada@example.com"))
            .await
            .unwrap();

        let wrong = svc
            .change_password(
                profile.id,
                ChangePasswordInput {
                    old_password: "guess".to_string(),
                    new_password: "n3w-pass".to_string(),
                },
            )
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidOldPassword)));

        svc.change_password(
            profile.id,
            ChangePasswordInput {
                old_password: "s3cret-pass".to_string(),
                new_password: "n3w-pass".to_string(),
            },
        )
        .await
        .unwrap();

        assert!(svc.login(login_as("ada", "s3cret-pass")).await.is_err());
        svc.login(login_as("ada", "n3w-pass")).await.unwrap();
    }

    #[tokio::test]
    async fn change_password_for_missing_identity_is_not_found() {
        let svc = service();
        let result = svc
            .change_password(
                UserId::new_v4(),
                ChangePasswordInput {
                    old_password: "a".to_string(),
                    new_password: "b".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(AuthError::UserNotFound)));
    }
}
