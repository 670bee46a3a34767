use crate::application_port::*;
use crate::domain_model::UserId;
use crate::domain_port::{IdentityStore, IdentityStoreError};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Session lifecycle backed by the identity record's `current_refresh_token` slot.
pub struct RealSessionTokenManager {
    identity_store: Arc<dyn IdentityStore>,
    token_codec: Arc<dyn TokenCodec>,
}

impl RealSessionTokenManager {
    pub fn new(identity_store: Arc<dyn IdentityStore>, token_codec: Arc<dyn TokenCodec>) -> Self {
        Self {
            identity_store,
            token_codec,
        }
    }

    async fn mint(&self, user_id: UserId) -> Result<SessionTokens, SessionError> {
        let (access_token, access_exp) = self
            .token_codec
            .issue_access_token(user_id)
            .await
            .map_err(internal)?;
        let (refresh_token, refresh_exp) = self
            .token_codec
            .issue_refresh_token(user_id)
            .await
            .map_err(internal)?;

        Ok(SessionTokens {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }
}

fn internal<E: std::fmt::Display>(e: E) -> SessionError {
    SessionError::InternalError(e.to_string())
}

#[async_trait::async_trait]
impl SessionTokenManager for RealSessionTokenManager {
    #[instrument(skip(self))]
    async fn issue(&self, user_id: UserId) -> Result<SessionTokens, SessionError> {
        let tokens = self.mint(user_id).await?;

        // The caller has already seen this identity, so NotFound here is internal too.
        self.identity_store
            .set_current_refresh_token(user_id, Some(tokens.refresh_token.0.as_str()))
            .await
            .map_err(|e| {
                warn!(error = %e, "persisting refresh token failed");
                internal(format!("persist refresh token: {e}"))
            })?;

        debug!("session issued");
        Ok(tokens)
    }

    #[instrument(skip_all)]
    async fn rotate(&self, presented_refresh_token: &str) -> Result<SessionTokens, SessionError> {
        if presented_refresh_token.trim().is_empty() {
            return Err(SessionError::Validation(
                "refresh token is required".to_string(),
            ));
        }

        let verified = match self
            .token_codec
            .verify_refresh_token(&RefreshToken(presented_refresh_token.to_owned()))
            .await
        {
            Ok(verified) => verified,
            Err(TokenError::Internal(e)) => return Err(SessionError::InternalError(e)),
            Err(e) => {
                debug!(reason = %e, "refresh token failed verification");
                return Err(SessionError::InvalidRefreshToken);
            }
        };
        let TokenVerifyResult { user_id, jti } = verified;

        let identity = self
            .identity_store
            .find_by_id(user_id)
            .await
            .map_err(internal)?
            .ok_or_else(|| {
                debug!(%user_id, "refresh token subject does not exist");
                SessionError::InvalidRefreshToken
            })?;

        if identity.current_refresh_token.as_deref() != Some(presented_refresh_token) {
            warn!(%user_id, %jti, "superseded refresh token presented");
            return Err(SessionError::RefreshTokenReused);
        }

        let tokens = self.mint(user_id).await?;

        let swapped = self
            .identity_store
            .compare_and_swap_refresh_token(
                user_id,
                presented_refresh_token,
                &tokens.refresh_token.0,
            )
            .await
            .map_err(|e| {
                warn!(%user_id, error = %e, "persisting rotated refresh token failed");
                internal(format!("persist refresh token: {e}"))
            })?;
        if !swapped {
            warn!(%user_id, %jti, "refresh token rotated concurrently");
            return Err(SessionError::RefreshTokenReused);
        }

        debug!(%user_id, replaced_jti = %jti, "session rotated");
        Ok(tokens)
    }

    #[instrument(skip(self))]
    async fn revoke(&self, user_id: UserId) -> Result<(), SessionError> {
        match self
            .identity_store
            .set_current_refresh_token(user_id, None)
            .await
        {
            Ok(()) => Ok(()),
            Err(IdentityStoreError::NotFound) => {
                debug!("revoking session of unknown identity");
                Ok(())
            }
            Err(e) => Err(internal(e)),
        }
    }

    async fn verify_access(&self, access_token: &str) -> Result<UserId, SessionError> {
        match self
            .token_codec
            .verify_access_token(&AccessToken(access_token.to_owned()))
            .await
        {
            Ok(verified) => Ok(verified.user_id),
            Err(TokenError::Internal(e)) => Err(SessionError::InternalError(e)),
            Err(_) => Err(SessionError::InvalidAccessToken),
        }
    }
}
