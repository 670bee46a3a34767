use crate::application_port::*;
use crate::domain_model::UserId;
use chrono::{DateTime, TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub access_signing_key: Vec<u8>,
    pub refresh_signing_key: Vec<u8>,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String, // user id as string
    exp: i64,
    iat: i64,
    iss: String,
    aud: String,
    jti: String, // keeps two tokens minted in the same second distinct
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl KeyPair {
    fn new(secret: &[u8], ttl: Duration) -> Self {
        KeyPair {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }
}

/// HS256 codec with one key per token class.
pub struct JwtHs256Codec {
    issuer: String,
    audience: String,
    access: KeyPair,
    refresh: KeyPair,
}

impl JwtHs256Codec {
    pub fn new(cfg: JwtConfig) -> Self {
        JwtHs256Codec {
            access: KeyPair::new(&cfg.access_signing_key, cfg.access_ttl),
            refresh: KeyPair::new(&cfg.refresh_signing_key, cfg.refresh_ttl),
            issuer: cfg.issuer,
            audience: cfg.audience,
        }
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[inline]
    fn parse_user_id(sub: &str) -> Result<UserId, TokenError> {
        sub.parse::<UserId>().map_err(|_| TokenError::Invalid)
    }

    fn encode(&self, uid: UserId, keys: &KeyPair) -> Result<(String, DateTime<Utc>), TokenError> {
        let iat_dt = Utc::now();
        let exp_dt = TimeDelta::from_std(keys.ttl)
            .ok()
            .and_then(|ttl| iat_dt.checked_add_signed(ttl))
            .ok_or_else(|| TokenError::Internal(format!("token ttl {:?} out of range", keys.ttl)))?;
        let claims = Claims {
            sub: uid.to_string(),
            exp: exp_dt.timestamp(),
            iat: iat_dt.timestamp(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Self::gen_jti(),
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| TokenError::Internal(e.to_string()))?;
        Ok((token, exp_dt))
    }

    fn decode(&self, token: &str, keys: &KeyPair) -> Result<TokenVerifyResult, TokenError> {
        let mut v = Validation::new(Algorithm::HS256);
        v.validate_exp = true;
        v.set_audience(&[self.audience.clone()]);
        v.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &keys.decoding, &v).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;
        Ok(TokenVerifyResult {
            user_id: Self::parse_user_id(&data.claims.sub)?,
            jti: data.claims.jti,
        })
    }
}

#[async_trait::async_trait]
impl TokenCodec for JwtHs256Codec {
    async fn issue_access_token(
        &self,
        user: UserId,
    ) -> Result<(AccessToken, DateTime<Utc>), TokenError> {
        let (token, exp_dt) = self.encode(user, &self.access)?;
        Ok((AccessToken(token), exp_dt))
    }

    async fn issue_refresh_token(
        &self,
        user: UserId,
    ) -> Result<(RefreshToken, DateTime<Utc>), TokenError> {
        let (token, exp_dt) = self.encode(user, &self.refresh)?;
        Ok((RefreshToken(token), exp_dt))
    }

    async fn verify_access_token(
        &self,
        token: &AccessToken,
    ) -> Result<TokenVerifyResult, TokenError> {
        self.decode(&token.0, &self.access)
    }

    async fn verify_refresh_token(
        &self,
        token: &RefreshToken,
    ) -> Result<TokenVerifyResult, TokenError> {
        self.decode(&token.0, &self.refresh)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const ISSUER: &str = "latchkey.test";
    pub(crate) const AUDIENCE: &str = "latchkey-client";
    pub(crate) const ACCESS_KEY: &[u8] = b"test-access-secret";
    pub(crate) const REFRESH_KEY: &[u8] = b"test-refresh-secret";

    pub(crate) fn test_config() -> JwtConfig {
        JwtConfig {
            issuer: ISSUER.to_string(),
            audience: AUDIENCE.to_string(),
            access_ttl: Duration::from_secs(15 * 60),
            refresh_ttl: Duration::from_secs(10 * 24 * 60 * 60),
            access_signing_key: ACCESS_KEY.to_vec(),
            refresh_signing_key: REFRESH_KEY.to_vec(),
        }
    }

    /// Signs arbitrary claims with the given key, for tokens the codec would never mint.
    pub(crate) fn forge(sub: &str, exp: i64, key: &[u8]) -> String {
        let claims = Claims {
            sub: sub.to_string(),
            exp,
            iat: exp - 60,
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
            jti: JwtHs256Codec::gen_jti(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &EncodingKey::from_secret(key)).unwrap()
    }

    #[tokio::test]
    async fn round_trips_both_token_classes() {
        let codec = JwtHs256Codec::new(test_config());
        let user = UserId::new_v4();

        let (access, access_exp) = codec.issue_access_token(user).await.unwrap();
        let (refresh, refresh_exp) = codec.issue_refresh_token(user).await.unwrap();
        assert!(refresh_exp > access_exp);

        assert_eq!(codec.verify_access_token(&access).await.unwrap().user_id, user);
        assert_eq!(codec.verify_refresh_token(&refresh).await.unwrap().user_id, user);
    }

    #[tokio::test]
    async fn token_classes_are_not_interchangeable() {
        let codec = JwtHs256Codec::new(test_config());
        let user = UserId::new_v4();
        let (access, _) = codec.issue_access_token(user).await.unwrap();
        let (refresh, _) = codec.issue_refresh_token(user).await.unwrap();

        let as_refresh = codec.verify_refresh_token(&RefreshToken(access.0)).await;
        assert!(matches!(as_refresh, Err(TokenError::Invalid)));
        let as_access = codec.verify_access_token(&AccessToken(refresh.0)).await;
        assert!(matches!(as_access, Err(TokenError::Invalid)));
    }

    #[tokio::test]
    async fn two_tokens_minted_back_to_back_differ() {
        let codec = JwtHs256Codec::new(test_config());
        let user = UserId::new_v4();
        let (a, _) = codec.issue_refresh_token(user).await.unwrap();
        let (b, _) = codec.issue_refresh_token(user).await.unwrap();
        assert_ne!(a, b);

        let jti_a = codec.verify_refresh_token(&a).await.unwrap().jti;
        let jti_b = codec.verify_refresh_token(&b).await.unwrap().jti;
        assert_ne!(jti_a, jti_b);
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_expired() {
        let codec = JwtHs256Codec::new(test_config());
        let expired = forge(
            &UserId::new_v4().to_string(),
            Utc::now().timestamp() - 3600,
            REFRESH_KEY,
        );
        let result = codec.verify_refresh_token(&RefreshToken(expired)).await;
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[tokio::test]
    async fn out_of_range_ttl_is_an_internal_error() {
        let mut cfg = test_config();
        cfg.refresh_ttl = Duration::from_secs(1_000_000_000_000_000);
        let codec = JwtHs256Codec::new(cfg);

        let result = codec.issue_refresh_token(UserId::new_v4()).await;
        assert!(matches!(result, Err(TokenError::Internal(_))));
        assert!(codec.issue_access_token(UserId::new_v4()).await.is_ok());
    }

    #[tokio::test]
    async fn non_uuid_subject_is_invalid() {
        let codec = JwtHs256Codec::new(test_config());
        let token = forge("admin", Utc::now().timestamp() + 3600, ACCESS_KEY);
        let result = codec.verify_access_token(&AccessToken(token)).await;
        assert!(matches!(result, Err(TokenError::Invalid)));
    }
}
