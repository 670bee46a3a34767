use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::logger::*;
use crate::settings::Settings;
use anyhow::{anyhow, bail};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;

/// Wired services shared by every request.
pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub secure_cookies: bool,
    pool: Option<MySqlPool>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let (identity_store, pool): (Arc<dyn IdentityStore>, Option<MySqlPool>) =
            match settings.store.backend.as_str() {
                "memory" => (Arc::new(MemoryIdentityStore::new()), None),
                "mysql" => {
                    let dsn = settings
                        .store
                        .dsn
                        .as_deref()
                        .ok_or_else(|| anyhow!("store.dsn is required for the mysql backend"))?;
                    let pool = MySqlPoolOptions::new()
                        .max_connections(settings.store.max_connections)
                        .connect(dsn)
                        .await?;
                    (Arc::new(MySqlIdentityStore::new(pool.clone())), Some(pool))
                }
                other => bail!("Unknown store backend: {}", other),
            };

        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: settings.jwt.issuer.clone(),
            audience: settings.jwt.audience.clone(),
            access_ttl: settings.jwt.access_ttl(),
            refresh_ttl: settings.jwt.refresh_ttl(),
            access_signing_key: settings.jwt.access_secret.clone().into_bytes(),
            refresh_signing_key: settings.jwt.refresh_secret.clone().into_bytes(),
        }));

        let session_manager: Arc<dyn SessionTokenManager> = Arc::new(
            RealSessionTokenManager::new(identity_store.clone(), token_codec),
        );
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);

        let auth_service: Arc<dyn AuthService> = match settings.auth.backend.as_str() {
            "fake" => Arc::new(FakeAuthService::new()),
            "real" => Arc::new(RealAuthService::new(
                identity_store,
                credential_hasher,
                session_manager,
            )),
            other => bail!("Unknown auth backend: {}", other),
        };

        info!(
            auth = %settings.auth.backend,
            store = %settings.store.backend,
            "server started"
        );

        Ok(Self {
            auth_service,
            secure_cookies: settings.http.secure_cookies,
            pool,
        })
    }

    #[cfg(test)]
    pub(crate) fn with_auth_service(auth_service: Arc<dyn AuthService>, secure_cookies: bool) -> Self {
        Self {
            auth_service,
            secure_cookies,
            pool: None,
        }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
