use crate::domain_model::*;

/// Lookup predicate for [`IdentityStore::find_one`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityFilter {
    Username(String),
    Email(String),
    /// Matches an identity whose username OR email equals the given value.
    /// A `None` side never matches.
    UsernameOrEmail {
        username: Option<String>,
        email: Option<String>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityStoreError {
    #[error("identity not found")]
    NotFound,
    #[error("identity with this username or email already exists")]
    Conflict,
    #[error("store error: {0}")]
    Store(String),
}

#[async_trait::async_trait]
pub trait IdentityStore: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<IdentityRecord>, IdentityStoreError>;

    async fn find_one(
        &self,
        filter: &IdentityFilter,
    ) -> Result<Option<IdentityRecord>, IdentityStoreError>;

    /// Insert a new identity. Fails with `Conflict` if the username or email is taken.
    async fn create(&self, identity: NewIdentity) -> Result<IdentityRecord, IdentityStoreError>;

    /// Overwrite (or clear, with `None`) the current refresh token unconditionally.
    async fn set_current_refresh_token(
        &self,
        id: UserId,
        token: Option<&str>,
    ) -> Result<(), IdentityStoreError>;

    /// Replace the current refresh token with `new` only if it still equals `expected`.
    /// Returns `false` when the stored value no longer matches; the check and the
    /// write must be one atomic step.
    async fn compare_and_swap_refresh_token(
        &self,
        id: UserId,
        expected: &str,
        new: &str,
    ) -> Result<bool, IdentityStoreError>;

    async fn update_credential_hash(
        &self,
        id: UserId,
        credential_hash: &str,
    ) -> Result<(), IdentityStoreError>;
}
