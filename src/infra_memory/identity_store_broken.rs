use crate::domain_model::*;
use crate::domain_port::*;

/// Store whose every call fails with the given backend error text.
pub struct BrokenIdentityStore {
    reason: String,
}

impl BrokenIdentityStore {
    pub fn new(reason: impl Into<String>) -> Self {
        BrokenIdentityStore {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> Result<T, IdentityStoreError> {
        Err(IdentityStoreError::Store(self.reason.clone()))
    }
}

#[async_trait::async_trait]
impl IdentityStore for BrokenIdentityStore {
    async fn find_by_id(&self, _id: UserId) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        self.fail()
    }

    async fn find_one(
        &self,
        _filter: &IdentityFilter,
    ) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        self.fail()
    }

    async fn create(&self, _identity: NewIdentity) -> Result<IdentityRecord, IdentityStoreError> {
        self.fail()
    }

    async fn set_current_refresh_token(
        &self,
        _id: UserId,
        _token: Option<&str>,
    ) -> Result<(), IdentityStoreError> {
        self.fail()
    }

    async fn compare_and_swap_refresh_token(
        &self,
        _id: UserId,
        _expected: &str,
        _new: &str,
    ) -> Result<bool, IdentityStoreError> {
        self.fail()
    }

    async fn update_credential_hash(
        &self,
        _id: UserId,
        _credential_hash: &str,
    ) -> Result<(), IdentityStoreError> {
        self.fail()
    }
}
