use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Process-local identity store, used by tests and the `memory` store backend.
///
/// Username and email uniqueness is enforced through two index maps that are
/// claimed before the record is inserted.
#[derive(Default)]
pub struct MemoryIdentityStore {
    records: DashMap<UserId, IdentityRecord>,
    by_username: DashMap<String, UserId>,
    by_email: DashMap<String, UserId>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, id: Option<UserId>) -> Option<IdentityRecord> {
        id.and_then(|id| self.records.get(&id).map(|r| r.value().clone()))
    }

    fn id_by_username(&self, username: &str) -> Option<UserId> {
        self.by_username.get(username).map(|r| *r.value())
    }

    fn id_by_email(&self, email: &str) -> Option<UserId> {
        self.by_email.get(email).map(|r| *r.value())
    }
}

#[async_trait::async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        Ok(self.get(Some(id)))
    }

    async fn find_one(
        &self,
        filter: &IdentityFilter,
    ) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        let id = match filter {
            IdentityFilter::Username(username) => self.id_by_username(username),
            IdentityFilter::Email(email) => self.id_by_email(email),
            IdentityFilter::UsernameOrEmail { username, email } => username
                .as_deref()
                .and_then(|u| self.id_by_username(u))
                .or_else(|| email.as_deref().and_then(|e| self.id_by_email(e))),
        };
        Ok(self.get(id))
    }

    async fn create(&self, identity: NewIdentity) -> Result<IdentityRecord, IdentityStoreError> {
        match self.by_username.entry(identity.username.clone()) {
            Entry::Occupied(_) => return Err(IdentityStoreError::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(identity.id);
            }
        }
        match self.by_email.entry(identity.email.clone()) {
            Entry::Occupied(_) => {
                self.by_username.remove(&identity.username);
                return Err(IdentityStoreError::Conflict);
            }
            Entry::Vacant(slot) => {
                slot.insert(identity.id);
            }
        }

        let record = IdentityRecord {
            id: identity.id,
            username: identity.username,
            email: identity.email,
            fullname: identity.fullname,
            credential_hash: identity.credential_hash,
            current_refresh_token: None,
            created_at: Utc::now(),
        };
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn set_current_refresh_token(
        &self,
        id: UserId,
        token: Option<&str>,
    ) -> Result<(), IdentityStoreError> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(IdentityStoreError::NotFound)?;
        record.current_refresh_token = token.map(str::to_owned);
        Ok(())
    }

    async fn compare_and_swap_refresh_token(
        &self,
        id: UserId,
        expected: &str,
        new: &str,
    ) -> Result<bool, IdentityStoreError> {
        // The shard write guard is held across the check and the write.
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(IdentityStoreError::NotFound)?;
        if record.current_refresh_token.as_deref() != Some(expected) {
            return Ok(false);
        }
        record.current_refresh_token = Some(new.to_owned());
        Ok(true)
    }

    async fn update_credential_hash(
        &self,
        id: UserId,
        credential_hash: &str,
    ) -> Result<(), IdentityStoreError> {
        let mut record = self
            .records
            .get_mut(&id)
            .ok_or(IdentityStoreError::NotFound)?;
        record.credential_hash = credential_hash.to_owned();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_identity(username: &str, email: &str) -> NewIdentity {
        NewIdentity {
            id: UserId::new_v4(),
            username: username.to_string(),
            email: email.to_string(),
            fullname: "Test User".to_string(),
            credential_hash: "hash".to_string(),
        }
    }

    #[tokio::test]
    async fn finds_by_username_or_email() {
        let store = MemoryIdentityStore::new();
        let created = store.create(new_identity("alice", "alice@example.com")).await.unwrap();

        let by_email = store
            .find_one(&IdentityFilter::UsernameOrEmail {
                username: None,
                email: Some("alice@example.com".to_string()),
            })
            .await
            .unwrap();
        assert_eq!(by_email.map(|r| r.id), Some(created.id));

        let by_username = store
            .find_one(&IdentityFilter::Username("alice".to_string()))
            .await
            .unwrap();
        assert_eq!(by_username.map(|r| r.id), Some(created.id));

        let nobody = store
            .find_one(&IdentityFilter::UsernameOrEmail {
                username: Some("bob".to_string()),
                email: None,
            })
            .await
            .unwrap();
        assert!(nobody.is_none());
    }

    #[tokio::test]
    async fn duplicate_email_releases_the_username_claim() {
        let store = MemoryIdentityStore::new();
        store.create(new_identity("alice", "shared@example.com")).await.unwrap();

        let dup = store.create(new_identity("bob", "shared@example.com")).await;
        assert!(matches!(dup, Err(IdentityStoreError::Conflict)));

        // "bob" must still be available after the failed insert.
        store.create(new_identity("bob", "bob@example.com")).await.unwrap();
    }

    #[tokio::test]
    async fn compare_and_swap_only_replaces_the_expected_value() {
        let store = MemoryIdentityStore::new();
        let id = store.create(new_identity("carol", "carol@example.com")).await.unwrap().id;
        store.set_current_refresh_token(id, Some("r1")).await.unwrap();

        assert!(!store.compare_and_swap_refresh_token(id, "stale", "r2").await.unwrap());
        assert!(store.compare_and_swap_refresh_token(id, "r1", "r2").await.unwrap());
        assert!(!store.compare_and_swap_refresh_token(id, "r1", "r3").await.unwrap());

        let stored = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.current_refresh_token.as_deref(), Some("r2"));
    }

    #[tokio::test]
    async fn writes_to_unknown_identity_are_not_found() {
        let store = MemoryIdentityStore::new();
        let missing = UserId::new_v4();
        assert!(matches!(
            store.set_current_refresh_token(missing, None).await,
            Err(IdentityStoreError::NotFound)
        ));
        assert!(matches!(
            store.update_credential_hash(missing, "h").await,
            Err(IdentityStoreError::NotFound)
        ));
    }
}
