use super::util::is_dup_key;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};
use uuid::Uuid;

/// Identity store over a single `identity` table:
///
/// ```sql
/// CREATE TABLE identity (
///     id            BINARY(16)   NOT NULL PRIMARY KEY,
///     username      VARCHAR(64)  NOT NULL UNIQUE,
///     email         VARCHAR(255) NOT NULL UNIQUE,
///     fullname      VARCHAR(255) NOT NULL,
///     password_hash VARCHAR(255) NOT NULL,
///     refresh_token TEXT         NULL,
///     created_at    TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)
/// );
/// ```
pub struct MySqlIdentityStore {
    pool: MySqlPool,
}

const SELECT_COLUMNS: &str =
    "SELECT id, username, email, fullname, password_hash, refresh_token, created_at FROM identity";

impl MySqlIdentityStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlIdentityStore { pool }
    }

    #[inline]
    fn uid_as_bytes(id: &UserId) -> &[u8] {
        id.0.as_bytes()
    }

    #[inline]
    fn uid_from_bytes(id: &[u8]) -> Result<UserId, IdentityStoreError> {
        Ok(UserId(
            Uuid::from_slice(id).map_err(|e| IdentityStoreError::Store(e.to_string()))?,
        ))
    }

    fn row_to_record(row: MySqlRow) -> Result<IdentityRecord, IdentityStoreError> {
        let id_bytes: Vec<u8> = row.try_get("id").map_err(store_err)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(store_err)?;

        Ok(IdentityRecord {
            id: Self::uid_from_bytes(&id_bytes)?,
            username: row.try_get("username").map_err(store_err)?,
            email: row.try_get("email").map_err(store_err)?,
            fullname: row.try_get("fullname").map_err(store_err)?,
            credential_hash: row.try_get("password_hash").map_err(store_err)?,
            current_refresh_token: row.try_get("refresh_token").map_err(store_err)?,
            created_at,
        })
    }

    /// MySQL reports rows *changed*, not rows matched, so a zero count on an
    /// UPDATE is ambiguous until existence is checked.
    async fn ensure_exists(&self, id: UserId) -> Result<(), IdentityStoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM identity WHERE id = ?")
            .bind(Self::uid_as_bytes(&id))
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;

        if count > 0 {
            Ok(())
        } else {
            Err(IdentityStoreError::NotFound)
        }
    }
}

fn store_err(e: sqlx::Error) -> IdentityStoreError {
    IdentityStoreError::Store(e.to_string())
}

#[async_trait::async_trait]
impl IdentityStore for MySqlIdentityStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        let row_opt = sqlx::query(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(Self::uid_as_bytes(&id))
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn find_one(
        &self,
        filter: &IdentityFilter,
    ) -> Result<Option<IdentityRecord>, IdentityStoreError> {
        // NULL never compares equal, so a missing side matches nothing.
        let (username, email) = match filter {
            IdentityFilter::Username(username) => (Some(username.as_str()), None),
            IdentityFilter::Email(email) => (None, Some(email.as_str())),
            IdentityFilter::UsernameOrEmail { username, email } => {
                (username.as_deref(), email.as_deref())
            }
        };

        let sql = format!("{SELECT_COLUMNS} WHERE username = ? OR email = ? LIMIT 1");
        let row_opt = sqlx::query(&sql)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        row_opt.map(Self::row_to_record).transpose()
    }

    async fn create(&self, identity: NewIdentity) -> Result<IdentityRecord, IdentityStoreError> {
        sqlx::query(
            r#"
INSERT INTO identity (id, username, email, fullname, password_hash)
VALUES (?, ?, ?, ?, ?)
"#,
        )
        .bind(Self::uid_as_bytes(&identity.id))
        .bind(&identity.username)
        .bind(&identity.email)
        .bind(&identity.fullname)
        .bind(&identity.credential_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                IdentityStoreError::Conflict
            } else {
                store_err(e)
            }
        })?;

        self.find_by_id(identity.id).await?.ok_or_else(|| {
            IdentityStoreError::Store("identity missing right after insert".to_string())
        })
    }

    async fn set_current_refresh_token(
        &self,
        id: UserId,
        token: Option<&str>,
    ) -> Result<(), IdentityStoreError> {
        let result = sqlx::query("UPDATE identity SET refresh_token = ? WHERE id = ?")
            .bind(token)
            .bind(Self::uid_as_bytes(&id))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        if result.rows_affected() == 0 {
            self.ensure_exists(id).await?;
        }
        Ok(())
    }

    async fn compare_and_swap_refresh_token(
        &self,
        id: UserId,
        expected: &str,
        new: &str,
    ) -> Result<bool, IdentityStoreError> {
        let result = sqlx::query(
            r#"
UPDATE identity
SET refresh_token = ?
WHERE id = ? AND refresh_token = ?
"#,
        )
        .bind(new)
        .bind(Self::uid_as_bytes(&id))
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn update_credential_hash(
        &self,
        id: UserId,
        credential_hash: &str,
    ) -> Result<(), IdentityStoreError> {
        let result = sqlx::query("UPDATE identity SET password_hash = ? WHERE id = ?")
            .bind(credential_hash)
            .bind(Self::uid_as_bytes(&id))
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        if result.rows_affected() == 0 {
            self.ensure_exists(id).await?;
        }
        Ok(())
    }
}
