use sqlx::mysql::MySqlDatabaseError;

/// MySQL server error 1062 (`ER_DUP_ENTRY`): an insert or update hit a unique key.
const ER_DUP_ENTRY: u16 = 1062;

/// Whether `err` is a MySQL unique-key violation, e.g. a taken username or email.
pub fn is_dup_key(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.try_downcast_ref::<MySqlDatabaseError>())
        .is_some_and(|mysql_err| mysql_err.number() == ER_DUP_ENTRY)
}
