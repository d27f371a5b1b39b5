use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::debug;
use uuid::Uuid;

use super::repo_types::{Account, RepoError, StoredCredential};

/// Durable account storage. Implementations must reject a duplicate username
/// atomically; that rejection is the authoritative "taken" signal.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(Uuid, OffsetDateTime), RepoError>;
    async fn find_by_username(&self, username: &str) -> Result<StoredCredential, RepoError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Account, RepoError>;
    async fn delete(&self, id: Uuid) -> Result<(), RepoError>;
    async fn count_by_username(&self, username: &str) -> Result<i64, RepoError>;
}

/// Created by the `unique-account-username` migration step.
const USERNAME_UNIQUE_INDEX: &str = "account_username_key";

#[derive(Clone)]
pub struct PgAccountRepository {
    db: PgPool,
}

impl PgAccountRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

// Columns predating the uuid migration are nullable.
#[derive(FromRow)]
struct AccountRow {
    uuid: Option<String>,
    username: Option<String>,
    date_joined: Option<PrimitiveDateTime>,
}

impl TryFrom<AccountRow> for Account {
    type Error = RepoError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: parse_id(row.uuid)?,
            username: row
                .username
                .ok_or_else(|| RepoError::Corrupt("username is null".into()))?,
            joined_at: row
                .date_joined
                .ok_or_else(|| RepoError::Corrupt("date_joined is null".into()))?
                .assume_utc(),
        })
    }
}

/// Other unique indexes (the uuid one) must not read as a taken username.
fn is_username_index(constraint: Option<&str>) -> bool {
    constraint == Some(USERNAME_UNIQUE_INDEX)
}

fn parse_id(raw: Option<String>) -> Result<Uuid, RepoError> {
    let raw = raw.ok_or_else(|| RepoError::Corrupt("uuid is null".into()))?;
    Uuid::parse_str(&raw).map_err(|e| RepoError::Corrupt(format!("uuid {raw:?}: {e}")))
}

#[async_trait]
impl AccountRepository for PgAccountRepository {
    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(Uuid, OffsetDateTime), RepoError> {
        let id = Uuid::new_v4();
        let now = OffsetDateTime::now_utc();
        // Postgres keeps microseconds; drop the rest so the returned value
        // matches what a later read yields.
        let now = now - time::Duration::nanoseconds(i64::from(now.nanosecond() % 1_000));
        // Column is `timestamp` without zone; values are always UTC.
        let joined = PrimitiveDateTime::new(now.date(), now.time());

        sqlx::query(
            r#"
            INSERT INTO account (username, encrypted_password, date_joined, uuid)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .bind(joined)
        .bind(id.to_string())
        .execute(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db)
                if db.is_unique_violation() && is_username_index(db.constraint()) =>
            {
                RepoError::DuplicateUsername
            }
            other => RepoError::Database(other),
        })?;

        debug!(%id, %username, "account inserted");
        Ok((id, joined.assume_utc()))
    }

    async fn find_by_username(&self, username: &str) -> Result<StoredCredential, RepoError> {
        let row = sqlx::query_as::<_, (Option<String>, Option<String>)>(
            r#"
            SELECT uuid, encrypted_password
            FROM account
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.db)
        .await?
        .ok_or(RepoError::NotFound)?;

        Ok(StoredCredential {
            id: parse_id(row.0)?,
            password_hash: row
                .1
                .ok_or_else(|| RepoError::Corrupt("encrypted_password is null".into()))?,
        })
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Account, RepoError> {
        let row = sqlx::query_as::<_, AccountRow>(
            r#"
            SELECT uuid, username, date_joined
            FROM account
            WHERE uuid = $1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.db)
        .await?
        .ok_or(RepoError::NotFound)?;

        row.try_into()
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM account WHERE uuid = $1")
            .bind(id.to_string())
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        debug!(%id, "account deleted");
        Ok(())
    }

    async fn count_by_username(&self, username: &str) -> Result<i64, RepoError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT count(1) FROM account WHERE username = $1")
                .bind(username)
                .fetch_one(&self.db)
                .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(uuid: Option<&str>) -> AccountRow {
        AccountRow {
            uuid: uuid.map(str::to_owned),
            username: Some("alice".into()),
            date_joined: Some(time::macros::datetime!(2024-03-01 12:30:00)),
        }
    }

    #[test]
    fn row_converts_to_account_in_utc() {
        let id = Uuid::new_v4();
        let account = Account::try_from(row(Some(&id.to_string()))).unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.username, "alice");
        assert_eq!(
            account.joined_at,
            time::macros::datetime!(2024-03-01 12:30:00 UTC)
        );
    }

    #[test]
    fn only_the_username_index_means_duplicate_username() {
        assert!(is_username_index(Some("account_username_key")));
        assert!(!is_username_index(Some("account_uuid_key")));
        assert!(!is_username_index(Some("account_email_key")));
        assert!(!is_username_index(None));
    }

    #[test]
    fn legacy_row_without_uuid_is_corrupt() {
        assert!(matches!(
            Account::try_from(row(None)),
            Err(RepoError::Corrupt(_))
        ));
        assert!(matches!(
            Account::try_from(row(Some("not-a-uuid"))),
            Err(RepoError::Corrupt(_))
        ));
    }
}
