use time::OffsetDateTime;
use uuid::Uuid;

/// Public view of an account record. The password digest is only ever read
/// through [`StoredCredential`].
#[derive(Debug, Clone)]
pub struct Account {
    /// Generated at creation, never reused.
    pub id: Uuid,
    /// Unique, case-sensitive.
    pub username: String,
    /// UTC, set once.
    pub joined_at: OffsetDateTime,
}

/// What login needs to check a password.
#[derive(Debug, Clone)]
pub struct StoredCredential {
    pub id: Uuid,
    pub password_hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error("username already taken")]
    DuplicateUsername,
    #[error("account not found")]
    NotFound,
    #[error("stored row is corrupt: {0}")]
    Corrupt(String),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}
