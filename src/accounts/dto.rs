use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::Account;

/// Public part of an account.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub username: String,
    pub id: Uuid,
    #[serde(rename = "dateJoined", with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
}

impl From<Account> for UserResponse {
    fn from(a: Account) -> Self {
        Self {
            username: a.username,
            id: a.id,
            date_joined: a.joined_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExistsQuery {
    pub username: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub user_exists: bool,
}
