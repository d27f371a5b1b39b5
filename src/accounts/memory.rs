use std::{collections::HashMap, sync::Mutex};

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    repo::AccountRepository,
    repo_types::{Account, RepoError, StoredCredential},
};

struct Record {
    account: Account,
    password_hash: String,
}

/// Map-backed repository for tests. The username check and insert happen
/// under one lock, like a unique index.
#[derive(Default)]
pub struct MemoryAccountRepository {
    accounts: Mutex<HashMap<Uuid, Record>>,
}

impl MemoryAccountRepository {
    pub fn account_count(&self) -> usize {
        self.accounts.lock().unwrap().len()
    }

    /// Stores an account as-is, bypassing hashing.
    pub fn seed(&self, account: Account, password_hash: &str) {
        let record = Record {
            password_hash: password_hash.to_owned(),
            account,
        };
        self.accounts
            .lock()
            .unwrap()
            .insert(record.account.id, record);
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn insert(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<(Uuid, OffsetDateTime), RepoError> {
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.values().any(|r| r.account.username == username) {
            return Err(RepoError::DuplicateUsername);
        }
        let account = Account {
            id: Uuid::new_v4(),
            username: username.to_owned(),
            joined_at: OffsetDateTime::now_utc(),
        };
        let created = (account.id, account.joined_at);
        accounts.insert(
            account.id,
            Record {
                account,
                password_hash: password_hash.to_owned(),
            },
        );
        Ok(created)
    }

    async fn find_by_username(&self, username: &str) -> Result<StoredCredential, RepoError> {
        self.accounts
            .lock()
            .unwrap()
            .values()
            .find(|r| r.account.username == username)
            .map(|r| StoredCredential {
                id: r.account.id,
                password_hash: r.password_hash.clone(),
            })
            .ok_or(RepoError::NotFound)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Account, RepoError> {
        self.accounts
            .lock()
            .unwrap()
            .get(&id)
            .map(|r| r.account.clone())
            .ok_or(RepoError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> Result<(), RepoError> {
        self.accounts
            .lock()
            .unwrap()
            .remove(&id)
            .map(|_| ())
            .ok_or(RepoError::NotFound)
    }

    async fn count_by_username(&self, username: &str) -> Result<i64, RepoError> {
        let accounts = self.accounts.lock().unwrap();
        let count = accounts
            .values()
            .filter(|r| r.account.username == username)
            .count();
        Ok(count as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_rejects_duplicate_username() {
        let repo = MemoryAccountRepository::default();
        repo.insert("alice", "h1").await.unwrap();
        assert!(matches!(
            repo.insert("alice", "h2").await,
            Err(RepoError::DuplicateUsername)
        ));
        assert_eq!(repo.account_count(), 1);
        assert_eq!(repo.count_by_username("alice").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn usernames_are_case_sensitive() {
        let repo = MemoryAccountRepository::default();
        repo.insert("alice", "h").await.unwrap();
        repo.insert("Alice", "h").await.unwrap();
        assert_eq!(repo.account_count(), 2);
    }

    #[tokio::test]
    async fn lookup_and_delete() {
        let repo = MemoryAccountRepository::default();
        let (id, _) = repo.insert("bob", "hash").await.unwrap();

        let cred = repo.find_by_username("bob").await.unwrap();
        assert_eq!(cred.id, id);
        assert_eq!(cred.password_hash, "hash");
        assert_eq!(repo.find_by_id(id).await.unwrap().username, "bob");

        repo.delete(id).await.unwrap();
        assert!(matches!(repo.find_by_id(id).await, Err(RepoError::NotFound)));
        assert!(matches!(repo.delete(id).await, Err(RepoError::NotFound)));
        assert!(matches!(
            repo.find_by_username("bob").await,
            Err(RepoError::NotFound)
        ));
    }
}
