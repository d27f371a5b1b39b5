use anyhow::Context;
use tracing::{info, warn};

use super::basic::Credential;
use crate::{
    accounts::repo_types::{Account, RepoError},
    error::{AppError, AppResult},
    state::AppState,
};

/// Creates an account. The repository's duplicate rejection is authoritative;
/// the count beforehand only skips a hash for names that are obviously taken.
pub async fn register(state: &AppState, credential: Credential) -> AppResult<Account> {
    let Credential { username, password } = credential;
    if username.is_empty() || password.is_empty() {
        return Err(AppError::Validation("empty username or password".into()));
    }

    if state.accounts.count_by_username(&username).await? > 0 {
        warn!(%username, "username already registered");
        return Err(AppError::DuplicateUsername);
    }

    let hasher = state.hasher.clone();
    let password_hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .context("hashing task")??;

    let (id, joined_at) = match state.accounts.insert(&username, &password_hash).await {
        Ok(created) => created,
        Err(RepoError::DuplicateUsername) => {
            warn!(%username, "username taken at insert");
            return Err(AppError::DuplicateUsername);
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %id, %username, "user registered");
    Ok(Account {
        id,
        username,
        joined_at,
    })
}

/// Checks a credential and issues a bearer token. Unknown usernames and wrong
/// passwords fail identically.
pub async fn login(state: &AppState, credential: Credential) -> AppResult<String> {
    let Credential { username, password } = credential;

    let stored = match state.accounts.find_by_username(&username).await {
        Ok(stored) => Some(stored),
        Err(RepoError::NotFound) => None,
        Err(e) => return Err(e.into()),
    };

    let hasher = state.hasher.clone();
    let digest = stored.as_ref().map(|s| s.password_hash.clone());
    let ok = tokio::task::spawn_blocking(move || match digest {
        Some(digest) => hasher.verify(&digest, &password),
        None => {
            hasher.verify_decoy(&password);
            false
        }
    })
    .await
    .context("verify task")?;

    let Some(stored) = stored.filter(|_| ok) else {
        warn!(%username, "login rejected");
        return Err(AppError::InvalidCredentials);
    };

    let token = state.tokens.issue(stored.id)?;
    info!(user_id = %stored.id, "user logged in");
    Ok(token)
}
