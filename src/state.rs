use crate::accounts::repo::{AccountRepository, PgAccountRepository};
use crate::auth::{jwt::TokenService, password::PasswordHasher};
use crate::config::AppConfig;
use anyhow::Context;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountRepository>,
    pub hasher: Arc<PasswordHasher>,
    pub tokens: Arc<TokenService>,
}

impl AppState {
    /// Wires the request-serving handles. Call only after migrations ran.
    pub fn init(config: &AppConfig, db: PgPool) -> anyhow::Result<Self> {
        let hasher = PasswordHasher::new(config.password).context("build password hasher")?;
        let tokens = TokenService::from_config(&config.token).context("build token service")?;
        let accounts = Arc::new(PgAccountRepository::new(db)) as Arc<dyn AccountRepository>;

        Ok(Self::from_parts(accounts, Arc::new(hasher), Arc::new(tokens)))
    }

    pub fn from_parts(
        accounts: Arc<dyn AccountRepository>,
        hasher: Arc<PasswordHasher>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            accounts,
            hasher,
            tokens,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::fake_with(Arc::new(
            crate::accounts::memory::MemoryAccountRepository::default(),
        ))
    }

    #[cfg(test)]
    pub fn fake_with(accounts: Arc<crate::accounts::memory::MemoryAccountRepository>) -> Self {
        use crate::auth::jwt::SigningSecret;

        let tokens = TokenService::new(
            SigningSecret::from_bytes("test"),
            std::time::Duration::from_secs(5 * 60),
        );
        Self::from_parts(
            accounts,
            Arc::new(crate::auth::password::cheap_hasher()),
            Arc::new(tokens),
        )
    }
}
