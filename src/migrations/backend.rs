use anyhow::Context;
use async_trait::async_trait;
use sqlx::{Executor, PgPool};
use tracing::debug;

use super::steps::MigrationStep;

/// Storage the migration runner drives.
#[async_trait]
pub trait SchemaBackend: Send + Sync {
    /// Returns the persisted version, creating the record at 0 if absent.
    async fn load_version(&self) -> anyhow::Result<u32>;
    async fn store_version(&self, version: u32) -> anyhow::Result<()>;
    async fn apply(&self, step: &MigrationStep) -> anyhow::Result<()>;
}

/// Single-row `version` table, shared with deployments that predate this
/// runner.
pub struct PgSchemaBackend {
    db: PgPool,
}

impl PgSchemaBackend {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SchemaBackend for PgSchemaBackend {
    async fn load_version(&self) -> anyhow::Result<u32> {
        self.db
            .execute("CREATE TABLE IF NOT EXISTS version (version int)")
            .await
            .context("create version table")?;

        let row = sqlx::query_scalar::<_, Option<i32>>("SELECT version FROM version LIMIT 1")
            .fetch_optional(&self.db)
            .await
            .context("select schema version")?;

        match row {
            Some(Some(v)) => u32::try_from(v)
                .with_context(|| format!("persisted schema version {v} is negative")),
            Some(None) => anyhow::bail!("persisted schema version is null"),
            None => {
                sqlx::query("INSERT INTO version (version) VALUES (0)")
                    .execute(&self.db)
                    .await
                    .context("seed schema version")?;
                debug!("seeded schema version at 0");
                Ok(0)
            }
        }
    }

    async fn store_version(&self, version: u32) -> anyhow::Result<()> {
        let v = i32::try_from(version).context("schema version out of range")?;
        sqlx::query("UPDATE version SET version = $1")
            .bind(v)
            .execute(&self.db)
            .await
            .with_context(|| format!("update schema version to {version}"))?;
        Ok(())
    }

    async fn apply(&self, step: &MigrationStep) -> anyhow::Result<()> {
        let sql = step.change.to_sql();
        debug!(step = step.id, %sql, "applying schema change");
        // Simple-query protocol: DO blocks are not preparable.
        self.db
            .execute(sql.as_str())
            .await
            .with_context(|| format!("execute {}", step.id))?;
        Ok(())
    }
}
