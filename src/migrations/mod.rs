//! Forward-only schema migrations tracked by a single persisted integer.
//!
//! The persisted version counts how many entries of the declared step list
//! have been applied. Step `i` runs only while the version is `<= i`, and the
//! version is written as `i + 1` before step `i + 1` starts. A failing step
//! aborts the run and leaves the version at the last value written. Steps are
//! not rolled back: DDL that partially applied before a failure stays in
//! place, which is why every step is written to tolerate its own effects.

use std::collections::HashSet;

use sqlx::PgPool;
use tracing::{info, warn};

pub mod backend;
pub mod steps;

use backend::{PgSchemaBackend, SchemaBackend};
use steps::{MigrationStep, ACCOUNT_MIGRATIONS};

#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("duplicate migration step id {0:?}")]
    DuplicateStepId(&'static str),
    #[error("failed to read schema version")]
    LoadVersion(#[source] anyhow::Error),
    #[error("schema version {version} is ahead of the {known} known migration steps")]
    AheadOfCode { version: u32, known: usize },
    #[error("migration step {index} ({id}) failed")]
    Step {
        index: usize,
        id: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to persist schema version {version}")]
    PersistVersion {
        version: u32,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub from: u32,
    pub to: u32,
}

impl MigrationOutcome {
    pub fn applied(&self) -> u32 {
        self.to - self.from
    }
}

pub struct MigrationRunner<'a> {
    backend: &'a dyn SchemaBackend,
}

impl<'a> MigrationRunner<'a> {
    pub fn new(backend: &'a dyn SchemaBackend) -> Self {
        Self { backend }
    }

    pub async fn run(&self, steps: &[MigrationStep]) -> Result<MigrationOutcome, MigrationError> {
        let mut seen = HashSet::new();
        if let Some(dup) = steps.iter().find(|s| !seen.insert(s.id)) {
            return Err(MigrationError::DuplicateStepId(dup.id));
        }

        let from = self
            .backend
            .load_version()
            .await
            .map_err(MigrationError::LoadVersion)?;
        info!(version = from, steps = steps.len(), "database schema version");

        if from as usize > steps.len() {
            return Err(MigrationError::AheadOfCode {
                version: from,
                known: steps.len(),
            });
        }

        let mut version = from;
        for (index, step) in steps.iter().enumerate() {
            if version as usize > index {
                continue;
            }

            if let Err(source) = self.backend.apply(step).await {
                warn!(index, step = step.id, error = %source, "migration step failed");
                return Err(MigrationError::Step {
                    index,
                    id: step.id,
                    source,
                });
            }

            let next = (index + 1) as u32;
            self.backend
                .store_version(next)
                .await
                .map_err(|source| MigrationError::PersistVersion {
                    version: next,
                    source,
                })?;
            info!(
                from = version,
                to = next,
                step = step.id,
                "database version updated"
            );
            version = next;
        }

        Ok(MigrationOutcome { from, to: version })
    }
}

/// Brings the `account` schema up to date. Must complete before serving.
pub async fn run_account_migrations(db: &PgPool) -> Result<MigrationOutcome, MigrationError> {
    info!("setting up database migrations");
    let backend = PgSchemaBackend::new(db.clone());
    MigrationRunner::new(&backend).run(ACCOUNT_MIGRATIONS).await
}
