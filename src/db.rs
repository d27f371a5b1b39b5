use anyhow::Context;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use tracing::info;

use crate::config::DatabaseConfig;

pub fn connect_options(cfg: &DatabaseConfig) -> anyhow::Result<PgConnectOptions> {
    if let Some(url) = &cfg.url {
        return url.parse().context("parse DATABASE_URL");
    }
    let mut opts = PgConnectOptions::new()
        .host(&cfg.host)
        .port(cfg.port)
        .username(&cfg.user)
        .database(&cfg.name);
    if let Some(password) = &cfg.password {
        opts = opts.password(password);
    }
    Ok(opts)
}

pub async fn connect(cfg: &DatabaseConfig) -> anyhow::Result<PgPool> {
    info!(host = %cfg.host, database = %cfg.name, "connecting to database");
    let db = PgPoolOptions::new()
        .max_connections(cfg.max_connections)
        .connect_with(connect_options(cfg)?)
        .await
        .context("connect to database")?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg(url: Option<&str>) -> DatabaseConfig {
        DatabaseConfig {
            url: url.map(str::to_owned),
            host: "db_postgres".into(),
            port: 5433,
            user: "svc".into(),
            password: Some("p@ss word".into()),
            name: "accounts".into(),
            max_connections: 2,
        }
    }

    #[test]
    fn discrete_settings_build_options() {
        let opts = connect_options(&cfg(None)).unwrap();
        assert_eq!(opts.get_host(), "db_postgres");
        assert_eq!(opts.get_port(), 5433);
        assert_eq!(opts.get_username(), "svc");
        assert_eq!(opts.get_database(), Some("accounts"));
    }

    #[test]
    fn url_takes_precedence() {
        let opts = connect_options(&cfg(Some("postgres://u:p@elsewhere:6000/other"))).unwrap();
        assert_eq!(opts.get_host(), "elsewhere");
        assert_eq!(opts.get_port(), 6000);
        assert_eq!(opts.get_database(), Some("other"));
    }

    #[test]
    fn bad_url_is_an_error() {
        assert!(connect_options(&cfg(Some("not a url"))).is_err());
    }
}
