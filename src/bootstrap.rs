//! Application wiring.
//!
//! [`AppHandle::start`] connects to the configured database, prepares the
//! schema and hands back an [`AllocationService`] backed by SeaORM units of
//! work. The CLI and the integration tests both start from here.

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use tracing::info;

use crate::application::AllocationService;
use crate::config::AppConfig;
use crate::infrastructure::{init_database, prepare_schema, reset_schema, SeaOrmUnitOfWorkFactory};
use crate::shared::errors::InfraError;

/// Options for starting the application.
pub struct AppOptions {
    pub config: AppConfig,
    /// Apply pending migrations on startup. Defaults to
    /// `config.database.auto_migrate`.
    pub auto_migrate: bool,
}

impl AppOptions {
    pub fn new(config: AppConfig) -> Self {
        Self {
            auto_migrate: config.database.auto_migrate,
            config,
        }
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::new(AppConfig::default())
    }
}

/// A connected application.
pub struct AppHandle {
    pub service: AllocationService,
    pub config: AppConfig,
    db: DatabaseConnection,
}

impl AppHandle {
    pub async fn start(opts: AppOptions) -> Result<Self, InfraError> {
        let config = opts.config;
        let db_config = config.to_database_config();
        info!(url = %db_config.url, "Starting allocation service");

        let db = init_database(&db_config).await?;
        if opts.auto_migrate {
            prepare_schema(&db).await?;
        } else {
            info!("Skipping database migrations");
        }

        let factory = SeaOrmUnitOfWorkFactory::new(db.clone());
        Ok(Self {
            service: AllocationService::new(Arc::new(factory)),
            config,
            db,
        })
    }

    pub fn db(&self) -> &DatabaseConnection {
        &self.db
    }

    pub async fn migrate(&self) -> Result<(), InfraError> {
        prepare_schema(&self.db).await?;
        Ok(())
    }

    /// Drop and recreate every table.
    pub async fn reset(&self) -> Result<(), InfraError> {
        reset_schema(&self.db).await?;
        Ok(())
    }

    pub async fn close(self) -> Result<(), InfraError> {
        self.db.close().await?;
        info!("Database connection closed");
        Ok(())
    }
}

/// Install the global tracing subscriber. `RUST_LOG` overrides
/// `logging.level`; `logging.format = "json"` switches to JSON lines.
pub fn init_tracing(config: &AppConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.is_json() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
