pub mod entities;
pub mod migrator;
pub mod repositories;
pub mod unit_of_work;

pub use repositories::SeaOrmBatchRepository;
pub use unit_of_work::{SeaOrmUnitOfWork, SeaOrmUnitOfWorkFactory};

use std::str::FromStr;

use sea_orm::sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sea_orm::sqlx::ConnectOptions as _;
use sea_orm::{
    ConnectOptions, Database, DatabaseConnection, DbErr, RuntimeErr, SqlxSqliteConnector,
};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use migrator::Migrator;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://./allocation.db?mode=rwc")
    pub url: String,
    /// Upper bound on pooled connections (ignored for in-memory databases)
    pub max_connections: u32,
    /// Log every SQL statement at debug level
    pub sqlx_logging: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./allocation.db?mode=rwc".to_string(),
            max_connections: 5,
            sqlx_logging: false,
        }
    }
}

impl DatabaseConfig {
    /// Create config for SQLite
    pub fn sqlite(path: &str) -> Self {
        Self {
            url: format!("sqlite://{}?mode=rwc", path),
            ..Self::default()
        }
    }

    /// Private in-memory SQLite database, used by tests
    pub fn in_memory() -> Self {
        Self {
            url: "sqlite::memory:".to_string(),
            ..Self::default()
        }
    }

    /// Create config from environment variable
    pub fn from_env() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://./allocation.db?mode=rwc".to_string()),
            ..Self::default()
        }
    }

    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// Initialize database connection
pub async fn init_database(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    info!("Connecting to database: {}", config.url);

    if config.is_in_memory() {
        return connect_in_memory(config).await;
    }

    let mut options = ConnectOptions::new(config.url.clone());
    options
        .max_connections(config.max_connections.max(1))
        .sqlx_logging(config.sqlx_logging)
        .sqlx_logging_level(log::LevelFilter::Debug);

    let db = Database::connect(options).await?;
    info!("Database connected successfully");
    Ok(db)
}

/// Every connection to an in-memory SQLite URL gets its own empty database,
/// so the pool holds exactly one connection that is never recycled.
async fn connect_in_memory(config: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let conn_err = |e: sea_orm::sqlx::Error| DbErr::Conn(RuntimeErr::Internal(e.to_string()));

    let mut options = SqliteConnectOptions::from_str(&config.url).map_err(conn_err)?;
    options = if config.sqlx_logging {
        options.log_statements(log::LevelFilter::Debug)
    } else {
        options.disable_statement_logging()
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .max_lifetime(None)
        .idle_timeout(None)
        .connect_with(options)
        .await
        .map_err(conn_err)?;

    info!("In-memory database connected");
    Ok(SqlxSqliteConnector::from_sqlx_sqlite_pool(pool))
}

/// Apply pending migrations. Safe to call any number of times: migrations
/// already applied are skipped.
pub async fn prepare_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(db, None).await?;
    info!("Database schema is up to date");
    Ok(())
}

/// Roll back every migration and re-apply them, leaving empty tables.
pub async fn reset_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::reset(db).await?;
    Migrator::up(db, None).await?;
    info!("Database schema reset");
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_database() -> DatabaseConnection {
    let db = init_database(&DatabaseConfig::in_memory())
        .await
        .expect("in-memory database");
    prepare_schema(&db).await.expect("migrations");
    db
}

#[cfg(test)]
mod tests {
    use sea_orm::{EntityTrait, PaginatorTrait};

    use super::*;

    #[tokio::test]
    async fn prepare_schema_is_idempotent() {
        let db = test_database().await;
        prepare_schema(&db).await.unwrap();
        prepare_schema(&db).await.unwrap();

        let applied = Migrator::get_applied_migrations(&db).await.unwrap();
        assert_eq!(applied.len(), 3);
    }

    #[tokio::test]
    async fn reset_schema_empties_tables() {
        use sea_orm::{ActiveModelTrait, Set};

        let db = test_database().await;
        entities::batch::ActiveModel {
            reference: Set("batch1".into()),
            sku: Set("SKU1".into()),
            purchased_quantity: Set(10),
            eta: Set(None),
        }
        .insert(&db)
        .await
        .unwrap();
        assert_eq!(entities::Batch::find().count(&db).await.unwrap(), 1);

        reset_schema(&db).await.unwrap();
        assert_eq!(entities::Batch::find().count(&db).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn in_memory_pool_keeps_its_single_connection() {
        let db = test_database().await;
        let pool = db.get_sqlite_connection_pool();

        assert_eq!(pool.options().get_max_connections(), 1);
        assert_eq!(pool.options().get_max_lifetime(), None);
        assert_eq!(pool.options().get_idle_timeout(), None);
    }

    #[test]
    fn detects_in_memory_urls() {
        assert!(DatabaseConfig::in_memory().is_in_memory());
        assert!(DatabaseConfig::sqlite("file::memory:").is_in_memory());
        assert!(!DatabaseConfig::sqlite("./allocation.db").is_in_memory());
    }
}
