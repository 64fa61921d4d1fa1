//! Database pool with split reader/writer connections in WAL mode.
//!
//! SQLite allows only one writer at a time. `DatabasePool` pairs a
//! multi-connection reader pool for concurrent reads with a single-connection
//! writer pool for serialized writes. The durable and fast stores each get
//! their own database file and their own migration set.

use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

static DURABLE_MIGRATIONS: Migrator = sqlx::migrate!("../../migrations/durable");
static FAST_MIGRATIONS: Migrator = sqlx::migrate!("../../migrations/fast");

/// Split read/write pool for SQLite with WAL mode.
///
/// - `reader`: Multi-connection pool (up to 8) for concurrent SELECT queries.
/// - `writer`: Single-connection pool for serialized INSERT/UPDATE/DELETE.
#[derive(Clone)]
pub struct DatabasePool {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl DatabasePool {
    /// Open the durable store database and apply its migrations.
    pub async fn durable(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::open(database_url, &DURABLE_MIGRATIONS).await
    }

    /// Open the fast store database and apply its migrations.
    pub async fn fast(database_url: &str) -> Result<Self, sqlx::Error> {
        Self::open(database_url, &FAST_MIGRATIONS).await
    }

    /// Both pools use WAL journal mode, foreign key enforcement, and a
    /// 5-second busy timeout. Migrations run on the writer before the reader
    /// pool is opened.
    async fn open(database_url: &str, migrator: &Migrator) -> Result<Self, sqlx::Error> {
        let base_opts = SqliteConnectOptions::from_str(database_url)?
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(std::time::Duration::from_secs(5))
            .create_if_missing(true);

        let read_opts = base_opts.clone().read_only(true);
        let write_opts = base_opts;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(write_opts)
            .await?;

        migrator.run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(read_opts)
            .await?;

        Ok(Self { reader, writer })
    }
}

/// SQLite URL for `file_name` inside `data_dir`.
pub fn database_url(data_dir: &Path, file_name: &str) -> String {
    format!("sqlite://{}?mode=rwc", data_dir.join(file_name).display())
}
