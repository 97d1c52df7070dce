use std::str::FromStr;

use anyhow::Context;
use sqlx::{
    Sqlite,
    pool::PoolConnection,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
};
use tokio::sync::{broadcast, watch};

use crate::{
    config::StoreLocation,
    core::{record::SubjectId, store::DocumentPath},
};

const IN_MEMORY_URL: &str = "sqlite::memory:";
const CHANGE_FEED_CAPACITY: usize = 64;

pub(super) struct BackendState {
    location: StoreLocation,
    pool: SqlitePool,
    pub(super) changes: broadcast::Sender<DocumentPath>,
    pub(super) subject: watch::Sender<Option<SubjectId>>,
}

impl std::fmt::Debug for BackendState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendState")
            .field("location", &self.location)
            .field("subject", &*self.subject.borrow())
            .finish()
    }
}

impl BackendState {
    pub(super) async fn open(location: &StoreLocation) -> anyhow::Result<Self> {
        let pool = match location {
            StoreLocation::File(db_file) => {
                if let Some(parent) = db_file.parent().filter(|p| !p.as_os_str().is_empty()) {
                    anyhow::ensure!(
                        parent.is_dir(),
                        "Database directory does not exist: {:?}",
                        parent
                    );
                }
                let connect_opts = SqliteConnectOptions::new()
                    .filename(db_file)
                    .create_if_missing(true)
                    .journal_mode(SqliteJournalMode::Wal)
                    .synchronous(SqliteSynchronous::Normal);

                SqlitePoolOptions::new()
                    .max_connections(5)
                    .connect_with(connect_opts)
                    .await
                    .with_context(|| format!("Failed to open document store {:?}", db_file))?
            }
            StoreLocation::InMemory => {
                // Every connection to :memory: is its own database, so pin exactly one.
                let connect_opts = SqliteConnectOptions::from_str(IN_MEMORY_URL)?;
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(connect_opts)
                    .await
                    .context("Failed to open in-memory document store")?
            }
        };
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("Failed to apply document store migrations")?;

        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        let (subject, _) = watch::channel(None);
        Ok(Self {
            location: location.clone(),
            pool,
            changes,
            subject,
        })
    }

    pub(super) async fn conn(&self) -> Result<PoolConnection<Sqlite>, sqlx::Error> {
        self.pool.acquire().await
    }

    /// Waits for in-flight queries and releases the database file.
    pub(super) async fn close(&self) {
        self.pool.close().await;
    }
}
