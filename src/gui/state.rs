use std::sync::Arc;

use futures::{StreamExt, future, stream};
use iced::{Task, task};
use tracing::debug;

use crate::{
    config::AppConfig,
    core::{
        FormMachine, IdentitySession, IdentityState, RecordStore, SqliteBackend,
        record::ApplicantRecord, store::RecordUpdate,
    },
};

/// Connected services, shared with background tasks.
#[derive(Debug, Clone)]
pub struct Services {
    pub backend: Arc<SqliteBackend>,
    pub session: Arc<IdentitySession<SqliteBackend>>,
    pub records: Arc<RecordStore<SqliteBackend>>,
}

impl Services {
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let backend = Arc::new(SqliteBackend::connect(&config).await?);
        let session = Arc::new(IdentitySession::new(backend.clone(), &config));
        let records = Arc::new(RecordStore::new(backend.clone(), &config, session.changes()));
        Ok(Self {
            backend,
            session,
            records,
        })
    }
}

#[derive(Debug)]
pub struct AppState {
    pub config: AppConfig,
    pub services: Option<Services>,
    pub identity: IdentityState,
    pub form: FormMachine,
    pub submitted: Option<ApplicantRecord>,
    feed: Option<task::Handle>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            services: None,
            identity: IdentityState::default(),
            form: FormMachine::new(),
            submitted: None,
            feed: None,
        }
    }

    /// (Re)subscribes to the current subject's record. Replaces any open feed.
    pub fn open_feed(&mut self) -> Task<RecordUpdate> {
        self.close_feed();
        let Some(services) = &self.services else {
            return Task::none();
        };
        let records = services.records.clone();
        let feed = stream::once(async move { records.subscribe().await }).flat_map(|result| {
            match result {
                Ok(subscription) => subscription.into_stream().left_stream(),
                Err(err) => {
                    let failed: RecordUpdate = Err(err);
                    stream::once(future::ready(failed)).right_stream()
                }
            }
        });
        let (task, handle) = Task::stream(feed).abortable();
        self.feed = Some(handle);
        task
    }

    pub fn close_feed(&mut self) {
        if let Some(handle) = self.feed.take() {
            debug!("Closing record feed");
            handle.abort();
        }
    }
}
