use std::{fmt, future::Future, sync::Arc};

use futures::{Stream, stream};
use serde_json::{Map, Value};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    core::{
        error::StoreError,
        identity::IdentityState,
        record::{ApplicantRecord, SubjectId},
    },
};

/// A JSON object stored at one path.
pub type Document = Map<String, Value>;

const USERS_SEGMENT: &str = "users";
const REGISTRATIONS_SEGMENT: &str = "registrations";
const REGISTRATION_DOCUMENT: &str = "vehicle_registration";

/// `{namespace}/users/{subject}/registrations/vehicle_registration`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath(String);

impl DocumentPath {
    pub fn registration(namespace: &str, subject: &SubjectId) -> Self {
        Self(format!(
            "{namespace}/{USERS_SEGMENT}/{subject}/{REGISTRATIONS_SEGMENT}/{REGISTRATION_DOCUMENT}"
        ))
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn namespace(&self) -> Option<&str> {
        self.0.split('/').next().filter(|ns| !ns.is_empty())
    }

    /// The subject owning this path, if the path follows the per-user scheme.
    pub fn owner(&self) -> Option<&str> {
        let mut segments = self.0.split('/');
        let _namespace = segments.next()?;
        if segments.next()? != USERS_SEGMENT {
            return None;
        }
        segments.next().filter(|owner| !owner.is_empty())
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Point-addressed JSON document store, acting on behalf of `caller`.
pub trait DocumentStore: Send + Sync + 'static {
    fn get(
        &self,
        path: &DocumentPath,
        caller: &SubjectId,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Overwrites the top-level keys in `fields`, creating the document if absent.
    fn merge(
        &self,
        path: &DocumentPath,
        caller: &SubjectId,
        fields: Document,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Paths of documents changed after this call.
    fn changes(&self) -> broadcast::Receiver<DocumentPath>;
}

/// Stops a background task when cancelled or dropped.
#[derive(Debug)]
pub struct CancelHandle {
    task: Option<JoinHandle<()>>,
}

impl CancelHandle {
    pub(crate) fn new(task: JoinHandle<()>) -> Self {
        Self { task: Some(task) }
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for CancelHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

pub type RecordUpdate = Result<Option<ApplicantRecord>, StoreError>;

/// Live view of one subject's record. Dropping it ends the subscription.
#[derive(Debug)]
pub struct RecordSubscription {
    subject: SubjectId,
    updates: mpsc::UnboundedReceiver<RecordUpdate>,
    handle: CancelHandle,
}

impl RecordSubscription {
    pub fn subject(&self) -> &SubjectId {
        &self.subject
    }

    /// Next pushed value; `None` once cancelled.
    pub async fn next(&mut self) -> Option<RecordUpdate> {
        self.updates.recv().await
    }

    /// Stops further pushes; `next` drains what was already sent, then yields `None`.
    pub fn cancel(&mut self) {
        self.handle.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn into_stream(self) -> impl Stream<Item = RecordUpdate> + Send + 'static {
        stream::unfold(self, |mut subscription| async move {
            let update = subscription.next().await?;
            Some((update, subscription))
        })
    }
}

/// Record-level access to the current subject's single registration document.
///
/// Every operation resolves the subject from the identity session at call time and
/// fails with [`StoreError::NotReady`] when there is none.
#[derive(Debug)]
pub struct RecordStore<S> {
    store: Arc<S>,
    namespace: String,
    identity: watch::Receiver<IdentityState>,
}

impl<S: DocumentStore> RecordStore<S> {
    pub fn new(
        store: Arc<S>,
        config: &AppConfig,
        identity: watch::Receiver<IdentityState>,
    ) -> Self {
        Self {
            store,
            namespace: config.namespace.clone(),
            identity,
        }
    }

    pub fn subject(&self) -> Result<SubjectId, StoreError> {
        let state = self.identity.borrow();
        match (&state.subject, state.ready) {
            (Some(subject), true) => Ok(subject.clone()),
            _ => Err(StoreError::NotReady),
        }
    }

    pub fn path_for(&self, subject: &SubjectId) -> DocumentPath {
        DocumentPath::registration(&self.namespace, subject)
    }

    pub async fn read(&self) -> Result<Option<ApplicantRecord>, StoreError> {
        let subject = self.subject()?;
        let path = self.path_for(&subject);
        let document = self.store.get(&path, &subject).await?;
        debug!(%path, found = document.is_some(), "Read registration");
        decode(document)
    }

    /// Merges `fields` into the subject's document.
    pub async fn upsert(&self, fields: Document) -> Result<(), StoreError> {
        let subject = self.subject()?;
        let path = self.path_for(&subject);
        let keys = fields.len();
        self.store.merge(&path, &subject, fields).await.inspect_err(|err| {
            warn!(%path, "Upsert failed: {err}");
        })?;
        info!(%path, keys, "Upserted registration");
        Ok(())
    }

    pub async fn upsert_record(&self, record: &ApplicantRecord) -> Result<(), StoreError> {
        let subject = self.subject()?;
        if record.subject_id != subject {
            return Err(StoreError::Denied(format!(
                "record belongs to {}, signed in as {subject}",
                record.subject_id
            )));
        }
        self.upsert(record.to_patch()?).await
    }

    /// Pushes the current record immediately and again after every change.
    pub async fn subscribe(&self) -> Result<RecordSubscription, StoreError> {
        let subject = self.subject()?;
        let path = self.path_for(&subject);
        // Listen before the first read so no change slips between the two.
        let changes = self.store.changes();
        let (tx, updates) = mpsc::unbounded_channel();
        let task = tokio::spawn(feed(
            self.store.clone(),
            path.clone(),
            subject.clone(),
            changes,
            tx,
        ));
        info!(%path, "Subscribed to registration");
        Ok(RecordSubscription {
            subject,
            updates,
            handle: CancelHandle::new(task),
        })
    }
}

async fn feed<S: DocumentStore>(
    store: Arc<S>,
    path: DocumentPath,
    caller: SubjectId,
    mut changes: broadcast::Receiver<DocumentPath>,
    tx: mpsc::UnboundedSender<RecordUpdate>,
) {
    loop {
        let update = match store.get(&path, &caller).await {
            Ok(document) => decode(document),
            Err(err) => Err(err),
        };
        if tx.send(update).is_err() {
            break;
        }
        loop {
            match changes.recv().await {
                Ok(changed) if changed == path => break,
                Ok(_) => continue,
                // Missed notifications may include ours; re-read to be safe.
                Err(broadcast::error::RecvError::Lagged(_)) => break,
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(%path, "Change feed closed");
                    return;
                }
            }
        }
    }
    debug!(%path, "Subscription ended");
}

fn decode(document: Option<Document>) -> Result<Option<ApplicantRecord>, StoreError> {
    document
        .map(|document| serde_json::from_value(Value::Object(document)))
        .transpose()
        .map_err(StoreError::from)
}
