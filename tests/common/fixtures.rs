use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use time::macros::datetime;
use tokio::sync::{broadcast, watch};
use wraprewards::{
    AppConfig, RegistrationFlow, SqliteBackend, StoreLocation,
    core::{
        ApplicantRecord, Document, DocumentPath, DocumentStore, Draft, Field, IdentityError,
        IdentityProvider, IdentitySession, RecordStore, StoreError, SubjectId, WrapCoverage,
    },
};

pub const TEST_NAMESPACE: &str = "wraprewards-test";

/// Upper bound for anything waiting on a background task.
pub const PUSH_TIMEOUT: Duration = Duration::from_secs(5);

/// Creates a SqliteBackend on a temporary database file.
/// Returns the backend, its config and the temp directory (which must be kept alive).
pub async fn create_test_backend() -> (Arc<SqliteBackend>, AppConfig, tempfile::TempDir) {
    let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
    let config = AppConfig::new(TEST_NAMESPACE, StoreLocation::File(dir.path().join("test.db")))
        .expect("Failed to build test config");
    let backend = SqliteBackend::connect(&config)
        .await
        .expect("Failed to create test backend");
    (Arc::new(backend), config, dir)
}

/// Services wired the way the app wires them, over any document store.
pub struct Harness<P: IdentityProvider, S: DocumentStore> {
    pub config: AppConfig,
    pub provider: Arc<P>,
    pub store: Arc<S>,
    pub session: Arc<IdentitySession<P>>,
    pub records: Arc<RecordStore<S>>,
}

impl<P: IdentityProvider, S: DocumentStore> Harness<P, S> {
    pub fn new(config: AppConfig, provider: Arc<P>, store: Arc<S>) -> Self {
        let session = Arc::new(IdentitySession::new(provider.clone(), &config));
        let records = Arc::new(RecordStore::new(store.clone(), &config, session.changes()));
        Self {
            config,
            provider,
            store,
            session,
            records,
        }
    }

    pub fn flow(&self) -> RegistrationFlow<P, S> {
        RegistrationFlow::new(self.session.clone(), self.records.clone())
    }
}

/// Harness over a fresh SQLite backend; identity not yet resolved.
pub async fn create_harness() -> (Harness<SqliteBackend, SqliteBackend>, tempfile::TempDir) {
    let (backend, config, dir) = create_test_backend().await;
    (Harness::new(config, backend.clone(), backend), dir)
}

/// Harness whose backend writes can be made to fail.
pub async fn create_flaky_harness() -> (
    Harness<SqliteBackend, FlakyStore<SqliteBackend>>,
    tempfile::TempDir,
) {
    let (backend, config, dir) = create_test_backend().await;
    let store = Arc::new(FlakyStore::new(backend.clone()));
    (Harness::new(config, backend, store), dir)
}

pub const JANE: [(Field, &str); 4] = [
    (Field::FullName, "Jane Doe"),
    (Field::Email, "jane@x.com"),
    (Field::Phone, "+15551234567"),
    (Field::City, "Austin"),
];

pub const CIVIC: [(Field, &str); 4] = [
    (Field::Make, "Honda"),
    (Field::Model, "Civic"),
    (Field::Year, "2020"),
    (Field::Mileage, "30000"),
];

pub fn fill<P: IdentityProvider, S: DocumentStore>(
    flow: &mut RegistrationFlow<P, S>,
    fields: &[(Field, &str)],
) {
    for (field, value) in fields {
        flow.set_field(*field, *value).expect("field should be editable");
    }
}

/// Jane's Civic as a complete record owned by `subject`.
pub fn jane_record(subject: SubjectId) -> ApplicantRecord {
    let mut draft = Draft::default();
    for (field, value) in JANE.iter().chain(CIVIC.iter()) {
        draft.set(*field, value.to_string());
    }
    draft.coverage = Some(WrapCoverage::PartialWrap);
    draft
        .to_record(subject, datetime!(2025-03-01 12:00 UTC))
        .expect("fixture draft is valid")
}

/// Starts the wizard and walks it to the review step with Jane's Civic.
pub async fn walk_to_review<P: IdentityProvider, S: DocumentStore>(
    flow: &mut RegistrationFlow<P, S>,
) {
    flow.start().await.expect("start");
    fill(flow, &JANE);
    flow.next().expect("personal step");
    fill(flow, &CIVIC);
    flow.next().expect("vehicle step");
}

/// Wraps a store and fails merges on demand, counting every merge attempt.
pub struct FlakyStore<S> {
    inner: Arc<S>,
    failure: Mutex<Option<StoreError>>,
    merges: AtomicUsize,
}

impl<S> std::fmt::Debug for FlakyStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyStore")
            .field("merges", &self.merges.load(Ordering::SeqCst))
            .finish()
    }
}

impl<S: DocumentStore> FlakyStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            failure: Mutex::new(None),
            merges: AtomicUsize::new(0),
        }
    }

    pub fn fail_with(&self, failure: Option<StoreError>) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn merge_attempts(&self) -> usize {
        self.merges.load(Ordering::SeqCst)
    }
}

impl<S: DocumentStore> DocumentStore for FlakyStore<S> {
    async fn get(
        &self,
        path: &DocumentPath,
        caller: &SubjectId,
    ) -> Result<Option<Document>, StoreError> {
        self.inner.get(path, caller).await
    }

    async fn merge(
        &self,
        path: &DocumentPath,
        caller: &SubjectId,
        fields: Document,
    ) -> Result<(), StoreError> {
        self.merges.fetch_add(1, Ordering::SeqCst);
        let failure = self.failure.lock().unwrap().clone();
        match failure {
            Some(err) => Err(err),
            None => self.inner.merge(path, caller, fields).await,
        }
    }

    fn changes(&self) -> broadcast::Receiver<DocumentPath> {
        self.inner.changes()
    }
}

/// Identity provider under test control: scripted tokens, swappable subject, or offline.
pub struct ScriptedProvider {
    offline: bool,
    token: Option<(String, SubjectId)>,
    subject: watch::Sender<Option<SubjectId>>,
    anonymous_issued: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        let (subject, _) = watch::channel(None);
        Self {
            offline: false,
            token: None,
            subject,
            anonymous_issued: AtomicUsize::new(0),
        }
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            ..Self::new()
        }
    }

    pub fn with_token(mut self, token: &str, subject: &str) -> Self {
        self.token = Some((token.to_string(), SubjectId::new(subject).unwrap()));
        self
    }

    /// Simulates the provider replacing the signed-in subject.
    pub fn swap_subject(&self, subject: &str) {
        self.subject.send_replace(SubjectId::new(subject));
    }

    pub fn anonymous_issued(&self) -> usize {
        self.anonymous_issued.load(Ordering::SeqCst)
    }
}

impl IdentityProvider for ScriptedProvider {
    async fn sign_in_with_token(&self, token: &str) -> Result<SubjectId, IdentityError> {
        if self.offline {
            return Err(IdentityError::Unreachable("offline".into()));
        }
        match &self.token {
            Some((known, subject)) if known == token => {
                self.subject.send_replace(Some(subject.clone()));
                Ok(subject.clone())
            }
            _ => Err(IdentityError::InvalidToken),
        }
    }

    async fn sign_in_anonymously(&self) -> Result<SubjectId, IdentityError> {
        if self.offline {
            return Err(IdentityError::Unreachable("offline".into()));
        }
        let n = self.anonymous_issued.fetch_add(1, Ordering::SeqCst);
        let subject = SubjectId::new(format!("anon-test-{n}")).unwrap();
        self.subject.send_replace(Some(subject.clone()));
        Ok(subject)
    }

    fn watch(&self) -> watch::Receiver<Option<SubjectId>> {
        self.subject.subscribe()
    }
}
