use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{info, warn};

use crate::core::{
    error::FormError,
    form::{FormMachine, FormState, Hydration},
    identity::{IdentityProvider, IdentitySession},
    record::{ApplicantRecord, Field, SubjectId, WrapCoverage},
    store::{DocumentStore, RecordStore, RecordSubscription, RecordUpdate},
};

/// Drives the wizard against live identity and store services.
///
/// Headless counterpart of the GUI: the same transitions, with store I/O awaited inline.
#[derive(Debug)]
pub struct RegistrationFlow<P, S> {
    session: Arc<IdentitySession<P>>,
    records: Arc<RecordStore<S>>,
    machine: FormMachine,
    feed: Option<RecordSubscription>,
}

impl<P: IdentityProvider, S: DocumentStore> RegistrationFlow<P, S> {
    pub fn new(session: Arc<IdentitySession<P>>, records: Arc<RecordStore<S>>) -> Self {
        Self {
            session,
            records,
            machine: FormMachine::new(),
            feed: None,
        }
    }

    pub fn machine(&self) -> &FormMachine {
        &self.machine
    }

    pub fn state(&self) -> FormState {
        self.machine.state()
    }

    pub fn is_subscribed(&self) -> bool {
        self.feed.is_some()
    }

    pub async fn resolve_identity(&self) -> Option<SubjectId> {
        self.session.resolve().await
    }

    /// Landing -> Personal, pre-filled from the stored record and subscribed to its changes.
    pub async fn start(&mut self) -> Result<(), FormError> {
        let existing = match self.records.read().await {
            Ok(existing) => existing,
            Err(err) => {
                warn!("Starting with an empty draft: {err}");
                None
            }
        };
        self.machine.start(existing.as_ref())?;
        self.open_feed().await;
        Ok(())
    }

    pub fn set_field(&mut self, field: Field, value: impl Into<String>) -> Result<(), FormError> {
        self.machine.set_field(field, value.into())
    }

    pub fn set_coverage(&mut self, coverage: Option<WrapCoverage>) -> Result<(), FormError> {
        self.machine.set_coverage(coverage)
    }

    pub fn next(&mut self) -> Result<FormState, FormError> {
        self.machine.next()
    }

    pub fn back(&mut self) -> Result<FormState, FormError> {
        self.machine.back()
    }

    /// Review -> Submitting -> Success | Failed.
    pub async fn confirm(&mut self) -> Result<ApplicantRecord, FormError> {
        let subject = self.records.subject().ok();
        let record = self
            .machine
            .confirm(subject.as_ref(), OffsetDateTime::now_utc())?;
        let result = self.records.upsert_record(&record).await;
        self.machine.finish_submit(result.clone())?;
        match result {
            Ok(()) => {
                info!(subject = %record.subject_id, "Registration submitted");
                Ok(record)
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn retry(&mut self) -> Result<(), FormError> {
        self.machine.retry()
    }

    pub fn dismiss_notice(&mut self) {
        self.machine.dismiss_notice()
    }

    /// Back to landing: drops the draft and the live subscription.
    pub fn home(&mut self) {
        self.machine.home();
        self.close_feed();
    }

    /// Waits for the next subscription push and applies it.
    pub async fn next_push(&mut self) -> Option<Hydration> {
        let update = self.feed.as_mut()?.next().await?;
        Some(self.on_record_push(update))
    }

    pub fn on_record_push(&mut self, update: RecordUpdate) -> Hydration {
        match update {
            Ok(record) => self.machine.hydrate(record.as_ref()),
            Err(err) => {
                warn!("Subscription error: {err}");
                Hydration::Ignored
            }
        }
    }

    /// Re-reads and re-subscribes after the identity provider swapped subjects.
    pub async fn on_subject_change(&mut self) -> Hydration {
        let current = self.records.subject().ok();
        if self.feed.as_ref().map(|feed| feed.subject()) == current.as_ref() {
            return Hydration::Ignored;
        }
        self.close_feed();
        if !self.machine.state().is_editing() {
            return Hydration::Ignored;
        }
        let hydration = match self.records.read().await {
            Ok(record) => self.machine.hydrate(record.as_ref()),
            Err(err) => {
                warn!("Re-hydration skipped: {err}");
                Hydration::Ignored
            }
        };
        self.open_feed().await;
        hydration
    }

    async fn open_feed(&mut self) {
        match self.records.subscribe().await {
            Ok(mut feed) => {
                // The first push mirrors what `start` just read.
                if let Some(update) = feed.next().await {
                    self.on_record_push(update);
                }
                self.feed = Some(feed);
            }
            Err(err) => warn!("Live updates unavailable: {err}"),
        }
    }

    fn close_feed(&mut self) {
        if let Some(mut feed) = self.feed.take() {
            feed.cancel();
        }
    }
}
