//! Registration wizard state machine.
//!
//! The machine is synchronous and owns no I/O: store calls are made by the caller with the
//! values the machine hands out ([`FormMachine::confirm`]) and fed back in
//! ([`FormMachine::finish_submit`], [`FormMachine::hydrate`]).

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::core::{
    error::{FormError, StoreError},
    record::{ApplicantRecord, Draft, Field, SubjectId, WrapCoverage},
};

/// Why the last submission failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotReady,
    Unavailable,
    Denied,
}

impl From<&StoreError> for FailureKind {
    fn from(err: &StoreError) -> Self {
        match err {
            StoreError::NotReady => FailureKind::NotReady,
            StoreError::Unavailable(_) => FailureKind::Unavailable,
            StoreError::Denied(_) => FailureKind::Denied,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Landing,
    Personal,
    Vehicle,
    Review,
    Submitting,
    Success,
    Failed(FailureKind),
}

impl FormState {
    /// Numbered wizard step (1-3) for the progress indicator.
    pub fn step_number(self) -> Option<u8> {
        match self {
            FormState::Personal => Some(1),
            FormState::Vehicle => Some(2),
            FormState::Review | FormState::Submitting => Some(3),
            _ => None,
        }
    }

    pub fn is_editing(self) -> bool {
        matches!(self, FormState::Personal | FormState::Vehicle | FormState::Review)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Edit,
    Next,
    Back,
    Confirm,
    Complete,
    Retry,
    Home,
}

/// What happened to a record pushed by the live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydration {
    /// The draft now mirrors the pushed record.
    Applied,
    /// The user already edited the draft; the push was dropped.
    KeptEdits,
    /// Not in an editing step.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct FormMachine {
    state: FormState,
    draft: Draft,
    dirty: bool,
    notice: Option<FormError>,
}

impl Default for FormMachine {
    fn default() -> Self {
        Self {
            state: FormState::Landing,
            draft: Draft::default(),
            dirty: false,
            notice: None,
        }
    }
}

impl FormMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn draft(&self) -> &Draft {
        &self.draft
    }

    /// True once the user changed any field since entering the wizard.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Inline error from the last rejected action, if any.
    pub fn notice(&self) -> Option<&FormError> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Landing -> Personal, pre-filled from `existing` when a record is on file.
    pub fn start(&mut self, existing: Option<&ApplicantRecord>) -> Result<(), FormError> {
        self.expect(FormState::Landing, Action::Start)?;
        self.draft = existing.map(Draft::from_record).unwrap_or_default();
        self.dirty = false;
        self.notice = None;
        self.move_to(FormState::Personal);
        Ok(())
    }

    pub fn set_field(&mut self, field: Field, value: String) -> Result<(), FormError> {
        self.expect_editable()?;
        if self.draft.get(field) != value {
            self.draft.set(field, value);
            self.dirty = true;
        }
        Ok(())
    }

    pub fn set_coverage(&mut self, coverage: Option<WrapCoverage>) -> Result<(), FormError> {
        self.expect_editable()?;
        if self.draft.coverage != coverage {
            self.draft.coverage = coverage;
            self.dirty = true;
        }
        Ok(())
    }

    pub fn next(&mut self) -> Result<FormState, FormError> {
        let checked = match self.state {
            FormState::Personal => self.draft.validate_personal().map(|_| FormState::Vehicle),
            FormState::Vehicle => self.draft.validate_vehicle().map(|_| FormState::Review),
            from => return Err(FormError::InvalidTransition { from, action: Action::Next }),
        };
        match checked {
            Ok(to) => {
                self.notice = None;
                self.move_to(to);
                Ok(to)
            }
            Err(err) => {
                debug!(state = ?self.state, "Step rejected: {err}");
                Err(self.reject(err.into()))
            }
        }
    }

    pub fn back(&mut self) -> Result<FormState, FormError> {
        let to = match self.state {
            FormState::Vehicle => FormState::Personal,
            FormState::Review => FormState::Vehicle,
            from => return Err(FormError::InvalidTransition { from, action: Action::Back }),
        };
        self.notice = None;
        self.move_to(to);
        Ok(to)
    }

    /// Review -> Submitting. Returns the record to upsert.
    ///
    /// Without a subject the action is rejected with `NotReady` and the machine stays in review.
    pub fn confirm(
        &mut self,
        subject: Option<&SubjectId>,
        now: OffsetDateTime,
    ) -> Result<ApplicantRecord, FormError> {
        self.expect(FormState::Review, Action::Confirm)?;
        let Some(subject) = subject else {
            warn!("Confirm rejected: identity not resolved");
            return Err(self.reject(FormError::NotReady));
        };
        let record = self
            .draft
            .to_record(subject.clone(), now)
            .map_err(|err| self.reject(err.into()))?;
        self.notice = None;
        self.move_to(FormState::Submitting);
        Ok(record)
    }

    /// Submitting -> Success | Failed. The draft survives a failure.
    pub fn finish_submit(
        &mut self,
        result: Result<(), StoreError>,
    ) -> Result<FormState, FormError> {
        self.expect(FormState::Submitting, Action::Complete)?;
        let to = match result {
            Ok(()) => {
                self.draft = Draft::default();
                self.dirty = false;
                FormState::Success
            }
            Err(err) => {
                warn!("Submission failed: {err}");
                let to = FormState::Failed(FailureKind::from(&err));
                self.notice = Some(err.into());
                to
            }
        };
        self.move_to(to);
        Ok(to)
    }

    /// Failed -> Review, keeping the draft.
    pub fn retry(&mut self) -> Result<(), FormError> {
        match self.state {
            FormState::Failed(_) => {
                self.notice = None;
                self.move_to(FormState::Review);
                Ok(())
            }
            from => Err(FormError::InvalidTransition { from, action: Action::Retry }),
        }
    }

    /// Any state -> Landing. Drops the in-memory draft; stored data is untouched.
    pub fn home(&mut self) {
        self.draft = Draft::default();
        self.dirty = false;
        self.notice = None;
        self.move_to(FormState::Landing);
    }

    /// Applies a record pushed by the store unless the user already started editing.
    pub fn hydrate(&mut self, record: Option<&ApplicantRecord>) -> Hydration {
        if !self.state.is_editing() {
            return Hydration::Ignored;
        }
        if self.dirty {
            debug!("Keeping in-progress edits over pushed record");
            return Hydration::KeptEdits;
        }
        self.draft = record.map(Draft::from_record).unwrap_or_default();
        Hydration::Applied
    }

    fn expect(&self, state: FormState, action: Action) -> Result<(), FormError> {
        if self.state == state {
            Ok(())
        } else {
            Err(FormError::InvalidTransition { from: self.state, action })
        }
    }

    fn expect_editable(&self) -> Result<(), FormError> {
        match self.state {
            FormState::Personal | FormState::Vehicle => Ok(()),
            from => Err(FormError::InvalidTransition { from, action: Action::Edit }),
        }
    }

    fn reject(&mut self, err: FormError) -> FormError {
        self.notice = Some(err.clone());
        err
    }

    fn move_to(&mut self, to: FormState) {
        if self.state != to {
            info!(from = ?self.state, to = ?to, "Form transition");
        }
        self.state = to;
    }
}
