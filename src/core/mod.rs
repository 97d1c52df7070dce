pub mod content;
pub mod db;
pub mod error;
pub mod flow;
pub mod form;
pub mod identity;
pub mod record;
pub mod router;
pub mod store;

pub use db::SqliteBackend;
pub use error::{ErrorKind, FormError, IdentityError, Problem, StoreError, ValidationError};
pub use flow::RegistrationFlow;
pub use form::{FailureKind, FormMachine, FormState, Hydration};
pub use identity::{IdentityProvider, IdentitySession, IdentityState};
pub use record::{ApplicantRecord, ApprovalStatus, Draft, Field, SubjectId, WrapCoverage};
pub use router::View;
pub use store::{
    CancelHandle, Document, DocumentPath, DocumentStore, RecordStore, RecordSubscription,
};
