mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from wraprewards for tests
pub use wraprewards::{
    AppConfig, RegistrationFlow, SqliteBackend, StoreLocation,
    core::{
        ApplicantRecord, ApprovalStatus, Document, DocumentPath, DocumentStore, Draft, FailureKind,
        Field, FormError, FormState, Hydration, IdentityError, IdentityProvider, IdentitySession,
        IdentityState, Problem, RecordStore, StoreError, SubjectId, WrapCoverage,
    },
};
