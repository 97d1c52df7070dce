use std::fmt;

use thiserror::Error;

use crate::core::{
    form::{Action, FormState},
    record::Field,
};

/// Failures at the document store boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("identity not resolved yet")]
    NotReady,
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    Denied(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Unavailable(format!("malformed document: {err}"))
    }
}

/// Failures at the identity provider boundary. Never escapes the identity session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    #[error("bootstrap token was rejected")]
    InvalidToken,
    #[error("identity provider unreachable: {0}")]
    Unreachable(String),
}

impl From<sqlx::Error> for IdentityError {
    fn from(err: sqlx::Error) -> Self {
        IdentityError::Unreachable(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problem {
    Missing,
    NotANumber,
    Negative,
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Problem::Missing => "is required",
            Problem::NotANumber => "must be a number",
            Problem::Negative => "must not be negative",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIssue {
    pub field: Field,
    pub problem: Problem,
}

/// Every field that blocked a step transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ValidationError {
    pub fn has(&self, field: Field) -> bool {
        self.issues.iter().any(|issue| issue.field == field)
    }

    pub fn problem(&self, field: Field) -> Option<Problem> {
        self.issues
            .iter()
            .find(|issue| issue.field == field)
            .map(|issue| issue.problem)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, issue) in self.issues.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{} {}", issue.field.label(), issue.problem)?;
        }
        Ok(())
    }
}

/// Coarse classification shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotReady,
    Unavailable,
    Denied,
    InvalidTransition,
}

/// Errors surfaced by the registration form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("identity not resolved yet")]
    NotReady,
    #[error("document store unavailable: {0}")]
    Unavailable(String),
    #[error("permission denied: {0}")]
    Denied(String),
    #[error("cannot {action:?} while in {from:?}")]
    InvalidTransition { from: FormState, action: Action },
}

impl From<StoreError> for FormError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotReady => FormError::NotReady,
            StoreError::Unavailable(detail) => FormError::Unavailable(detail),
            StoreError::Denied(detail) => FormError::Denied(detail),
        }
    }
}

impl FormError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FormError::Validation(_) => ErrorKind::Validation,
            FormError::NotReady => ErrorKind::NotReady,
            FormError::Unavailable(_) => ErrorKind::Unavailable,
            FormError::Denied(_) => ErrorKind::Denied,
            FormError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
        }
    }

    /// Text safe to show in the UI. Store details stay in the log.
    pub fn user_message(&self) -> String {
        match self {
            FormError::Validation(err) => format!("Please check your details: {err}."),
            FormError::NotReady => "Still connecting, please wait a moment.".to_string(),
            FormError::Unavailable(_) => {
                "We couldn't reach the registration service. Please try again.".to_string()
            }
            FormError::Denied(_) => {
                "Your registration could not be saved. Please try again later or contact support."
                    .to_string()
            }
            FormError::InvalidTransition { .. } => {
                "That action isn't available right now.".to_string()
            }
        }
    }
}
