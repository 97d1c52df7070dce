use crate::core::form::FormState;

/// The two top-level views. Derived from the form state, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Landing,
    Form,
}

impl From<FormState> for View {
    fn from(state: FormState) -> Self {
        match state {
            FormState::Landing => View::Landing,
            _ => View::Form,
        }
    }
}
