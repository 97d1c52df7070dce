use std::{
    fmt,
    future::Future,
    sync::{Arc, OnceLock},
};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    config::AppConfig,
    core::{error::IdentityError, record::SubjectId, store::CancelHandle},
};

/// Issues subject identifiers for the current visitor.
pub trait IdentityProvider: Send + Sync + 'static {
    fn sign_in_with_token(
        &self,
        token: &str,
    ) -> impl Future<Output = Result<SubjectId, IdentityError>> + Send;

    /// Always manufactures a fresh subject unless the provider is unreachable.
    fn sign_in_anonymously(&self) -> impl Future<Output = Result<SubjectId, IdentityError>> + Send;

    /// The provider's current subject, updated whenever it changes.
    fn watch(&self) -> watch::Receiver<Option<SubjectId>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityState {
    /// Flips to true after the first resolution and stays there.
    pub ready: bool,
    pub subject: Option<SubjectId>,
}

pub struct IdentitySession<P> {
    provider: Arc<P>,
    token: Option<String>,
    state: Arc<watch::Sender<IdentityState>>,
    follower: OnceLock<CancelHandle>,
}

impl<P> fmt::Debug for IdentitySession<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentitySession")
            .field("has_token", &self.token.is_some())
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl<P: IdentityProvider> IdentitySession<P> {
    pub fn new(provider: Arc<P>, config: &AppConfig) -> Self {
        let (state, _) = watch::channel(IdentityState::default());
        Self {
            provider,
            token: config.auth_token.clone(),
            state: Arc::new(state),
            follower: OnceLock::new(),
        }
    }

    /// Signs in (token first, anonymous as fallback) and marks the session ready.
    ///
    /// Returns `None` only when the provider could not be reached at all; the session is
    /// still marked ready so callers never wait forever.
    pub async fn resolve(&self) -> Option<SubjectId> {
        let mut subject = None;
        if let Some(token) = self.token.as_deref() {
            match self.provider.sign_in_with_token(token).await {
                Ok(signed_in) => {
                    info!(subject = %signed_in, "Signed in with bootstrap token");
                    subject = Some(signed_in);
                }
                Err(err) => warn!("Token sign-in failed, falling back to anonymous: {err}"),
            }
        }
        if subject.is_none() {
            match self.provider.sign_in_anonymously().await {
                Ok(anonymous) => {
                    info!(subject = %anonymous, "Signed in anonymously");
                    subject = Some(anonymous);
                }
                Err(err) => error!("Identity provider unavailable: {err}"),
            }
        }

        self.state.send_modify(|state| {
            state.ready = true;
            state.subject = subject.clone();
        });
        self.follower.get_or_init(|| self.follow_provider());
        subject
    }

    pub fn state(&self) -> IdentityState {
        self.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.state.borrow().ready
    }

    pub fn subject(&self) -> Option<SubjectId> {
        self.state.borrow().subject.clone()
    }

    /// Notified on readiness and on every later subject change.
    pub fn changes(&self) -> watch::Receiver<IdentityState> {
        self.state.subscribe()
    }

    fn follow_provider(&self) -> CancelHandle {
        let mut provider_subject = self.provider.watch();
        let state = self.state.clone();
        CancelHandle::new(tokio::spawn(async move {
            while provider_subject.changed().await.is_ok() {
                let subject = provider_subject.borrow_and_update().clone();
                let changed = state.send_if_modified(|state| {
                    if state.subject == subject {
                        false
                    } else {
                        state.subject = subject.clone();
                        true
                    }
                });
                if changed {
                    info!(subject = ?subject, "Identity changed");
                }
            }
            debug!("Identity provider closed its change feed");
        }))
    }
}
