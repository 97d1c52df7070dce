use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use tracing::info;

pub const DEFAULT_NAMESPACE: &str = "wraprewards";
pub const DEFAULT_DATABASE: &str = "wraprewards.db";
const IN_MEMORY_DATABASE: &str = ":memory:";

/// Where the document store keeps its data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    File(PathBuf),
    InMemory,
}

/// Startup configuration, built once and handed to every service constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub namespace: String,
    pub store: StoreLocation,
    pub auth_token: Option<String>,
}

impl AppConfig {
    pub fn new(namespace: impl Into<String>, store: StoreLocation) -> anyhow::Result<Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace)?;
        Ok(Self {
            namespace,
            store,
            auth_token: None,
        })
    }

    pub fn in_memory(namespace: impl Into<String>) -> anyhow::Result<Self> {
        Self::new(namespace, StoreLocation::InMemory)
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        // A blank token is the same as no token at all.
        self.auth_token = if token.trim().is_empty() {
            None
        } else {
            Some(token)
        };
        self
    }
}

fn validate_namespace(namespace: &str) -> anyhow::Result<()> {
    if namespace.trim().is_empty() {
        bail!("Namespace must not be empty");
    }
    if namespace.contains('/') {
        bail!("Namespace must not contain '/': {namespace:?}");
    }
    Ok(())
}

/// Command line / environment view of [`AppConfig`].
#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Namespace all registration documents are stored under
    #[arg(long, env = "WRAPREWARDS_NAMESPACE", default_value = DEFAULT_NAMESPACE)]
    pub namespace: String,

    /// Path to the document store database (":memory:" for a throwaway store)
    #[arg(long, env = "WRAPREWARDS_DATABASE", default_value = DEFAULT_DATABASE)]
    pub database: PathBuf,

    /// Bootstrap token used for sign-in before falling back to an anonymous identity
    #[arg(long, env = "WRAPREWARDS_AUTH_TOKEN")]
    pub auth_token: Option<String>,
}

impl ConfigArgs {
    pub fn into_config(self) -> anyhow::Result<AppConfig> {
        let store = if self.database.as_os_str() == IN_MEMORY_DATABASE {
            info!("Using in-memory document store");
            StoreLocation::InMemory
        } else {
            info!("Using document store at {:?}", self.database);
            StoreLocation::File(self.database)
        };
        let config = AppConfig::new(self.namespace, store)?;
        Ok(match self.auth_token {
            Some(token) => config.with_auth_token(token),
            None => config,
        })
    }
}
