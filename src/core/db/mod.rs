mod state;

use std::sync::Arc;

use sqlx::Connection;
use state::BackendState;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    config::AppConfig,
    core::{
        error::{IdentityError, StoreError},
        identity::IdentityProvider,
        record::SubjectId,
        store::{Document, DocumentPath, DocumentStore},
    },
};

const ANONYMOUS_PREFIX: &str = "anon-";

/// SQLite-backed document store and identity provider.
#[derive(Debug, Clone)]
pub struct SqliteBackend {
    state: Arc<BackendState>,
    namespace: String,
}

impl SqliteBackend {
    pub async fn connect(config: &AppConfig) -> anyhow::Result<Self> {
        let state = BackendState::open(&config.store).await?;
        info!(namespace = %config.namespace, "Document store ready");
        Ok(Self {
            state: Arc::new(state),
            namespace: config.namespace.clone(),
        })
    }

    /// Provisions (or re-points) a bootstrap token.
    pub async fn register_token(&self, token: &str, subject: &SubjectId) -> anyhow::Result<()> {
        anyhow::ensure!(!token.trim().is_empty(), "Token must not be empty");
        let mut conn = self.state.conn().await?;
        sqlx::query(
            r#"INSERT INTO identity_tokens (token, subject) VALUES (?, ?)
            ON CONFLICT (token) DO UPDATE SET subject = excluded.subject"#,
        )
        .bind(token)
        .bind(subject.as_str())
        .execute(&mut *conn)
        .await?;
        info!(%subject, "Registered bootstrap token");
        Ok(())
    }

    /// Explicitly close the pool, e.g. before the database file is removed.
    pub async fn close(&self) {
        self.state.close().await
    }

    /// Only the owner of a per-user path in our namespace may touch it.
    fn authorize(&self, path: &DocumentPath, caller: &SubjectId) -> Result<(), StoreError> {
        if path.namespace() != Some(self.namespace.as_str()) {
            return Err(StoreError::Denied(format!(
                "{path} is outside namespace {}",
                self.namespace
            )));
        }
        match path.owner() {
            Some(owner) if owner == caller.as_str() => Ok(()),
            Some(_) => Err(StoreError::Denied(format!("{caller} may not access {path}"))),
            None => Err(StoreError::Denied(format!("{path} is not a per-user document"))),
        }
    }

    fn announce(&self, subject: &SubjectId) {
        self.state.subject.send_replace(Some(subject.clone()));
    }
}

impl DocumentStore for SqliteBackend {
    async fn get(
        &self,
        path: &DocumentPath,
        caller: &SubjectId,
    ) -> Result<Option<Document>, StoreError> {
        self.authorize(path, caller)?;
        let mut conn = self.state.conn().await?;
        let body: Option<String> = sqlx::query_scalar("SELECT body FROM documents WHERE path = ?")
            .bind(path.as_str())
            .fetch_optional(&mut *conn)
            .await?;
        Ok(body
            .map(|raw| serde_json::from_str::<Document>(&raw))
            .transpose()?)
    }

    async fn merge(
        &self,
        path: &DocumentPath,
        caller: &SubjectId,
        fields: Document,
    ) -> Result<(), StoreError> {
        self.authorize(path, caller)?;
        let updated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let mut conn = self.state.conn().await?;
        let mut tx = conn.begin().await?;
        let current: Option<String> =
            sqlx::query_scalar("SELECT body FROM documents WHERE path = ?")
                .bind(path.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        let mut body: Document = match current {
            Some(raw) => serde_json::from_str(&raw)?,
            None => Document::new(),
        };
        body.extend(fields);
        let encoded = serde_json::to_string(&body)?;
        sqlx::query(
            r#"INSERT INTO documents (path, body, updated_at) VALUES (?, ?, ?)
            ON CONFLICT (path) DO UPDATE
            SET body = excluded.body, updated_at = excluded.updated_at"#,
        )
        .bind(path.as_str())
        .bind(&encoded)
        .bind(&updated_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(%path, "Document merged");
        // No subscribers is not an error.
        let _ = self.state.changes.send(path.clone());
        Ok(())
    }

    fn changes(&self) -> broadcast::Receiver<DocumentPath> {
        self.state.changes.subscribe()
    }
}

impl IdentityProvider for SqliteBackend {
    async fn sign_in_with_token(&self, token: &str) -> Result<SubjectId, IdentityError> {
        let mut conn = self.state.conn().await?;
        let subject: Option<String> =
            sqlx::query_scalar("SELECT subject FROM identity_tokens WHERE token = ?")
                .bind(token)
                .fetch_optional(&mut *conn)
                .await?;
        let subject = subject
            .and_then(SubjectId::new)
            .ok_or(IdentityError::InvalidToken)?;
        self.announce(&subject);
        Ok(subject)
    }

    async fn sign_in_anonymously(&self) -> Result<SubjectId, IdentityError> {
        let subject = SubjectId::new(format!("{ANONYMOUS_PREFIX}{}", Uuid::new_v4()))
            .ok_or_else(|| IdentityError::Unreachable("generated an empty subject".into()))?;
        self.announce(&subject);
        Ok(subject)
    }

    fn watch(&self) -> watch::Receiver<Option<SubjectId>> {
        self.state.subject.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    async fn backend() -> SqliteBackend {
        let config = AppConfig::in_memory("ns").unwrap();
        SqliteBackend::connect(&config).await.unwrap()
    }

    fn doc(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[tokio::test]
    async fn merge_keeps_untouched_keys() -> anyhow::Result<()> {
        let backend = backend().await;
        let me = SubjectId::new("anon-1").unwrap();
        let path = DocumentPath::registration("ns", &me);

        backend.merge(&path, &me, doc(json!({"a": 1, "status": "approved"}))).await?;
        backend.merge(&path, &me, doc(json!({"a": 2, "b": true}))).await?;

        let stored = backend.get(&path, &me).await?.unwrap();
        assert_eq!(
            serde_json::Value::Object(stored),
            json!({"a": 2, "b": true, "status": "approved"})
        );
        Ok(())
    }

    #[tokio::test]
    async fn other_subjects_are_denied() -> anyhow::Result<()> {
        let backend = backend().await;
        let me = SubjectId::new("anon-1").unwrap();
        let them = SubjectId::new("anon-2").unwrap();
        let theirs = DocumentPath::registration("ns", &them);

        assert!(matches!(backend.get(&theirs, &me).await, Err(StoreError::Denied(_))));
        assert!(matches!(
            backend.merge(&theirs, &me, Document::new()).await,
            Err(StoreError::Denied(_))
        ));
        let elsewhere = DocumentPath::registration("other", &me);
        assert!(matches!(backend.get(&elsewhere, &me).await, Err(StoreError::Denied(_))));
        Ok(())
    }

    #[tokio::test]
    async fn anonymous_subjects_are_fresh() -> anyhow::Result<()> {
        let backend = backend().await;
        let first = backend.sign_in_anonymously().await?;
        let second = backend.sign_in_anonymously().await?;
        assert_ne!(first, second);
        assert!(first.as_str().starts_with(ANONYMOUS_PREFIX));
        assert_eq!(*backend.watch().borrow(), Some(second));
        Ok(())
    }

    #[tokio::test]
    async fn tokens_map_to_subjects() -> anyhow::Result<()> {
        let backend = backend().await;
        let driver = SubjectId::new("driver-7").unwrap();
        backend.register_token("t0k3n", &driver).await?;

        assert_eq!(backend.sign_in_with_token("t0k3n").await?, driver);
        assert_eq!(
            backend.sign_in_with_token("nope").await,
            Err(IdentityError::InvalidToken)
        );
        Ok(())
    }
}
