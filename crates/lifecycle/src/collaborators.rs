//! Collaborator seams the lifecycle services call out to.
//!
//! Each trait has a default implementation good enough for a single-node
//! deployment; the API crate swaps in a webhook-backed [`SigningNotifier`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use cultura_core::error::CoreError;
use cultura_core::types::{DbId, Timestamp};
use serde::Serialize;

use crate::store::GrantStore;

/// Failure in a best-effort collaborator.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("rendering failed: {0}")]
    Render(String),

    #[error("artifact storage failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

// ---------------------------------------------------------------------------
// Document index
// ---------------------------------------------------------------------------

/// Existence predicate over uploaded documents.
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    async fn has_document(
        &self,
        subject_kind: &str,
        subject_id: DbId,
        category: &str,
    ) -> Result<bool, CoreError>;
}

/// Answers from the `documents` index held by the store.
pub struct StoreDocumentIndex {
    store: Arc<dyn GrantStore>,
}

impl StoreDocumentIndex {
    pub fn new(store: Arc<dyn GrantStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DocumentIndex for StoreDocumentIndex {
    async fn has_document(
        &self,
        subject_kind: &str,
        subject_id: DbId,
        category: &str,
    ) -> Result<bool, CoreError> {
        Ok(self
            .store
            .has_document(subject_kind, subject_id, category)
            .await?)
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Turns an HTML document into the bytes of a printable artifact.
#[async_trait]
pub trait DocumentRenderer: Send + Sync {
    /// File extension of the produced artifact, without the dot.
    fn extension(&self) -> &str;

    async fn render(&self, html: &str) -> Result<Vec<u8>, CollaboratorError>;
}

/// Stores the HTML itself as the artifact.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

#[async_trait]
impl DocumentRenderer for HtmlRenderer {
    fn extension(&self) -> &str {
        "html"
    }

    async fn render(&self, html: &str) -> Result<Vec<u8>, CollaboratorError> {
        if html.trim().is_empty() {
            return Err(CollaboratorError::Render("empty document".into()));
        }
        Ok(html.as_bytes().to_vec())
    }
}

// ---------------------------------------------------------------------------
// Artifact storage
// ---------------------------------------------------------------------------

/// Persists artifact bytes and returns a locator for them.
#[async_trait]
pub trait ArtifactStorage: Send + Sync {
    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<String, CollaboratorError>;
}

/// Writes artifacts under a local directory.
#[derive(Debug, Clone)]
pub struct LocalArtifactStorage {
    root: PathBuf,
}

impl LocalArtifactStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Keep keys inside the root as a single file name. Path separators and
/// dots collapse to `_`. The last dot survives only when what follows it is
/// a plain alphanumeric extension.
fn sanitize_key(key: &str) -> String {
    let (stem, ext) = match key.rsplit_once('.') {
        Some((stem, ext))
            if !stem.is_empty()
                && !ext.is_empty()
                && ext.chars().all(|c| c.is_ascii_alphanumeric()) =>
        {
            (stem, Some(ext))
        }
        _ => (key, None),
    };
    let clean = |s: &str| -> String {
        s.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect()
    };
    match ext {
        Some(ext) => format!("{}.{ext}", clean(stem)),
        None if stem.is_empty() => "_".to_string(),
        None => clean(stem),
    }
}

#[async_trait]
impl ArtifactStorage for LocalArtifactStorage {
    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<String, CollaboratorError> {
        tokio::fs::create_dir_all(&self.root).await?;
        let path = self.root.join(sanitize_key(key));
        tokio::fs::write(&path, bytes).await?;
        Ok(path.to_string_lossy().into_owned())
    }
}

// ---------------------------------------------------------------------------
// Signing notifications
// ---------------------------------------------------------------------------

/// What the notifier needs to reach a signer on one channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SigningNotice {
    pub contract_id: DbId,
    pub contract_number: String,
    pub channel: String,
    pub recipient_name: String,
    pub recipient_email: String,
    pub recipient_phone: Option<String>,
    pub signing_link: String,
    pub expires_at: Timestamp,
}

#[async_trait]
pub trait SigningNotifier: Send + Sync {
    async fn notify(&self, notice: &SigningNotice) -> Result<(), CollaboratorError>;
}

/// Logs the notice instead of delivering it. The link is left out of the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl SigningNotifier for LoggingNotifier {
    async fn notify(&self, notice: &SigningNotice) -> Result<(), CollaboratorError> {
        tracing::info!(
            contract_id = notice.contract_id,
            contract_number = %notice.contract_number,
            channel = %notice.channel,
            recipient = %notice.recipient_email,
            expires_at = %notice.expires_at,
            "Signing notice (no dispatcher configured)",
        );
        Ok(())
    }
}
