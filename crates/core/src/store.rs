//! Filesystem store for signed documents.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::document::{DocumentKey, StoredDocumentReference};
use crate::domain::submission::FormSubmission;
use crate::pipeline::DocumentStore;

const KEY_PREFIX: &str = "nda_signed_";
const KEY_EXTENSION: &str = ".pdf";
const MAX_SLUG_LEN: usize = 80;

#[derive(Debug, Error)]
pub enum StorageWriteError {
    #[error("could not create storage directory `{path}`: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("could not write `{path}`: {source}")]
    Write { path: PathBuf, source: io::Error },
    #[error("could not move document into place at `{path}`: {source}")]
    Rename { path: PathBuf, source: io::Error },
}

/// `nda_signed_<slug>.pdf` for the submission's reference id, or its random token.
pub fn compute_key(submission: &FormSubmission) -> DocumentKey {
    key_for_reference(submission.reference_id().unwrap_or_else(|| submission.token()))
}

pub fn key_for_reference(reference: &str) -> DocumentKey {
    DocumentKey(format!("{KEY_PREFIX}{}{KEY_EXTENSION}", slug(reference.trim())))
}

/// Sanitized ids get a digest suffix so two ids never collapse onto one slot.
fn slug(reference: &str) -> String {
    let mut sanitized: String = reference
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' { ch } else { '_' })
        .take(MAX_SLUG_LEN)
        .collect();

    if sanitized != reference {
        let digest = Sha256::digest(reference.as_bytes());
        let suffix: String = digest.iter().take(4).map(|byte| format!("{byte:02x}")).collect();
        sanitized.push('_');
        sanitized.push_str(&suffix);
    }

    sanitized
}

#[derive(Clone, Debug)]
pub struct FsDocumentStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self { root: root.into(), public_base_url: public_base_url.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_reference(&self, key: &DocumentKey) -> StoredDocumentReference {
        let base = self.public_base_url.trim_end_matches('/');
        StoredDocumentReference {
            path: self.root.join(key.as_str()),
            url: format!("{base}/{}", key.as_str()),
        }
    }

    /// Writes to a temp file next to the target and renames it over the target.
    pub async fn save(
        &self,
        key: &DocumentKey,
        bytes: &[u8],
    ) -> Result<StoredDocumentReference, StorageWriteError> {
        let reference = self.public_reference(key);
        let directory =
            reference.path.parent().map(Path::to_path_buf).unwrap_or_else(|| self.root.clone());

        tokio::fs::create_dir_all(&directory)
            .await
            .map_err(|source| StorageWriteError::CreateDir { path: directory.clone(), source })?;

        let temp_path =
            directory.join(format!(".{}.{}.tmp", key.as_str(), Uuid::new_v4().simple()));
        if let Err(source) = tokio::fs::write(&temp_path, bytes).await {
            discard_temp(&temp_path).await;
            return Err(StorageWriteError::Write { path: temp_path, source });
        }

        if let Err(source) = tokio::fs::rename(&temp_path, &reference.path).await {
            discard_temp(&temp_path).await;
            return Err(StorageWriteError::Rename { path: reference.path, source });
        }

        debug!(
            event_name = "storage.document_saved",
            key = %key,
            bytes = bytes.len(),
            "stored signed document"
        );
        Ok(reference)
    }
}

async fn discard_temp(path: &Path) {
    if let Err(error) = tokio::fs::remove_file(path).await {
        if error.kind() != io::ErrorKind::NotFound {
            warn!(
                event_name = "storage.temp_cleanup_failed",
                path = %path.display(),
                error = %error,
                "could not remove temporary document"
            );
        }
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    fn compute_key(&self, submission: &FormSubmission) -> DocumentKey {
        compute_key(submission)
    }

    fn public_reference(&self, key: &DocumentKey) -> StoredDocumentReference {
        FsDocumentStore::public_reference(self, key)
    }

    async fn save(
        &self,
        key: &DocumentKey,
        bytes: &[u8],
    ) -> Result<StoredDocumentReference, StorageWriteError> {
        FsDocumentStore::save(self, key, bytes).await
    }
}
