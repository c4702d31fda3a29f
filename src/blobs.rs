//! Filesystem-backed blob store for downloaded artifacts.
//!
//! Blobs are addressed by relative slash paths under a root directory. A
//! small JSON sidecar records the content type supplied at put time.

use std::fs::File;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Errors returned by blob store operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The blob path is empty, absolute, or escapes the store root.
    #[error("invalid blob path {0:?}")]
    InvalidPath(String),
    /// Failed to create a directory inside the store.
    #[error("Could not create blob directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: io::Error,
    },
    /// Reading the source or writing the blob failed.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    /// Writing the metadata sidecar failed.
    #[error("blob metadata serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Options attached to a stored blob.
#[derive(Debug, Clone, Default)]
pub struct PutOptions {
    /// MIME type recorded in the sidecar, if known.
    pub content_type: Option<String>,
}

/// Blob store rooted at a local directory.
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: &Path) -> Result<Self, BlobError> {
        std::fs::create_dir_all(root).map_err(|source| BlobError::CreateDir {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path the blob at `path` is (or would be) stored at.
    ///
    /// Only plain relative paths are accepted; `..` components and absolute
    /// paths cannot address a blob.
    pub fn blob_path(&self, path: &str) -> Result<PathBuf, BlobError> {
        let relative = Path::new(path);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if path.is_empty() || !safe {
            return Err(BlobError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    /// Stream `reader` into the blob at `path`, recording `options` alongside.
    ///
    /// Parent directories are created as needed; an existing blob at the same
    /// path is overwritten.
    pub fn put(
        &self,
        path: &str,
        mut reader: impl Read,
        options: &PutOptions,
    ) -> Result<(), BlobError> {
        let dest = self.blob_path(path)?;
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|source| BlobError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let mut file = File::create(&dest)?;
        io::copy(&mut reader, &mut file)?;
        if let Some(content_type) = &options.content_type {
            let meta = serde_json::json!({ "content-type": content_type });
            let meta_path = self.root.join(format!("{path}.meta.json"));
            std::fs::write(&meta_path, serde_json::to_vec(&meta)?)?;
        }
        tracing::debug!(path, "stored blob");
        Ok(())
    }
}
