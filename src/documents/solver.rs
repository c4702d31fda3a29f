//! Solver metadata document and specification download.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{Document, DocumentError, DocumentStore};
use crate::blobs::{BlobError, BlobStore, PutOptions};
use crate::http_client;

/// Filename under the solver's blob prefix holding the downloaded spec.
pub const SPEC_BLOB_FILE_NAME: &str = "spec.prototxt";

/// Hard cap on specification download size.
const MAX_SPEC_BYTES: usize = 16 * 1024 * 1024;

/// Errors returned by solver operations.
#[derive(Debug, Error)]
pub enum SolverError {
    /// The solver has no id yet; insert it before downloading its spec.
    #[error("Solver has not been stored yet")]
    NotStored,
    /// The specification URL could not be parsed.
    #[error("Invalid specification url {url}: {source}")]
    InvalidSpecUrl {
        url: String,
        source: url::ParseError,
    },
    /// Fetching the specification failed.
    #[error("Fetching specification from {url} failed: {message}")]
    Http { url: String, message: String },
    /// Document store failure.
    #[error("document store error: {0}")]
    Store(#[from] DocumentError),
    /// Blob store failure.
    #[error("blob store error: {0}")]
    Blob(#[from] BlobError),
}

/// A solver generates trained models from a dataset and a specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solver {
    /// Store-assigned id.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Stored revision; zero before the first insert.
    #[serde(rename = "_rev", default)]
    pub rev: i64,
    /// Dataset this solver trains against.
    #[serde(rename = "dataset-id")]
    pub dataset_id: String,
    /// Where the solver specification lives; rewritten to a `blob://` URL
    /// once the spec has been stored locally.
    #[serde(rename = "specification-url")]
    pub specification_url: String,
}

impl Document for Solver {
    const DOC_TYPE: &'static str = "solver";

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn rev(&self) -> i64 {
        self.rev
    }

    fn set_rev(&mut self, rev: i64) {
        self.rev = rev;
    }
}

impl Solver {
    /// Create a solver that has not been stored yet.
    pub fn new(dataset_id: impl Into<String>, specification_url: impl Into<String>) -> Self {
        Self {
            id: None,
            rev: 0,
            dataset_id: dataset_id.into(),
            specification_url: specification_url.into(),
        }
    }

    /// Insert into the store. Only for solvers that do not exist yet.
    pub fn insert(&self, store: &DocumentStore) -> Result<Solver, SolverError> {
        Ok(store.insert(self)?)
    }

    /// Save, returning the copy with the bumped revision.
    pub fn save(&self, store: &DocumentStore) -> Result<Solver, SolverError> {
        Ok(store.save(self)?)
    }

    /// Download the specification into the blob store and point this solver
    /// at the stored copy.
    ///
    /// The body is fetched from `specification_url` with a size cap, stored
    /// at `<solver-id>/spec.prototxt` as `text/plain`, and the solver is
    /// saved with its specification URL rewritten to `blob://<path>`. A
    /// failure at any step is surfaced without retry; nothing is rolled back.
    pub fn save_spec(
        &self,
        store: &DocumentStore,
        blobs: &BlobStore,
    ) -> Result<Solver, SolverError> {
        let id = self.id.as_deref().ok_or(SolverError::NotStored)?;
        let source_url = self.specification_url.clone();
        url::Url::parse(&source_url).map_err(|source| SolverError::InvalidSpecUrl {
            url: source_url.clone(),
            source,
        })?;

        let response = http_client::agent()
            .get(&source_url)
            .set("User-Agent", "splitpack")
            .call()
            .map_err(|err| SolverError::Http {
                url: source_url.clone(),
                message: err.to_string(),
            })?;
        let body = http_client::read_response_bytes(response, MAX_SPEC_BYTES).map_err(|err| {
            SolverError::Http {
                url: source_url.clone(),
                message: err.to_string(),
            }
        })?;

        let dest_path = format!("{id}/{SPEC_BLOB_FILE_NAME}");
        let options = PutOptions {
            content_type: Some("text/plain".to_string()),
        };
        blobs.put(&dest_path, body.as_slice(), &options)?;
        tracing::info!(path = %dest_path, bytes = body.len(), "stored solver specification");

        let mut updated = self.clone();
        updated.specification_url = format!("blob://{dest_path}");
        updated.save(store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use tempfile::tempdir;

    fn serve_once(body: &str) -> String {
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{}", addr)
    }

    #[test]
    fn save_spec_stores_body_and_rewrites_url() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(&dir.path().join("documents.db")).unwrap();
        let blobs = BlobStore::open(&dir.path().join("blobs")).unwrap();

        let spec_url = serve_once("net: { name: \"demo\" }");
        let solver = Solver::new("dataset-1", spec_url).insert(&store).unwrap();
        let id = solver.id.clone().unwrap();

        let updated = solver.save_spec(&store, &blobs).unwrap();
        assert_eq!(
            updated.specification_url,
            format!("blob://{id}/{SPEC_BLOB_FILE_NAME}")
        );
        assert_eq!(updated.rev, 2);

        let stored = std::fs::read_to_string(
            dir.path().join("blobs").join(&id).join(SPEC_BLOB_FILE_NAME),
        )
        .unwrap();
        assert_eq!(stored, "net: { name: \"demo\" }");
    }

    #[test]
    fn save_spec_requires_a_stored_solver() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(&dir.path().join("documents.db")).unwrap();
        let blobs = BlobStore::open(&dir.path().join("blobs")).unwrap();

        let solver = Solver::new("dataset-1", "http://example.com/spec");
        let err = solver.save_spec(&store, &blobs).unwrap_err();
        assert!(matches!(err, SolverError::NotStored));
    }

    #[test]
    fn save_spec_rejects_unparseable_urls() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::open(&dir.path().join("documents.db")).unwrap();
        let blobs = BlobStore::open(&dir.path().join("blobs")).unwrap();

        let solver = Solver::new("dataset-1", "not a url").insert(&store).unwrap();
        let err = solver.save_spec(&store, &blobs).unwrap_err();
        assert!(matches!(err, SolverError::InvalidSpecUrl { .. }));
    }
}
