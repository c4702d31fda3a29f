//! Embedded document store for dataset and solver metadata.
//!
//! Documents are JSON bodies in a single SQLite table, keyed by UUID with an
//! integer revision used for optimistic concurrency. Insert and save re-read
//! the stored row so callers always hold the assigned id and latest revision.

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::app_dirs;

pub mod dataset;
pub mod solver;

/// Filename for the document database stored under the user app directory.
pub const DOCUMENTS_DB_FILE_NAME: &str = "documents.db";

/// Errors returned when operating on the document store.
#[derive(Debug, Error)]
pub enum DocumentError {
    /// No suitable application directory was available.
    #[error("No suitable config directory available for document database")]
    NoConfigDir,
    /// Failed to create the directory holding the database file.
    #[error("Could not create document store directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to open or query the database.
    #[error("Document database query failed: {0}")]
    Sql(#[from] rusqlite::Error),
    /// Failed to serialize or deserialize a document body.
    #[error("Document body serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    /// The document has no id yet; it must be inserted first.
    #[error("Document has not been stored yet")]
    MissingId,
    /// No stored document matches the id and type.
    #[error("No {doc_type} document with id {id}")]
    NotFound {
        doc_type: &'static str,
        id: String,
    },
    /// The stored revision differs from the document's revision.
    #[error("Revision conflict on {id}: stored rev {stored}, document rev {given}")]
    RevisionConflict {
        id: String,
        stored: i64,
        given: i64,
    },
}

/// A typed record persisted in the document store.
pub trait Document: Serialize + DeserializeOwned {
    /// Tag distinguishing document kinds in the shared table.
    const DOC_TYPE: &'static str;

    /// Assigned id, if the document has been stored.
    fn id(&self) -> Option<&str>;

    /// Record the store-assigned id.
    fn set_id(&mut self, id: String);

    /// Stored revision; zero before the first insert.
    fn rev(&self) -> i64;

    /// Record the stored revision.
    fn set_rev(&mut self, rev: i64);
}

/// SQLite-backed store for JSON documents.
pub struct DocumentStore {
    connection: Connection,
}

impl DocumentStore {
    /// Open the store at `path`, creating the database and schema if needed.
    pub fn open(path: &Path) -> Result<Self, DocumentError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| DocumentError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let connection = Connection::open(path)?;
        let store = Self { connection };
        store.apply_pragmas()?;
        store.apply_schema()?;
        Ok(store)
    }

    /// Open the store at its default location under the app root directory.
    pub fn open_default() -> Result<Self, DocumentError> {
        let root = app_dirs::app_root_dir().map_err(|_| DocumentError::NoConfigDir)?;
        Self::open(&root.join(DOCUMENTS_DB_FILE_NAME))
    }

    fn apply_pragmas(&self) -> Result<(), DocumentError> {
        self.connection.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys=ON;
             PRAGMA busy_timeout=5000;",
        )?;
        Ok(())
    }

    fn apply_schema(&self) -> Result<(), DocumentError> {
        self.connection.execute_batch(
            "CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                doc_type TEXT NOT NULL,
                rev INTEGER NOT NULL,
                body TEXT NOT NULL
            );
             CREATE INDEX IF NOT EXISTS idx_documents_doc_type
                ON documents (doc_type);",
        )?;
        Ok(())
    }

    /// Insert a new document, assigning a fresh id and revision 1.
    ///
    /// Only call this for documents that do not exist yet. The stored copy is
    /// re-read and returned so the caller holds the id and revision fields.
    pub fn insert<D: Document>(&self, doc: &D) -> Result<D, DocumentError> {
        let id = uuid::Uuid::new_v4().to_string();
        let mut stored: D = clone_via_json(doc)?;
        stored.set_id(id.clone());
        stored.set_rev(1);
        let body = serde_json::to_string(&stored)?;
        self.connection.execute(
            "INSERT INTO documents (id, doc_type, rev, body) VALUES (?1, ?2, ?3, ?4)",
            params![id, D::DOC_TYPE, 1i64, body],
        )?;
        self.retrieve(&id)
    }

    /// Save an existing document, returning the copy with the bumped revision.
    ///
    /// Fails with [`DocumentError::RevisionConflict`] when the stored revision
    /// no longer matches the document's revision; the conflict is surfaced to
    /// the caller rather than retried.
    pub fn save<D: Document>(&self, doc: &D) -> Result<D, DocumentError> {
        let id = doc.id().ok_or(DocumentError::MissingId)?.to_string();
        let stored_rev: i64 = self
            .connection
            .query_row(
                "SELECT rev FROM documents WHERE id = ?1 AND doc_type = ?2",
                params![id, D::DOC_TYPE],
                |row| row.get(0),
            )
            .optional()?
            .ok_or_else(|| DocumentError::NotFound {
                doc_type: D::DOC_TYPE,
                id: id.clone(),
            })?;
        if stored_rev != doc.rev() {
            return Err(DocumentError::RevisionConflict {
                id,
                stored: stored_rev,
                given: doc.rev(),
            });
        }
        let mut updated: D = clone_via_json(doc)?;
        updated.set_rev(stored_rev + 1);
        let body = serde_json::to_string(&updated)?;
        self.connection.execute(
            "UPDATE documents SET rev = ?2, body = ?3 WHERE id = ?1",
            params![id, updated.rev(), body],
        )?;
        self.retrieve(&id)
    }

    /// Load a document by id.
    pub fn retrieve<D: Document>(&self, id: &str) -> Result<D, DocumentError> {
        let row: Option<(i64, String)> = self
            .connection
            .query_row(
                "SELECT rev, body FROM documents WHERE id = ?1 AND doc_type = ?2",
                params![id, D::DOC_TYPE],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (rev, body) = row.ok_or_else(|| DocumentError::NotFound {
            doc_type: D::DOC_TYPE,
            id: id.to_string(),
        })?;
        let mut doc: D = serde_json::from_str(&body)?;
        doc.set_id(id.to_string());
        doc.set_rev(rev);
        Ok(doc)
    }
}

fn clone_via_json<D: Document>(doc: &D) -> Result<D, serde_json::Error> {
    serde_json::from_value(serde_json::to_value(doc)?)
}

#[cfg(test)]
mod tests {
    use super::dataset::{Dataset, TestDataset, TrainingDataset};
    use super::*;
    use tempfile::tempdir;

    fn open_store(dir: &Path) -> DocumentStore {
        DocumentStore::open(&dir.join("documents.db")).unwrap()
    }

    fn sample_dataset() -> Dataset {
        Dataset {
            training: TrainingDataset {
                split_percentage: 0.8,
                url: None,
            },
            test: TestDataset {
                split_percentage: 0.2,
                url: None,
            },
            ..Dataset::default()
        }
    }

    #[test]
    fn insert_assigns_id_and_first_revision() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let stored = store.insert(&sample_dataset()).unwrap();
        assert!(stored.id.is_some());
        assert_eq!(stored.rev, 1);
        assert_eq!(stored.training.split_percentage, 0.8);
    }

    #[test]
    fn save_bumps_revision_and_persists_changes() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let mut stored = store.insert(&sample_dataset()).unwrap();
        stored.training.url = Some("blob://training.tar".to_string());
        let updated = store.save(&stored).unwrap();
        assert_eq!(updated.rev, 2);

        let id = updated.id.clone().unwrap();
        let reread: Dataset = store.retrieve(&id).unwrap();
        assert_eq!(reread.training.url.as_deref(), Some("blob://training.tar"));
    }

    #[test]
    fn save_with_stale_revision_conflicts() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let stored = store.insert(&sample_dataset()).unwrap();
        store.save(&stored).unwrap();

        let err = store.save(&stored).unwrap_err();
        assert!(matches!(err, DocumentError::RevisionConflict { .. }));
    }

    #[test]
    fn save_without_id_is_rejected() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let err = store.save(&sample_dataset()).unwrap_err();
        assert!(matches!(err, DocumentError::MissingId));
    }

    #[test]
    fn retrieve_unknown_id_is_not_found() {
        let dir = tempdir().unwrap();
        let store = open_store(dir.path());
        let err = store.retrieve::<Dataset>("missing").unwrap_err();
        assert!(matches!(err, DocumentError::NotFound { .. }));
    }
}
