//! Dataset metadata document.

use serde::{Deserialize, Serialize};

use super::{Document, DocumentError, DocumentStore};
use crate::splitter::{SplitConfig, SplitError};

/// Training half of a dataset: its split fraction plus the output archive
/// URL once the split has been written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingDataset {
    /// Fraction of each label group routed to the training archive.
    #[serde(rename = "split-percentage")]
    pub split_percentage: f64,
    /// Location of the written training archive, if any.
    #[serde(rename = "url", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Test half of a dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TestDataset {
    /// Fraction of each label group routed to the test archive.
    #[serde(rename = "split-percentage")]
    pub split_percentage: f64,
    /// Location of the written test archive, if any.
    #[serde(rename = "url", skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A labeled dataset registered for splitting.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    /// Store-assigned id.
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Stored revision; zero before the first insert.
    #[serde(rename = "_rev", default)]
    pub rev: i64,
    /// URL of the source archive the split reads from.
    #[serde(rename = "source-url", skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Training half configuration and output location.
    #[serde(rename = "training-dataset")]
    pub training: TrainingDataset,
    /// Test half configuration and output location.
    #[serde(rename = "test-dataset")]
    pub test: TestDataset,
}

impl Document for Dataset {
    const DOC_TYPE: &'static str = "dataset";

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

impl Dataset {
    /// Insert into the store. Only for datasets that do not exist yet.
    pub fn insert(&self, store: &DocumentStore) -> Result<Dataset, DocumentError> {
        store.insert(self)
    }

    /// Save, returning the copy with the bumped revision.
    pub fn save(&self, store: &DocumentStore) -> Result<Dataset, DocumentError> {
        store.save(self)
    }

    /// Build the split configuration from this dataset's fractions.
    pub fn split_config(&self) -> Result<SplitConfig, SplitError> {
        SplitConfig::new(self.training.split_percentage, self.test.split_percentage)
    }
}
