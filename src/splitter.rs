//! Deterministic train/test splitting of labeled tar archives.
//!
//! A source archive groups files into one directory per label
//! (`<label>/<filename>`). The splitter buffers the archive into a per-label
//! index, partitions each label group by the configured fractions, and emits
//! the two halves as fresh tar archives carrying the original headers and
//! body bytes. Buffering is required because a proportional split point can
//! only be chosen once a label's total entry count is known, and tar streams
//! are forward-only.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use tar::{Archive, Builder, Header};
use thiserror::Error;

/// Tolerance applied when checking that the two fractions sum to one.
const FRACTION_SUM_EPSILON: f64 = 1e-9;

/// Errors returned by archive validation, indexing, and splitting.
#[derive(Debug, Error)]
pub enum SplitError {
    /// The configured fractions are out of range or do not sum to one.
    #[error("invalid split fractions: train={train}, test={test}")]
    InvalidFractions {
        /// Requested training fraction.
        train: f64,
        /// Requested test fraction.
        test: f64,
    },
    /// An entry path does not have the `<label>/<filename>` shape.
    #[error("archive entry {0:?} is not of the form <label>/<filename>")]
    MalformedEntryPath(String),
    /// An entry path is not valid UTF-8 and therefore cannot name a label.
    #[error("archive entry path is not valid UTF-8")]
    NonUtf8EntryPath,
    /// Reading the source archive or writing an output archive failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Fractions controlling how each label group divides between the outputs.
#[derive(Debug, Clone, Copy)]
pub struct SplitConfig {
    train_fraction: f64,
    test_fraction: f64,
}

impl SplitConfig {
    /// Build a config, rejecting fractions outside `[0, 1]` or pairs whose
    /// sum is not one.
    pub fn new(train_fraction: f64, test_fraction: f64) -> Result<Self, SplitError> {
        let in_range = |fraction: f64| (0.0..=1.0).contains(&fraction);
        if !in_range(train_fraction)
            || !in_range(test_fraction)
            || (train_fraction + test_fraction - 1.0).abs() > FRACTION_SUM_EPSILON
        {
            return Err(SplitError::InvalidFractions {
                train: train_fraction,
                test: test_fraction,
            });
        }
        Ok(Self {
            train_fraction,
            test_fraction,
        })
    }

    /// Fraction of each label group routed to the training output.
    pub fn train_fraction(&self) -> f64 {
        self.train_fraction
    }

    /// Fraction of each label group routed to the test output.
    pub fn test_fraction(&self) -> f64 {
        self.test_fraction
    }

    /// Number of entries a label group of `n` routes to the training side.
    ///
    /// Training receives `floor(n * train_fraction)` entries and the test
    /// side receives the remainder, so non-integral split points favor the
    /// test output. Exact for divisible cases (n=2 at 0.5 gives 1 and 1).
    pub fn train_count(&self, n: usize) -> usize {
        (n as f64 * self.train_fraction).floor() as usize
    }
}

/// One buffered archive entry: header, UTF-8 path, and raw body bytes.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    header: Header,
    path: String,
    body: Vec<u8>,
}

impl ArchiveEntry {
    /// Full `<label>/<filename>` path inside the archive.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw content bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Per-label index of a source archive, in original archive order.
pub type DatasetIndex = BTreeMap<String, Vec<ArchiveEntry>>;

/// Totals reported by a completed [`DatasetSplitter::transform`].
#[derive(Debug, Clone, Copy)]
pub struct SplitSummary {
    /// Distinct labels seen in the source archive.
    pub labels: usize,
    /// Entries written to the training archive.
    pub train_entries: usize,
    /// Entries written to the test archive.
    pub test_entries: usize,
}

/// Splits one labeled archive into a training archive and a test archive.
pub struct DatasetSplitter {
    config: SplitConfig,
}

impl DatasetSplitter {
    /// Create a splitter for one split operation.
    pub fn new(config: SplitConfig) -> Self {
        Self { config }
    }

    /// The fractions this splitter applies.
    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Check that every entry path is exactly `<label>/<filename>`.
    ///
    /// Read-only structural pass; stops at the first violation. An archive
    /// with no entries is valid.
    pub fn validate<R: Read>(&self, archive: &mut Archive<R>) -> Result<(), SplitError> {
        for entry in archive.entries()? {
            let entry = entry?;
            let path = entry_path_string(entry.path_bytes().as_ref())?;
            split_label_path(&path)?;
        }
        Ok(())
    }

    /// Buffer the archive into a per-label index, preserving archive order
    /// within each label.
    ///
    /// Performs the same structural check as [`Self::validate`] inline, so it
    /// can run against a fresh stream without a prior validation pass.
    pub fn create_map<R: Read>(&self, archive: &mut Archive<R>) -> Result<DatasetIndex, SplitError> {
        let mut index = DatasetIndex::new();
        for entry in archive.entries()? {
            let mut entry = entry?;
            let path = entry_path_string(entry.path_bytes().as_ref())?;
            let (label, _) = split_label_path(&path)?;
            let label = label.to_string();
            let header = entry.header().clone();
            let mut body = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut body)?;
            index
                .entry(label)
                .or_default()
                .push(ArchiveEntry { header, path, body });
        }
        Ok(index)
    }

    /// Split `source` into the `train` and `test` archives.
    ///
    /// Indexes the full source first (no bytes are written if the archive is
    /// structurally invalid), then routes each label group's leading
    /// [`SplitConfig::train_count`] entries to `train` and the remainder to
    /// `test`, preserving relative order. Neither builder is finalized here;
    /// callers finish the archives once they are done appending.
    ///
    /// Any error after writing has begun leaves the outputs partially
    /// written; callers must discard them and may retry from a fresh copy of
    /// the source bytes.
    pub fn transform<R: Read, TW: Write, EW: Write>(
        &self,
        source: &mut Archive<R>,
        train: &mut Builder<TW>,
        test: &mut Builder<EW>,
    ) -> Result<SplitSummary, SplitError> {
        let index = self.create_map(source)?;
        let mut summary = SplitSummary {
            labels: index.len(),
            train_entries: 0,
            test_entries: 0,
        };
        for (label, entries) in &index {
            let train_count = self.config.train_count(entries.len());
            tracing::debug!(
                label = %label,
                total = entries.len(),
                train_count,
                "splitting label group"
            );
            let (to_train, to_test) = entries.split_at(train_count);
            for entry in to_train {
                append_entry(train, entry)?;
            }
            for entry in to_test {
                append_entry(test, entry)?;
            }
            summary.train_entries += to_train.len();
            summary.test_entries += to_test.len();
        }
        tracing::info!(
            labels = summary.labels,
            train_entries = summary.train_entries,
            test_entries = summary.test_entries,
            "split complete"
        );
        Ok(summary)
    }
}

fn append_entry<W: Write>(builder: &mut Builder<W>, entry: &ArchiveEntry) -> Result<(), SplitError> {
    let mut header = entry.header.clone();
    builder.append_data(&mut header, &entry.path, entry.body.as_slice())?;
    Ok(())
}

fn entry_path_string(bytes: &[u8]) -> Result<String, SplitError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| SplitError::NonUtf8EntryPath)
}

/// Split `<label>/<filename>` into its two components.
///
/// Paths with zero separators, more than one separator, or an empty component
/// (including directory entries ending in `/`) are structural errors.
fn split_label_path(path: &str) -> Result<(&str, &str), SplitError> {
    let mut parts = path.split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(label), Some(name), None) if !label.is_empty() && !name.is_empty() => {
            Ok((label, name))
        }
        _ => Err(SplitError::MalformedEntryPath(path.to_string())),
    }
}
