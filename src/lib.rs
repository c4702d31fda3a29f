//! Library exports for the splitpack dataset tools.
/// Application directory helpers.
pub mod app_dirs;
/// Filesystem-backed blob store.
pub mod blobs;
/// TOML settings for the binaries.
pub mod config;
/// Document store and typed metadata documents.
pub mod documents;
/// Logging setup.
pub mod logging;
/// Train/test splitting of labeled tar archives.
pub mod splitter;

mod http_client;
