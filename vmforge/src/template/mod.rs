//! Remote build templates.
//!
//! Turns a version-controlled tree into a local working directory that the
//! build pipeline can run against:
//!
//! ```text
//! RemoteSource::parse ──→ GitFetcher::fetch ──→ TreeEntries ──→ materialize_entry
//!   (scheme check)         (bare scratch repo)    (lazy walk)     (files, symlinks)
//! ```

mod git;
mod materialize;
mod source;

pub use git::{DEFAULT_BRANCH, DEFAULT_REMOTE, FetchSummary, GitFetcher, RemoteEntry, TreeEntries};
pub use materialize::{Materialized, SYMLINK_MODE, materialize_entry};
pub use source::{RemoteSource, Transport};
