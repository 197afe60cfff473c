//! Git transport for template fetching.
//!
//! History is fetched into a throwaway bare repository so the destination
//! receives only the working tree of the branch tip, never a `.git`
//! directory.

use super::materialize::{Materialized, SYMLINK_MODE, materialize_entry};
use git2::{Blob, ObjectType, Oid, Repository, Tree};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use vmforge_shared::errors::{VmforgeError, VmforgeResult};

pub const DEFAULT_BRANCH: &str = "master";
pub const DEFAULT_REMOTE: &str = "origin";

/// Helper macro to convert git2 errors to VmforgeError with context.
macro_rules! git_err {
    ($result:expr, $($context:tt)+) => {
        $result.map_err(|e| {
            VmforgeError::Fetch(format!("{}: {}", format!($($context)+), e.message()))
        })
    };
}

/// One file or symlink from a commit's tree.
pub struct RemoteEntry<'repo> {
    /// Path relative to the repository root.
    pub path: PathBuf,
    pub mode: u32,
    blob: Blob<'repo>,
}

impl RemoteEntry<'_> {
    pub fn is_symlink(&self) -> bool {
        self.mode == SYMLINK_MODE
    }

    /// Entry content. For symlinks, the link target.
    pub fn content(&self) -> &[u8] {
        self.blob.content()
    }
}

/// Lazy depth-first walk over every blob reachable from a tree.
///
/// Single pass: `None` marks the end of the tree, `Some(Err(_))` a failure,
/// after which the walk is over. Only the trees on the current path are held
/// open; they are released as the walk leaves them or when the iterator is
/// dropped.
pub struct TreeEntries<'repo> {
    repo: &'repo Repository,
    stack: Vec<Frame<'repo>>,
}

struct Frame<'repo> {
    prefix: PathBuf,
    tree: Tree<'repo>,
    next: usize,
}

impl<'repo> TreeEntries<'repo> {
    pub fn new(repo: &'repo Repository, root: Tree<'repo>) -> Self {
        Self {
            repo,
            stack: vec![Frame {
                prefix: PathBuf::new(),
                tree: root,
                next: 0,
            }],
        }
    }

    fn fail(&mut self, err: VmforgeError) -> Option<VmforgeResult<RemoteEntry<'repo>>> {
        self.stack.clear();
        Some(Err(err))
    }
}

impl<'repo> Iterator for TreeEntries<'repo> {
    type Item = VmforgeResult<RemoteEntry<'repo>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.tree.get(frame.next).map(|e| e.to_owned()) else {
                self.stack.pop();
                continue;
            };
            frame.next += 1;
            let path = frame.prefix.join(OsStr::from_bytes(entry.name_bytes()));

            match entry.kind() {
                Some(ObjectType::Tree) => {
                    match git_err!(self.repo.find_tree(entry.id()), "Failed to open tree {}", path.display()) {
                        Ok(tree) => self.stack.push(Frame {
                            prefix: path,
                            tree,
                            next: 0,
                        }),
                        Err(e) => return self.fail(e),
                    }
                }
                Some(ObjectType::Blob) => {
                    return match git_err!(self.repo.find_blob(entry.id()), "Failed to read {}", path.display()) {
                        Ok(blob) => Some(Ok(RemoteEntry {
                            path,
                            mode: entry.filemode() as u32,
                            blob,
                        })),
                        Err(e) => self.fail(e),
                    };
                }
                kind => {
                    tracing::debug!(path = %path.display(), kind = ?kind, "Skipping non-file tree entry");
                }
            }
        }
    }
}

/// What a fetch wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchSummary {
    /// Commit the tree was taken from.
    pub commit: String,
    pub files: usize,
    pub symlinks: usize,
}

/// Fetches the tip of a fixed branch and writes its tree into a directory.
#[derive(Debug, Clone)]
pub struct GitFetcher {
    branch: String,
    remote: String,
}

impl Default for GitFetcher {
    fn default() -> Self {
        Self {
            branch: DEFAULT_BRANCH.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
        }
    }
}

impl GitFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Materialize the branch tip of `source` into `dest`.
    ///
    /// `dest` must be empty: existing paths are never overwritten. The first
    /// failure aborts the fetch and leaves `dest` partially populated;
    /// removing it is the caller's job.
    pub fn fetch(&self, source: &str, dest: &Path) -> VmforgeResult<FetchSummary> {
        let scratch = tempfile::Builder::new().prefix("vmforge-git-").tempdir()?;
        let repo = git_err!(
            Repository::init_bare(scratch.path()),
            "Failed to initialize scratch repository"
        )?;

        let oid = self.sync(&repo, source)?;
        let commit = git_err!(repo.find_commit(oid), "Failed to load commit {}", oid)?;
        let tree = git_err!(commit.tree(), "Failed to load tree of {}", oid)?;

        tracing::info!(source, commit = %oid, dest = %dest.display(), "Materializing template");

        let mut summary = FetchSummary {
            commit: oid.to_string(),
            files: 0,
            symlinks: 0,
        };
        for entry in TreeEntries::new(&repo, tree) {
            let entry = entry?;
            match materialize_entry(dest, &entry.path, entry.mode, entry.content())? {
                Materialized::File => summary.files += 1,
                Materialized::Symlink => summary.symlinks += 1,
            }
        }

        tracing::info!(
            commit = %summary.commit,
            files = summary.files,
            symlinks = summary.symlinks,
            "Template fetched"
        );
        Ok(summary)
    }

    /// Fetch the branch into a remote-tracking ref and return its tip.
    fn sync(&self, repo: &Repository, source: &str) -> VmforgeResult<Oid> {
        let mut remote = git_err!(
            repo.remote(&self.remote, source),
            "Failed to add remote {}",
            source
        )?;

        let tracking = format!("refs/remotes/{}/{}", self.remote, self.branch);
        let refspec = format!("+refs/heads/{}:{}", self.branch, tracking);
        git_err!(
            remote.fetch(&[refspec.as_str()], None, None),
            "Failed to fetch {} from {}",
            self.branch,
            source
        )?;

        let reference = git_err!(
            repo.find_reference(&tracking),
            "Branch {} not found in {}",
            self.branch,
            source
        )?;
        let commit = git_err!(reference.peel_to_commit(), "Failed to resolve {}", tracking)?;
        Ok(commit.id())
    }
}
