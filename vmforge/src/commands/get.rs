//! `vmforge get`: fetch a template from a remote repository, then build it
//! from inside the fetched directory.
//!
//! Exit codes: 0 on success, 1 on usage errors, 2 when the destination or
//! the fetch fails. When a build runs, its exit code is returned as is.

use super::{EXIT_ERROR, EXIT_SUCCESS, build};
use crate::template::{GitFetcher, RemoteSource};
use crate::ui::{BuildUi, ConsoleUi};
use crate::util::fs::create_dir_all;
use clap::Parser;
use std::path::{Path, PathBuf};
use vmforge_shared::errors::{ResultExt, VmforgeError, VmforgeResult};

#[derive(Debug, Parser)]
#[command(name = "get")]
pub struct GetArgs {
    /// Destination directory, which must not exist. Defaults to a fresh
    /// temporary directory.
    #[arg(short = 'd', long = "dest", value_name = "DIR")]
    pub dest: Option<PathBuf>,

    /// Keep the destination directory after exiting
    #[arg(short = 'k', long)]
    pub keep: bool,

    /// Only fetch the template and print where it was written
    #[arg(short = 'f', long = "fetch-only")]
    pub fetch_only: bool,

    /// Remote location: git://, git+http:// or git+https://
    #[arg(value_name = "REMOTE")]
    pub remote: String,

    /// Arguments passed to `build`, run from inside the destination
    #[arg(value_name = "BUILD_ARGS", trailing_var_arg = true, allow_hyphen_values = true)]
    pub build_args: Vec<String>,
}

pub async fn run(args: GetArgs) -> i32 {
    let ui = ConsoleUi::new("get");

    // Validated before anything touches the filesystem.
    let source = match RemoteSource::parse(&args.remote) {
        Ok(source) => source,
        Err(e) => {
            ui.error(&format!("err: {}", e));
            return EXIT_ERROR;
        }
    };

    fetch_and_build(&args, source).await
}

/// Fetch `source` into the destination and, unless only fetching, run
/// `build` from inside it.
pub(crate) async fn fetch_and_build(args: &GetArgs, source: RemoteSource) -> i32 {
    let ui = ConsoleUi::new("get");

    let dest = match prepare_destination(args.dest.as_deref()) {
        Ok(dest) => dest,
        Err(e) => {
            ui.error(&format!("err: {}", e));
            return EXIT_ERROR;
        }
    };
    let _scope = ScopedDir::new(dest.clone(), !args.keep);

    ui.say(&format!("Fetching {} into {}", args.remote, dest.display()));
    if let Err(e) = fetch(source, dest.clone()).await {
        ui.error(&format!("err: {}", e));
        return EXIT_ERROR;
    }

    if args.fetch_only {
        println!("{}", dest.display());
        return EXIT_SUCCESS;
    }

    // Dropped before `_scope`, so the previous directory is restored before
    // the destination is removed.
    let _cwd = match WorkingDir::enter(&dest) {
        Ok(guard) => guard,
        Err(e) => {
            ui.error(&format!("err: {}", e));
            return EXIT_ERROR;
        }
    };

    build::run_from_args(&args.build_args).await
}

async fn fetch(source: RemoteSource, dest: PathBuf) -> VmforgeResult<()> {
    let summary = tokio::task::spawn_blocking(move || GitFetcher::new().fetch(&source.url, &dest))
        .await
        .map_err(|e| VmforgeError::Internal(format!("fetch task failed: {}", e)))??;
    tracing::debug!(commit = %summary.commit, files = summary.files, "Fetch complete");
    Ok(())
}

/// Resolve the destination directory, creating it.
///
/// An explicit destination must not exist yet. Without one, a fresh
/// temporary directory is allocated.
pub(crate) fn prepare_destination(dest: Option<&Path>) -> VmforgeResult<PathBuf> {
    match dest {
        None => {
            let dir = tempfile::Builder::new().prefix("vmforge-get-").tempdir()?;
            #[allow(deprecated)]
            let path = dir.into_path();
            Ok(path)
        }
        Some(path) => {
            if path.symlink_metadata().is_ok() {
                return Err(VmforgeError::Storage(format!(
                    "destination dir must not exist: {}",
                    path.display()
                )));
            }
            create_dir_all(path)
                .with_context(|| format!("Failed to create destination {}", path.display()))?;
            Ok(path.to_path_buf())
        }
    }
}

/// Removes a directory tree on drop unless asked to keep it.
pub(crate) struct ScopedDir {
    path: PathBuf,
    remove: bool,
}

impl ScopedDir {
    pub(crate) fn new(path: PathBuf, remove: bool) -> Self {
        Self { path, remove }
    }
}

impl Drop for ScopedDir {
    fn drop(&mut self) {
        if !self.remove {
            return;
        }
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed destination"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove destination")
            }
        }
    }
}

/// Changes the process working directory, restoring the previous one on drop.
pub(crate) struct WorkingDir {
    previous: PathBuf,
}

impl WorkingDir {
    pub(crate) fn enter(dir: &Path) -> VmforgeResult<Self> {
        let previous = std::env::current_dir().context("Failed to read working directory")?;
        std::env::set_current_dir(dir)
            .with_context(|| format!("Failed to enter {}", dir.display()))?;
        Ok(Self { previous })
    }
}

impl Drop for WorkingDir {
    fn drop(&mut self) {
        if let Err(e) = std::env::set_current_dir(&self.previous) {
            tracing::warn!(
                path = %self.previous.display(),
                error = %e,
                "Failed to restore working directory"
            );
        }
    }
}
