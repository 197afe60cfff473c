//! Filesystem helpers used during provisioning and unwind.

use serde::{Deserialize, Serialize};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::Path;
use std::time::Duration;

/// Standard permissions for directories created by vmforge.
pub const DIR_MODE: u32 = 0o755;

/// Bounded retry policy for removing directories that child processes may
/// still hold open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            delay_ms: 2000,
        }
    }
}

/// Create `path` and all missing parents with [`DIR_MODE`].
pub fn create_dir_all(path: &Path) -> io::Result<()> {
    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(DIR_MODE)
        .create(path)
}

/// Recursively remove `path`, retrying per `policy`.
///
/// Returns `true` once the directory is gone (a missing directory counts as
/// removed), `false` after every attempt failed. Never returns an error: this
/// runs while unwinding a build.
pub async fn remove_dir_all_with_retry(path: &Path, policy: &RetryPolicy) -> bool {
    remove_with_retry(path, policy, |p| std::fs::remove_dir_all(p)).await
}

pub(crate) async fn remove_with_retry<F>(path: &Path, policy: &RetryPolicy, mut remove: F) -> bool
where
    F: FnMut(&Path) -> io::Result<()>,
{
    for attempt in 1..=policy.attempts {
        match remove(path) {
            Ok(()) => return true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return true,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    attempt,
                    max_attempts = policy.attempts,
                    error = %e,
                    "Error removing output dir"
                );
                if attempt < policy.attempts {
                    tokio::time::sleep(policy.delay()).await;
                }
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            attempts: 5,
            delay_ms: 1,
        }
    }

    #[tokio::test]
    async fn test_gives_up_after_exactly_five_attempts() {
        let mut calls = 0;
        let removed = remove_with_retry(Path::new("/busy"), &fast_policy(), |_| {
            calls += 1;
            Err(io::Error::other("directory busy"))
        })
        .await;

        assert!(!removed);
        assert_eq!(calls, 5);
    }

    #[tokio::test]
    async fn test_stops_retrying_after_success() {
        let mut calls = 0;
        let removed = remove_with_retry(Path::new("/busy"), &fast_policy(), |_| {
            calls += 1;
            if calls < 3 {
                Err(io::Error::other("directory busy"))
            } else {
                Ok(())
            }
        })
        .await;

        assert!(removed);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_missing_directory_counts_as_removed() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("never-created");
        assert!(remove_dir_all_with_retry(&missing, &fast_policy()).await);
    }

    #[tokio::test]
    async fn test_removes_populated_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("output");
        create_dir_all(&dir.join("nested")).unwrap();
        std::fs::write(dir.join("nested/disk.img"), b"data").unwrap();

        assert!(remove_dir_all_with_retry(&dir, &fast_policy()).await);
        assert!(!dir.exists());
    }

    #[test]
    fn test_create_dir_all_uses_standard_mode() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("a/b/c");
        create_dir_all(&dir).unwrap();

        let mode = std::fs::metadata(&dir).unwrap().permissions().mode();
        assert_eq!(mode & 0o777 & !DIR_MODE, 0);
    }
}
