//! Error taxonomy for image builds and template fetching.

use thiserror::Error;

pub type VmforgeResult<T> = Result<T, VmforgeError>;

#[derive(Error, Debug)]
pub enum VmforgeError {
    /// Invalid build configuration or command usage. Detected before any side effect.
    #[error("configuration error: {0}")]
    Config(String),

    /// External tool ran but exited unsuccessfully.
    #[error("{program} exited with {status}: {output}")]
    Tool {
        program: String,
        status: String,
        /// Combined stdout and stderr of the tool.
        output: String,
    },

    /// External tool could not be started at all.
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("template error: {0}")]
    Template(String),

    #[error("fetch error: {0}")]
    Fetch(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<VmforgeError>,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl VmforgeError {
    /// Wrap this error with a message describing the failed operation.
    pub fn context(self, context: impl Into<String>) -> Self {
        VmforgeError::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// True if this error, or any error it wraps, is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            VmforgeError::Cancelled => true,
            VmforgeError::Context { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Attach context to any result whose error converts into [`VmforgeError`].
pub trait ResultExt<T> {
    fn context<C: Into<String>>(self, context: C) -> VmforgeResult<T>;

    fn with_context<C, F>(self, f: F) -> VmforgeResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C;
}

impl<T, E> ResultExt<T> for Result<T, E>
where
    E: Into<VmforgeError>,
{
    fn context<C: Into<String>>(self, context: C) -> VmforgeResult<T> {
        self.map_err(|e| e.into().context(context))
    }

    fn with_context<C, F>(self, f: F) -> VmforgeResult<T>
    where
        C: Into<String>,
        F: FnOnce() -> C,
    {
        self.map_err(|e| e.into().context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_cause_in_message() {
        let err = VmforgeError::Tool {
            program: "qemu-img".into(),
            status: "exit status: 1".into(),
            output: "disk full".into(),
        }
        .context("Error creating hard drive");

        let msg = err.to_string();
        assert!(msg.starts_with("Error creating hard drive: "));
        assert!(msg.contains("disk full"));
    }

    #[test]
    fn test_is_cancelled_through_context() {
        assert!(VmforgeError::Cancelled.is_cancelled());
        assert!(
            VmforgeError::Cancelled
                .context("Error creating network")
                .is_cancelled()
        );
        assert!(!VmforgeError::Internal("x".into()).is_cancelled());
    }

    #[test]
    fn test_result_ext_converts_io_errors() {
        let res: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            "exists",
        ));
        let err = res.context("Failed to create file").unwrap_err();
        assert!(matches!(err, VmforgeError::Context { .. }));
        assert_eq!(err.to_string(), "Failed to create file: exists");
    }
}
