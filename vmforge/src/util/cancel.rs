//! Cancellation signal shared between the pipeline and in-flight tool calls.

use tokio_util::sync::CancellationToken;

/// Cloneable cancellation flag.
///
/// All clones observe the same flag. Once cancelled, a token stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: CancellationToken,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation and wake every task waiting in [`CancelToken::cancelled`].
    pub fn cancel(&self) {
        self.inner.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolve once the token has been cancelled.
    pub async fn cancelled(&self) {
        self.inner.cancelled().await
    }
}
