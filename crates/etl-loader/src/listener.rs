//! Error listener for soft failures

use crate::error::LoadError;

/// Receives per-object lookup save failures during commit
pub trait ErrorListener: Send + Sync {
    /// Report a failure for the object identified by `identifier`
    fn on_error(&self, identifier: &str, error: &LoadError);
}

impl<F> ErrorListener for F
where
    F: Fn(&str, &LoadError) + Send + Sync,
{
    fn on_error(&self, identifier: &str, error: &LoadError) {
        self(identifier, error);
    }
}

/// Listener that logs failures at warn level
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

impl ErrorListener for LoggingListener {
    fn on_error(&self, identifier: &str, error: &LoadError) {
        tracing::warn!(%identifier, %error, "failed to save lookup");
    }
}
