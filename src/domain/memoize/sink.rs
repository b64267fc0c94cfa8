//! Logging sink for non-fatal memoization warnings

#[cfg(test)]
use mockall::automock;

/// Receives critical-level messages about calls that could not be cached.
///
/// Implementations must not panic and must not block the caller.
#[cfg_attr(test, automock)]
pub trait LogSink: Send + Sync {
    fn critical(&self, message: &str);
}

/// Forwards messages to `tracing` at error level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn critical(&self, message: &str) {
        tracing::error!(target: "scoped_memo", "{}", message);
    }
}
