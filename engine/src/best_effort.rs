//! Non-critical operations
//!
//! Event writes and chat-turn persistence must never abort the operation that
//! triggered them. Failures are logged at `warn` and turned into `None`.

use std::fmt::Display;
use std::future::Future;
use tracing::warn;

/// Run a fallible, non-critical operation and swallow its error
pub fn best_effort<T, E, F>(what: &str, op: F) -> Option<T>
where
    E: Display,
    F: FnOnce() -> Result<T, E>,
{
    match op() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} failed (ignored): {}", what, e);
            None
        }
    }
}

/// Async counterpart of [`best_effort`]
pub async fn best_effort_async<T, E, F>(what: &str, fut: F) -> Option<T>
where
    E: Display,
    F: Future<Output = Result<T, E>>,
{
    match fut.await {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("{} failed (ignored): {}", what, e);
            None
        }
    }
}
