//! Error types and handling
//!
//! This module provides the error types shared by the orchestration hub, the
//! memory adapters and the spoke implementations. All errors implement the
//! `HubErrorExt` trait which provides user-friendly hints and indicates whether
//! the error is recoverable.
//!
//! # Propagation
//!
//! - `UnknownSpace` is fatal to the individual write. Event writes are
//!   diagnostic and callers swallow it there.
//! - `ImplFailure` leaves the pipeline after every acquired spoke is released.
//! - `AdapterMisconfiguration` is raised at construction time, never deferred.

use thiserror::Error;

/// Result type for memory port and spoke operations
pub type Result<T> = std::result::Result<T, HubError>;

/// Trait for hub error extensions
pub trait HubErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and never includes prompt
    /// content or API keys.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors can be retried by the caller. Non-recoverable
    /// errors require the process to be reconfigured.
    fn is_recoverable(&self) -> bool;
}

/// Main hub error type
///
/// # Examples
///
/// ```
/// use sdk::errors::{HubError, HubErrorExt};
///
/// let error = HubError::UnknownSpace("wc-1".to_string());
/// assert!(error.is_recoverable());
///
/// let fatal = HubError::AdapterMisconfiguration("no memory".to_string());
/// assert!(!fatal.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum HubError {
    // Memory port errors
    #[error("Unknown space: {0}")]
    UnknownSpace(String),

    // Spoke errors
    #[error("Spoke '{role}' failed: {message}")]
    ImplFailure { role: String, message: String },

    // Construction errors
    #[error("Adapter misconfiguration: {0}")]
    AdapterMisconfiguration(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // LLM provider errors
    #[error("LLM provider error: {0}")]
    LLMProvider(String),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl HubError {
    /// Shorthand for a spoke failure attributed to `role`
    pub fn impl_failure(role: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ImplFailure {
            role: role.into(),
            message: message.into(),
        }
    }
}

impl HubErrorExt for HubError {
    fn user_hint(&self) -> &str {
        match self {
            Self::UnknownSpace(_) => "The memory space was already closed or never existed",
            Self::ImplFailure { .. } => "A worker failed while processing the ticket. Retry the run",
            Self::AdapterMisconfiguration(_) => "The memory adapter is not configured",
            Self::Config(_) => "Check your config.toml file for errors",
            Self::LLMProvider(_) => "LLM provider unavailable. Check your API key and network",
            Self::Network(_) => "Network operation failed. Check your connection",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        !matches!(self, Self::AdapterMisconfiguration(_) | Self::Config(_))
    }
}
